//! Scheduled event management commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use cueist_core::{Db, EventPriority, ScheduledEvent};

#[derive(Subcommand)]
pub enum EventAction {
    /// List all scheduled events
    List,
    /// Create a scheduled event
    Add {
        /// Event ID (external calendar id)
        id: String,
        /// Event title
        title: String,
        /// Start time (RFC3339)
        #[arg(long)]
        start: String,
        /// Priority: high, medium, low
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Preparation time in minutes
        #[arg(long, default_value = "0")]
        prep: u32,
        /// Travel time in minutes
        #[arg(long, default_value = "0")]
        travel: u32,
        /// Comma-separated location contexts where reminding is worthwhile
        #[arg(long)]
        contexts: Option<String>,
        /// Event description
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark an event completed
    Complete {
        /// Event ID
        id: String,
    },
    /// Dismiss an event
    Dismiss {
        /// Event ID
        id: String,
    },
}

fn parse_priority(raw: &str) -> Result<EventPriority, Box<dyn std::error::Error>> {
    match raw.to_ascii_lowercase().as_str() {
        "high" => Ok(EventPriority::High),
        "medium" => Ok(EventPriority::Medium),
        "low" => Ok(EventPriority::Low),
        _ => Err(format!("unknown priority: {raw}").into()),
    }
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Db::open()?;

    match action {
        EventAction::List => {
            let events = db.all_events()?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        EventAction::Add {
            id,
            title,
            start,
            priority,
            prep,
            travel,
            contexts,
            description,
        } => {
            let start_time = DateTime::parse_from_rfc3339(&start)?.with_timezone(&Utc);
            let mut event = ScheduledEvent::new(id, title, start_time, parse_priority(&priority)?);
            event.preparation_minutes = prep;
            event.travel_minutes = travel;
            event.description = description;
            event.suggested_contexts = contexts
                .map(|c| c.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();

            db.insert_event(&event)?;
            println!("Event created: {}", event.id);
            println!("reminder from: {}", event.reminder_time());
        }
        EventAction::Complete { id } => {
            db.set_event_completed(&id)?;
            println!("Event completed: {id}");
        }
        EventAction::Dismiss { id } => {
            db.set_event_dismissed(&id)?;
            println!("Event dismissed: {id}");
        }
    }
    Ok(())
}
