//! Decision command: evaluate a context snapshot against the engine.

use chrono::{DateTime, Utc};
use clap::Args;
use cueist_core::{ActivityState, CalendarAvailability, Context, LocationCategory};

/// Context flags shared by the decide and feedback commands.
#[derive(Args, Clone)]
pub struct ContextArgs {
    /// Activity: stationary, walking, running, cycling, driving
    #[arg(long, default_value = "stationary")]
    pub activity: String,

    /// Location category: home, work, campus, commute, gym, errand, unknown
    #[arg(long, default_value = "unknown")]
    pub location: String,

    /// Finer location label for rule matching (e.g. leaving_home)
    #[arg(long)]
    pub location_vector: Option<String>,

    /// Current speed in km/h
    #[arg(long, default_value = "0.0")]
    pub speed: f64,

    /// Connected to car Bluetooth
    #[arg(long)]
    pub car_bluetooth: bool,

    /// Current WiFi SSID (omit when disconnected)
    #[arg(long)]
    pub wifi: Option<String>,

    /// Calendar availability: free, busy, tentative, unknown
    #[arg(long, default_value = "unknown")]
    pub calendar: String,

    /// Snapshot timestamp (RFC3339); defaults to now
    #[arg(long)]
    pub at: Option<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> Result<Context, Box<dyn std::error::Error>> {
        let timestamp = match &self.at {
            Some(raw) => DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc),
            None => Utc::now(),
        };

        let mut context = Context::new(
            timestamp,
            parse_activity(&self.activity)?,
            parse_location(&self.location)?,
        );
        context.speed_kmh = self.speed;
        context.location_vector = self.location_vector.clone();
        context.car_bluetooth = self.car_bluetooth;
        context.wifi_ssid = self.wifi.clone();
        context.calendar = parse_availability(&self.calendar)?;
        Ok(context)
    }
}

pub fn parse_activity(raw: &str) -> Result<ActivityState, Box<dyn std::error::Error>> {
    match raw.to_ascii_lowercase().as_str() {
        "stationary" | "still" => Ok(ActivityState::Stationary),
        "walking" => Ok(ActivityState::Walking),
        "running" => Ok(ActivityState::Running),
        "cycling" => Ok(ActivityState::Cycling),
        "driving" | "in_vehicle" => Ok(ActivityState::Driving),
        _ => Err(format!("unknown activity: {raw}").into()),
    }
}

pub fn parse_location(raw: &str) -> Result<LocationCategory, Box<dyn std::error::Error>> {
    match raw.to_ascii_lowercase().as_str() {
        "home" => Ok(LocationCategory::Home),
        "work" => Ok(LocationCategory::Work),
        "campus" => Ok(LocationCategory::Campus),
        "commute" => Ok(LocationCategory::Commute),
        "gym" => Ok(LocationCategory::Gym),
        "errand" => Ok(LocationCategory::Errand),
        "unknown" => Ok(LocationCategory::Unknown),
        _ => Err(format!("unknown location category: {raw}").into()),
    }
}

fn parse_availability(raw: &str) -> Result<CalendarAvailability, Box<dyn std::error::Error>> {
    match raw.to_ascii_lowercase().as_str() {
        "free" => Ok(CalendarAvailability::Free),
        "busy" => Ok(CalendarAvailability::Busy),
        "tentative" => Ok(CalendarAvailability::Tentative),
        "unknown" => Ok(CalendarAvailability::Unknown),
        _ => Err(format!("unknown calendar availability: {raw}").into()),
    }
}

#[derive(Args)]
pub struct DecideArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Print the full decision as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: DecideArgs) -> Result<(), Box<dyn std::error::Error>> {
    let context = args.context.to_context()?;
    let mut engine = super::open_engine()?;
    let decision = engine.decide(&context)?;

    if decision.quality == cueist_core::DecisionQuality::Degraded {
        eprintln!("warning: optimizer degraded to greedy fallback");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!(
        "context: {} ({} rules evaluated, quality: {:?})",
        decision.context_key, decision.rules_evaluated, decision.quality
    );
    if decision.suggestions.is_empty() {
        println!("no suggestions right now");
        return Ok(());
    }
    for (i, suggestion) in decision.suggestions.iter().enumerate() {
        let window = suggestion
            .chosen_window
            .map(|w| format!("{w} min before"))
            .unwrap_or_else(|| "skipped".to_string());
        println!(
            "{}. {} [{}] confidence {:.0}% x timing {:.0}%",
            i + 1,
            suggestion.title,
            window,
            suggestion.confidence * 100.0,
            suggestion.timing_confidence * 100.0,
        );
        println!("   why: {}", suggestion.reasoning);
        println!("   timing: {}", suggestion.explanation);
    }
    if let Some(search) = &decision.search {
        println!(
            "search: {} nodes in {:.1} ms (completed: {})",
            search.nodes_explored, search.search_time_ms, search.search_completed
        );
    }
    Ok(())
}
