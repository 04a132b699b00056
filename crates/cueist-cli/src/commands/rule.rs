//! Task rule management commands.

use clap::Subcommand;
use cueist_core::{Db, TaskRule, TaskRuleStore, TimeRange, TriggerCondition, WifiCondition};
use uuid::Uuid;

use super::decide::parse_activity;

#[derive(Subcommand)]
pub enum RuleAction {
    /// List rules
    List {
        /// Include deactivated rules
        #[arg(long)]
        all: bool,
    },
    /// Create a new rule
    Add {
        /// Task name
        name: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Initial probability weight (0.0 to 1.0)
        #[arg(long, default_value = "0.7")]
        weight: f64,
        /// Required activity (e.g. driving)
        #[arg(long)]
        activity: Option<String>,
        /// Time range predicate, "HH:MM-HH:MM" (may wrap midnight)
        #[arg(long)]
        time_range: Option<String>,
        /// Location label predicate (e.g. leaving_home)
        #[arg(long)]
        location_vector: Option<String>,
        /// Require car Bluetooth connection state
        #[arg(long)]
        car_bluetooth: Option<bool>,
        /// WiFi SSID predicate, or "disconnected"
        #[arg(long)]
        wifi: Option<String>,
        /// Minimum speed in km/h
        #[arg(long)]
        min_speed: Option<f64>,
        /// Link to a scheduled calendar event
        #[arg(long)]
        event_id: Option<String>,
    },
    /// Get rule details
    Get {
        /// Rule ID
        id: String,
    },
    /// Activate a rule
    Enable {
        /// Rule ID
        id: String,
    },
    /// Deactivate a rule
    Disable {
        /// Rule ID
        id: String,
    },
}

pub fn run(action: RuleAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Db::open()?;

    match action {
        RuleAction::List { all } => {
            let rules = if all { db.all_rules()? } else { db.list_active()? };
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        RuleAction::Add {
            name,
            description,
            weight,
            activity,
            time_range,
            location_vector,
            car_bluetooth,
            wifi,
            min_speed,
            event_id,
        } => {
            let trigger = TriggerCondition {
                activity: activity.as_deref().map(parse_activity).transpose()?,
                time_range: time_range.as_deref().map(TimeRange::parse).transpose()?,
                location_vector,
                car_bluetooth,
                wifi_ssid: wifi.map(WifiCondition::from),
                min_speed,
                ..Default::default()
            };

            let mut rule = TaskRule::new(name, trigger, weight);
            if let Some(d) = description {
                rule = rule.with_description(d);
            }
            if let Some(e) = event_id {
                rule = rule.with_event(e);
            }
            db.insert_rule(&rule)?;
            println!("Rule created: {}", rule.id);
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }
        RuleAction::Get { id } => {
            let id = Uuid::parse_str(&id)?;
            match db.get_rule(id)? {
                Some(rule) => println!("{}", serde_json::to_string_pretty(&rule)?),
                None => println!("Rule not found: {id}"),
            }
        }
        RuleAction::Enable { id } => {
            let id = Uuid::parse_str(&id)?;
            db.set_rule_active(id, true)?;
            println!("Rule activated: {id}");
        }
        RuleAction::Disable { id } => {
            let id = Uuid::parse_str(&id)?;
            db.set_rule_active(id, false)?;
            println!("Rule deactivated: {id}");
        }
    }
    Ok(())
}
