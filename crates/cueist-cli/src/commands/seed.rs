//! Demo seeding: canonical rules and events so decide has something to chew on.

use chrono::{Duration, Utc};
use cueist_core::{
    ActivityState, Db, EventPriority, ScheduledEvent, TaskRule, TimeRange, TriggerCondition,
    WifiCondition,
};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Db::open()?;

    if db.rule_count()? > 0 {
        println!("database already seeded ({} rules), skipping", db.rule_count()?);
        return Ok(());
    }

    let rules = vec![
        TaskRule::new(
            "Get Fuel",
            TriggerCondition {
                activity: Some(ActivityState::Driving),
                time_range: Some(TimeRange::parse("07:00-10:00")?),
                location_vector: Some("leaving_home".to_string()),
                min_speed: Some(15.0),
                ..Default::default()
            },
            0.75,
        )
        .with_description("Stop at gas station on your commute"),
        TaskRule::new(
            "Stop for Coffee",
            TriggerCondition {
                activity: Some(ActivityState::Driving),
                time_range: Some(TimeRange::parse("07:00-09:30")?),
                location_vector: Some("leaving_home".to_string()),
                car_bluetooth: Some(true),
                ..Default::default()
            },
            0.80,
        )
        .with_description("Grab coffee on your morning commute"),
        TaskRule::new(
            "Review Morning Emails",
            TriggerCondition {
                activity: Some(ActivityState::Stationary),
                time_range: Some(TimeRange::parse("08:30-10:30")?),
                location_vector: Some("work".to_string()),
                ..Default::default()
            },
            0.70,
        )
        .with_description("Check important emails when arriving at work"),
        TaskRule::new(
            "Buy Groceries",
            TriggerCondition {
                activity: Some(ActivityState::Driving),
                time_range: Some(TimeRange::parse("16:30-19:00")?),
                location_vector: Some("leaving_work".to_string()),
                ..Default::default()
            },
            0.72,
        )
        .with_description("Stop for groceries on the way home"),
        TaskRule::new(
            "Take Evening Medication",
            TriggerCondition {
                activity: Some(ActivityState::Stationary),
                time_range: Some(TimeRange::parse("20:00-22:30")?),
                location_vector: Some("home".to_string()),
                wifi_ssid: Some(WifiCondition::Ssid("HomeNet".to_string())),
                ..Default::default()
            },
            0.85,
        )
        .with_description("Daily medication reminder at home"),
    ];

    for rule in &rules {
        db.insert_rule(rule)?;
        println!("seeded rule: {} ({})", rule.name, rule.id);
    }

    let now = Utc::now();
    let mut dentist = ScheduledEvent::new(
        "demo-dentist",
        "Dentist Appointment",
        now + Duration::hours(4),
        EventPriority::High,
    );
    dentist.preparation_minutes = 15;
    dentist.travel_minutes = 25;
    db.insert_event(&dentist)?;
    println!("seeded event: {} ({})", dentist.title, dentist.id);

    let mut pickup = ScheduledEvent::new(
        "demo-pickup",
        "Pick up prescription",
        now + Duration::hours(8),
        EventPriority::Low,
    );
    pickup.suggested_contexts = vec!["errand".to_string(), "commute".to_string()];
    db.insert_event(&pickup)?;
    println!("seeded event: {} ({})", pickup.title, pickup.id);

    println!("done: {} rules, 2 events", rules.len());
    Ok(())
}
