//! Integration tests for the full decide/feedback loop.
//!
//! These tests run the decision engine end-to-end: seeded rules and events,
//! repeated decide() calls, and feedback that shifts both rule weights and
//! timing beliefs -- on the in-memory store and on a real SQLite file.

use chrono::{Duration, TimeZone, Utc};
use cueist_core::{
    ActivityState, Context, DecisionEngine, DecisionQuality, Db, EventPriority, LocationCategory,
    MemoryStore, ScheduledEvent, TaskRule, TimeRange, TriggerCondition,
};

fn commute_context() -> Context {
    // Monday 08:30 UTC.
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();
    let mut ctx = Context::new(ts, ActivityState::Driving, LocationCategory::Commute);
    ctx.speed_kmh = 45.0;
    ctx.car_bluetooth = true;
    ctx.location_vector = Some("leaving_home".to_string());
    ctx
}

fn fuel_rule() -> TaskRule {
    TaskRule::new(
        "Get Fuel",
        TriggerCondition {
            activity: Some(ActivityState::Driving),
            time_range: Some(TimeRange::parse("07:00-10:00").unwrap()),
            location_vector: Some("leaving_home".to_string()),
            min_speed: Some(15.0),
            ..Default::default()
        },
        0.75,
    )
    .with_description("Stop at gas station on your commute")
}

fn coffee_rule() -> TaskRule {
    TaskRule::new(
        "Stop for Coffee",
        TriggerCondition {
            activity: Some(ActivityState::Driving),
            time_range: Some(TimeRange::parse("07:00-09:30").unwrap()),
            location_vector: Some("leaving_home".to_string()),
            car_bluetooth: Some(true),
            ..Default::default()
        },
        0.80,
    )
}

#[test]
fn test_seeded_rules_produce_ranked_suggestions() {
    let mut store = MemoryStore::new();
    store.insert_rule(fuel_rule());
    store.insert_rule(coffee_rule());

    let mut engine = DecisionEngine::new(store);
    let decision = engine.decide(&commute_context()).unwrap();

    assert_eq!(decision.suggestions.len(), 2);
    assert_eq!(decision.quality, DecisionQuality::Optimal);
    // Coffee has the higher weight, so it ranks first.
    assert_eq!(decision.suggestions[0].title, "Stop for Coffee");
    assert_eq!(decision.suggestions[1].title, "Get Fuel");

    for suggestion in &decision.suggestions {
        assert!(suggestion.chosen_window.is_some());
        assert!(!suggestion.reasoning.is_empty());
        assert!(!suggestion.explanation.is_empty());
    }
}

#[test]
fn test_feedback_shifts_selected_window() {
    let mut store = MemoryStore::new();
    store.insert_rule(fuel_rule());
    let mut engine = DecisionEngine::new(store);
    let ctx = commute_context();
    let task_id = engine.store().rules()[0].id;

    // Before learning, all windows sit at the prior and the first declared
    // window (60) wins.
    let decision = engine.decide(&ctx).unwrap();
    assert_eq!(decision.suggestions[0].chosen_window, Some(60));

    // The user consistently rejects 60-minute notifications and accepts
    // 10-minute ones. Two accepts per reject keep the rule weight level
    // (+0.05 +0.05 -0.10) while the beliefs diverge.
    for _ in 0..4 {
        engine.record_feedback(task_id, &ctx, 60, "reject").unwrap();
        engine.record_feedback(task_id, &ctx, 10, "accept").unwrap();
        engine.record_feedback(task_id, &ctx, 10, "accept").unwrap();
    }

    let decision = engine.decide(&ctx).unwrap();
    assert_eq!(decision.suggestions[0].chosen_window, Some(10));
    assert!(decision.suggestions[0].timing_confidence > 0.7);
}

#[test]
fn test_persistent_rejection_suppresses_rule() {
    let mut store = MemoryStore::new();
    store.insert_rule(fuel_rule());
    let mut engine = DecisionEngine::new(store);
    let ctx = commute_context();
    let task_id = engine.store().rules()[0].id;

    // Weight 0.75 drops by 0.10 per rejection; after three rejections the
    // base confidence (0.45) is below the 0.6 threshold.
    for window in [60, 30, 10] {
        engine.record_feedback(task_id, &ctx, window, "reject").unwrap();
    }

    let decision = engine.decide(&ctx).unwrap();
    assert!(decision.suggestions.is_empty());
}

#[test]
fn test_decide_twice_identical_output() {
    let mut store = MemoryStore::new();
    store.insert_rule(fuel_rule());
    store.insert_rule(coffee_rule());
    let mut engine = DecisionEngine::new(store);
    let ctx = commute_context();

    let first = engine.decide(&ctx).unwrap();
    let second = engine.decide(&ctx).unwrap();

    let fingerprint = |d: &cueist_core::Decision| {
        d.suggestions
            .iter()
            .map(|s| (s.task_id, s.chosen_window, s.confidence.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(fingerprint(&first), fingerprint(&second));
}

#[test]
fn test_mixed_rule_and_event_candidates() {
    let mut store = MemoryStore::new();
    store.insert_rule(fuel_rule());
    store.insert_rule(coffee_rule());

    let ctx = commute_context();
    let mut event = ScheduledEvent::new(
        "evt-dentist",
        "Dentist Appointment",
        ctx.timestamp + Duration::minutes(100),
        EventPriority::High,
    );
    event.optimal_reminder_time = Some(ctx.timestamp - Duration::minutes(10));
    store.insert_event(event);

    let mut engine = DecisionEngine::new(store);
    let decision = engine.decide(&ctx).unwrap();

    assert_eq!(decision.suggestions.len(), 3);
    assert_eq!(decision.quality, DecisionQuality::Optimal);
    // The high-priority reminder carries 0.95 confidence and outranks the
    // trigger rules.
    assert_eq!(decision.suggestions[0].title, "Dentist Appointment");
}

#[test]
fn test_full_loop_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Db::open_at(&dir.path().join("cueist.db")).unwrap();
    let rule = fuel_rule();
    let task_id = rule.id;
    db.insert_rule(&rule).unwrap();

    let ctx = commute_context();
    let mut event = ScheduledEvent::new(
        "evt-1",
        "Team Meeting",
        ctx.timestamp + Duration::minutes(45),
        EventPriority::Medium,
    );
    event.optimal_reminder_time = Some(ctx.timestamp - Duration::minutes(5));
    db.insert_event(&event).unwrap();

    let mut engine = DecisionEngine::new(db);
    let decision = engine.decide(&ctx).unwrap();
    // Fuel rule plus the medium event forced inside its final hour.
    assert_eq!(decision.suggestions.len(), 2);

    let update = engine.record_feedback(task_id, &ctx, 30, "accept").unwrap();
    assert!(update.new_weight > update.old_weight);
    assert!(update.new_confidence > update.old_confidence);

    // Learning survives a reopen of the same database file.
    drop(engine);
    let db = Db::open_at(&dir.path().join("cueist.db")).unwrap();
    let engine = DecisionEngine::new(db);
    let summary = engine
        .belief_summary(&cueist_core::BeliefFilter::default())
        .unwrap();
    assert!(summary.iter().any(|s| s.feedback_count == 1));

    let history = engine.feedback_history(Some(task_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].window_minutes, 30);
}

#[test]
fn test_reminder_interval_enforced_across_decides() {
    let mut store = MemoryStore::new();
    let ctx = commute_context();
    let mut event = ScheduledEvent::new(
        "evt-recital",
        "School Recital",
        ctx.timestamp + Duration::minutes(90),
        EventPriority::High,
    );
    event.optimal_reminder_time = Some(ctx.timestamp - Duration::minutes(10));
    store.insert_event(event);

    let mut engine = DecisionEngine::new(store);

    // First decide fires the reminder and persists the transition.
    let decision = engine.decide(&ctx).unwrap();
    assert_eq!(decision.suggestions.len(), 1);
    assert_eq!(engine.store().events()[0].reminder_count, 1);

    // A decide moments later is inside the re-fire interval.
    let mut later = ctx.clone();
    later.timestamp = ctx.timestamp + Duration::minutes(5);
    let decision = engine.decide(&later).unwrap();
    assert!(decision.suggestions.is_empty());
    assert_eq!(engine.store().events()[0].reminder_count, 1);

    // After the 30-minute interval (event still >30 min away) it fires again.
    let mut much_later = ctx.clone();
    much_later.timestamp = ctx.timestamp + Duration::minutes(35);
    let decision = engine.decide(&much_later).unwrap();
    assert_eq!(decision.suggestions.len(), 1);
    assert_eq!(engine.store().events()[0].reminder_count, 2);
}
