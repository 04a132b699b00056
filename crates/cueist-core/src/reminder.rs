//! Priority-tiered reminder policy for calendar-bound events.
//!
//! Each [`ScheduledEvent`] moves through a small state machine:
//!
//! ```text
//! Idle -> Reminding (repeatable) -> Done
//! ```
//!
//! The policy itself is pure: evaluating an event against `now` and the
//! current context returns a decision, and an eligible decision carries the
//! [`ReminderTransition`] snapshot the caller persists through the event
//! store. The policy never mutates stored state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Context;

/// Lead-time buffer in minutes added per priority tier.
const HIGH_BUFFER_MIN: i64 = 60;
const MEDIUM_BUFFER_MIN: i64 = 30;
const LOW_BUFFER_MIN: i64 = 15;

/// Minimum lead time in minutes regardless of tier.
const MIN_LEAD_MIN: i64 = 10;

/// Priority tier of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    High,
    Medium,
    Low,
}

impl EventPriority {
    pub fn name(&self) -> &'static str {
        match self {
            EventPriority::High => "high",
            EventPriority::Medium => "medium",
            EventPriority::Low => "low",
        }
    }

    fn buffer_minutes(&self) -> i64 {
        match self {
            EventPriority::High => HIGH_BUFFER_MIN,
            EventPriority::Medium => MEDIUM_BUFFER_MIN,
            EventPriority::Low => LOW_BUFFER_MIN,
        }
    }
}

/// Reminder lifecycle state derived from an event's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderState {
    /// No reminder sent yet
    Idle,
    /// At least one reminder sent, more may follow
    Reminding,
    /// Terminal: completed, dismissed, or the event has started
    Done,
}

/// A calendar-linked event that may deserve reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// External calendar event id
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub priority: EventPriority,
    /// Estimated preparation time in minutes
    #[serde(default)]
    pub preparation_minutes: u32,
    /// Estimated travel time in minutes
    #[serde(default)]
    pub travel_minutes: u32,
    /// Location labels where a reminder is worthwhile (low tier)
    #[serde(default)]
    pub suggested_contexts: Vec<String>,
    /// Derived optimal reminder time; recomputed from the formula when absent
    #[serde(default)]
    pub optimal_reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_reminded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_count: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub dismissed: bool,
}

impl ScheduledEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        priority: EventPriority,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            start_time,
            priority,
            preparation_minutes: 0,
            travel_minutes: 0,
            suggested_contexts: Vec::new(),
            optimal_reminder_time: None,
            last_reminded_at: None,
            reminder_count: 0,
            completed: false,
            dismissed: false,
        }
    }

    /// When the first reminder should ideally land.
    ///
    /// `start - (preparation + travel + priority buffer)`, with the total
    /// lead time floored at 10 minutes. A stored value (e.g. carried over
    /// from calendar ingestion) takes precedence over the formula.
    pub fn reminder_time(&self) -> DateTime<Utc> {
        if let Some(stored) = self.optimal_reminder_time {
            return stored;
        }
        let lead = (i64::from(self.preparation_minutes)
            + i64::from(self.travel_minutes)
            + self.priority.buffer_minutes())
        .max(MIN_LEAD_MIN);
        self.start_time - Duration::minutes(lead)
    }

    /// Derive the lifecycle state at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> ReminderState {
        if self.completed || self.dismissed || self.start_time <= now {
            ReminderState::Done
        } else if self.reminder_count > 0 {
            ReminderState::Reminding
        } else {
            ReminderState::Idle
        }
    }

    /// Apply a persisted reminder transition to this snapshot.
    pub fn apply(&mut self, transition: &ReminderTransition) {
        self.last_reminded_at = Some(transition.last_reminded_at);
        self.reminder_count = transition.reminder_count;
    }
}

/// New field values after a reminder fires; persisted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderTransition {
    pub last_reminded_at: DateTime<Utc>,
    pub reminder_count: u32,
}

/// Outcome of evaluating one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReminderDecision {
    /// Remind now with the given confidence; persist the transition
    Remind {
        confidence: f64,
        reasoning: String,
        transition: ReminderTransition,
    },
    /// Not eligible right now
    Hold { reason: String },
    /// The event is terminal and will never remind again
    Terminal { reason: String },
}

impl ReminderDecision {
    pub fn is_remind(&self) -> bool {
        matches!(self, ReminderDecision::Remind { .. })
    }
}

/// Priority-tiered reminder eligibility policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderPolicy;

impl ReminderPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether the event deserves a reminder at `now`.
    pub fn evaluate(
        &self,
        event: &ScheduledEvent,
        context: &Context,
        now: DateTime<Utc>,
    ) -> ReminderDecision {
        if event.completed {
            return ReminderDecision::Terminal {
                reason: "event completed".to_string(),
            };
        }
        if event.dismissed {
            return ReminderDecision::Terminal {
                reason: "event dismissed".to_string(),
            };
        }
        if event.start_time <= now {
            return ReminderDecision::Terminal {
                reason: "event start time has passed".to_string(),
            };
        }

        let minutes_until = (event.start_time - now).num_minutes();
        match event.priority {
            EventPriority::High => self.evaluate_high(event, now, minutes_until),
            EventPriority::Medium => self.evaluate_medium(event, context, now, minutes_until),
            EventPriority::Low => self.evaluate_low(event, context, now, minutes_until),
        }
    }

    /// High tier: remind from the optimal time onwards, unbounded count,
    /// with a re-fire interval that tightens as the event approaches.
    fn evaluate_high(
        &self,
        event: &ScheduledEvent,
        now: DateTime<Utc>,
        minutes_until: i64,
    ) -> ReminderDecision {
        if now < event.reminder_time() {
            return ReminderDecision::Hold {
                reason: "not yet at optimal reminder time".to_string(),
            };
        }

        let min_interval = if minutes_until <= 30 {
            Duration::minutes(15)
        } else if minutes_until <= 120 {
            Duration::minutes(30)
        } else {
            Duration::minutes(120)
        };
        if let Some(hold) = reminded_too_recently(event, now, min_interval) {
            return hold;
        }

        let mut reasoning = format!(
            "HIGH PRIORITY: {} in {}",
            event.title,
            format_time_until(minutes_until)
        );
        if event.preparation_minutes > 0 {
            reasoning.push_str(&format!(
                "; allow {} min for preparation",
                event.preparation_minutes
            ));
        }
        if event.travel_minutes > 0 {
            reasoning.push_str(&format!("; travel time {} min", event.travel_minutes));
        }

        ReminderDecision::Remind {
            confidence: 0.95,
            reasoning,
            transition: transition_for(event, now),
        }
    }

    /// Medium tier: wait for free time (stationary at home or work), but
    /// force a reminder inside the final hour. Re-fires at most every 3 h.
    fn evaluate_medium(
        &self,
        event: &ScheduledEvent,
        context: &Context,
        now: DateTime<Utc>,
        minutes_until: i64,
    ) -> ReminderDecision {
        if now < event.reminder_time() {
            return ReminderDecision::Hold {
                reason: "not yet at optimal reminder time".to_string(),
            };
        }

        let is_free = context.is_free();
        if !is_free && minutes_until > 60 {
            return ReminderDecision::Hold {
                reason: "waiting for free time".to_string(),
            };
        }
        if let Some(hold) = reminded_too_recently(event, now, Duration::minutes(180)) {
            return hold;
        }

        let reasoning = if is_free {
            format!(
                "{} in {}; good time to prepare",
                event.title,
                format_time_until(minutes_until)
            )
        } else {
            format!(
                "{} in {}; event approaching soon",
                event.title,
                format_time_until(minutes_until)
            )
        };

        ReminderDecision::Remind {
            confidence: if is_free { 0.75 } else { 0.65 },
            reasoning,
            transition: transition_for(event, now),
        }
    }

    /// Low tier: fires at most once, and only near the optimal time, close
    /// to the event, or in a suggested location context.
    fn evaluate_low(
        &self,
        event: &ScheduledEvent,
        context: &Context,
        now: DateTime<Utc>,
        minutes_until: i64,
    ) -> ReminderDecision {
        if event.reminder_count > 0 {
            return ReminderDecision::Hold {
                reason: "already reminded once (low priority)".to_string(),
            };
        }

        let near_optimal =
            (now - event.reminder_time()).num_minutes().abs() <= 15;
        let near_event = minutes_until <= 30;
        let location = context.location_label().to_ascii_lowercase();
        let context_matches = event
            .suggested_contexts
            .iter()
            .any(|suggested| location.contains(&suggested.to_ascii_lowercase()));

        if !(near_optimal || near_event || context_matches) {
            return ReminderDecision::Hold {
                reason: "not at optimal reminder time yet".to_string(),
            };
        }

        ReminderDecision::Remind {
            confidence: 0.60,
            reasoning: format!(
                "Reminder: {} in {}",
                event.title,
                format_time_until(minutes_until)
            ),
            transition: transition_for(event, now),
        }
    }
}

fn transition_for(event: &ScheduledEvent, now: DateTime<Utc>) -> ReminderTransition {
    ReminderTransition {
        last_reminded_at: now,
        reminder_count: event.reminder_count + 1,
    }
}

fn reminded_too_recently(
    event: &ScheduledEvent,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Option<ReminderDecision> {
    let last = event.last_reminded_at?;
    if now - last < min_interval {
        Some(ReminderDecision::Hold {
            reason: "reminded too recently".to_string(),
        })
    } else {
        None
    }
}

/// Format minutes-until in human-readable form.
fn format_time_until(minutes: i64) -> String {
    if minutes < 60 {
        format!("{minutes} min")
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes < 120 {
            "about 1 hour".to_string()
        } else {
            format!("about {hours} hours")
        }
    } else {
        format!("about {} days", minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActivityState, Context, LocationCategory};
    use chrono::TimeZone;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn free_context() -> Context {
        Context::new(test_now(), ActivityState::Stationary, LocationCategory::Home)
    }

    fn busy_context() -> Context {
        let mut ctx = Context::new(test_now(), ActivityState::Driving, LocationCategory::Commute);
        ctx.speed_kmh = 50.0;
        ctx
    }

    fn make_test_event(priority: EventPriority, minutes_ahead: i64) -> ScheduledEvent {
        ScheduledEvent::new(
            "evt-1",
            "Dentist Appointment",
            test_now() + Duration::minutes(minutes_ahead),
            priority,
        )
    }

    #[test]
    fn test_reminder_time_formula() {
        let mut event = make_test_event(EventPriority::High, 240);
        event.preparation_minutes = 15;
        event.travel_minutes = 20;
        // 15 + 20 + 60 = 95 minutes of lead time.
        assert_eq!(
            event.reminder_time(),
            event.start_time - Duration::minutes(95)
        );

        event.priority = EventPriority::Medium;
        assert_eq!(
            event.reminder_time(),
            event.start_time - Duration::minutes(65)
        );

        event.priority = EventPriority::Low;
        assert_eq!(
            event.reminder_time(),
            event.start_time - Duration::minutes(50)
        );
    }

    #[test]
    fn test_reminder_time_without_prep_or_travel() {
        let event = make_test_event(EventPriority::Low, 240);
        assert_eq!(
            event.reminder_time(),
            event.start_time - Duration::minutes(15)
        );
    }

    #[test]
    fn test_stored_reminder_time_takes_precedence() {
        let mut event = make_test_event(EventPriority::High, 240);
        let stored = test_now() + Duration::minutes(30);
        event.optimal_reminder_time = Some(stored);
        assert_eq!(event.reminder_time(), stored);
    }

    #[test]
    fn test_high_respects_refire_interval_when_close() {
        // start = now+20, optimal = now-5.
        let now = test_now();
        let mut event = make_test_event(EventPriority::High, 20);
        event.optimal_reminder_time = Some(now - Duration::minutes(5));
        event.reminder_count = 1;

        // Reminded 10 minutes ago: the 15-minute near-event interval has not
        // elapsed.
        event.last_reminded_at = Some(now - Duration::minutes(10));
        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        assert!(matches!(
            decision,
            ReminderDecision::Hold { ref reason } if reason == "reminded too recently"
        ));

        // Reminded 16 minutes ago: eligible again.
        event.last_reminded_at = Some(now - Duration::minutes(16));
        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        match decision {
            ReminderDecision::Remind {
                confidence,
                transition,
                ..
            } => {
                assert_eq!(confidence, 0.95);
                assert_eq!(transition.reminder_count, 2);
                assert_eq!(transition.last_reminded_at, now);
            }
            other => panic!("expected Remind, got {other:?}"),
        }
    }

    #[test]
    fn test_high_interval_scales_with_proximity() {
        let now = test_now();
        let policy = ReminderPolicy::new();

        // 90 minutes out: 30-minute interval applies.
        let mut event = make_test_event(EventPriority::High, 90);
        event.optimal_reminder_time = Some(now - Duration::minutes(60));
        event.last_reminded_at = Some(now - Duration::minutes(20));
        event.reminder_count = 1;
        assert!(!policy.evaluate(&event, &busy_context(), now).is_remind());

        event.last_reminded_at = Some(now - Duration::minutes(31));
        assert!(policy.evaluate(&event, &busy_context(), now).is_remind());

        // 5 hours out: 120-minute interval applies.
        let mut event = make_test_event(EventPriority::High, 300);
        event.optimal_reminder_time = Some(now - Duration::minutes(60));
        event.last_reminded_at = Some(now - Duration::minutes(90));
        event.reminder_count = 1;
        assert!(!policy.evaluate(&event, &busy_context(), now).is_remind());
    }

    #[test]
    fn test_high_holds_before_optimal_time() {
        let now = test_now();
        let event = make_test_event(EventPriority::High, 600);
        // Formula puts the optimal time 60 min before a 10-hour-away event.
        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        assert!(matches!(decision, ReminderDecision::Hold { .. }));
    }

    #[test]
    fn test_medium_waits_for_free_time() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Medium, 180);
        event.optimal_reminder_time = Some(now - Duration::minutes(10));

        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        assert!(matches!(
            decision,
            ReminderDecision::Hold { ref reason } if reason == "waiting for free time"
        ));

        let decision = ReminderPolicy::new().evaluate(&event, &free_context(), now);
        match decision {
            ReminderDecision::Remind { confidence, .. } => assert_eq!(confidence, 0.75),
            other => panic!("expected Remind, got {other:?}"),
        }
    }

    #[test]
    fn test_medium_forces_reminder_inside_final_hour() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Medium, 45);
        event.optimal_reminder_time = Some(now - Duration::minutes(10));

        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        match decision {
            ReminderDecision::Remind { confidence, .. } => assert_eq!(confidence, 0.65),
            other => panic!("expected Remind, got {other:?}"),
        }
    }

    #[test]
    fn test_medium_refire_interval_three_hours() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Medium, 45);
        event.optimal_reminder_time = Some(now - Duration::minutes(60));
        event.reminder_count = 1;
        event.last_reminded_at = Some(now - Duration::minutes(100));

        let decision = ReminderPolicy::new().evaluate(&event, &free_context(), now);
        assert!(matches!(
            decision,
            ReminderDecision::Hold { ref reason } if reason == "reminded too recently"
        ));
    }

    #[test]
    fn test_low_fires_at_most_once() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Low, 20);
        event.reminder_count = 1;

        // Perfect context, close to the event -- still ineligible forever.
        let mut ctx = free_context();
        ctx.location_vector = Some("pharmacy".to_string());
        event.suggested_contexts = vec!["pharmacy".to_string()];

        let decision = ReminderPolicy::new().evaluate(&event, &ctx, now);
        assert!(matches!(decision, ReminderDecision::Hold { .. }));
    }

    #[test]
    fn test_low_fires_near_event() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Low, 25);
        event.optimal_reminder_time = Some(now - Duration::minutes(120));

        let decision = ReminderPolicy::new().evaluate(&event, &busy_context(), now);
        match decision {
            ReminderDecision::Remind {
                confidence,
                transition,
                ..
            } => {
                assert_eq!(confidence, 0.60);
                assert_eq!(transition.reminder_count, 1);
            }
            other => panic!("expected Remind, got {other:?}"),
        }
    }

    #[test]
    fn test_low_fires_on_suggested_context() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::Low, 300);
        event.optimal_reminder_time = Some(now - Duration::minutes(120));
        event.suggested_contexts = vec!["gym".to_string()];

        let mut ctx = busy_context();
        ctx.location_vector = Some("gym_downtown".to_string());

        let decision = ReminderPolicy::new().evaluate(&event, &ctx, now);
        assert!(decision.is_remind());
    }

    #[test]
    fn test_terminal_states() {
        let now = test_now();
        let policy = ReminderPolicy::new();

        let mut event = make_test_event(EventPriority::High, 20);
        event.completed = true;
        assert!(matches!(
            policy.evaluate(&event, &free_context(), now),
            ReminderDecision::Terminal { .. }
        ));

        let mut event = make_test_event(EventPriority::High, 20);
        event.dismissed = true;
        assert!(matches!(
            policy.evaluate(&event, &free_context(), now),
            ReminderDecision::Terminal { .. }
        ));

        let event = make_test_event(EventPriority::High, -5);
        assert!(matches!(
            policy.evaluate(&event, &free_context(), now),
            ReminderDecision::Terminal { .. }
        ));
    }

    #[test]
    fn test_state_machine_progression() {
        let now = test_now();
        let mut event = make_test_event(EventPriority::High, 60);
        assert_eq!(event.state(now), ReminderState::Idle);

        event.apply(&ReminderTransition {
            last_reminded_at: now,
            reminder_count: 1,
        });
        assert_eq!(event.state(now), ReminderState::Reminding);
        assert_eq!(event.reminder_count, 1);

        event.completed = true;
        assert_eq!(event.state(now), ReminderState::Done);
    }

    #[test]
    fn test_format_time_until() {
        assert_eq!(format_time_until(45), "45 min");
        assert_eq!(format_time_until(75), "about 1 hour");
        assert_eq!(format_time_until(150), "about 2 hours");
        assert_eq!(format_time_until(3000), "about 2 days");
    }
}
