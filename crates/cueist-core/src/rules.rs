//! Task rules and trigger matching.
//!
//! A [`TaskRule`] pairs a task with a set of trigger predicates; the matcher
//! scores those predicates against a [`Context`] snapshot. Matching is a pure
//! function: absent predicates simply reduce the denominator of the score,
//! and evaluation never fails.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{ActivityState, Context};
use crate::error::ValidationError;

/// Fraction of declared predicates that must match for the rule to fire.
const MATCH_THRESHOLD: f64 = 0.8;

/// A clock-time range, possibly wrapping midnight (e.g. "22:00-06:00").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse from "HH:MM-HH:MM".
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (start_str, end_str) = raw
            .split_once('-')
            .ok_or_else(|| ValidationError::InvalidTimeRange(raw.to_string()))?;
        let start = NaiveTime::parse_from_str(start_str.trim(), "%H:%M")
            .map_err(|_| ValidationError::InvalidTimeRange(raw.to_string()))?;
        let end = NaiveTime::parse_from_str(end_str.trim(), "%H:%M")
            .map_err(|_| ValidationError::InvalidTimeRange(raw.to_string()))?;
        Ok(Self { start, end })
    }

    /// Whether the given clock time falls inside the range.
    ///
    /// Ranges with `start > end` wrap midnight: "22:00-06:00" contains both
    /// 23:00 and 05:00.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

impl TryFrom<String> for TimeRange {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        format!(
            "{}-{}",
            range.start.format("%H:%M"),
            range.end.format("%H:%M")
        )
    }
}

/// WiFi predicate: a literal SSID, or the requirement to be disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WifiCondition {
    /// Must be connected to this SSID (case-insensitive)
    Ssid(String),
    /// Must not be connected to any WiFi network
    Disconnected,
}

impl From<String> for WifiCondition {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "disconnected" | "not_connected" | "" => WifiCondition::Disconnected,
            _ => WifiCondition::Ssid(raw),
        }
    }
}

impl From<WifiCondition> for String {
    fn from(condition: WifiCondition) -> Self {
        match condition {
            WifiCondition::Ssid(ssid) => ssid,
            WifiCondition::Disconnected => "disconnected".to_string(),
        }
    }
}

/// Trigger predicates for a task rule.
///
/// Every field is optional; only declared predicates participate in scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_vector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_bluetooth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_ssid: Option<WifiCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl TriggerCondition {
    /// Whether any predicate is declared at all.
    pub fn is_empty(&self) -> bool {
        self.activity.is_none()
            && self.time_range.is_none()
            && self.location_vector.is_none()
            && self.car_bluetooth.is_none()
            && self.wifi_ssid.is_none()
            && self.min_speed.is_none()
            && self.custom.is_empty()
    }
}

/// A probabilistic rule that can trigger a task suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRule {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger: TriggerCondition,
    /// Learned probability weight in [0, 1]
    pub weight: f64,
    pub active: bool,
    /// Link to a calendar event; linked rules are routed through the
    /// reminder policy instead of the trigger matcher.
    #[serde(default)]
    pub scheduled_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRule {
    /// Create a new active rule with the given weight.
    pub fn new(name: impl Into<String>, trigger: TriggerCondition, weight: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            trigger,
            weight: weight.clamp(0.0, 1.0),
            active: true,
            scheduled_event_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_event(mut self, event_id: impl Into<String>) -> Self {
        self.scheduled_event_id = Some(event_id.into());
        self
    }
}

/// Result of matching a rule against a context snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    /// True when at least 80% of declared predicates matched
    pub matches: bool,
    /// successes / declared predicates, 0 when none declared
    pub score: f64,
    /// Predicate name -> matched value
    pub matched_conditions: BTreeMap<String, serde_json::Value>,
    /// Human-readable match reasons
    pub reasoning: String,
}

/// Score a rule's trigger predicates against a context snapshot.
///
/// Pure and infallible: each declared predicate increments the check count,
/// each satisfied one increments the success count and contributes a reason.
pub fn evaluate(rule: &TaskRule, context: &Context) -> RuleMatch {
    let trigger = &rule.trigger;
    let mut total_checks = 0u32;
    let mut successes = 0u32;
    let mut matched_conditions = BTreeMap::new();
    let mut reasons = Vec::new();

    if let Some(expected) = trigger.activity {
        total_checks += 1;
        if context.activity == expected {
            successes += 1;
            matched_conditions.insert(
                "activity".to_string(),
                serde_json::Value::String(context.activity.name().to_string()),
            );
            reasons.push(format!("You are {}", context.activity.humanize()));
        }
    }

    if let Some(range) = trigger.time_range {
        total_checks += 1;
        if range.contains(context.timestamp.time()) {
            successes += 1;
            let stamp = context.timestamp.format("%H:%M").to_string();
            matched_conditions.insert("time".to_string(), serde_json::Value::String(stamp.clone()));
            reasons.push(format!("Time is {stamp}"));
        }
    }

    if let Some(expected) = trigger.location_vector.as_deref() {
        total_checks += 1;
        if context.location_label().eq_ignore_ascii_case(expected) {
            successes += 1;
            let label = context.location_label().to_string();
            matched_conditions.insert(
                "location_vector".to_string(),
                serde_json::Value::String(label.clone()),
            );
            reasons.push(format!("Location: {}", label.replace('_', " ")));
        }
    }

    if let Some(expected) = trigger.car_bluetooth {
        total_checks += 1;
        if context.car_bluetooth == expected {
            successes += 1;
            matched_conditions.insert(
                "car_bluetooth".to_string(),
                serde_json::Value::Bool(context.car_bluetooth),
            );
            if context.car_bluetooth {
                reasons.push("Connected to car Bluetooth".to_string());
            }
        }
    }

    if let Some(condition) = &trigger.wifi_ssid {
        total_checks += 1;
        match condition {
            WifiCondition::Disconnected => {
                if context.wifi_ssid.as_deref().unwrap_or("").is_empty() {
                    successes += 1;
                    matched_conditions.insert(
                        "wifi_ssid".to_string(),
                        serde_json::Value::String("disconnected".to_string()),
                    );
                    reasons.push("WiFi disconnected".to_string());
                }
            }
            WifiCondition::Ssid(expected) => {
                if let Some(ssid) = context.wifi_ssid.as_deref() {
                    if ssid.eq_ignore_ascii_case(expected) {
                        successes += 1;
                        matched_conditions.insert(
                            "wifi_ssid".to_string(),
                            serde_json::Value::String(ssid.to_string()),
                        );
                        reasons.push(format!("Connected to {ssid}"));
                    }
                }
            }
        }
    }

    if let Some(min_speed) = trigger.min_speed {
        total_checks += 1;
        if context.speed_kmh >= min_speed {
            successes += 1;
            matched_conditions.insert("speed".to_string(), serde_json::json!(context.speed_kmh));
            reasons.push(format!("Speed: {:.1} km/h", context.speed_kmh));
        }
    }

    for (key, expected) in &trigger.custom {
        if let Some(actual) = context.extras.get(key) {
            total_checks += 1;
            if actual == expected {
                successes += 1;
                matched_conditions.insert(key.clone(), expected.clone());
                reasons.push(format!("{}: {}", key.replace('_', " "), expected));
            }
        }
    }

    let score = if total_checks > 0 {
        f64::from(successes) / f64::from(total_checks)
    } else {
        0.0
    };

    let reasoning = if reasons.is_empty() {
        "Conditions not met".to_string()
    } else {
        reasons.join("; ")
    };

    RuleMatch {
        matches: score >= MATCH_THRESHOLD,
        score,
        matched_conditions,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LocationCategory;
    use chrono::TimeZone;

    fn make_test_context() -> Context {
        // Monday 08:30 UTC
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();
        let mut ctx = Context::new(ts, ActivityState::Driving, LocationCategory::Commute);
        ctx.speed_kmh = 45.0;
        ctx.car_bluetooth = true;
        ctx.location_vector = Some("leaving_home".to_string());
        ctx
    }

    fn make_commute_rule() -> TaskRule {
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
    }

    #[test]
    fn test_full_match() {
        let result = evaluate(&make_commute_rule(), &make_test_context());
        assert!(result.matches);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.matched_conditions.len(), 4);
        assert!(result.reasoning.contains("driving"));
    }

    #[test]
    fn test_partial_match_below_threshold() {
        let mut ctx = make_test_context();
        ctx.activity = ActivityState::Walking;
        ctx.speed_kmh = 4.0;

        let result = evaluate(&make_commute_rule(), &ctx);
        // 2 of 4 predicates match (time, location).
        assert!(!result.matches);
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn test_no_predicates_scores_zero() {
        let rule = TaskRule::new("Anything", TriggerCondition::default(), 0.9);
        let result = evaluate(&rule, &make_test_context());
        assert!(!result.matches);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.reasoning, "Conditions not met");
    }

    #[test]
    fn test_time_range_wraps_midnight() {
        let range = TimeRange::parse("22:00-06:00").unwrap();
        assert!(range.contains(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
        assert!(range.contains(NaiveTime::from_hms_opt(5, 0, 0).unwrap()));
        assert!(!range.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn test_time_range_plain() {
        let range = TimeRange::parse("07:00-10:00").unwrap();
        assert!(range.contains(NaiveTime::from_hms_opt(7, 0, 0).unwrap()));
        assert!(range.contains(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(!range.contains(NaiveTime::from_hms_opt(10, 1, 0).unwrap()));
    }

    #[test]
    fn test_time_range_rejects_garbage() {
        assert!(TimeRange::parse("7am-10am").is_err());
        assert!(TimeRange::parse("07:00").is_err());
    }

    #[test]
    fn test_wifi_disconnected_sentinel() {
        let rule = TaskRule::new(
            "Offline task",
            TriggerCondition {
                wifi_ssid: Some(WifiCondition::Disconnected),
                ..Default::default()
            },
            0.7,
        );

        let mut ctx = make_test_context();
        ctx.wifi_ssid = None;
        assert!(evaluate(&rule, &ctx).matches);

        ctx.wifi_ssid = Some("HomeNet".to_string());
        assert!(!evaluate(&rule, &ctx).matches);
    }

    #[test]
    fn test_wifi_ssid_case_insensitive() {
        let rule = TaskRule::new(
            "At home",
            TriggerCondition {
                wifi_ssid: Some(WifiCondition::Ssid("HomeNet".to_string())),
                ..Default::default()
            },
            0.7,
        );

        let mut ctx = make_test_context();
        ctx.wifi_ssid = Some("homenet".to_string());
        assert!(evaluate(&rule, &ctx).matches);
    }

    #[test]
    fn test_wifi_condition_from_sentinel_strings() {
        assert_eq!(
            WifiCondition::from("disconnected".to_string()),
            WifiCondition::Disconnected
        );
        assert_eq!(
            WifiCondition::from("not_connected".to_string()),
            WifiCondition::Disconnected
        );
        assert_eq!(
            WifiCondition::from("CafeWifi".to_string()),
            WifiCondition::Ssid("CafeWifi".to_string())
        );
    }

    #[test]
    fn test_custom_predicates() {
        let mut custom = BTreeMap::new();
        custom.insert("headphones".to_string(), serde_json::json!(true));
        let rule = TaskRule::new(
            "Podcast",
            TriggerCondition {
                custom,
                ..Default::default()
            },
            0.7,
        );

        let mut ctx = make_test_context();
        ctx.extras
            .insert("headphones".to_string(), serde_json::json!(true));
        let result = evaluate(&rule, &ctx);
        assert!(result.matches);
        assert!(result.reasoning.contains("headphones"));
    }

    #[test]
    fn test_four_of_five_predicates_meets_threshold() {
        let mut rule = make_commute_rule();
        rule.trigger.car_bluetooth = Some(true);
        let mut ctx = make_test_context();
        ctx.car_bluetooth = false;

        let result = evaluate(&rule, &ctx);
        assert_eq!(result.score, 0.8);
        assert!(result.matches);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let rule = make_commute_rule();
        let ctx = make_test_context();
        let first = evaluate(&rule, &ctx);
        let second = evaluate(&rule, &ctx);
        assert_eq!(first.score, second.score);
        assert_eq!(first.reasoning, second.reasoning);
    }
}
