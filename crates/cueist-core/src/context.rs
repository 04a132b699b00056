//! Situational context types.
//!
//! A [`Context`] is an immutable snapshot of the user's situation at the
//! moment a decision is requested: activity, movement, location, connectivity
//! and calendar availability. The [`ContextKey`] signature groups similar
//! situations so timing beliefs learned in one can be reused in the next.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Physical activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Stationary,
    Walking,
    Running,
    Cycling,
    Driving,
}

impl ActivityState {
    /// Canonical lowercase name used in context keys.
    pub fn name(&self) -> &'static str {
        match self {
            ActivityState::Stationary => "stationary",
            ActivityState::Walking => "walking",
            ActivityState::Running => "running",
            ActivityState::Cycling => "cycling",
            ActivityState::Driving => "driving",
        }
    }

    /// Human-readable phrase for reasoning strings.
    pub fn humanize(&self) -> &'static str {
        match self {
            ActivityState::Stationary => "stationary",
            ActivityState::Walking => "walking",
            ActivityState::Running => "running",
            ActivityState::Cycling => "cycling",
            ActivityState::Driving => "driving",
        }
    }
}

/// Time-of-day buckets used for belief grouping.
///
/// Boundaries: morning 05:00-11:59, afternoon 12:00-16:59,
/// evening 17:00-20:59, night otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Classify an hour (0-23) into a bucket.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

/// Coarse location classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationCategory {
    Home,
    Work,
    Campus,
    Commute,
    Gym,
    Errand,
    Unknown,
}

impl LocationCategory {
    pub fn name(&self) -> &'static str {
        match self {
            LocationCategory::Home => "home",
            LocationCategory::Work => "work",
            LocationCategory::Campus => "campus",
            LocationCategory::Commute => "commute",
            LocationCategory::Gym => "gym",
            LocationCategory::Errand => "errand",
            LocationCategory::Unknown => "unknown",
        }
    }
}

/// Calendar availability at the snapshot instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarAvailability {
    Free,
    Busy,
    Tentative,
    Unknown,
}

/// Immutable snapshot of the user's situation for one decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Current physical activity
    pub activity: ActivityState,
    /// Current speed in km/h
    #[serde(default)]
    pub speed_kmh: f64,
    /// Coarse location category
    pub location: LocationCategory,
    /// Finer location label for rule matching (e.g. "leaving_home")
    #[serde(default)]
    pub location_vector: Option<String>,
    /// Connected to a car head unit over Bluetooth
    #[serde(default)]
    pub car_bluetooth: bool,
    /// Current WiFi network, None when disconnected
    #[serde(default)]
    pub wifi_ssid: Option<String>,
    /// Calendar availability at this instant
    #[serde(default = "default_availability")]
    pub calendar: CalendarAvailability,
    /// Extension point for custom rule predicates
    #[serde(default)]
    pub extras: HashMap<String, serde_json::Value>,
}

fn default_availability() -> CalendarAvailability {
    CalendarAvailability::Unknown
}

impl Context {
    /// Create a minimal context at the given instant.
    pub fn new(timestamp: DateTime<Utc>, activity: ActivityState, location: LocationCategory) -> Self {
        Self {
            timestamp,
            activity,
            speed_kmh: 0.0,
            location,
            location_vector: None,
            car_bluetooth: false,
            wifi_ssid: None,
            calendar: CalendarAvailability::Unknown,
            extras: HashMap::new(),
        }
    }

    /// Label used when matching rules against location.
    ///
    /// Prefers the finer `location_vector` when present.
    pub fn location_label(&self) -> &str {
        self.location_vector
            .as_deref()
            .unwrap_or_else(|| self.location.name())
    }

    /// Whether the user looks interruptible: stationary at home or work.
    pub fn is_free(&self) -> bool {
        self.activity == ActivityState::Stationary
            && matches!(self.location, LocationCategory::Home | LocationCategory::Work)
    }

    /// Derive the grouping signature for this snapshot.
    pub fn key(&self) -> ContextKey {
        ContextKey::from_context(self)
    }
}

/// Canonical context signature for belief grouping.
///
/// Format: `<activity>_<morning|afternoon|evening|night>_<weekday|weekend>_<location>`,
/// e.g. `driving_morning_weekday_commute`. Used only for grouping similar
/// situations, never as a storage identity on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ContextKey {
    /// Build the signature from a context snapshot.
    pub fn from_context(context: &Context) -> Self {
        let time_period = TimeOfDay::from_hour(context.timestamp.hour());
        let day_type = if context.timestamp.weekday().num_days_from_monday() < 5 {
            "weekday"
        } else {
            "weekend"
        };
        Self(format!(
            "{}_{}_{}_{}",
            context.activity.name(),
            time_period.name(),
            day_type,
            context.location.name()
        ))
    }

    /// Wrap an already-formatted signature (e.g. read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable description of the signature components.
    pub fn describe(&self) -> String {
        let parts: Vec<&str> = self.0.splitn(4, '_').collect();
        match parts.as_slice() {
            [activity, time, day, location] => {
                format!("{activity} on a {day} {time} at {location}")
            }
            _ => self.0.clone(),
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}
