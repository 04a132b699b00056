//! Persistence interfaces and implementations.
//!
//! The decision engine only ever talks to the four store traits defined
//! here; [`Db`] implements them over SQLite and [`MemoryStore`] over plain
//! maps for tests and seeding. Trait methods that read-modify-write take
//! `&mut self`, which is what serializes concurrent writes to the same
//! belief triple.

pub mod database;
pub mod memory;
pub mod migrations;

pub use database::Db;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::context::ContextKey;
use crate::error::DatabaseError;
use crate::feedback::FeedbackEntry;
use crate::reminder::{ReminderTransition, ScheduledEvent};
use crate::rules::TaskRule;
use crate::timing::{BeliefFilter, TimingBelief, TimingPrior};

/// Store of task rules and their learned weights.
pub trait TaskRuleStore {
    /// All active rules, calendar-linked ones included.
    fn list_active(&self) -> Result<Vec<TaskRule>, DatabaseError>;

    fn get_rule(&self, id: Uuid) -> Result<Option<TaskRule>, DatabaseError>;

    /// Persist a new probability weight for the rule.
    fn update_weight(&mut self, id: Uuid, new_weight: f64) -> Result<(), DatabaseError>;
}

/// Store of Beta-distribution timing beliefs.
///
/// At most one record exists per (task type, context key, window) triple.
pub trait TimingBeliefStore {
    /// Fetch the belief for the triple, creating it at `prior` when unseen.
    fn get_or_create(
        &mut self,
        task_type: &str,
        context_key: &ContextKey,
        window_minutes: u32,
        prior: TimingPrior,
    ) -> Result<TimingBelief, DatabaseError>;

    /// Persist updated alpha/beta/trigger values for an existing record.
    fn update_belief(&mut self, belief: &TimingBelief) -> Result<(), DatabaseError>;

    /// All stored beliefs matching the task-type/context-key filters.
    fn list_beliefs(&self, filter: &BeliefFilter) -> Result<Vec<TimingBelief>, DatabaseError>;
}

/// Store of calendar-linked scheduled events.
pub trait ScheduledEventStore {
    /// Non-terminal events starting within `horizon` of `now`.
    fn upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError>;

    /// Persist a reminder transition produced by the reminder policy.
    fn mark_reminded(
        &mut self,
        event_id: &str,
        transition: &ReminderTransition,
    ) -> Result<(), DatabaseError>;
}

/// Append-only feedback log.
pub trait FeedbackLogStore {
    fn append(&mut self, entry: &FeedbackEntry) -> Result<(), DatabaseError>;

    /// Most recent entries, newest first, optionally filtered by task.
    fn recent(
        &self,
        task_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, DatabaseError>;
}

/// Returns `~/.config/cueist[-dev]/` based on CUEIST_ENV.
///
/// Set CUEIST_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CUEIST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cueist-dev")
    } else {
        base_dir.join("cueist")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
