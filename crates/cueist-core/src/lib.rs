//! # Cueist Core Library
//!
//! This library provides the core business logic for Cueist, a context-aware
//! notification decision engine. Given a snapshot of the user's situation it
//! decides which pending tasks deserve a notification now and at what lead
//! time, and it learns lead-time preferences from accept/reject feedback.
//!
//! ## Architecture
//!
//! - **Rule matching**: pure predicate scoring of trigger rules against a
//!   context snapshot
//! - **Timing model**: Beta-distribution beliefs per (task type, context,
//!   lead-time window), selected with a UCB exploration bonus
//! - **Reminder policy**: priority-tiered state machine for calendar-bound
//!   events, expressed as pure transitions
//! - **Optimizer**: best-first branch-and-bound assignment of lead times
//!   across simultaneously eligible tasks
//! - **Storage**: SQLite persistence behind four store traits, with an
//!   in-memory implementation for tests
//!
//! ## Key Components
//!
//! - [`DecisionEngine`]: orchestrates one `decide()` call per context
//! - [`TimingModel`]: Bayesian window selection and feedback updates
//! - [`ReminderPolicy`]: eligibility decisions for scheduled events
//! - [`ScheduleOptimizer`]: branch-and-bound lead-time assignment
//! - [`Db`]: SQLite store implementing all storage traits

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod optimizer;
pub mod reminder;
pub mod rules;
pub mod storage;
pub mod timing;

pub use config::EngineConfig;
pub use context::{ActivityState, CalendarAvailability, Context, ContextKey, LocationCategory, TimeOfDay};
pub use engine::{Decision, DecisionConfig, DecisionEngine, DecisionQuality, Suggestion};
pub use error::{ConfigError, CoreError, DatabaseError, FeedbackError, Result, ValidationError};
pub use feedback::{FeedbackAction, FeedbackEntry, FeedbackProcessor, FeedbackUpdate};
pub use optimizer::{
    greedy_schedule, Candidate, CandidateOption, OptimizerConfig, ScheduleOptimizer,
    ScheduleOutcome, ScheduleResult,
};
pub use reminder::{
    EventPriority, ReminderDecision, ReminderPolicy, ReminderState, ReminderTransition,
    ScheduledEvent,
};
pub use rules::{RuleMatch, TaskRule, TimeRange, TriggerCondition, WifiCondition};
pub use storage::{
    Db, FeedbackLogStore, MemoryStore, ScheduledEventStore, TaskRuleStore, TimingBeliefStore,
};
pub use timing::{
    BeliefFilter, BeliefSnapshot, TimingBelief, TimingConfig, TimingModel, TimingPrior,
};
