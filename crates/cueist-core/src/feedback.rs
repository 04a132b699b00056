//! Accept/reject feedback processing.
//!
//! One feedback call updates three things together: the rule's probability
//! weight, the Beta belief for the (task type, context key, window) triple,
//! and the immutable feedback log. Validation happens before any mutation,
//! so the recoverable errors (unknown task, bad action string) guarantee
//! zero partial writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{Context, ContextKey};
use crate::error::{CoreError, FeedbackError};
use crate::storage::{FeedbackLogStore, TaskRuleStore, TimingBeliefStore};
use crate::timing::TimingModel;

/// Weight adjustment on accept, capped at 1.0.
const ACCEPT_DELTA: f64 = 0.05;
/// Weight adjustment on reject, floored at 0.0.
const REJECT_DELTA: f64 = 0.10;

/// Parsed user feedback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Accepted,
    Rejected,
}

impl FeedbackAction {
    /// Parse a user-supplied action string.
    pub fn parse(raw: &str) -> Result<Self, FeedbackError> {
        match raw.to_ascii_lowercase().as_str() {
            "accept" | "accepted" => Ok(FeedbackAction::Accepted),
            "reject" | "rejected" => Ok(FeedbackAction::Rejected),
            _ => Err(FeedbackError::InvalidAction(raw.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeedbackAction::Accepted => "accepted",
            FeedbackAction::Rejected => "rejected",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, FeedbackAction::Accepted)
    }
}

/// Immutable feedback log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    pub action: FeedbackAction,
    pub window_minutes: u32,
    pub context_key: ContextKey,
    /// Context snapshot at the moment feedback was given
    pub context: Context,
    pub timestamp: DateTime<Utc>,
}

/// Result of one feedback call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackUpdate {
    pub task_id: Uuid,
    pub task_name: String,
    pub action: FeedbackAction,
    pub old_weight: f64,
    pub new_weight: f64,
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub context_key: ContextKey,
    pub window_minutes: u32,
    /// Human-readable summary of what was learned
    pub explanation: String,
}

/// Applies feedback to rule weights, timing beliefs, and the feedback log.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackProcessor;

impl FeedbackProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Record one accept/reject observation.
    ///
    /// Unknown task ids and unparseable action strings return before any
    /// state is touched. Store failures after validation propagate as fatal.
    pub fn record<S>(
        &self,
        store: &mut S,
        model: &TimingModel,
        task_id: Uuid,
        context: &Context,
        window_minutes: u32,
        action: &str,
    ) -> Result<FeedbackUpdate, CoreError>
    where
        S: TaskRuleStore + TimingBeliefStore + FeedbackLogStore,
    {
        let action = FeedbackAction::parse(action)?;
        let rule = store
            .get_rule(task_id)?
            .ok_or(FeedbackError::NotFound(task_id))?;

        let old_weight = rule.weight;
        let new_weight = if action.is_accepted() {
            (old_weight + ACCEPT_DELTA).min(1.0)
        } else {
            (old_weight - REJECT_DELTA).max(0.0)
        };
        store.update_weight(task_id, new_weight)?;

        let context_key = context.key();
        let belief_update = model.update(
            store,
            &rule.name,
            &context_key,
            window_minutes,
            action.is_accepted(),
        )?;

        let entry = FeedbackEntry {
            id: Uuid::new_v4(),
            task_id,
            action,
            window_minutes,
            context_key: context_key.clone(),
            context: context.clone(),
            timestamp: Utc::now(),
        };
        store.append(&entry)?;

        let explanation = explain_update(
            &context_key,
            action,
            &belief_update,
            old_weight,
            new_weight,
        );

        Ok(FeedbackUpdate {
            task_id,
            task_name: rule.name,
            action,
            old_weight,
            new_weight,
            old_confidence: belief_update.old_confidence,
            new_confidence: belief_update.new_confidence,
            context_key,
            window_minutes,
            explanation,
        })
    }
}

fn explain_update(
    context_key: &ContextKey,
    action: FeedbackAction,
    update: &crate::timing::BeliefUpdate,
    old_weight: f64,
    new_weight: f64,
) -> String {
    let direction = if update.new_confidence > update.old_confidence {
        "increased"
    } else {
        "decreased"
    };
    let progress = match update.total_triggers {
        1 => "first feedback for this context".to_string(),
        n if n < 5 => format!("{n} samples so far, still learning"),
        n => format!("{n} samples, well calibrated"),
    };

    format!(
        "You {} the notification during {}. Timing confidence {} from {:.1}% to {:.1}% ({}). \
         Rule weight moved {:.2} -> {:.2}. Distribution: Beta({:.0}, {:.0}).",
        action.name(),
        context_key.describe(),
        direction,
        update.old_confidence * 100.0,
        update.new_confidence * 100.0,
        progress,
        old_weight,
        new_weight,
        update.alpha,
        update.beta,
    )
}
