//! In-memory store for tests and demo seeding.
//!
//! Implements all four store traits over plain maps. Mutating methods take
//! `&mut self`, so read-modify-write on a belief triple is exclusive by
//! construction.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{FeedbackLogStore, ScheduledEventStore, TaskRuleStore, TimingBeliefStore};
use crate::context::ContextKey;
use crate::error::DatabaseError;
use crate::feedback::FeedbackEntry;
use crate::reminder::{ReminderTransition, ScheduledEvent};
use crate::rules::TaskRule;
use crate::timing::{BeliefFilter, TimingBelief, TimingPrior};

type BeliefKey = (String, String, u32);

/// Map-backed store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rules: Vec<TaskRule>,
    beliefs: HashMap<BeliefKey, TimingBelief>,
    events: Vec<ScheduledEvent>,
    feedback: Vec<FeedbackEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_rule(&mut self, rule: TaskRule) {
        self.rules.push(rule);
    }

    pub fn insert_event(&mut self, event: ScheduledEvent) {
        self.events.push(event);
    }

    pub fn rules(&self) -> &[TaskRule] {
        &self.rules
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn feedback_entries(&self) -> &[FeedbackEntry] {
        &self.feedback
    }

    pub fn belief_count(&self) -> usize {
        self.beliefs.len()
    }
}

impl TaskRuleStore for MemoryStore {
    fn list_active(&self) -> Result<Vec<TaskRule>, DatabaseError> {
        Ok(self.rules.iter().filter(|r| r.active).cloned().collect())
    }

    fn get_rule(&self, id: Uuid) -> Result<Option<TaskRule>, DatabaseError> {
        Ok(self.rules.iter().find(|r| r.id == id).cloned())
    }

    fn update_weight(&mut self, id: Uuid, new_weight: f64) -> Result<(), DatabaseError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DatabaseError::QueryFailed(format!("no rule with id {id}")))?;
        rule.weight = new_weight;
        rule.updated_at = Utc::now();
        Ok(())
    }
}

impl TimingBeliefStore for MemoryStore {
    fn get_or_create(
        &mut self,
        task_type: &str,
        context_key: &ContextKey,
        window_minutes: u32,
        prior: TimingPrior,
    ) -> Result<TimingBelief, DatabaseError> {
        let key = (
            task_type.to_string(),
            context_key.as_str().to_string(),
            window_minutes,
        );
        let belief = self.beliefs.entry(key).or_insert_with(|| {
            TimingBelief::from_prior(task_type, context_key.clone(), window_minutes, prior)
        });
        Ok(belief.clone())
    }

    fn update_belief(&mut self, belief: &TimingBelief) -> Result<(), DatabaseError> {
        let key = (
            belief.task_type.clone(),
            belief.context_key.as_str().to_string(),
            belief.window_minutes,
        );
        self.beliefs.insert(key, belief.clone());
        Ok(())
    }

    fn list_beliefs(&self, filter: &BeliefFilter) -> Result<Vec<TimingBelief>, DatabaseError> {
        let mut beliefs: Vec<TimingBelief> = self
            .beliefs
            .values()
            .filter(|b| {
                filter
                    .task_type
                    .as_deref()
                    .map_or(true, |t| b.task_type == t)
            })
            .filter(|b| {
                filter
                    .context_key
                    .as_ref()
                    .map_or(true, |k| &b.context_key == k)
            })
            .cloned()
            .collect();
        // Stable output order for callers that don't re-sort.
        beliefs.sort_by(|a, b| {
            (a.task_type.as_str(), a.context_key.as_str(), a.window_minutes).cmp(&(
                b.task_type.as_str(),
                b.context_key.as_str(),
                b.window_minutes,
            ))
        });
        Ok(beliefs)
    }
}

impl ScheduledEventStore for MemoryStore {
    fn upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        let cutoff = now + horizon;
        Ok(self
            .events
            .iter()
            .filter(|e| !e.completed && !e.dismissed)
            .filter(|e| e.start_time >= now && e.start_time <= cutoff)
            .cloned()
            .collect())
    }

    fn mark_reminded(
        &mut self,
        event_id: &str,
        transition: &ReminderTransition,
    ) -> Result<(), DatabaseError> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| DatabaseError::QueryFailed(format!("no event with id {event_id}")))?;
        event.apply(transition);
        Ok(())
    }
}

impl FeedbackLogStore for MemoryStore {
    fn append(&mut self, entry: &FeedbackEntry) -> Result<(), DatabaseError> {
        self.feedback.push(entry.clone());
        Ok(())
    }

    fn recent(
        &self,
        task_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, DatabaseError> {
        let mut entries: Vec<FeedbackEntry> = self
            .feedback
            .iter()
            .filter(|e| task_id.map_or(true, |id| e.task_id == id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }
}
