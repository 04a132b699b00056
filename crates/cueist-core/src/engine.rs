//! Decision engine orchestration.
//!
//! `decide()` runs the full pipeline for one context snapshot: trigger rules
//! through the matcher, calendar events through the reminder policy, lead
//! times through the Bayesian timing model, and the merged candidate set
//! through the branch-and-bound optimizer. The engine is stateless per call;
//! everything it learns lives behind the injected store.
//!
//! The snapshot's own timestamp is treated as "now" throughout, which keeps
//! a decision reproducible for a given (context, store state) pair.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{Context, ContextKey};
use crate::error::{CoreError, Result};
use crate::feedback::{FeedbackEntry, FeedbackProcessor, FeedbackUpdate};
use crate::optimizer::{Candidate, CandidateOption, ScheduleOptimizer, ScheduleResult};
use crate::reminder::{ReminderDecision, ReminderPolicy, ScheduledEvent};
use crate::rules::{self, TaskRule};
use crate::storage::{FeedbackLogStore, ScheduledEventStore, TaskRuleStore, TimingBeliefStore};
use crate::timing::{BeliefFilter, BeliefSnapshot, TimingExplanation, TimingModel};

/// Lead-time windows offered to calendar-event candidates, scaled by
/// proximity so closer windows score higher.
const EVENT_WINDOWS: [u32; 4] = [60, 30, 15, 10];

/// Decision thresholds and toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Minimum weight x match-score product for a rule to stay in play
    #[serde(default = "default_base_threshold")]
    pub base_confidence_threshold: f64,

    /// Base confidence at which a rule is suggested regardless of timing
    /// confidence
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f64,

    /// How far ahead to look for calendar events, in hours
    #[serde(default = "default_horizon_hours")]
    pub event_horizon_hours: i64,

    /// Run the branch-and-bound optimizer when more than one candidate
    #[serde(default = "default_enabled")]
    pub enable_optimization: bool,
}

fn default_base_threshold() -> f64 {
    0.6
}
fn default_promotion_threshold() -> f64 {
    0.7
}
fn default_horizon_hours() -> i64 {
    24
}
fn default_enabled() -> bool {
    true
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            base_confidence_threshold: default_base_threshold(),
            promotion_threshold: default_promotion_threshold(),
            event_horizon_hours: default_horizon_hours(),
            enable_optimization: default_enabled(),
        }
    }
}

/// How the ranked output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionQuality {
    /// Branch-and-bound search completed exactly
    Optimal,
    /// Optimizer fell back to the greedy schedule
    Degraded,
    /// Zero or one candidate, or optimization disabled; local sort only
    Unoptimized,
}

/// One ranked notification suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub task_id: Uuid,
    /// Calendar event id when this suggestion came from the reminder policy
    #[serde(default)]
    pub event_id: Option<String>,
    pub title: String,
    /// Rule-match or reminder confidence
    pub confidence: f64,
    /// Confidence of the chosen lead-time window
    pub timing_confidence: f64,
    /// Minutes before the task to notify; None only when skipped
    pub chosen_window: Option<u32>,
    /// Why this task matched (rule predicates or reminder tier)
    pub reasoning: String,
    /// Why this lead time was chosen
    pub explanation: String,
}

/// Metadata from the optimizer run, when one happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInfo {
    pub total_reward: f64,
    pub nodes_explored: usize,
    pub search_completed: bool,
    pub search_time_ms: f64,
}

impl From<&ScheduleResult> for SearchInfo {
    fn from(result: &ScheduleResult) -> Self {
        Self {
            total_reward: result.total_reward,
            nodes_explored: result.nodes_explored,
            search_completed: result.search_completed,
            search_time_ms: result.search_time_ms,
        }
    }
}

/// Ranked output of one decide() call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub context_key: ContextKey,
    pub suggestions: Vec<Suggestion>,
    pub quality: DecisionQuality,
    pub rules_evaluated: usize,
    #[serde(default)]
    pub search: Option<SearchInfo>,
}

/// Candidate plus the presentation data needed to build its suggestion.
struct PendingSuggestion {
    candidate: Candidate,
    event_id: Option<String>,
    confidence: f64,
    reasoning: String,
    explanation: String,
    default_window: u32,
    default_timing_confidence: f64,
    /// window -> timing confidence, for resolving the optimizer's choice
    window_confidence: Vec<(u32, f64)>,
}

impl PendingSuggestion {
    fn timing_confidence_for(&self, window: u32) -> f64 {
        self.window_confidence
            .iter()
            .find(|(w, _)| *w == window)
            .map(|(_, c)| *c)
            .unwrap_or(self.default_timing_confidence)
    }
}

/// Orchestrates matcher, timing model, reminder policy, and optimizer over a
/// single store.
pub struct DecisionEngine<S> {
    store: S,
    timing: TimingModel,
    policy: ReminderPolicy,
    optimizer: ScheduleOptimizer,
    processor: FeedbackProcessor,
    config: DecisionConfig,
}

impl<S> DecisionEngine<S>
where
    S: TaskRuleStore + TimingBeliefStore + ScheduledEventStore + FeedbackLogStore,
{
    /// Engine with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            timing: TimingModel::default(),
            policy: ReminderPolicy::new(),
            optimizer: ScheduleOptimizer::new(),
            processor: FeedbackProcessor::new(),
            config: DecisionConfig::default(),
        }
    }

    pub fn with_components(
        store: S,
        timing: TimingModel,
        optimizer: ScheduleOptimizer,
        config: DecisionConfig,
    ) -> Self {
        Self {
            store,
            timing,
            policy: ReminderPolicy::new(),
            optimizer,
            processor: FeedbackProcessor::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Produce the ranked notification suggestions for one context snapshot.
    ///
    /// A belief-store failure is fatal to the request; optimizer trouble
    /// only degrades ranking quality.
    pub fn decide(&mut self, context: &Context) -> Result<Decision> {
        let rules = self.store.list_active()?;
        let rules_evaluated = rules.len();

        let mut pending = Vec::new();
        for rule in &rules {
            // Calendar-linked rules are handled by the reminder policy below.
            if rule.scheduled_event_id.is_some() {
                continue;
            }
            if let Some(candidate) = self.evaluate_rule_candidate(rule, context)? {
                pending.push(candidate);
            }
        }

        let events = self
            .store
            .upcoming(context.timestamp, Duration::hours(self.config.event_horizon_hours))?;
        for event in &events {
            if let Some(candidate) = self.evaluate_event_candidate(event, &rules, context)? {
                pending.push(candidate);
            }
        }

        let (mut suggestions, quality, search) =
            if pending.len() > 1 && self.config.enable_optimization {
                self.optimized_suggestions(pending)
            } else {
                let suggestions = pending
                    .into_iter()
                    .map(|p| build_suggestion(&p, Some(p.default_window)))
                    .collect();
                (suggestions, DecisionQuality::Unoptimized, None)
            };

        suggestions.sort_by(|a: &Suggestion, b: &Suggestion| {
            let left = a.confidence * a.timing_confidence;
            let right = b.confidence * b.timing_confidence;
            right
                .partial_cmp(&left)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(Decision {
            context_key: context.key(),
            suggestions,
            quality,
            rules_evaluated,
            search,
        })
    }

    /// Record accept/reject feedback for a suggestion.
    pub fn record_feedback(
        &mut self,
        task_id: Uuid,
        context: &Context,
        window_minutes: u32,
        action: &str,
    ) -> Result<FeedbackUpdate> {
        self.processor.record(
            &mut self.store,
            &self.timing,
            task_id,
            context,
            window_minutes,
            action,
        )
    }

    /// Snapshot stored beliefs, most confident first.
    pub fn belief_summary(&self, filter: &BeliefFilter) -> Result<Vec<BeliefSnapshot>> {
        self.timing
            .summary(&self.store, filter)
            .map_err(CoreError::from)
    }

    /// Per-window learning detail for one task in the given context.
    pub fn explain_timing(
        &mut self,
        task_type: &str,
        context: &Context,
    ) -> Result<TimingExplanation> {
        self.timing
            .explain(&mut self.store, task_type, context)
            .map_err(CoreError::from)
    }

    /// Most recent feedback entries, newest first.
    pub fn feedback_history(
        &self,
        task_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>> {
        self.store.recent(task_id, limit).map_err(CoreError::from)
    }

    /// Rule path: matcher -> thresholds -> timing model -> candidate.
    fn evaluate_rule_candidate(
        &mut self,
        rule: &TaskRule,
        context: &Context,
    ) -> Result<Option<PendingSuggestion>> {
        let matched = rules::evaluate(rule, context);
        if !matched.matches {
            return Ok(None);
        }

        let base_confidence = rule.weight * matched.score;
        if base_confidence < self.config.base_confidence_threshold {
            return Ok(None);
        }

        let timing = self
            .timing
            .select_window(&mut self.store, &rule.name, context)?;

        // Strong rule matches surface regardless of timing confidence;
        // weaker ones need the timing model to vouch for its chosen window.
        let should_suggest =
            base_confidence >= self.config.promotion_threshold || timing.meets_threshold;
        if !should_suggest {
            return Ok(None);
        }

        let options: Vec<CandidateOption> = timing
            .all_windows
            .iter()
            .map(|estimate| CandidateOption {
                window_minutes: estimate.window_minutes,
                expected_reward: base_confidence * estimate.confidence,
                context_match_score: estimate.confidence,
            })
            .collect();
        let window_confidence = timing
            .all_windows
            .iter()
            .map(|e| (e.window_minutes, e.confidence))
            .collect();

        Ok(Some(PendingSuggestion {
            candidate: Candidate {
                task_id: rule.id,
                title: rule.name.clone(),
                priority_weight: base_confidence,
                options,
            },
            event_id: None,
            confidence: base_confidence,
            reasoning: matched.reasoning,
            explanation: timing.explanation,
            default_window: timing.window_minutes,
            default_timing_confidence: timing.confidence,
            window_confidence,
        }))
    }

    /// Event path: reminder policy -> transition persist -> candidate with
    /// proximity-scaled window options.
    fn evaluate_event_candidate(
        &mut self,
        event: &ScheduledEvent,
        rules: &[TaskRule],
        context: &Context,
    ) -> Result<Option<PendingSuggestion>> {
        let decision = self.policy.evaluate(event, context, context.timestamp);
        let (confidence, reasoning, transition) = match decision {
            ReminderDecision::Remind {
                confidence,
                reasoning,
                transition,
            } => (confidence, reasoning, transition),
            ReminderDecision::Hold { .. } | ReminderDecision::Terminal { .. } => return Ok(None),
        };

        self.store.mark_reminded(&event.id, &transition)?;

        let minutes_until = (event.start_time - context.timestamp).num_minutes().max(0) as u32;

        // Standard windows scaled by time remaining; closer windows score
        // higher. Falls back to "notify now" when the event is nearer than
        // every standard window.
        let mut options: Vec<CandidateOption> = EVENT_WINDOWS
            .iter()
            .filter(|&&window| minutes_until >= window)
            .map(|&window| {
                let scaled = confidence * (1.0 - f64::from(window) / 120.0);
                CandidateOption {
                    window_minutes: window,
                    expected_reward: scaled,
                    context_match_score: 1.0,
                }
            })
            .collect();
        if options.is_empty() {
            options.push(CandidateOption {
                window_minutes: minutes_until,
                expected_reward: confidence,
                context_match_score: 1.0,
            });
        }

        let window_confidence: Vec<(u32, f64)> = options
            .iter()
            .map(|o| (o.window_minutes, o.expected_reward / confidence))
            .collect();
        let mut best = 0;
        for (i, option) in options.iter().enumerate() {
            if option.expected_reward > options[best].expected_reward {
                best = i;
            }
        }
        let default_window = options[best].window_minutes;
        let default_timing_confidence = options[best].expected_reward / confidence;

        // Reuse the linked rule's id when one exists so feedback lands on
        // the rule; otherwise mint an ephemeral id for this response.
        let task_id = rules
            .iter()
            .find(|r| r.scheduled_event_id.as_deref() == Some(event.id.as_str()))
            .map(|r| r.id)
            .unwrap_or_else(Uuid::new_v4);

        Ok(Some(PendingSuggestion {
            candidate: Candidate {
                task_id,
                title: event.title.clone(),
                priority_weight: confidence,
                options,
            },
            event_id: Some(event.id.clone()),
            confidence,
            reasoning,
            explanation: format!(
                "{} priority event starting in {} min",
                event.priority.name(),
                minutes_until
            ),
            default_window,
            default_timing_confidence,
            window_confidence,
        }))
    }

    /// Run the optimizer and translate assignments back into suggestions.
    /// Tasks the search skipped are dropped from the output.
    fn optimized_suggestions(
        &self,
        pending: Vec<PendingSuggestion>,
    ) -> (Vec<Suggestion>, DecisionQuality, Option<SearchInfo>) {
        let candidates: Vec<Candidate> = pending.iter().map(|p| p.candidate.clone()).collect();
        let outcome = self.optimizer.optimize(&candidates);
        let quality = if outcome.is_degraded() {
            DecisionQuality::Degraded
        } else {
            DecisionQuality::Optimal
        };
        let result = outcome.result();
        let search = Some(SearchInfo::from(result));

        let suggestions = pending
            .iter()
            .zip(result.schedule.iter())
            .filter_map(|(p, (_, window))| window.map(|w| build_suggestion(p, Some(w))))
            .collect();

        (suggestions, quality, search)
    }
}

fn build_suggestion(pending: &PendingSuggestion, chosen_window: Option<u32>) -> Suggestion {
    let timing_confidence = chosen_window
        .map(|w| pending.timing_confidence_for(w))
        .unwrap_or(pending.default_timing_confidence);
    Suggestion {
        task_id: pending.candidate.task_id,
        event_id: pending.event_id.clone(),
        title: pending.candidate.title.clone(),
        confidence: pending.confidence,
        timing_confidence,
        chosen_window,
        reasoning: pending.reasoning.clone(),
        explanation: pending.explanation.clone(),
    }
}
