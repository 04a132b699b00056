//! Bayesian notification-timing model.
//!
//! For each (task type, context key, lead-time window) triple the model keeps
//! a Beta(alpha, beta) belief over whether a notification at that lead time
//! gets accepted. Window selection uses an Upper Confidence Bound rule so
//! under-sampled windows still get explored. All state lives behind a
//! [`TimingBeliefStore`]; the model holds no cache across calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{Context, ContextKey};
use crate::error::DatabaseError;
use crate::storage::TimingBeliefStore;

/// Canonical initial prior for unseen triples: Beta(4, 2).
///
/// Initial confidence is 4/6 ~= 0.667 -- optimistic enough that tasks with no
/// history still surface, while a handful of rejections quickly pulls the
/// belief down. This prior is the single source of truth and is applied on
/// every call path that creates a belief.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for TimingPrior {
    fn default() -> Self {
        Self {
            alpha: 4.0,
            beta: 2.0,
        }
    }
}

/// Configuration for the timing model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Candidate lead-time windows in minutes, in preference order.
    /// Ties in the selection score break toward the earlier entry.
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,

    /// Confidence a window must reach to count as trustworthy on its own
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Weight of the uncertainty bonus in the UCB selection score
    #[serde(default = "default_exploration_bonus")]
    pub exploration_bonus: f64,
}

fn default_windows() -> Vec<u32> {
    vec![60, 30, 10]
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_exploration_bonus() -> f64 {
    0.5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            confidence_threshold: default_confidence_threshold(),
            exploration_bonus: default_exploration_bonus(),
        }
    }
}

/// One Beta-distribution belief record.
///
/// At most one record exists per (task type, context key, window) triple.
/// Records are never deleted, only incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingBelief {
    pub task_type: String,
    pub context_key: ContextKey,
    pub window_minutes: u32,
    pub alpha: f64,
    pub beta: f64,
    /// Number of feedback updates applied to this record
    pub total_triggers: u32,
    pub last_updated: DateTime<Utc>,
}

impl TimingBelief {
    /// Fresh belief at the given prior.
    pub fn from_prior(
        task_type: impl Into<String>,
        context_key: ContextKey,
        window_minutes: u32,
        prior: TimingPrior,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            context_key,
            window_minutes,
            alpha: prior.alpha,
            beta: prior.beta,
            total_triggers: 0,
            last_updated: Utc::now(),
        }
    }

    /// Posterior mean of the Beta distribution, always in (0, 1).
    pub fn confidence(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Variance of the Beta distribution.
    pub fn variance(&self) -> f64 {
        let total = self.alpha + self.beta;
        (self.alpha * self.beta) / (total * total * (total + 1.0))
    }

    /// Standard deviation of the Beta distribution.
    pub fn uncertainty(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Apply one feedback observation.
    pub fn record(&mut self, accepted: bool, now: DateTime<Utc>) {
        if accepted {
            self.alpha += 1.0;
        } else {
            self.beta += 1.0;
        }
        self.total_triggers += 1;
        self.last_updated = now;
    }
}

/// Per-window detail included in a timing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowEstimate {
    pub window_minutes: u32,
    pub confidence: f64,
    pub uncertainty: f64,
    pub alpha: f64,
    pub beta: f64,
    pub total_triggers: u32,
}

/// Result of selecting a lead-time window for one task/context pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingDecision {
    /// Chosen lead time in minutes before the task
    pub window_minutes: u32,
    /// Posterior confidence of the chosen window
    pub confidence: f64,
    /// Whether the chosen window clears the configured threshold
    pub meets_threshold: bool,
    /// Human-readable reasoning for the choice
    pub explanation: String,
    /// Detail for every candidate window, in declaration order
    pub all_windows: Vec<WindowEstimate>,
    pub context_key: ContextKey,
}

/// Outcome of one belief update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefUpdate {
    pub task_type: String,
    pub context_key: ContextKey,
    pub window_minutes: u32,
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Feedback samples applied to this triple, including this one
    pub total_triggers: u32,
    pub accepted: bool,
}

/// Filters for belief summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeliefFilter {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub context_key: Option<ContextKey>,
    /// Only include beliefs with at least this many feedback samples
    #[serde(default)]
    pub min_feedback: u32,
}

/// Read-only snapshot of one belief, for summaries and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefSnapshot {
    pub task_type: String,
    pub context_key: ContextKey,
    pub window_minutes: u32,
    pub confidence: f64,
    pub uncertainty: f64,
    pub feedback_count: u32,
    pub last_updated: DateTime<Utc>,
}

/// Per-window learning detail for explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowExplanation {
    pub window_minutes: u32,
    pub confidence: f64,
    /// Approximate 95% credible interval around the posterior mean
    pub credible_interval: (f64, f64),
    pub feedback_count: u32,
    /// At least 5 feedback samples observed
    pub is_well_learned: bool,
}

/// What the model has learned about one task in one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingExplanation {
    pub task_type: String,
    pub context_key: ContextKey,
    pub recommended_window: u32,
    pub recommended_confidence: f64,
    pub windows: Vec<WindowExplanation>,
    pub total_samples: u32,
    pub is_well_trained: bool,
}

/// Bayesian timing model over a persisted belief store.
#[derive(Debug, Clone, Default)]
pub struct TimingModel {
    config: TimingConfig,
    prior: TimingPrior,
}

impl TimingModel {
    pub fn new(config: TimingConfig, prior: TimingPrior) -> Self {
        let mut config = config;
        // An empty window set would leave nothing to select.
        if config.windows.is_empty() {
            config.windows = default_windows();
        }
        Self { config, prior }
    }

    pub fn windows(&self) -> &[u32] {
        &self.config.windows
    }

    pub fn prior(&self) -> TimingPrior {
        self.prior
    }

    /// Select the best lead-time window for a task in the given context.
    ///
    /// Scores every candidate window with `confidence + bonus * uncertainty`
    /// and returns the maximum; ties break by window declaration order, so
    /// repeated calls with no intervening updates are deterministic.
    pub fn select_window(
        &self,
        store: &mut dyn TimingBeliefStore,
        task_type: &str,
        context: &Context,
    ) -> Result<TimingDecision, DatabaseError> {
        let context_key = context.key();

        let mut estimates = Vec::with_capacity(self.config.windows.len());
        for &window in &self.config.windows {
            let belief = store.get_or_create(task_type, &context_key, window, self.prior)?;
            estimates.push(WindowEstimate {
                window_minutes: window,
                confidence: belief.confidence(),
                uncertainty: belief.uncertainty(),
                alpha: belief.alpha,
                beta: belief.beta,
                total_triggers: belief.total_triggers,
            });
        }

        // Strict > keeps the earliest window on ties.
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, estimate) in estimates.iter().enumerate() {
            let score = estimate.confidence + self.config.exploration_bonus * estimate.uncertainty;
            if score > best_score {
                best_score = score;
                best = i;
            }
        }

        let chosen = estimates[best].clone();
        let explanation = self.explain_choice(&chosen, &estimates, &context_key);

        Ok(TimingDecision {
            window_minutes: chosen.window_minutes,
            confidence: chosen.confidence,
            meets_threshold: chosen.confidence >= self.config.confidence_threshold,
            explanation,
            all_windows: estimates,
            context_key,
        })
    }

    /// Apply accept/reject feedback to one belief triple.
    pub fn update(
        &self,
        store: &mut dyn TimingBeliefStore,
        task_type: &str,
        context_key: &ContextKey,
        window_minutes: u32,
        accepted: bool,
    ) -> Result<BeliefUpdate, DatabaseError> {
        let mut belief = store.get_or_create(task_type, context_key, window_minutes, self.prior)?;
        let old_confidence = belief.confidence();

        belief.record(accepted, Utc::now());
        store.update_belief(&belief)?;

        Ok(BeliefUpdate {
            task_type: task_type.to_string(),
            context_key: context_key.clone(),
            window_minutes,
            old_confidence,
            new_confidence: belief.confidence(),
            alpha: belief.alpha,
            beta: belief.beta,
            total_triggers: belief.total_triggers,
            accepted,
        })
    }

    /// Snapshot all stored beliefs matching the filter, most confident first.
    pub fn summary(
        &self,
        store: &dyn TimingBeliefStore,
        filter: &BeliefFilter,
    ) -> Result<Vec<BeliefSnapshot>, DatabaseError> {
        let mut snapshots: Vec<BeliefSnapshot> = store
            .list_beliefs(filter)?
            .into_iter()
            .filter(|b| b.total_triggers >= filter.min_feedback)
            .map(|b| BeliefSnapshot {
                confidence: b.confidence(),
                uncertainty: b.uncertainty(),
                feedback_count: b.total_triggers,
                task_type: b.task_type,
                context_key: b.context_key,
                window_minutes: b.window_minutes,
                last_updated: b.last_updated,
            })
            .collect();

        snapshots.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(snapshots)
    }

    /// Expose per-window learning detail for one task/context pair.
    pub fn explain(
        &self,
        store: &mut dyn TimingBeliefStore,
        task_type: &str,
        context: &Context,
    ) -> Result<TimingExplanation, DatabaseError> {
        let context_key = context.key();

        let mut windows = Vec::with_capacity(self.config.windows.len());
        for &window in &self.config.windows {
            let belief = store.get_or_create(task_type, &context_key, window, self.prior)?;
            let confidence = belief.confidence();
            let std = belief.uncertainty();
            windows.push(WindowExplanation {
                window_minutes: window,
                confidence,
                credible_interval: (
                    (confidence - 1.96 * std).max(0.0),
                    (confidence + 1.96 * std).min(1.0),
                ),
                feedback_count: belief.total_triggers,
                is_well_learned: belief.total_triggers >= 5,
            });
        }

        let mut best = 0;
        for (i, window) in windows.iter().enumerate() {
            if window.confidence > windows[best].confidence {
                best = i;
            }
        }

        Ok(TimingExplanation {
            task_type: task_type.to_string(),
            context_key,
            recommended_window: windows[best].window_minutes,
            recommended_confidence: windows[best].confidence,
            total_samples: windows.iter().map(|w| w.feedback_count).sum(),
            is_well_trained: windows.iter().any(|w| w.is_well_learned),
            windows,
        })
    }

    fn explain_choice(
        &self,
        chosen: &WindowEstimate,
        all: &[WindowEstimate],
        context_key: &ContextKey,
    ) -> String {
        let mut parts = vec![format!(
            "Optimal timing: {} min before task (confidence {:.0}%)",
            chosen.window_minutes,
            chosen.confidence * 100.0
        )];

        match chosen.total_triggers {
            0 => parts.push("no feedback yet, using prior estimate".to_string()),
            n if n < 5 => parts.push(format!("limited feedback ({n} samples), still learning")),
            n => parts.push(format!("based on {n} feedback samples")),
        }

        parts.push(format!("context: {}", context_key.describe()));

        let mut others: Vec<&WindowEstimate> = all
            .iter()
            .filter(|e| e.window_minutes != chosen.window_minutes)
            .collect();
        others.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(runner_up) = others.first() {
            if (chosen.confidence - runner_up.confidence).abs() < 0.1 {
                parts.push(format!(
                    "close alternative: {} min (confidence {:.0}%)",
                    runner_up.window_minutes,
                    runner_up.confidence * 100.0
                ));
            }
        }

        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActivityState, LocationCategory};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn make_test_context() -> Context {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();
        Context::new(ts, ActivityState::Driving, LocationCategory::Commute)
    }

    #[test]
    fn test_prior_confidence() {
        let belief = TimingBelief::from_prior(
            "Get Fuel",
            ContextKey::from_raw("driving_morning_weekday_commute"),
            30,
            TimingPrior::default(),
        );
        assert!((belief.confidence() - 0.667).abs() < 0.001);
        assert_eq!(belief.total_triggers, 0);
    }

    #[test]
    fn test_confidence_increases_with_accepts() {
        let mut belief = TimingBelief::from_prior(
            "Get Fuel",
            ContextKey::from_raw("k"),
            30,
            TimingPrior::default(),
        );
        let mut last = belief.confidence();
        for k in 1..=10u32 {
            belief.record(true, Utc::now());
            let confidence = belief.confidence();
            assert!(confidence > last, "confidence must strictly increase");
            // (a0 + k) / (a0 + b0 + k)
            let expected = (4.0 + f64::from(k)) / (6.0 + f64::from(k));
            assert!((confidence - expected).abs() < 1e-12);
            last = confidence;
        }
    }

    #[test]
    fn test_confidence_decreases_with_rejects_never_zero() {
        let mut belief = TimingBelief::from_prior(
            "Get Fuel",
            ContextKey::from_raw("k"),
            30,
            TimingPrior::default(),
        );
        let mut last = belief.confidence();
        for k in 1..=50u32 {
            belief.record(false, Utc::now());
            let confidence = belief.confidence();
            assert!(confidence < last, "confidence must strictly decrease");
            let expected = 4.0 / (6.0 + f64::from(k));
            assert!((confidence - expected).abs() < 1e-12);
            assert!(confidence > 0.0);
            last = confidence;
        }
    }

    #[test]
    fn test_variance_formula() {
        let belief = TimingBelief::from_prior(
            "t",
            ContextKey::from_raw("k"),
            30,
            TimingPrior { alpha: 4.0, beta: 2.0 },
        );
        // alpha*beta / ((a+b)^2 * (a+b+1)) = 8 / (36 * 7)
        let expected = 8.0 / 252.0;
        assert!((belief.variance() - expected).abs() < 1e-12);
        assert!((belief.uncertainty() - expected.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_select_window_deterministic() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let ctx = make_test_context();

        let first = model.select_window(&mut store, "Get Fuel", &ctx).unwrap();
        let second = model.select_window(&mut store, "Get Fuel", &ctx).unwrap();
        assert_eq!(first.window_minutes, second.window_minutes);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn test_select_window_ties_break_by_declaration_order() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let ctx = make_test_context();

        // All three windows start at the identical prior, so the first
        // declared window (60) must win.
        let decision = model.select_window(&mut store, "Get Fuel", &ctx).unwrap();
        assert_eq!(decision.window_minutes, 60);
        assert_eq!(decision.all_windows.len(), 3);
    }

    #[test]
    fn test_select_window_prefers_learned_window() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let ctx = make_test_context();
        let key = ctx.key();

        for _ in 0..8 {
            model.update(&mut store, "Get Fuel", &key, 10, true).unwrap();
        }
        for _ in 0..4 {
            model.update(&mut store, "Get Fuel", &key, 60, false).unwrap();
        }

        let decision = model.select_window(&mut store, "Get Fuel", &ctx).unwrap();
        assert_eq!(decision.window_minutes, 10);
        assert!(decision.meets_threshold);
    }

    #[test]
    fn test_update_round_trip() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let key = ContextKey::from_raw("stationary_evening_weekday_home");

        let update = model.update(&mut store, "Call Mom", &key, 30, true).unwrap();
        assert!((update.old_confidence - 0.667).abs() < 0.001);
        assert!((update.new_confidence - 5.0 / 7.0).abs() < 1e-12);
        assert_eq!(update.alpha, 5.0);
        assert_eq!(update.beta, 2.0);

        let update = model.update(&mut store, "Call Mom", &key, 30, false).unwrap();
        assert_eq!(update.alpha, 5.0);
        assert_eq!(update.beta, 3.0);
    }

    #[test]
    fn test_summary_sorted_and_filtered() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let key = ContextKey::from_raw("k");

        for _ in 0..3 {
            model.update(&mut store, "A", &key, 30, true).unwrap();
        }
        model.update(&mut store, "B", &key, 30, false).unwrap();

        let all = model.summary(&store, &BeliefFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].task_type, "A");
        assert!(all[0].confidence > all[1].confidence);

        let filtered = model
            .summary(
                &store,
                &BeliefFilter {
                    min_feedback: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].task_type, "A");
    }

    #[test]
    fn test_explain_reports_credible_interval() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let ctx = make_test_context();

        let explanation = model.explain(&mut store, "Get Fuel", &ctx).unwrap();
        assert_eq!(explanation.windows.len(), 3);
        assert!(!explanation.is_well_trained);
        for window in &explanation.windows {
            let (lo, hi) = window.credible_interval;
            assert!(lo >= 0.0 && hi <= 1.0 && lo < hi);
            assert!(!window.is_well_learned);
        }
    }

    #[test]
    fn test_explanation_mentions_prior_when_unseen() {
        let mut store = MemoryStore::new();
        let model = TimingModel::default();
        let ctx = make_test_context();

        let decision = model.select_window(&mut store, "Get Fuel", &ctx).unwrap();
        assert!(decision.explanation.contains("no feedback yet"));
        assert!(decision.explanation.contains("driving on a weekday morning"));
    }
}
