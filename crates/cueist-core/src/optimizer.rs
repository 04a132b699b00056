//! Branch-and-bound lead-time assignment across eligible tasks.
//!
//! Given a set of candidate tasks, each with several (window, expected
//! reward) options plus an implicit skip, the optimizer picks one option per
//! task to maximize total expected reward. The search is best-first with an
//! admissible suffix heuristic and upper-bound pruning; a node budget caps
//! the exponential state space and a per-candidate greedy argmax serves as
//! the fallback when the budget runs out.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single lead-time option for a candidate task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateOption {
    /// Minutes before the task to notify
    pub window_minutes: u32,
    /// Predicted utility of this choice
    pub expected_reward: f64,
    /// How well the current context matches this option (0.0 to 1.0)
    pub context_match_score: f64,
}

/// A task with multiple possible notification lead times.
///
/// Skipping the task entirely is always legal and contributes zero reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub task_id: Uuid,
    pub title: String,
    /// Task priority in [0, 1]
    pub priority_weight: f64,
    pub options: Vec<CandidateOption>,
}

/// Chosen lead time per candidate, in input order. `None` means skipped.
pub type Schedule = Vec<(Uuid, Option<u32>)>;

/// Result of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub schedule: Schedule,
    pub total_reward: f64,
    pub nodes_explored: usize,
    /// False when the node budget ran out before the queue drained
    pub search_completed: bool,
    pub search_time_ms: f64,
}

/// Outcome surfaced to the orchestrator.
///
/// `Degraded` carries a usable greedy schedule plus the reason quality was
/// reduced; the caller branches on the variant instead of catching errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleOutcome {
    Optimized(ScheduleResult),
    Degraded(ScheduleResult, String),
}

impl ScheduleOutcome {
    pub fn result(&self) -> &ScheduleResult {
        match self {
            ScheduleOutcome::Optimized(result) => result,
            ScheduleOutcome::Degraded(result, _) => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ScheduleOutcome::Degraded(..))
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Hard cap on explored nodes; the only cancellation mechanism
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Upper-bound pruning toggle (kept for diagnostics)
    #[serde(default = "default_true")]
    pub enable_pruning: bool,
}

fn default_max_nodes() -> usize {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            enable_pruning: default_true(),
        }
    }
}

/// Partial assignment in the search queue.
///
/// Ordered by optimistic total (accumulated reward plus the admissible
/// estimate of everything still assignable), so the heap pops the most
/// promising prefix first.
struct SearchNode {
    optimistic_total: f64,
    next_index: usize,
    accumulated_reward: f64,
    assignments: Vec<Option<u32>>,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.optimistic_total == other.optimistic_total
    }
}
impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.optimistic_total
            .partial_cmp(&other.optimistic_total)
            .unwrap_or(Ordering::Equal)
    }
}

/// Best-first branch-and-bound scheduler.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptimizer {
    config: OptimizerConfig,
}

impl ScheduleOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimize the candidate set, never failing.
    ///
    /// A malformed candidate (empty option list) or an exhausted node budget
    /// degrades the batch to the greedy fallback rather than erroring.
    pub fn optimize(&self, candidates: &[Candidate]) -> ScheduleOutcome {
        if let Some(malformed) = candidates.iter().find(|c| c.options.is_empty()) {
            let started = Instant::now();
            let (total_reward, schedule) = greedy_schedule(candidates);
            return ScheduleOutcome::Degraded(
                ScheduleResult {
                    schedule,
                    total_reward,
                    nodes_explored: 0,
                    search_completed: false,
                    search_time_ms: elapsed_ms(started),
                },
                format!("candidate '{}' has no timing options", malformed.title),
            );
        }

        let result = self.search(candidates);
        if result.search_completed {
            ScheduleOutcome::Optimized(result)
        } else {
            ScheduleOutcome::Degraded(result, "search node budget exhausted".to_string())
        }
    }

    /// Run the branch-and-bound search.
    ///
    /// 1. Precompute `max_reward_from[i]`: the sum over `candidates[i..]` of
    ///    each candidate's best single-option reward -- an optimistic bound
    ///    on everything still assignable.
    /// 2. Pop the most promising partial assignment; branch into one child
    ///    per option plus a skip child; prune children that cannot beat the
    ///    best complete schedule found so far.
    /// 3. Stop when the queue drains or the node budget is spent; fall back
    ///    to the greedy schedule if no complete solution was recorded.
    pub fn search(&self, candidates: &[Candidate]) -> ScheduleResult {
        let started = Instant::now();

        if candidates.is_empty() {
            return ScheduleResult {
                schedule: Vec::new(),
                total_reward: 0.0,
                nodes_explored: 0,
                search_completed: true,
                search_time_ms: elapsed_ms(started),
            };
        }

        let n = candidates.len();
        let mut max_reward_from = vec![0.0; n + 1];
        for i in (0..n).rev() {
            let best_option = candidates[i]
                .options
                .iter()
                .map(|o| o.expected_reward)
                .fold(0.0, f64::max);
            max_reward_from[i] = max_reward_from[i + 1] + best_option;
        }

        let mut queue = BinaryHeap::new();
        queue.push(SearchNode {
            optimistic_total: max_reward_from[0],
            next_index: 0,
            accumulated_reward: 0.0,
            assignments: Vec::new(),
        });

        let mut best_complete: Option<(f64, Vec<Option<u32>>)> = None;
        let mut nodes_explored = 0usize;

        while let Some(node) = queue.pop() {
            if nodes_explored >= self.config.max_nodes {
                // Re-queue the popped node so the exhaustion check below
                // sees a non-empty frontier.
                queue.push(node);
                break;
            }
            nodes_explored += 1;

            if node.next_index == n {
                let better = best_complete
                    .as_ref()
                    .map_or(true, |(best, _)| node.accumulated_reward > *best);
                if better {
                    best_complete = Some((node.accumulated_reward, node.assignments));
                }
                continue;
            }

            if self.config.enable_pruning {
                if let Some((best, _)) = &best_complete {
                    if node.accumulated_reward + max_reward_from[node.next_index] <= *best {
                        continue;
                    }
                }
            }

            let candidate = &candidates[node.next_index];
            for option in &candidate.options {
                let accumulated = node.accumulated_reward + option.expected_reward;
                let mut assignments = node.assignments.clone();
                assignments.push(Some(option.window_minutes));
                queue.push(SearchNode {
                    optimistic_total: accumulated + max_reward_from[node.next_index + 1],
                    next_index: node.next_index + 1,
                    accumulated_reward: accumulated,
                    assignments,
                });
            }

            let mut assignments = node.assignments;
            assignments.push(None);
            queue.push(SearchNode {
                optimistic_total: node.accumulated_reward + max_reward_from[node.next_index + 1],
                next_index: node.next_index + 1,
                accumulated_reward: node.accumulated_reward,
                assignments,
            });
        }

        // The frontier only survives the loop when the budget ran out.
        let search_completed = queue.is_empty();

        let (total_reward, schedule) = match best_complete {
            Some((reward, assignments)) => (
                reward,
                candidates
                    .iter()
                    .zip(assignments)
                    .map(|(c, window)| (c.task_id, window))
                    .collect(),
            ),
            None => greedy_schedule(candidates),
        };

        ScheduleResult {
            schedule,
            total_reward,
            nodes_explored,
            search_completed,
            search_time_ms: elapsed_ms(started),
        }
    }
}

/// Independent per-candidate argmax. Not globally constrained, but always a
/// valid schedule.
pub fn greedy_schedule(candidates: &[Candidate]) -> (f64, Schedule) {
    let mut schedule = Vec::with_capacity(candidates.len());
    let mut total_reward = 0.0;

    for candidate in candidates {
        let best = candidate.options.iter().max_by(|a, b| {
            a.expected_reward
                .partial_cmp(&b.expected_reward)
                .unwrap_or(Ordering::Equal)
        });
        match best {
            Some(option) => {
                schedule.push((candidate.task_id, Some(option.window_minutes)));
                total_reward += option.expected_reward;
            }
            None => schedule.push((candidate.task_id, None)),
        }
    }

    (total_reward, schedule)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_candidate(title: &str, rewards: &[(u32, f64)]) -> Candidate {
        Candidate {
            task_id: Uuid::new_v4(),
            title: title.to_string(),
            priority_weight: 0.8,
            options: rewards
                .iter()
                .map(|&(window_minutes, expected_reward)| CandidateOption {
                    window_minutes,
                    expected_reward,
                    context_match_score: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_candidates() {
        let result = ScheduleOptimizer::new().search(&[]);
        assert!(result.schedule.is_empty());
        assert_eq!(result.total_reward, 0.0);
        assert!(result.search_completed);
    }

    #[test]
    fn test_optimum_equals_greedy_on_unconstrained_set() {
        let candidates = vec![
            make_test_candidate("Gym Workout", &[(30, 0.75), (60, 0.65), (90, 0.55)]),
            make_test_candidate("Call Mom", &[(15, 0.82), (30, 0.78)]),
            make_test_candidate("Buy Groceries", &[(60, 0.41), (10, 0.62)]),
        ];

        let outcome = ScheduleOptimizer::new().optimize(&candidates);
        assert!(!outcome.is_degraded());
        let result = outcome.result();

        let (greedy_reward, _) = greedy_schedule(&candidates);
        assert!((result.total_reward - greedy_reward).abs() < 1e-9);
        assert!((result.total_reward - (0.75 + 0.82 + 0.62)).abs() < 1e-9);

        // Chosen windows match the per-candidate argmax.
        assert_eq!(result.schedule[0].1, Some(30));
        assert_eq!(result.schedule[1].1, Some(15));
        assert_eq!(result.schedule[2].1, Some(10));
    }

    #[test]
    fn test_six_candidates_three_options_within_budget() {
        let candidates: Vec<Candidate> = (0..6)
            .map(|i| {
                let base = 0.4 + i as f64 * 0.05;
                make_test_candidate(
                    &format!("Task {i}"),
                    &[(60, base), (30, base + 0.1), (10, base + 0.05)],
                )
            })
            .collect();

        let result = ScheduleOptimizer::new().search(&candidates);
        assert!(result.search_completed);
        assert!(result.nodes_explored <= 10_000);

        let (greedy_reward, _) = greedy_schedule(&candidates);
        assert!((result.total_reward - greedy_reward).abs() < 1e-9);
    }

    #[test]
    fn test_budget_exhaustion_degrades_to_greedy() {
        let candidates: Vec<Candidate> = (0..5)
            .map(|i| make_test_candidate(&format!("Task {i}"), &[(60, 0.5), (30, 0.6)]))
            .collect();

        let optimizer = ScheduleOptimizer::with_config(OptimizerConfig {
            max_nodes: 2,
            enable_pruning: true,
        });
        let outcome = optimizer.optimize(&candidates);
        assert!(outcome.is_degraded());

        let result = outcome.result();
        assert!(!result.search_completed);
        // Fallback still produces a full, valid schedule.
        assert_eq!(result.schedule.len(), 5);
        let (greedy_reward, _) = greedy_schedule(&candidates);
        assert!((result.total_reward - greedy_reward).abs() < 1e-9);
    }

    #[test]
    fn test_empty_option_list_degrades() {
        let candidates = vec![
            make_test_candidate("Fine", &[(30, 0.7)]),
            make_test_candidate("Malformed", &[]),
        ];

        let outcome = ScheduleOptimizer::new().optimize(&candidates);
        match outcome {
            ScheduleOutcome::Degraded(result, reason) => {
                assert!(reason.contains("Malformed"));
                assert_eq!(result.schedule[0].1, Some(30));
                assert_eq!(result.schedule[1].1, None);
            }
            other => panic!("expected Degraded, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_is_always_legal() {
        // Zero-reward options: skipping ties the best total, and either way
        // every candidate receives an assignment slot.
        let candidates = vec![make_test_candidate("Zero", &[(30, 0.0)])];
        let result = ScheduleOptimizer::new().search(&candidates);
        assert!(result.search_completed);
        assert_eq!(result.schedule.len(), 1);
        assert_eq!(result.total_reward, 0.0);
    }

    #[test]
    fn test_pruning_does_not_change_optimum() {
        let candidates: Vec<Candidate> = (0..4)
            .map(|i| {
                let base = 0.3 + i as f64 * 0.1;
                make_test_candidate(&format!("Task {i}"), &[(60, base), (30, base + 0.2)])
            })
            .collect();

        let pruned = ScheduleOptimizer::new().search(&candidates);
        let unpruned = ScheduleOptimizer::with_config(OptimizerConfig {
            max_nodes: 10_000,
            enable_pruning: false,
        })
        .search(&candidates);

        assert!((pruned.total_reward - unpruned.total_reward).abs() < 1e-9);
        assert!(pruned.nodes_explored <= unpruned.nodes_explored);
    }

    #[test]
    fn test_search_is_deterministic() {
        let candidates = vec![
            make_test_candidate("A", &[(60, 0.5), (30, 0.5)]),
            make_test_candidate("B", &[(60, 0.4), (30, 0.4)]),
        ];

        let first = ScheduleOptimizer::new().search(&candidates);
        let second = ScheduleOptimizer::new().search(&candidates);
        assert_eq!(first.schedule, second.schedule);
        assert_eq!(first.total_reward, second.total_reward);
        assert_eq!(first.nodes_explored, second.nodes_explored);
    }
}
