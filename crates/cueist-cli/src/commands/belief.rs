//! Timing belief inspection commands.

use clap::Subcommand;
use cueist_core::{BeliefFilter, ContextKey};

use super::decide::ContextArgs;

#[derive(Subcommand)]
pub enum BeliefAction {
    /// Summarize stored beliefs, most confident first
    Summary {
        /// Filter by task type
        #[arg(long)]
        task_type: Option<String>,
        /// Filter by context key
        #[arg(long)]
        context_key: Option<String>,
        /// Only show beliefs with at least this many feedback samples
        #[arg(long, default_value = "0")]
        min_feedback: u32,
    },
    /// Show what the model has learned about a task in a context
    Explain {
        /// Task type (rule name)
        task_type: String,
        #[command(flatten)]
        context: ContextArgs,
    },
}

pub fn run(action: BeliefAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    match action {
        BeliefAction::Summary {
            task_type,
            context_key,
            min_feedback,
        } => {
            let filter = BeliefFilter {
                task_type,
                context_key: context_key.map(ContextKey::from_raw),
                min_feedback,
            };
            let snapshots = engine.belief_summary(&filter)?;
            if snapshots.is_empty() {
                println!("no beliefs stored yet");
                return Ok(());
            }
            for snapshot in &snapshots {
                println!(
                    "{:<28} {:<42} {:>3} min  confidence {:.1}% (+/- {:.1}%)  {} samples",
                    snapshot.task_type,
                    snapshot.context_key,
                    snapshot.window_minutes,
                    snapshot.confidence * 100.0,
                    snapshot.uncertainty * 100.0,
                    snapshot.feedback_count,
                );
            }
        }
        BeliefAction::Explain { task_type, context } => {
            let context = context.to_context()?;
            let explanation = engine.explain_timing(&task_type, &context)?;
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
    }
    Ok(())
}
