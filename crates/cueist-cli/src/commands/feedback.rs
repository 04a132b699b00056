//! Feedback commands: record accept/reject and inspect history.

use clap::Subcommand;
use uuid::Uuid;

use super::decide::ContextArgs;

#[derive(Subcommand)]
pub enum FeedbackCmd {
    /// Record accept/reject feedback for a suggestion
    Record {
        /// Task rule ID
        task_id: String,
        /// Lead-time window that was used (minutes)
        #[arg(long)]
        window: u32,
        /// "accept" or "reject"
        #[arg(long)]
        action: String,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Show recent feedback entries
    History {
        /// Filter by task rule ID
        #[arg(long)]
        task_id: Option<String>,
        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(action: FeedbackCmd) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    match action {
        FeedbackCmd::Record {
            task_id,
            window,
            action,
            context,
        } => {
            let task_id = Uuid::parse_str(&task_id)?;
            let context = context.to_context()?;
            let update = engine.record_feedback(task_id, &context, window, &action)?;
            println!("{}", update.explanation);
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
        FeedbackCmd::History { task_id, limit } => {
            let task_id = task_id.map(|raw| Uuid::parse_str(&raw)).transpose()?;
            let entries = engine.feedback_history(task_id, limit)?;
            if entries.is_empty() {
                println!("no feedback recorded yet");
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "{}  {}  {} min  {}  [{}]",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.action.name(),
                    entry.window_minutes,
                    entry.task_id,
                    entry.context_key,
                );
            }
        }
    }
    Ok(())
}
