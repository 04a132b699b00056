use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cueist", version, about = "Cueist CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a decision for a context snapshot
    Decide(commands::decide::DecideArgs),
    /// Feedback recording and history
    Feedback {
        #[command(subcommand)]
        action: commands::feedback::FeedbackCmd,
    },
    /// Task rule management
    Rule {
        #[command(subcommand)]
        action: commands::rule::RuleAction,
    },
    /// Timing belief inspection
    Belief {
        #[command(subcommand)]
        action: commands::belief::BeliefAction,
    },
    /// Scheduled event management
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Seed the database with demo rules and events
    Seed,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Decide(args) => commands::decide::run(args),
        Commands::Feedback { action } => commands::feedback::run(action),
        Commands::Rule { action } => commands::rule::run(action),
        Commands::Belief { action } => commands::belief::run(action),
        Commands::Event { action } => commands::event::run(action),
        Commands::Seed => commands::seed::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
