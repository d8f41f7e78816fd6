mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{action::ActionSubcommand, feedback::FeedbackSubcommand, intake::IntakeSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "easi",
    about = "IT governance requests: task lists, feedback and admin actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .easi/ or .git/)
    #[arg(long, global = true, env = "EASI_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize EASi in the current directory
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage system intake requests
    Intake {
        #[command(subcommand)]
        subcommand: IntakeSubcommand,
    },

    /// Show the requester task list for an intake
    Tasks {
        /// Intake ID
        id: String,
    },

    /// Add and list feedback on an intake
    Feedback {
        #[command(subcommand)]
        subcommand: FeedbackSubcommand,
    },

    /// Take admin actions on an intake
    Action {
        #[command(subcommand)]
        subcommand: ActionSubcommand,
    },

    /// Serve the JSON API
    Serve {
        /// Port to listen on (0 picks a free port)
        #[arg(long, short = 'p', default_value_t = 3141)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Intake { subcommand } => cmd::intake::run(&root, subcommand, cli.json),
        Commands::Tasks { id } => cmd::tasks::run(&root, &id, cli.json),
        Commands::Feedback { subcommand } => cmd::feedback::run(&root, subcommand, cli.json),
        Commands::Action { subcommand } => cmd::action::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
