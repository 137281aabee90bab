mod cmd_checkpoint;
mod cmd_classify;
mod cmd_config;
mod cmd_log;
mod cmd_recall;
mod cmd_sessions;
mod git;
mod render;
mod workspace;

use clap::{Parser, Subcommand};

/// Log filter env var, in `EnvFilter` syntax.
const LOG_ENV: &str = "TRAILMARK_LOG";

#[derive(Parser)]
#[command(
    name = "trailmark",
    version,
    about = "Checkpoint memory for coding sessions"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a checkpoint in the current workspace
    Checkpoint {
        /// What happened
        description: String,
        /// Tags for the checkpoint (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Files touched (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,
        /// Project name
        #[arg(long)]
        project: Option<String>,
        /// External session id
        #[arg(long)]
        session: Option<String>,
        /// Entry type (e.g. insight, bug-fix, completion)
        #[arg(long = "type")]
        entry_type: Option<String>,
        /// Do not capture git branch/commit
        #[arg(long)]
        no_git: bool,
    },
    /// Recall a token-budgeted digest of recent checkpoints
    Recall {
        /// Look back this many days (default: 7)
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<u32>,
        /// Inclusive lower bound (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Inclusive upper bound (RFC 3339)
        #[arg(long)]
        to: Option<String>,
        /// Only entries whose description or tags contain this text
        #[arg(long)]
        query: Option<String>,
        /// Only entries recorded for this project
        #[arg(long)]
        project: Option<String>,
        /// Search every workspace, not just the current one
        #[arg(long)]
        all_workspaces: bool,
        /// Token budget (overrides config)
        #[arg(long)]
        budget: Option<i64>,
        /// Similarity threshold for merging duplicates (overrides config)
        #[arg(long)]
        threshold: Option<f64>,
        /// Project you are working on now
        #[arg(long)]
        active_project: Option<String>,
        /// Technologies you are working with now (repeatable)
        #[arg(long = "tech")]
        tech: Vec<String>,
        /// Kind of work you are doing now (e.g. bug-fix, feature)
        #[arg(long)]
        work_type: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show work sessions detected in recent checkpoints
    Sessions {
        /// Look back this many days
        #[arg(long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify ad-hoc text without recording it
    Classify {
        /// Text to classify
        text: String,
        /// Tags to classify with (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the newest raw checkpoints
    Log {
        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Manage per-workspace pipeline configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let cwd = std::env::current_dir()?;
    let repo_root = git::repo_root(&cwd).unwrap_or(cwd);

    match cli.cmd {
        Command::Checkpoint {
            description,
            tags,
            files,
            project,
            session,
            entry_type,
            no_git,
        } => cmd_checkpoint::execute(&cmd_checkpoint::CheckpointParams {
            repo_root: &repo_root,
            description: &description,
            tags: &tags,
            files: &files,
            project: project.as_deref(),
            session: session.as_deref(),
            entry_type: entry_type.as_deref(),
            capture_git: !no_git,
        }),
        Command::Recall {
            days,
            from,
            to,
            query,
            project,
            all_workspaces,
            budget,
            threshold,
            active_project,
            tech,
            work_type,
            json,
        } => cmd_recall::execute(&cmd_recall::RecallParams {
            repo_root: &repo_root,
            days,
            from: from.as_deref(),
            to: to.as_deref(),
            query: query.as_deref(),
            project: project.as_deref(),
            all_workspaces,
            budget,
            threshold,
            active_project: active_project.as_deref(),
            tech: &tech,
            work_type: work_type.as_deref(),
            json,
        }),
        Command::Sessions { days, json } => cmd_sessions::execute(&repo_root, days, json),
        Command::Classify { text, tags, json } => cmd_classify::execute(&text, &tags, json),
        Command::Log { limit, json } => cmd_log::execute(&repo_root, limit, json),
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
    }
}
