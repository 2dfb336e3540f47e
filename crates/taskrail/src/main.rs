//! CLI entry point for taskrail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Command-line client for a taskrail server.
#[derive(Parser, Debug)]
#[command(
    name = "taskrail",
    version,
    about = "taskrail: track tasks against a remote taskrail server"
)]
struct Cli {
    /// Override the configured API base URL.
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out and clear local session data.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// List tasks.
    List {
        /// Restrict to `pending` or `completed`.
        #[arg(long)]
        status: Option<String>,
        /// Restrict to `low`, `medium` or `high`.
        #[arg(long)]
        priority: Option<String>,
        /// Free-text search over title and description.
        #[arg(long)]
        search: Option<String>,
        /// 1-based page number.
        #[arg(long)]
        page: Option<u32>,
        /// Page size.
        #[arg(long = "per-page")]
        per_page: Option<u32>,
        /// Emit the tasks as JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Append completed/pending counts.
        #[arg(long)]
        stats: bool,
    },

    /// Create a task.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: String,
    },

    /// Mark a task completed.
    Done { id: String },

    /// Mark a completed task pending again.
    Reopen { id: String },

    /// Edit task fields.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },

    /// Delete a task.
    Rm {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing();
    tokio::runtime::Runtime::new()?.block_on(commands::run(cli))
}

fn install_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_command() {
        let cli = Cli::parse_from([
            "taskrail",
            "login",
            "--email",
            "alice@example.com",
            "--password",
            "hunter2",
        ]);

        match cli.cmd {
            Command::Login { email, password } => {
                assert_eq!(email, "alice@example.com");
                assert_eq!(password, "hunter2");
            }
            _ => panic!("expected login command"),
        }
    }

    #[test]
    fn parse_list_command_with_filters() {
        let cli = Cli::parse_from([
            "taskrail",
            "list",
            "--status",
            "pending",
            "--priority",
            "high",
            "--search",
            "milk",
            "--page",
            "2",
            "--per-page",
            "10",
            "--json",
        ]);

        match cli.cmd {
            Command::List {
                status,
                priority,
                search,
                page,
                per_page,
                json,
                stats,
            } => {
                assert_eq!(status.as_deref(), Some("pending"));
                assert_eq!(priority.as_deref(), Some("high"));
                assert_eq!(search.as_deref(), Some("milk"));
                assert_eq!(page, Some(2));
                assert_eq!(per_page, Some(10));
                assert!(json);
                assert!(!stats);
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn parse_add_command_defaults_priority() {
        let cli = Cli::parse_from(["taskrail", "add", "--title", "Buy milk"]);

        match cli.cmd {
            Command::Add {
                title,
                description,
                priority,
            } => {
                assert_eq!(title, "Buy milk");
                assert!(description.is_none());
                assert_eq!(priority, "medium");
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_rm_command_with_confirmation_skip() {
        let cli = Cli::parse_from([
            "taskrail",
            "rm",
            "0192d7a0-0000-7000-8000-000000000001",
            "--yes",
        ]);

        match cli.cmd {
            Command::Rm { id, yes } => {
                assert_eq!(id, "0192d7a0-0000-7000-8000-000000000001");
                assert!(yes);
            }
            _ => panic!("expected rm command"),
        }
    }

    #[test]
    fn api_url_override_is_global() {
        let cli = Cli::parse_from(["taskrail", "--api-url", "http://localhost:9999/api", "whoami"]);
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9999/api"));
    }
}
