//! PM OS CLI, the main entry point.
//!
//! Commands:
//! - `onboard`  Create `~/.pmos` and a default config
//! - `chat`     Interactive or single-message session
//! - `route`    Show where a message would go, without running anything
//! - `session`  Inspect, list, or reset stored sessions
//! - `serve`    Start the HTTP gateway

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "pmos",
    about = "PM OS: routes product-management requests to specialist agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config.toml
    Onboard,

    /// Chat with the assistant
    Chat {
        /// Session to continue; a new one is created when omitted
        #[arg(short, long, env = "PMOS_SESSION")]
        session: Option<String>,

        /// Send straight to one agent, skipping classification
        #[arg(short, long, conflicts_with = "chain")]
        agent: Option<String>,

        /// Run a configured chain (e.g. "plan") or a comma-separated agent list
        #[arg(short, long)]
        chain: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Dry-run routing for a message
    Route {
        #[arg(short, long, env = "PMOS_SESSION")]
        session: Option<String>,

        message: String,
    },

    /// Manage stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Phase, artifacts and recent turns of a session
    Show { id: String },
    /// The decision log as markdown
    Decisions { id: String },
    /// All stored sessions, most recent first
    List,
    /// Clear artifacts and phase; history and decisions are kept
    Reset { id: String },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            session,
            agent,
            chain,
            message,
        } => commands::chat::run(session, agent, chain, message).await?,
        Commands::Route { session, message } => commands::route::run(session, message).await?,
        Commands::Session { action } => match action {
            SessionAction::Show { id } => commands::session::show(id).await?,
            SessionAction::Decisions { id } => commands::session::decisions(id).await?,
            SessionAction::List => commands::session::list().await?,
            SessionAction::Reset { id } => commands::session::reset(id).await?,
        },
        Commands::Serve { port } => commands::serve::run(port).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_flags() {
        let cli = Cli::try_parse_from(["pmos", "chat", "-s", "s-1", "-a", "framer", "-m", "churn is up"]).unwrap();
        match cli.command {
            Commands::Chat {
                session,
                agent,
                chain,
                message,
            } => {
                assert_eq!(session.as_deref(), Some("s-1"));
                assert_eq!(agent.as_deref(), Some("framer"));
                assert!(chain.is_none());
                assert_eq!(message.as_deref(), Some("churn is up"));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn agent_and_chain_conflict() {
        assert!(Cli::try_parse_from(["pmos", "chat", "-a", "framer", "-c", "plan"]).is_err());
    }

    #[test]
    fn parses_session_subcommands_and_globals() {
        let cli = Cli::try_parse_from(["pmos", "session", "decisions", "s-9", "--verbose", "--log-json"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert!(matches!(
            cli.command,
            Commands::Session {
                action: SessionAction::Decisions { ref id }
            } if id == "s-9"
        ));
    }
}
