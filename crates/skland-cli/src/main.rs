//! Skland companion command-line interface.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skland_config_and_utils::{init_logging, Config, Paths};

/// Skland companion command-line interface.
#[derive(Parser)]
#[command(name = "skland")]
#[command(about = "Skland companion: session management for the Skland API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, session). Defaults to
    /// ~/.skland-companion
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        /// Phone number of the Hypergryph account
        #[arg(long)]
        phone: String,

        /// Account password
        #[arg(long, env = "SKLAND_PASSWORD", conflicts_with = "code")]
        password: Option<String>,

        /// SMS verification code (request one with `send-code`)
        #[arg(long)]
        code: Option<String>,
    },
    /// Request an SMS verification code
    SendCode {
        /// Phone number to send the code to
        #[arg(long)]
        phone: String,
    },
    /// Show session status and bound game accounts
    Status,
    /// Probe whether the current session is still accepted
    Check,
    /// Print signed headers for a session-scoped request
    Sign {
        /// HTTP method (GET or POST)
        #[arg(long, default_value = "GET")]
        method: String,

        /// Full request URL
        #[arg(long)]
        url: String,

        /// JSON body, for POST requests
        #[arg(long)]
        body: Option<String>,
    },
    /// Log out and remove the persisted session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let orchestrator = app::build_orchestrator(&config, &paths)?;

    match cli.command {
        Commands::Login {
            phone,
            password,
            code,
        } => app::login(&orchestrator, &phone, password, code).await,
        Commands::SendCode { phone } => app::send_code(&orchestrator, &phone).await,
        Commands::Status => app::status(&orchestrator).await,
        Commands::Check => app::check(&orchestrator).await,
        Commands::Sign { method, url, body } => {
            app::sign(&orchestrator, &method, &url, body.as_deref()).await
        }
        Commands::Logout => app::logout(&orchestrator).await,
    }
}
