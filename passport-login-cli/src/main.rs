//! `passport-login`: developer tooling for passport logins.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use passport_login_core::{Environment, PassportConfig};

/// Inspect session snapshots, build passport proof request URLs and recompute group roots.
#[derive(Parser, Debug)]
#[command(name = "passport-login", version, about)]
struct Cli {
    /// Passport deployment whose default endpoints are used.
    #[arg(long, env = "PASSPORT_ENVIRONMENT", default_value = "production")]
    environment: Environment,

    /// JSON configuration file, overriding `--environment`.
    #[arg(long, env = "PASSPORT_CONFIG")]
    config: Option<PathBuf>,

    /// The application's popup page.
    #[arg(long, default_value = PassportConfig::NON_INTERACTIVE_POPUP_URL)]
    popup_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Decode a persisted session snapshot and print its summary.
    Inspect(commands::InspectArgs),
    /// Print the popup URL of a login request.
    RequestUrl(commands::RequestUrlArgs),
    /// Print the Merkle root of a semaphore group.
    GroupRoot(commands::GroupRootArgs),
}

impl Cli {
    fn passport_config(&self) -> eyre::Result<PassportConfig> {
        match &self.config {
            Some(path) => Ok(PassportConfig::from_json(&std::fs::read_to_string(path)?)?),
            None => Ok(
                PassportConfig::from_environment(self.environment, &self.popup_url)?
                    .with_app_name("passport-login"),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.passport_config()?;
    tracing::debug!(
        passport = %config.passport_url(),
        server = %config.server_url(),
        "using passport configuration"
    );

    match cli.command {
        Command::Inspect(args) => commands::inspect(&config, &args).await,
        Command::RequestUrl(args) => commands::request_url(config, args).await,
        Command::GroupRoot(args) => commands::group_root(config, args).await,
    }
}
