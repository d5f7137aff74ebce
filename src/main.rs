//! cup-identity - deployer identity provisioning and verification

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cup_identity::engine::{Engine, Mode};
use cup_identity::provider::AwsSessionFactory;
use cup_identity::retry::RetryConfig;
use cup_identity::store::MongoCredentialStore;

/// cup-identity - reconcile the deployer cloud identity with its credential record
#[derive(Parser, Debug)]
#[command(name = "cup-identity", version, about, long_about = None)]
struct Cli {
    /// Connection string for the credential store
    #[arg(
        long,
        env = "CUP_DATABASE_URL",
        default_value = "mongodb://localhost:27017"
    )]
    database_url: String,

    /// Database holding the credential profiles
    #[arg(long, env = "CUP_DATABASE_NAME", default_value = "cup")]
    database_name: String,

    /// Attempt cap for confirmation loops (key purge, policy attachment,
    /// duplicate record purge)
    #[arg(long, env = "CUP_MAX_ATTEMPTS", default_value = "20")]
    max_attempts: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check for drift without changing anything
    ///
    /// Read-only: inspects the cloud identity and the credential record and
    /// reports the first divergence found. Drift is a reported outcome, not
    /// an error; only unexpected failures exit non-zero.
    Verify,

    /// Reconcile the deployer identity until it is in sync
    ///
    /// Creates the identity if missing, rotates its access key, attaches the
    /// required policies, and rewrites the credential record to match.
    Converge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cup_identity=info")),
        )
        .init();

    let cli = Cli::parse();

    let mode = match cli.command {
        Commands::Verify => Mode::Verify,
        Commands::Converge => Mode::Converge,
    };

    let store = MongoCredentialStore::connect(&cli.database_url, &cli.database_name).await?;
    let retry = RetryConfig::with_max_attempts(cli.max_attempts);

    let engine = Engine::new(mode, store, AwsSessionFactory::new()).with_retry(retry);
    let outcome = engine.run().await?;

    println!("{outcome}");
    Ok(())
}
