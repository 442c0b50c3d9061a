use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regcred::api::DigitalOceanClient;
use regcred::cli::credentials;
use regcred::registry::providers::DigitalOceanIssuer;
use regcred::registry::CredentialsIssuer;
use regcred::resource::{docker_credentials, DockerCredentialsResource};
use regcred::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the local state file
    #[arg(long, global = true, default_value = "regcred.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or replace Docker credentials for a registry
    Apply {
        /// Name of the account's container registry
        #[arg(long)]
        registry_name: String,
        /// Issue read-write credentials instead of read-only
        #[arg(long)]
        write: bool,
        /// Lifetime of the credentials in seconds (defaults to the maximum)
        #[arg(long)]
        expiry_seconds: Option<u64>,
    },
    /// Re-read tracked credentials, reissuing them if expired
    Refresh,
    /// Revoke tracked credentials
    #[command(visible_alias = "rm")]
    Destroy,
    /// Show tracked credentials
    #[command(visible_alias = "s")]
    Show {
        /// Print sensitive values unmasked
        #[arg(long)]
        show_secrets: bool,
    },
    /// Print the Docker config JSON of the tracked credentials
    DockerConfig,
    /// Check that destroyed credentials no longer authenticate
    VerifyRevoked,
    /// Show the account's container registry
    Registry,
}

fn build_issuer(settings: &Settings) -> Result<Arc<DigitalOceanIssuer>> {
    let client = DigitalOceanClient::new(&settings.api, &settings.http)?;
    Ok(Arc::new(DigitalOceanIssuer::new(
        client,
        settings.registry.host.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that only read the state file work without credentials
    match &cli.command {
        Commands::Show { show_secrets } => {
            return credentials::show(&docker_credentials::schema(), &cli.state, *show_secrets);
        }
        Commands::DockerConfig => {
            println!("{}", credentials::docker_config(&cli.state)?);
            return Ok(());
        }
        _ => {}
    }

    let settings = Settings::new().context("Failed to load settings")?;
    let issuer = build_issuer(&settings)?;
    let resource = DockerCredentialsResource::new(issuer.clone());

    match cli.command {
        Commands::Apply {
            registry_name,
            write,
            expiry_seconds,
        } => {
            let config = credentials::apply_config(&registry_name, write, expiry_seconds);
            credentials::apply(&resource, &cli.state, &config).await?;
        }
        Commands::Refresh => {
            credentials::refresh(&resource, &cli.state).await?;
        }
        Commands::Destroy => {
            credentials::destroy(&resource, &cli.state).await?;
        }
        Commands::VerifyRevoked => {
            let issuer: &dyn CredentialsIssuer = issuer.as_ref();
            credentials::verify_revoked(issuer, &cli.state).await?;
        }
        Commands::Registry => {
            credentials::show_registry(issuer.as_ref()).await?;
        }
        Commands::Show { .. } | Commands::DockerConfig => {
            unreachable!("State-only commands should have been handled earlier")
        }
    }

    Ok(())
}
