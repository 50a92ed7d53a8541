use anyhow::{bail, Context, Result};
use std::process::ExitCode;
use tracing::info;

use pat_auth::crypto::CryptoEngine;
use pat_auth::store::SecretDb;
use pat_auth::{Authority, AuthorityStores, Config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only the command result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pat_auth=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".into());
    if !matches!(command.as_str(), "status" | "logout") {
        bail!("unknown command {command:?} (expected status or logout)");
    }

    let config = Config::from_env()?;
    let target = config.target()?;
    info!("pat-auth v{}", env!("CARGO_PKG_VERSION"));

    let crypto = CryptoEngine::new(&config.master_key)?;
    let db = SecretDb::connect(&config.database_url, crypto)
        .await
        .context("Failed to open credential database")?;
    db.migrate().await?;

    let authority = Authority::from_config(&config, AuthorityStores::from_db(&db))?;

    match command.as_str() {
        "logout" => {
            match authority.delete(&target).await? {
                Some(tier) => println!("removed {} for {target}", tier.as_str()),
                None => println!("nothing stored for {target}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            let authenticated = match authority.resolve(&target).await? {
                Some(credential) => authority.validate(&credential).await?,
                None => false,
            };
            if authenticated {
                println!("authenticated");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("not authenticated");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
