use std::sync::Arc;

use fastaid_api::AppState;
use fastaid_core::{config, CoreConfig, Database};
use fastaid_generator::{GeneratorConfig, RemoteGenerator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Fastaid application
///
/// Resolves configuration from the environment, opens the SQLite database,
/// wires the remote prediagnosis generator and serves the REST API.
///
/// # Environment Variables
/// - `FASTAID_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `FASTAID_DB`: SQLite database path (default: "fastaid.db")
/// - `ANTH_API_KEY`: API key for the reasoning service
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fastaid=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("FASTAID_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let database_path =
        config::database_path_from_env_value(std::env::var("FASTAID_DB").ok());
    let api_key = std::env::var("ANTH_API_KEY").unwrap_or_default();

    let cfg = Arc::new(CoreConfig::new(database_path));
    let db = Database::open(cfg.database_path())?;
    let generator = Arc::new(RemoteGenerator::new(GeneratorConfig::new(api_key))?);

    let app = fastaid_api::router(AppState::new(cfg, db, generator));

    tracing::info!("++ Starting Fastaid REST on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
