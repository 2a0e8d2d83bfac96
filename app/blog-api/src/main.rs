//! BlogNest API server

use blognest_api::{build_app, connect, AppConfig};
use blognest_auth::AuthConfig;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let auth_config = AuthConfig::from_env()?;

    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    let db = connect(&config.database_url).await?;
    let app = build_app(&config, auth_config, db).await?;

    let listener = TcpListener::bind(config.server_addr).await?;
    tracing::info!("BlogNest API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
