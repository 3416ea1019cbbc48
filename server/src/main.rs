mod auth;
mod config;
mod crypto;
mod db;
mod error;
mod messages;
mod reports;
mod routes;
mod state;
mod tasks;
mod uploads;
mod users;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use ws::presence::PresenceRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "taskhub_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "taskhub_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Taskhub server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Load or generate the at-rest message encryption master key
    let message_key = crypto::load_or_generate_message_key(&config.data_dir)?;

    if config.admin_invite_token.is_none() {
        tracing::info!("No admin invite token configured; all registrations are members");
    }

    // Build application state
    let app_state = state::AppState {
        db,
        jwt_secret,
        message_key,
        connections: ws::new_connection_registry(),
        presence: Arc::new(PresenceRegistry::new()),
        admin_invite_token: config.admin_invite_token.clone(),
        data_dir: config.data_dir.clone(),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
