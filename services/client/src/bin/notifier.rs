//! services/client/src/bin/notifier.rs

use client_lib::{
    adapters::{
        push::{Backoff, WsTransport},
        rest::RestApiAdapter,
        surface::ConsoleSurface,
    },
    config::{Config, ConfigError},
    console::Console,
    error::ClientError,
};
use notification_core::{NotificationApi, NotificationSurface, PushTransport, SyncCore};
use reqwest::Url;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting notifier...");

    // --- 2. Initialize Service Adapters ---
    let base_url = Url::parse(&config.api_base_url)
        .map_err(|e| ConfigError::InvalidValue("API_BASE_URL".to_string(), e.to_string()))?;
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let api: Arc<dyn NotificationApi> = Arc::new(RestApiAdapter::new(http, base_url));

    let transport: Arc<dyn PushTransport> = Arc::new(WsTransport::new(
        config.push_url.clone(),
        Backoff {
            initial: config.reconnect_delay,
            max: config.reconnect_max_delay,
        },
    ));
    let surface: Arc<dyn NotificationSurface> =
        Arc::new(ConsoleSurface::new(config.desktop_notifications));

    // --- 3. Start the Sync Core ---
    info!("Connecting to {} (push: {})", config.api_base_url, config.push_url);
    let sync = SyncCore::start(api.clone(), transport, Some(surface)).await?;

    // --- 4. Run the Console Until EOF or `quit` ---
    let result = Console::new(&sync, api)
        .run(BufReader::new(tokio::io::stdin()))
        .await;

    sync.shutdown().await;
    result
}
