//! EventHub Relay: keeps monitor channels subscribed and logs their traffic.
//!
//! Main entry point that wires configuration, logging, the transport, and
//! the channel registry together.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing_subscriber::{EnvFilter, fmt};

use eventhub_core::config::HubConfig;
use eventhub_core::error::AppError;
use eventhub_core::traits::PubSubTransport;
use eventhub_realtime::bridge::TransportBridge;
use eventhub_realtime::channel::{CATCH_ALL, ChannelRegistry, DEAF_EVENT, listener};
use eventhub_realtime::{InboundMessage, MemoryBroker};

type InboundStream = BoxStream<'static, InboundMessage>;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Relay error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<HubConfig, AppError> {
    let config_path =
        std::env::var("EVENTHUB_CONFIG").unwrap_or_else(|_| "config/relay.toml".to_string());
    HubConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &HubConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Connect the configured transport
async fn connect_transport(
    config: &HubConfig,
) -> Result<(Arc<dyn PubSubTransport>, InboundStream), AppError> {
    match config.transport.provider.as_str() {
        "memory" => {
            let (transport, inbound) = MemoryBroker::new().connect().await;
            Ok((Arc::new(transport), inbound.boxed()))
        }
        #[cfg(feature = "redis-pubsub")]
        "redis" => {
            let (transport, inbound) =
                eventhub_realtime::bridge::RedisTransport::connect(&config.transport.redis).await?;
            Ok((Arc::new(transport), inbound))
        }
        other => Err(AppError::configuration(format!(
            "Unsupported transport provider: {other}"
        ))),
    }
}

/// Main relay run function
async fn run(config: HubConfig) -> Result<(), AppError> {
    tracing::info!("Starting EventHub relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        transport = %config.transport.provider,
        codec = ?config.codec,
        "Relay configuration loaded"
    );

    let (transport, inbound) = connect_transport(&config).await?;
    let registry = Arc::new(ChannelRegistry::from_config(transport, &config));
    let bridge = TransportBridge::spawn(registry.clone(), inbound);

    for name in &config.monitor.channels {
        let channel = registry.acquire(name);
        channel
            .on(
                CATCH_ALL,
                listener(|event| {
                    tracing::info!(
                        channel = %event.channel,
                        event = %event.event,
                        args = %serde_json::Value::Array(event.args.clone()),
                        "Event observed"
                    );
                    Ok(())
                }),
            )
            .await?;
        channel
            .on(
                DEAF_EVENT,
                listener(|event| {
                    tracing::warn!(channel = %event.channel, "Monitored channel is deaf");
                    Ok(())
                }),
            )
            .await?;
        tracing::info!(channel = %name, kind = ?channel.kind(), "Monitoring channel");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        _ = bridge => {
            tracing::warn!("Transport stream closed");
        }
    }

    let subscribed = registry.subscriptions().subscribed_channels().await;
    for name in &subscribed {
        if let Some(channel) = registry.get(name) {
            if let Err(e) = channel.remove_all_listeners(None).await {
                tracing::warn!(channel = %name, error = %e, "Failed to unsubscribe");
            }
        }
    }
    tracing::info!(channels = subscribed.len(), "Relay stopped");
    Ok(())
}
