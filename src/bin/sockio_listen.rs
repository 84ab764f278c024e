use anyhow::{Context, Result};
use serde_json::Value;
use sockio::{ON_CONNECTED, ON_DISCONNECTED, ON_ERROR};
use sockio_cli::bin_common::{
    init_tracing, load_config_from_env, parse_args, ClientSettings, ConfigType, ShutdownManager,
};
use std::time::Duration;
use tracing::{error, info, warn};

/// How often the listener reports its counters
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Config path: first argument, else SOCKIO_CONFIG_PATH, else config/client.yaml
    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Client,
    };
    let config_path = load_config_from_env(config_type);
    let settings = ClientSettings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Initialize logging with configured level
    init_tracing(&settings.log_level);
    settings.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut builder = settings
        .client_builder()
        .shutdown_flag(shutdown.flag())
        .on(ON_CONNECTED, |channel, _| {
            info!("Connected (generation {})", channel.generation());
            Ok(())
        })
        .on(ON_DISCONNECTED, |_, reason| {
            warn!("Disconnected: {}", display_payload(reason));
            Ok(())
        })
        .on(ON_ERROR, |_, payload| {
            error!("Error: {}", display_payload(payload));
            Ok(())
        });

    for event in &settings.events {
        let name = event.clone();
        builder = builder.on(event.as_str(), move |_, payload| {
            info!("[{}] {}", name, display_payload(payload));
            Ok(())
        });
    }

    let client = builder
        .connect()
        .await
        .with_context(|| format!("connecting to {}", settings.url()))?;

    print_banner("sockio listener", &settings.url());

    while shutdown.is_running() {
        shutdown.interruptible_sleep(STATS_INTERVAL).await;
        if shutdown.is_running() {
            let metrics = client.metrics();
            info!(
                "Stats: {:?}, sent {}, received {}, reconnects {}, dropped {}",
                metrics.channel_state,
                metrics.messages_sent,
                metrics.messages_received,
                metrics.reconnect_count,
                metrics.dropped_frames
            );
        }
    }

    client.close().await;
    print_shutdown("sockio listener");
    Ok(())
}

fn display_payload(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn print_banner(name: &str, url: &str) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    info!("Listening on {}", url);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(name: &str) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", name);
    info!("========================================");
}
