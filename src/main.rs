use anyhow::{Context, Result};
use chatlink::transport::MockConnector;
use chatlink::{ClientIdentity, ConnectionConfig, ConnectionManager, SendOutcome};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where the installation's client id is persisted between runs
const IDENTITY_PATH: &str = ".chatlink/client_id";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // `chatlink mock` runs against an in-process echo server
    let target = std::env::args().nth(1);
    let offline = target.as_deref() == Some("mock");

    let mut config = match target.as_deref() {
        Some(url) if !offline => ConnectionConfig::new(url),
        Some(_) => ConnectionConfig::new("mock://echo"),
        None => ConnectionConfig::default(),
    };
    config.auth_token = std::env::var("CHATLINK_TOKEN").ok();

    let identity = ClientIdentity::load_or_create(IDENTITY_PATH)
        .with_context(|| format!("Failed to load client id from {}", IDENTITY_PATH))?;

    info!("Chat client starting: {}", identity);
    info!("  Endpoint: {}", config.url);

    let conn = if offline {
        let (connector, server) = MockConnector::new();
        server.spawn_echo();
        ConnectionManager::with_connector(config, identity, Arc::new(connector))?
    } else {
        ConnectionManager::new(config, identity)?
    };

    conn.on_message(|envelope| {
        info!("[{}] {}", envelope.kind(), envelope.payload());
    });
    conn.on_connect(|| info!("Link up"));
    conn.on_error(|e| warn!("Link error: {}", e));
    conn.on_disconnect(|event| info!("Link down ({}): {:?}", event.state, event.reason));

    conn.connect();

    // Every stdin line becomes a chat message; EOF disconnects
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let envelope = conn.envelope("chat", serde_json::json!({ "text": text }));
        match conn.send(envelope) {
            SendOutcome::Sent => debug!("Sent"),
            SendOutcome::Queued => info!(
                "Queued ({} waiting, link {})",
                conn.queue_depth(),
                conn.state()
            ),
            SendOutcome::Rejected(reason) => error!("Message rejected: {}", reason),
        }
    }

    info!("Input closed, disconnecting");
    conn.disconnect();
    Ok(())
}
