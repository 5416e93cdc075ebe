use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use espnow_bridge::{Bridge, BridgeConfig, BridgeError};
use espnow_bridge_radio::SimulatedRadio;

#[tokio::main]
async fn main() -> Result<()> {
    // stderr only: stdout may be the host link
    env_logger::init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            BridgeConfig::load(&path).with_context(|| format!("loading config {}", path))?
        }
        None => BridgeConfig::default(),
    };
    if let Ok(addr) = std::env::var("BRIDGE_LISTEN") {
        config.listen = Some(addr);
    }

    info!("Radio config: {:?}", config.radio);
    let radio = Arc::new(SimulatedRadio::new(config.radio.clone()));

    match config.listen.clone() {
        Some(addr) => serve_tcp(&addr, radio, config).await,
        None => {
            info!("Host link on stdin/stdout");
            let io = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
            run_session(io, radio, &config).await
        }
    }
}

/// Serves one host connection at a time, like a serial port. Each connection
/// starts a fresh bridge session, as a board reset on reconnect would.
async fn serve_tcp(addr: &str, radio: Arc<SimulatedRadio>, config: BridgeConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Host link listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        info!("Host connected from {}", peer);
        run_session(stream, radio.clone(), &config).await?;
        info!("Host {} disconnected", peer);
    }
}

async fn run_session<T>(io: T, radio: Arc<SimulatedRadio>, config: &BridgeConfig) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let bridge = Bridge::new(radio.clone(), config.clone());
    let stats = bridge.stats();

    match bridge.run(io).await {
        Ok(()) => {}
        Err(e @ BridgeError::RadioInit(_)) => {
            // Fatal: leave recovery to whatever supervises the process
            return Err(e).context("radio stack did not come up");
        }
        Err(e) => error!("Host link failed: {}", e),
    }

    let (sent, lost, bytes) = radio.get_stats().await;
    info!(
        "Session stats: {} (radio: {} sent, {} lost, {} bytes)",
        serde_json::to_string(&stats.snapshot())?,
        sent,
        lost,
        bytes
    );
    Ok(())
}
