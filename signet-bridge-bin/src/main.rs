use clap::Parser;
use std::env::current_dir;
use std::path::PathBuf;
use std::time::Duration;

use signet_bridge_core::{wait_for_phase, BridgeHarness, Logger};
use signet_bridge_dapp::DappDriver;
use signet_bridge_models::constants::DEFAULT_CONFIG_FILE_NAME;
use signet_bridge_models::Settings;
use signet_bridge_sdk::{BridgeError, BridgeResult, LinkDriver, SessionPhase};
use tokio::sync::watch;
use tracing::info;

/// Signet Bridge - delegated signer exchange between two wallet pages
///
/// Runs both pages of the bridge in one process: the portal opens the
/// partner window and re-sends its delegated signer until the dapp adds
/// it to its wallet and confirms, then a signature request is served
/// over the same channel.
#[derive(Parser)]
#[command(name = "signet-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Signet Bridge", long_about = None)]
struct Cli {
    /// Sets a custom config file with full path
    ///
    /// If not specified, the bridge will look for 'signet-bridge.toml'
    /// in the current working directory.
    #[arg(short, long, env = "SB_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> BridgeResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(p) => p,
        None => {
            let dir = current_dir().map_err(|e| {
                BridgeError::ConfigurationError(format!("failed to get current directory: {e}"))
            })?;
            dir.join(DEFAULT_CONFIG_FILE_NAME)
        }
    };

    let settings = Settings::load(&config_path.to_string_lossy())
        .map_err(|e| BridgeError::ConfigurationError(e.to_string()))?;
    let mut logger = Logger::new(&settings.log);
    logger.initialize()?;

    let harness = BridgeHarness::build(settings)?;
    let dapp = harness.launch().await?;

    tokio::spawn(trace_phases("portal", harness.portal().subscribe_phase()));
    tokio::spawn(trace_phases("dapp", dapp.subscribe_phase()));

    let limit = Duration::from_secs(30);
    wait_for_phase(
        harness.portal().subscribe_phase(),
        SessionPhase::Completed,
        limit,
    )
    .await?;
    wait_for_phase(dapp.subscribe_phase(), SessionPhase::Completed, limit).await?;
    info!(
        peer_wallet = harness.portal().peer_wallet().as_deref().unwrap_or(""),
        "delegated signer granted and confirmed"
    );

    let prepared = dapp.request_signature().await?;
    info!(transaction = %prepared.transaction_id, "signature requested");
    let hash = await_transaction_hash(&dapp, limit).await?;
    info!(%hash, "signature applied, transaction approved");

    if let Some(snapshot) = harness.portal().snapshot() {
        info!(
            attempt = snapshot.attempt,
            phase = %snapshot.phase,
            "bridge run finished"
        );
    }
    Ok(())
}

/// Logs every phase transition of one side until its watch closes.
async fn trace_phases(side: &'static str, mut rx: watch::Receiver<SessionPhase>) {
    loop {
        info!(side, phase = %*rx.borrow_and_update(), "session phase");
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Poll until the dapp records an approved transaction hash.
async fn await_transaction_hash(dapp: &DappDriver, limit: Duration) -> BridgeResult<String> {
    let wait = async {
        loop {
            if let Some(hash) = dapp.transaction_hash() {
                return hash;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .map_err(|_| BridgeError::Timeout(limit))
}
