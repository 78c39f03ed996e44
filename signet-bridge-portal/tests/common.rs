#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use signet_bridge_models::settings::Inner;
use signet_bridge_models::{
    AuthStatus, ChainSettings, DappSettings, DelegatedSignerRecord, EmbedMode, LivenessPolicy,
    LogSettings, Origin, PortalSettings, RedeliveryPolicy, SessionPolicy, Settings, SignerRef,
};
use signet_bridge_sdk::{
    AuthSource, BridgeError, BridgeResult, InboundMessage, RemoteWindow, SessionPhase, WalletError,
    WalletGateway, WindowContext, WindowEmbedder,
};

pub const PORTAL_ORIGIN: &str = "http://localhost:3000";
pub const DAPP_ORIGIN: &str = "http://localhost:3001";
pub const EVIL_ORIGIN: &str = "http://evil.example";

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn origin(raw: &str) -> Origin {
    Origin::parse(raw).expect("test origin must parse")
}

pub fn test_settings(session: SessionPolicy) -> Settings {
    Settings::from_inner(Inner {
        portal: PortalSettings::default(),
        dapp: DappSettings::default(),
        chain: ChainSettings::default(),
        redelivery: RedeliveryPolicy::default(),
        liveness: LivenessPolicy::default(),
        session,
        log: LogSettings::default(),
    })
    .expect("test settings must validate")
}

/// Local window double: an origin plus a deliverable inbox. Each
/// `take_inbox` call re-subscribes, superseding the previous listener.
pub struct TestWindow {
    origin: Origin,
    inbox_tx: Mutex<mpsc::UnboundedSender<InboundMessage>>,
    opener: Mutex<Option<Arc<dyn RemoteWindow>>>,
}

impl TestWindow {
    pub fn new(raw_origin: &str) -> Arc<Self> {
        // No listener attached yet; deliveries before take_inbox are lost.
        let (inbox_tx, _) = mpsc::unbounded_channel();
        Arc::new(Self {
            origin: origin(raw_origin),
            inbox_tx: Mutex::new(inbox_tx),
            opener: Mutex::new(None),
        })
    }

    pub fn with_opener(raw_origin: &str, opener: Arc<dyn RemoteWindow>) -> Arc<Self> {
        let window = Self::new(raw_origin);
        *window.opener.lock().unwrap() = Some(opener);
        window
    }

    /// Deliver a message as the runtime would, stamped with the sender origin.
    pub fn deliver(&self, from: &str, data: Value) {
        let _ = self.inbox_tx.lock().unwrap().send(InboundMessage {
            origin: origin(from),
            data,
        });
    }
}

impl WindowContext for TestWindow {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inbox_tx.lock().unwrap() = tx;
        Some(rx)
    }

    fn opener(&self) -> Option<Arc<dyn RemoteWindow>> {
        self.opener.lock().unwrap().clone()
    }
}

/// Remote window double that records every delivered post.
#[derive(Debug)]
pub struct RecordingWindow {
    origin: Origin,
    posts: Mutex<Vec<Value>>,
    closed: AtomicBool,
}

impl RecordingWindow {
    pub fn new(raw_origin: &str) -> Arc<Self> {
        Arc::new(Self {
            origin: origin(raw_origin),
            posts: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn posts(&self) -> Vec<Value> {
        self.posts.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn count_of(&self, event: &str) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|value| value.get(event).is_some())
            .count()
    }
}

impl RemoteWindow for RecordingWindow {
    fn post(&self, data: Value, target_origin: &Origin) -> BridgeResult<()> {
        // The runtime silently withholds delivery on a closed window or a
        // target-origin mismatch.
        if self.closed.load(Ordering::Acquire) || *target_origin != self.origin {
            return Ok(());
        }
        self.posts.lock().unwrap().push(data);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Embedder double returning a fixed window, or refusing like a blocked popup.
pub struct FixedEmbedder {
    window: Arc<RecordingWindow>,
    blocked: bool,
    opened: AtomicU64,
}

impl FixedEmbedder {
    pub fn new(window: Arc<RecordingWindow>) -> Arc<Self> {
        Arc::new(Self {
            window,
            blocked: false,
            opened: AtomicU64::new(0),
        })
    }

    pub fn blocked(window: Arc<RecordingWindow>) -> Arc<Self> {
        Arc::new(Self {
            window,
            blocked: true,
            opened: AtomicU64::new(0),
        })
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Acquire)
    }
}

impl WindowEmbedder for FixedEmbedder {
    fn open_partner(
        &self,
        _url: &str,
        _name: &str,
        _mode: EmbedMode,
        _features: &str,
    ) -> BridgeResult<Arc<dyn RemoteWindow>> {
        self.opened.fetch_add(1, Ordering::AcqRel);
        if self.blocked {
            return Err(BridgeError::WindowUnavailable("popup blocked".into()));
        }
        Ok(self.window.clone() as Arc<dyn RemoteWindow>)
    }
}

/// Wallet double for the portal side: a fixed address, scriptable signing.
pub struct TestWallet {
    address: String,
    reject_signing: AtomicBool,
}

impl TestWallet {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            reject_signing: AtomicBool::new(false),
        })
    }

    pub fn reject_next_signing(&self) {
        self.reject_signing.store(true, Ordering::Release);
    }
}

#[async_trait]
impl WalletGateway for TestWallet {
    async fn add_delegated_signer(
        &self,
        _signer: &SignerRef,
        _chain: &str,
    ) -> Result<(), WalletError> {
        Ok(())
    }

    async fn list_delegated_signers(&self) -> Result<Vec<DelegatedSignerRecord>, WalletError> {
        Ok(Vec::new())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        if self.reject_signing.swap(false, Ordering::AcqRel) {
            return Err(WalletError::UserRejected);
        }
        Ok(format!("signed:{}", String::from_utf8_lossy(message)))
    }

    async fn address(&self) -> Result<String, WalletError> {
        Ok(self.address.clone())
    }
}

/// Settable auth gate.
pub struct TestAuth {
    tx: watch::Sender<AuthStatus>,
}

impl TestAuth {
    pub fn logged_in() -> Arc<Self> {
        Arc::new(Self {
            tx: watch::channel(AuthStatus::LoggedIn).0,
        })
    }

    pub fn logged_out() -> Arc<Self> {
        Arc::new(Self {
            tx: watch::channel(AuthStatus::LoggedOut).0,
        })
    }

    pub fn set(&self, status: AuthStatus) {
        let _ = self.tx.send(status);
    }
}

impl AuthSource for TestAuth {
    fn status(&self) -> AuthStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }
}

/// Wait until the phase watch reports `target`, failing the test after a
/// bounded wait.
pub async fn wait_for_phase(rx: &mut watch::Receiver<SessionPhase>, target: SessionPhase) {
    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if *rx.borrow_and_update() == target {
                return;
            }
            if rx.changed().await.is_err() {
                panic!("phase watch closed before reaching {target}");
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out waiting for phase {target}");
}
