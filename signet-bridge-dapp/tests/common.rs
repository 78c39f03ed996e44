#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use signet_bridge_models::{
    AuthStatus, ChainSettings, DappSettings, DelegatedSignerRecord, LivenessPolicy, LogSettings,
    Origin, PortalSettings, RedeliveryPolicy, SessionPolicy, Settings, SignerRef,
};
use signet_bridge_models::settings::Inner;
use signet_bridge_sdk::{
    AuthSource, BridgeResult, InboundMessage, PreparedTransaction, RemoteWindow, SessionPhase,
    TransactionApprover, WalletError, WalletGateway, WindowContext,
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

pub fn test_settings() -> Settings {
    Settings::from_inner(Inner {
        portal: PortalSettings::default(),
        dapp: DappSettings::default(),
        chain: ChainSettings::default(),
        redelivery: RedeliveryPolicy::default(),
        liveness: LivenessPolicy::default(),
        session: SessionPolicy::default(),
        log: LogSettings::default(),
    })
    .expect("test settings must validate")
}

/// Local window double with a re-subscribable inbox and an optional opener.
pub struct TestWindow {
    origin: Origin,
    inbox_tx: Mutex<mpsc::UnboundedSender<InboundMessage>>,
    opener: Mutex<Option<Arc<dyn RemoteWindow>>>,
}

impl TestWindow {
    pub fn new(raw_origin: &str) -> Arc<Self> {
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

    pub fn count_of(&self, event: &str) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|value| value.get(event).is_some())
            .count()
    }

    pub fn saw_ready(&self) -> bool {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .any(|value| value.get("type") == Some(&Value::String("ready".into())))
    }
}

impl RemoteWindow for RecordingWindow {
    fn post(&self, data: Value, target_origin: &Origin) -> BridgeResult<()> {
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

/// Wallet double for the accepting side: records grants, scriptable failures.
pub struct GrantWallet {
    address: String,
    records: Mutex<Vec<DelegatedSignerRecord>>,
    grant_calls: AtomicU64,
    failures_left: AtomicU64,
}

impl GrantWallet {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            records: Mutex::new(Vec::new()),
            grant_calls: AtomicU64::new(0),
            failures_left: AtomicU64::new(0),
        })
    }

    /// Pre-register a signer, as if granted in an earlier session.
    pub fn preload(&self, signer: SignerRef, chain: &str) {
        self.records.lock().unwrap().push(DelegatedSignerRecord {
            signer,
            chain: chain.to_string(),
            added_at: Utc::now(),
        });
    }

    /// Make the next `n` grant calls fail.
    pub fn fail_next_grants(&self, n: u64) {
        self.failures_left.store(n, Ordering::Release);
    }

    pub fn grant_calls(&self) -> u64 {
        self.grant_calls.load(Ordering::Acquire)
    }

    pub fn records(&self) -> Vec<DelegatedSignerRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletGateway for GrantWallet {
    async fn add_delegated_signer(
        &self,
        signer: &SignerRef,
        chain: &str,
    ) -> Result<(), WalletError> {
        self.grant_calls.fetch_add(1, Ordering::AcqRel);
        if self.failures_left.load(Ordering::Acquire) > 0 {
            self.failures_left.fetch_sub(1, Ordering::AcqRel);
            return Err(WalletError::Failed("wallet backend unavailable".into()));
        }
        self.records.lock().unwrap().push(DelegatedSignerRecord {
            signer: signer.clone(),
            chain: chain.to_string(),
            added_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_delegated_signers(&self) -> Result<Vec<DelegatedSignerRecord>, WalletError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<String, WalletError> {
        Err(WalletError::Failed("this wallet does not sign".into()))
    }

    async fn address(&self) -> Result<String, WalletError> {
        Ok(self.address.clone())
    }
}

/// Approver double: numbered transactions, scriptable approval failure.
pub struct TestApprover {
    prepared: AtomicU64,
    approve_calls: AtomicU64,
    fail_next_approval: AtomicBool,
}

impl TestApprover {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prepared: AtomicU64::new(0),
            approve_calls: AtomicU64::new(0),
            fail_next_approval: AtomicBool::new(false),
        })
    }

    pub fn fail_next_approval(&self) {
        self.fail_next_approval.store(true, Ordering::Release);
    }

    pub fn approve_calls(&self) -> u64 {
        self.approve_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransactionApprover for TestApprover {
    async fn prepare_transaction(
        &self,
        _signer: &SignerRef,
    ) -> Result<PreparedTransaction, WalletError> {
        let n = self.prepared.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(PreparedTransaction {
            transaction_id: format!("tx-{n}"),
            message_to_sign: format!("unsigned-{n}"),
        })
    }

    async fn approve_transaction(
        &self,
        transaction_id: &str,
        _signer: &SignerRef,
        _signature: &str,
    ) -> Result<String, WalletError> {
        self.approve_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_next_approval.swap(false, Ordering::AcqRel) {
            return Err(WalletError::Failed("approval failed".into()));
        }
        Ok(format!("0xhash-{transaction_id}"))
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
