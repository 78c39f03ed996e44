use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use signet_bridge_models::{DelegatedSignerRecord, SignerRef};
use signet_bridge_sdk::{PreparedTransaction, TransactionApprover, WalletError, WalletGateway};

/// In-memory wallet: a delegated signer registry, deterministic signing,
/// and a two-step prepare/approve transaction flow. The failure knobs make
/// the externally-controlled wallet behaviors reproducible.
pub struct MemoryWallet {
    address: String,
    chain: String,
    signers: DashMap<SignerRef, DelegatedSignerRecord>,
    pending: DashMap<String, String>,
    tx_seq: AtomicU64,
    grant_calls: AtomicU64,
    sign_calls: AtomicU64,
    approve_calls: AtomicU64,
    failing_grants: AtomicU64,
    reject_signing: AtomicBool,
}

impl MemoryWallet {
    pub fn new(address: &str, chain: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            chain: chain.to_string(),
            signers: DashMap::new(),
            pending: DashMap::new(),
            tx_seq: AtomicU64::new(0),
            grant_calls: AtomicU64::new(0),
            sign_calls: AtomicU64::new(0),
            approve_calls: AtomicU64::new(0),
            failing_grants: AtomicU64::new(0),
            reject_signing: AtomicBool::new(false),
        })
    }

    /// Make the next `n` grant calls fail, as a flaky backend would.
    pub fn fail_next_grants(&self, n: u64) {
        self.failing_grants.store(n, Ordering::Release);
    }

    /// Decline the next signing request, as a user would.
    pub fn reject_next_signing(&self) {
        self.reject_signing.store(true, Ordering::Release);
    }

    pub fn grant_calls(&self) -> u64 {
        self.grant_calls.load(Ordering::Acquire)
    }

    pub fn sign_calls(&self) -> u64 {
        self.sign_calls.load(Ordering::Acquire)
    }

    pub fn approve_calls(&self) -> u64 {
        self.approve_calls.load(Ordering::Acquire)
    }

    pub fn delegated(&self, signer: &SignerRef) -> bool {
        self.signers.contains_key(signer)
    }

    // FNV-1a; placeholder digests for demo signatures and hashes.
    fn digest(payload: &[u8]) -> u64 {
        payload.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }
}

#[async_trait]
impl WalletGateway for MemoryWallet {
    async fn add_delegated_signer(
        &self,
        signer: &SignerRef,
        chain: &str,
    ) -> Result<(), WalletError> {
        self.grant_calls.fetch_add(1, Ordering::AcqRel);
        if self.failing_grants.load(Ordering::Acquire) > 0 {
            self.failing_grants.fetch_sub(1, Ordering::AcqRel);
            return Err(WalletError::Failed("wallet backend unavailable".into()));
        }
        if chain != self.chain {
            return Err(WalletError::ChainMismatch {
                expected: chain.to_string(),
                actual: self.chain.clone(),
            });
        }
        if self.signers.contains_key(signer) {
            return Err(WalletError::AlreadyDelegated);
        }
        self.signers.insert(
            signer.clone(),
            DelegatedSignerRecord {
                signer: signer.clone(),
                chain: chain.to_string(),
                added_at: Utc::now(),
            },
        );
        debug!(%signer, chain, "delegated signer recorded");
        Ok(())
    }

    async fn list_delegated_signers(&self) -> Result<Vec<DelegatedSignerRecord>, WalletError> {
        Ok(self
            .signers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        if self.reject_signing.swap(false, Ordering::AcqRel) {
            return Err(WalletError::UserRejected);
        }
        self.sign_calls.fetch_add(1, Ordering::AcqRel);
        let digest = Self::digest(message) ^ Self::digest(self.address.as_bytes());
        Ok(format!("0x{digest:016x}"))
    }

    async fn address(&self) -> Result<String, WalletError> {
        Ok(self.address.clone())
    }
}

#[async_trait]
impl TransactionApprover for MemoryWallet {
    async fn prepare_transaction(
        &self,
        signer: &SignerRef,
    ) -> Result<PreparedTransaction, WalletError> {
        if !self.signers.contains_key(signer) {
            return Err(WalletError::NotConnected);
        }
        let seq = self.tx_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let transaction_id = format!("tx-{seq:04}");
        let message_to_sign = format!(
            "{:016x}{:016x}",
            Self::digest(transaction_id.as_bytes()),
            Self::digest(signer.to_string().as_bytes())
        );
        self.pending
            .insert(transaction_id.clone(), message_to_sign.clone());
        debug!(%transaction_id, %signer, "transaction prepared");
        Ok(PreparedTransaction {
            transaction_id,
            message_to_sign,
        })
    }

    async fn approve_transaction(
        &self,
        transaction_id: &str,
        signer: &SignerRef,
        signature: &str,
    ) -> Result<String, WalletError> {
        self.approve_calls.fetch_add(1, Ordering::AcqRel);
        if !self.signers.contains_key(signer) {
            return Err(WalletError::NotConnected);
        }
        let Some((_, message)) = self.pending.remove(transaction_id) else {
            return Err(WalletError::Failed(format!(
                "unknown transaction {transaction_id}"
            )));
        };
        let hash = Self::digest(message.as_bytes()) ^ Self::digest(signature.as_bytes());
        debug!(%transaction_id, "transaction approved");
        Ok(format!("0x{hash:016x}"))
    }
}
