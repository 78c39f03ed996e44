use crate::error::WalletError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signet_bridge_models::{AuthStatus, DelegatedSignerRecord, SignerRef};
use tokio::sync::watch;

/// Wallet operations the bridge invokes but never implements.
///
/// On the Portal side the gateway fronts the externally-controlled signer
/// (`sign_message`, `address`); on the DApp side it fronts the wallet that
/// receives the delegation (`add_delegated_signer`, `list_delegated_signers`,
/// `address`).
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Grant `signer` transaction-signing rights on the wallet for `chain`.
    async fn add_delegated_signer(&self, signer: &SignerRef, chain: &str)
        -> Result<(), WalletError>;

    /// Signers currently granted on the wallet.
    async fn list_delegated_signers(&self) -> Result<Vec<DelegatedSignerRecord>, WalletError>;

    /// Sign raw message bytes with the wallet's own signer.
    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError>;

    /// Address of the wallet or signer this gateway controls.
    async fn address(&self) -> Result<String, WalletError>;
}

/// A transaction built on the DApp wallet, awaiting an external signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub transaction_id: String,
    /// Message the delegated signer must sign, as sent over the wire.
    pub message_to_sign: String,
}

/// Transaction preparation and approval on the DApp's wallet.
#[async_trait]
pub trait TransactionApprover: Send + Sync {
    /// Build a transaction whose signer will be `signer` and return the
    /// message that must be signed for it.
    async fn prepare_transaction(&self, signer: &SignerRef)
        -> Result<PreparedTransaction, WalletError>;

    /// Apply `signature` to a previously prepared transaction; returns the
    /// transaction hash on success.
    async fn approve_transaction(
        &self,
        transaction_id: &str,
        signer: &SignerRef,
        signature: &str,
    ) -> Result<String, WalletError>;
}

/// Login status supplier. Drivers keep the protocol idle until `LoggedIn`.
pub trait AuthSource: Send + Sync {
    fn status(&self) -> AuthStatus;

    /// Watch status changes; used to wait for the gate to open.
    fn subscribe(&self) -> watch::Receiver<AuthStatus>;
}

/// Block until `auth` reports a logged-in user. Nothing protocol-visible may
/// happen before then.
pub async fn wait_for_login(auth: &dyn AuthSource) -> crate::error::BridgeResult<()> {
    let mut rx = auth.subscribe();
    loop {
        let status = *rx.borrow_and_update();
        if status == AuthStatus::LoggedIn {
            return Ok(());
        }
        tracing::debug!(%status, "waiting for login");
        if rx.changed().await.is_err() {
            return Err(crate::error::BridgeError::ConfigurationError(
                "auth source dropped before login".into(),
            ));
        }
    }
}
