use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Raised when a stored signer string does not parse as `namespace:address`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid signer reference '{0}'")]
pub struct InvalidSignerRef(pub String);

/// Namespace prefix under which a signer is recorded on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerNamespace {
    /// A signer controlled by an external wallet (the Portal holds its key).
    ExternalWallet,
    /// A keypair managed by the wallet itself.
    EvmKeypair,
}

impl SignerNamespace {
    /// Return the stable string representation (kebab-case).
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SignerNamespace::ExternalWallet => "external-wallet",
            SignerNamespace::EvmKeypair => "evm-keypair",
        }
    }
}

impl Display for SignerNamespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignerNamespace {
    type Err = InvalidSignerRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external-wallet" => Ok(SignerNamespace::ExternalWallet),
            "evm-keypair" => Ok(SignerNamespace::EvmKeypair),
            other => Err(InvalidSignerRef(other.to_string())),
        }
    }
}

/// Namespaced signer reference, rendered as `namespace:address`.
///
/// The wire carries the bare address; the namespace is wallet-side
/// bookkeeping applied where records are stored and compared. The
/// already-registered check matches on the full namespaced string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerRef {
    pub namespace: SignerNamespace,
    pub address: String,
}

impl SignerRef {
    /// Reference a signer whose key lives in an external wallet.
    pub fn external_wallet(address: impl Into<String>) -> Self {
        Self {
            namespace: SignerNamespace::ExternalWallet,
            address: address.into(),
        }
    }

    /// Reference a wallet-managed keypair.
    pub fn evm_keypair(address: impl Into<String>) -> Self {
        Self {
            namespace: SignerNamespace::EvmKeypair,
            address: address.into(),
        }
    }
}

impl Display for SignerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.address)
    }
}

impl FromStr for SignerRef {
    type Err = InvalidSignerRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, address) = s
            .split_once(':')
            .ok_or_else(|| InvalidSignerRef(s.to_string()))?;
        if address.is_empty() {
            return Err(InvalidSignerRef(s.to_string()));
        }
        Ok(Self {
            namespace: namespace.parse()?,
            address: address.to_string(),
        })
    }
}

impl Serialize for SignerRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignerRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A signer currently granted signing rights on a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatedSignerRecord {
    /// Namespaced signer string, e.g. `external-wallet:0xABC`.
    pub signer: SignerRef,
    /// Chain the grant applies to.
    pub chain: String,
    /// When the grant was recorded.
    pub added_at: DateTime<Utc>,
}
