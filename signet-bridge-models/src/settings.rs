use crate::constants::{DEFAULT_POPUP_FEATURES, ENV_PREFIX, ENV_SEPARATOR};
use crate::origin::Origin;
use crate::policy::{LivenessPolicy, RedeliveryPolicy, SessionPolicy};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Cheap-to-clone handle over the loaded configuration tree.
#[derive(Debug, Clone)]
pub struct Settings(Arc<Inner>);

impl Deref for Settings {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Root configuration tree.
///
/// Every section has full defaults so the binary runs without a config file;
/// overrides come from `signet-bridge.toml` and `SB__`-prefixed environment
/// variables.
#[derive(Debug, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub portal: PortalSettings,
    #[serde(default)]
    pub dapp: DappSettings,
    #[serde(default)]
    pub chain: ChainSettings,
    #[serde(default)]
    pub redelivery: RedeliveryPolicy,
    #[serde(default)]
    pub liveness: LivenessPolicy,
    #[serde(default)]
    pub session: SessionPolicy,
    #[serde(default)]
    pub log: LogSettings,
}

/// How the Portal embeds the partner document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedMode {
    /// Open the partner in a popup window; liveness is poll-monitored.
    #[default]
    Popup,
    /// Embed the partner as a same-tab iframe; teardown follows the host
    /// document lifecycle and no liveness monitor runs.
    Iframe,
}

/// Portal-side settings: where the partner DApp lives and how to embed it.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    /// Absolute URL of the partner DApp document.
    #[serde(default = "PortalSettings::default_dapp_url")]
    pub dapp_url: String,
    /// Embedding mode for the partner window.
    #[serde(default)]
    pub embed: EmbedMode,
    /// Window feature string used for popup embedding.
    #[serde(default = "PortalSettings::default_popup_features")]
    pub popup_features: String,
}

impl PortalSettings {
    fn default_dapp_url() -> String {
        "http://localhost:3001".to_string()
    }

    fn default_popup_features() -> String {
        DEFAULT_POPUP_FEATURES.to_string()
    }

    /// Origin the Portal binds its channel to and posts toward.
    pub fn partner_origin(&self) -> Result<Origin, crate::origin::InvalidOrigin> {
        Origin::parse(&self.dapp_url)
    }
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            dapp_url: Self::default_dapp_url(),
            embed: EmbedMode::default(),
            popup_features: Self::default_popup_features(),
        }
    }
}

/// DApp-side settings: where the partner Portal lives.
#[derive(Debug, Clone, Deserialize)]
pub struct DappSettings {
    /// Absolute URL of the partner Portal document.
    #[serde(default = "DappSettings::default_portal_url")]
    pub portal_url: String,
}

impl DappSettings {
    fn default_portal_url() -> String {
        "http://localhost:3000".to_string()
    }

    /// Origin the DApp binds its opener channel to and posts toward.
    pub fn partner_origin(&self) -> Result<Origin, crate::origin::InvalidOrigin> {
        Origin::parse(&self.portal_url)
    }
}

impl Default for DappSettings {
    fn default() -> Self {
        Self {
            portal_url: Self::default_portal_url(),
        }
    }
}

/// Target chain for delegated-signer grants.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    /// Chain identifier passed to the wallet collaborator.
    #[serde(default = "ChainSettings::default_id")]
    pub id: String,
}

impl ChainSettings {
    fn default_id() -> String {
        "base-sepolia".to_string()
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            id: Self::default_id(),
        }
    }
}

/// Logging settings for the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Level for both console and file output.
    #[serde(default = "LogSettings::default_level")]
    pub level: String,
    /// Optional directory for daily-rolling log files; console-only if unset.
    #[serde(default)]
    pub dir: Option<String>,
}

impl LogSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            dir: None,
        }
    }
}

impl Settings {
    /// Load settings from an optional config file layered with environment
    /// overrides, then validate fail-fast.
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;
        let inner: Inner = config.try_deserialize()?;
        let settings = Self(Arc::new(inner));
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings directly from an already-constructed tree (tests,
    /// embedded harnesses). Validation still applies.
    pub fn from_inner(inner: Inner) -> Result<Self, ConfigError> {
        let settings = Self(Arc::new(inner));
        settings.validate()?;
        Ok(settings)
    }

    /// Fail-fast configuration checks: both partner URLs must carry a usable
    /// origin and the chain identifier must be non-empty. Malformed
    /// configuration is reported here, never at first message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.portal
            .partner_origin()
            .map_err(|e| ConfigError::Message(format!("portal.dapp_url: {e}")))?;
        self.dapp
            .partner_origin()
            .map_err(|e| ConfigError::Message(format!("dapp.portal_url: {e}")))?;
        if self.chain.id.trim().is_empty() {
            return Err(ConfigError::Message(
                "chain.id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self(Arc::new(Inner {
            portal: PortalSettings::default(),
            dapp: DappSettings::default(),
            chain: ChainSettings::default(),
            redelivery: RedeliveryPolicy::default(),
            liveness: LivenessPolicy::default(),
            session: SessionPolicy::default(),
            log: LogSettings::default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.portal.partner_origin().unwrap().as_str(),
            "http://localhost:3001"
        );
        assert_eq!(
            settings.dapp.partner_origin().unwrap().as_str(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn malformed_partner_url_fails_fast() {
        let inner = Inner {
            portal: PortalSettings {
                dapp_url: "not a url".to_string(),
                ..PortalSettings::default()
            },
            dapp: DappSettings::default(),
            chain: ChainSettings::default(),
            redelivery: RedeliveryPolicy::default(),
            liveness: LivenessPolicy::default(),
            session: SessionPolicy::default(),
            log: LogSettings::default(),
        };
        assert!(Settings::from_inner(inner).is_err());
    }

    #[test]
    fn empty_chain_id_fails_fast() {
        let inner = Inner {
            portal: PortalSettings::default(),
            dapp: DappSettings::default(),
            chain: ChainSettings { id: "  ".to_string() },
            redelivery: RedeliveryPolicy::default(),
            liveness: LivenessPolicy::default(),
            session: SessionPolicy::default(),
            log: LogSettings::default(),
        };
        assert!(Settings::from_inner(inner).is_err());
    }

    #[test]
    fn embed_mode_deserializes_kebab_case() {
        let mode: EmbedMode = serde_json::from_str(r#""iframe""#).unwrap();
        assert_eq!(mode, EmbedMode::Iframe);
    }
}
