// Constants for the signet-bridge modules
// This file contains global constants used across the application

/// The default configuration file name for the application.
/// This constant is used to specify the default configuration file
/// that the binary will attempt to load at startup.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "signet-bridge.toml";

/// Environment variable prefix for configuration overrides
/// (e.g. `SB__CHAIN__ID=base-sepolia`).
pub const ENV_PREFIX: &str = "SB";

/// Separator between nested configuration keys in environment variables.
pub const ENV_SEPARATOR: &str = "__";

/// Default cadence, in milliseconds, at which the delivery-until-acknowledged
/// sender re-posts an envelope that has not been acknowledged yet.
pub const DEFAULT_REDELIVERY_INTERVAL_MS: u64 = 1000;

/// Default cadence, in milliseconds, at which the liveness monitor polls a
/// popup handle for closure.
pub const DEFAULT_LIVENESS_INTERVAL_MS: u64 = 1000;

/// Window feature string applied when the Portal opens the partner popup.
pub const DEFAULT_POPUP_FEATURES: &str = "width=500,height=600,menubar=no,toolbar=no";

/// Name given to the partner window so that repeated opens focus the
/// existing one instead of spawning another.
pub const PARTNER_WINDOW_NAME: &str = "signet-connection";
