pub mod auth;
pub mod constants;
pub mod origin;
pub mod policy;
pub mod settings;
pub mod signer;

pub use auth::AuthStatus;
pub use origin::{InvalidOrigin, Origin};
pub use policy::{LivenessPolicy, RedeliveryPolicy, SessionPolicy};
pub use settings::{
    ChainSettings, DappSettings, EmbedMode, LogSettings, PortalSettings, Settings,
};
pub use signer::{DelegatedSignerRecord, InvalidSignerRef, SignerNamespace, SignerRef};
