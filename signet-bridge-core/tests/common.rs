#![allow(dead_code)]

use std::sync::Once;

use signet_bridge_models::settings::Inner;
use signet_bridge_models::{
    ChainSettings, DappSettings, EmbedMode, LivenessPolicy, LogSettings, Origin, PortalSettings,
    RedeliveryPolicy, SessionPolicy, Settings,
};

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

pub fn iframe_settings() -> Settings {
    Settings::from_inner(Inner {
        portal: PortalSettings {
            embed: EmbedMode::Iframe,
            ..PortalSettings::default()
        },
        dapp: DappSettings::default(),
        chain: ChainSettings::default(),
        redelivery: RedeliveryPolicy::default(),
        liveness: LivenessPolicy::default(),
        session: SessionPolicy::default(),
        log: LogSettings::default(),
    })
    .expect("test settings must validate")
}
