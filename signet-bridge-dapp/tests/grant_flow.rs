mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use signet_bridge_dapp::{DappContext, DappDriver};
use signet_bridge_models::SignerRef;
use signet_bridge_sdk::{BridgeError, LinkDriver, SessionPhase};

use common::{
    init_logging, test_settings, GrantWallet, RecordingWindow, TestApprover, TestAuth, TestWindow,
    DAPP_ORIGIN, EVIL_ORIGIN, PORTAL_ORIGIN,
};

struct Fixture {
    driver: Arc<DappDriver>,
    window: Arc<TestWindow>,
    portal: Arc<RecordingWindow>,
    wallet: Arc<GrantWallet>,
}

fn fixture(wallet: Arc<GrantWallet>) -> Fixture {
    let portal = RecordingWindow::new(PORTAL_ORIGIN);
    let window = TestWindow::with_opener(DAPP_ORIGIN, portal.clone());
    let driver = DappDriver::with_context(DappContext {
        settings: test_settings(),
        window: window.clone(),
        wallet: wallet.clone(),
        approver: TestApprover::new(),
        auth: TestAuth::logged_in(),
    })
    .expect("dapp driver builds");
    Fixture {
        driver: Arc::new(driver),
        window,
        portal,
        wallet,
    }
}

#[tokio::test(start_paused = true)]
async fn announces_ready_then_grants_and_confirms() {
    init_logging();
    let f = fixture(GrantWallet::new("0xDAPP"));
    let mut phases = f.driver.subscribe_phase();

    // 1. start: the listener attaches, then ready goes to the opener
    f.driver.start().await.expect("start succeeds");
    assert!(f.portal.saw_ready());
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Ready);

    // 2. the signer arrives: grant once, confirm with the wallet address
    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    common::wait_for_phase(&mut phases, SessionPhase::Completed).await;

    assert_eq!(f.wallet.grant_calls(), 1);
    let records = f.wallet.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].signer, SignerRef::external_wallet("0xSIGNER"));
    assert_eq!(records[0].chain, "base-sepolia");
    assert_eq!(f.portal.count_of("wallet"), 1);
    assert_eq!(
        f.portal.posts().last().and_then(|v| v.get("wallet")),
        Some(&json!("0xDAPP"))
    );
    assert_eq!(
        f.driver.granted_signer(),
        Some(SignerRef::external_wallet("0xSIGNER"))
    );
}

#[tokio::test(start_paused = true)]
async fn redelivered_signer_mutates_the_wallet_once() {
    init_logging();
    let f = fixture(GrantWallet::new("0xDAPP"));
    let mut phases = f.driver.subscribe_phase();

    f.driver.start().await.expect("start succeeds");

    // The peer re-sends the signer on a timer; deliver a burst of them.
    for _ in 0..4 {
        f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    }
    common::wait_for_phase(&mut phases, SessionPhase::Completed).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(f.wallet.grant_calls(), 1);
    assert_eq!(f.wallet.records().len(), 1);
    // Every surviving duplicate is answered, never re-granted.
    assert!(f.portal.count_of("wallet") >= 1);
}

#[tokio::test(start_paused = true)]
async fn already_registered_signer_confirms_without_mutating() {
    init_logging();
    let wallet = GrantWallet::new("0xDAPP");
    wallet.preload(SignerRef::external_wallet("0xSIGNER"), "base-sepolia");
    let f = fixture(wallet);
    let mut phases = f.driver.subscribe_phase();

    f.driver.start().await.expect("start succeeds");
    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    common::wait_for_phase(&mut phases, SessionPhase::Completed).await;

    assert_eq!(f.wallet.grant_calls(), 0);
    assert_eq!(f.wallet.records().len(), 1);
    assert_eq!(f.portal.count_of("wallet"), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_grant_returns_to_ready_and_retries_on_redelivery() {
    init_logging();
    let wallet = GrantWallet::new("0xDAPP");
    wallet.fail_next_grants(1);
    let f = fixture(wallet);
    let mut phases = f.driver.subscribe_phase();

    f.driver.start().await.expect("start succeeds");

    // 1. first delivery fails inside the wallet and falls back to ready
    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Ready);
    assert_eq!(f.wallet.grant_calls(), 1);
    assert_eq!(f.portal.count_of("wallet"), 0);
    assert!(f.driver.last_error().is_some());

    // 2. the peer's next re-send retries the grant and completes
    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    common::wait_for_phase(&mut phases, SessionPhase::Completed).await;
    assert_eq!(f.wallet.grant_calls(), 2);
    assert_eq!(f.wallet.records().len(), 1);
    assert_eq!(f.portal.count_of("wallet"), 1);
}

#[tokio::test(start_paused = true)]
async fn signer_from_unexpected_origin_is_discarded() {
    init_logging();
    let f = fixture(GrantWallet::new("0xDAPP"));
    let mut phases = f.driver.subscribe_phase();

    f.driver.start().await.expect("start succeeds");
    f.window.deliver(EVIL_ORIGIN, json!({ "delegatedSigner": "0xEVIL" }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*phases.borrow_and_update(), SessionPhase::Ready);
    assert_eq!(f.wallet.grant_calls(), 0);
    let stats = f.driver.channel_stats().expect("channel is open");
    assert_eq!(stats.origin_rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_signer_payload_is_discarded() {
    init_logging();
    let f = fixture(GrantWallet::new("0xDAPP"));

    f.driver.start().await.expect("start succeeds");
    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": 42 }));
    f.window.deliver(PORTAL_ORIGIN, json!({ "unknownEvent": "x" }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(f.wallet.grant_calls(), 0);
    let stats = f.driver.channel_stats().expect("channel is open");
    assert_eq!(stats.schema_rejected, 2);
    assert_eq!(stats.delivered, 0);
}

#[tokio::test(start_paused = true)]
async fn start_without_opener_fails() {
    init_logging();
    let window = TestWindow::new(DAPP_ORIGIN);
    let driver = DappDriver::with_context(DappContext {
        settings: test_settings(),
        window,
        wallet: GrantWallet::new("0xDAPP"),
        approver: TestApprover::new(),
        auth: TestAuth::logged_in(),
    })
    .expect("dapp driver builds");

    let err = driver.start().await.expect_err("no opener must fail");
    assert!(matches!(err, BridgeError::WindowUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn cancel_abandons_and_ignores_late_signer() {
    init_logging();
    let f = fixture(GrantWallet::new("0xDAPP"));
    let mut phases = f.driver.subscribe_phase();

    f.driver.start().await.expect("start succeeds");
    f.driver.cancel().await.expect("cancel succeeds");
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Abandoned);

    f.window.deliver(PORTAL_ORIGIN, json!({ "delegatedSigner": "0xSIGNER" }));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(f.wallet.grant_calls(), 0);
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Abandoned);
}
