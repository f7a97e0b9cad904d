//! Integration tests for the claim gate.
//!
//! Covers local precondition failures, the one-claim-per-identity
//! rule, the single post-claim refresh, and failure classification.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskmint::app::App;
use taskmint::claim::ClaimError;
use taskmint::config::ClientConfig;
use taskmint::notify::Notifier;
use taskmint::remote::RemoteError;
use taskmint::remote::memory::{MemoryRewardAuthority, MemoryTaskStore};
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;

const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

fn alice() -> Address {
    Address::parse(ALICE).unwrap()
}

type TestApp = App<MemoryTaskStore, MemoryRewardAuthority>;

/// An app connected as Alice with `completed` tasks done and nothing claimed.
async fn connected(completed: u64, claim_timeout: Duration) -> (Arc<TestApp>, Arc<MemoryRewardAuthority>) {
    let authority = Arc::new(MemoryRewardAuthority::new());
    authority.set_progress(&alice(), ProgressSnapshot::derive(completed, 0, 10).unwrap());
    let config = ClientConfig {
        claim_timeout,
        ..ClientConfig::default()
    };
    let app = Arc::new(App::new(
        Arc::new(MemoryTaskStore::new()),
        Arc::clone(&authority),
        &config,
        Notifier::disabled(),
    ));
    app.identity.handle_accounts_changed(&[alice()]);
    tokio::time::sleep(Duration::from_millis(1)).await;
    (app, authority)
}

#[tokio::test(start_paused = true)]
async fn no_identity_fails_fast() {
    let (app, authority) = connected(10, Duration::from_secs(60)).await;
    app.identity.disconnect();

    assert_eq!(app.claim().await, Err(ClaimError::NoIdentity));
    assert_eq!(authority.claim_calls(), 0);
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn not_eligible_reports_remaining_tasks() {
    let (app, authority) = connected(23, Duration::from_secs(60)).await;
    authority.set_progress(&alice(), ProgressSnapshot::derive(23, 2, 10).unwrap());
    app.progress.refresh_now().await;

    assert_eq!(app.claim().await, Err(ClaimError::NotEligible { remaining: 7 }));
    assert_eq!(authority.claim_calls(), 0);
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn duplicate_claim_is_rejected_locally() {
    let (app, authority) = connected(10, Duration::from_secs(60)).await;
    authority.set_claim_delay(Duration::from_secs(2));

    let first = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.claim().await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(authority.claim_calls(), 1);
    assert!(app.status().claim_pending);

    assert_eq!(app.claim().await, Err(ClaimError::AlreadyPending));
    assert_eq!(authority.claim_calls(), 1);

    let receipt = first.await.unwrap().unwrap();
    assert!(receipt.transaction_hash.as_str().starts_with("0x"));
    assert!(!app.status().claim_pending);
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn success_triggers_exactly_one_refresh() {
    let (app, authority) = connected(10, Duration::from_secs(60)).await;
    let before = authority.progress_calls(&alice());

    app.claim().await.unwrap();
    assert_eq!(authority.progress_calls(&alice()), before + 1);

    let snapshot = app.progress.snapshot();
    assert_eq!(snapshot.claimed_milestone(), 1);
    assert!(!snapshot.claim_available());
    assert_eq!(
        app.claim().await,
        Err(ClaimError::NotEligible { remaining: 10 })
    );
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failure_leaves_snapshot_and_clears_marker() {
    let (app, authority) = connected(10, Duration::from_secs(60)).await;
    let before_calls = authority.progress_calls(&alice());
    let before = app.progress.snapshot();

    authority.script_claim(RemoteError::Rejected {
        status: 400,
        detail: "ACTION_REJECTED".to_string(),
    });
    assert_eq!(app.claim().await, Err(ClaimError::UserRejected));
    assert_eq!(app.progress.snapshot(), before);
    assert_eq!(authority.progress_calls(&alice()), before_calls);
    assert!(!app.status().claim_pending);

    // The marker is gone, so a retry goes through.
    app.claim().await.unwrap();
    assert_eq!(authority.claim_calls(), 2);
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failures_are_classified() {
    let (app, authority) = connected(50, Duration::from_secs(60)).await;

    authority.script_claim(RemoteError::Rejected {
        status: 500,
        detail: "execution reverted: Ownable: caller is not the owner".to_string(),
    });
    assert_eq!(app.claim().await, Err(ClaimError::NotAuthorized));

    authority.script_claim(RemoteError::Rejected {
        status: 403,
        detail: "forbidden".to_string(),
    });
    assert_eq!(app.claim().await, Err(ClaimError::NotAuthorized));

    authority.script_claim(RemoteError::Timeout);
    assert_eq!(app.claim().await, Err(ClaimError::Timeout));

    authority.script_claim(RemoteError::Rejected {
        status: 409,
        detail: "Minting paused".to_string(),
    });
    let err = app.claim().await.unwrap_err();
    assert_eq!(err, ClaimError::Rejected { detail: "Minting paused".to_string() });
    assert_eq!(err.user_message(), "Minting paused");

    authority.script_claim(RemoteError::Decode("eof".to_string()));
    assert!(matches!(app.claim().await, Err(ClaimError::Unknown(_))));
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn slow_claim_times_out() {
    let (app, authority) = connected(10, Duration::from_secs(5)).await;
    authority.set_claim_delay(Duration::from_secs(30));

    assert_eq!(app.claim().await, Err(ClaimError::Timeout));
    assert!(!app.status().claim_pending);
    assert_eq!(app.progress.snapshot().claimed_milestone(), 0);
    app.shutdown();
}
