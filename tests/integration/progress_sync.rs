//! Integration tests for progress polling across identity changes.
//!
//! Drives the poller through the identity tracker (as the app does)
//! with a paused clock and a delayed in-memory authority.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskmint::app::App;
use taskmint::config::ClientConfig;
use taskmint::notify::{NoticeLevel, Notifier};
use taskmint::remote::RemoteError;
use taskmint::remote::memory::{MemoryRewardAuthority, MemoryTaskStore};
use taskmint::wallet::loopback::LoopbackWallet;
use taskmint_proto::identity::{Address, ChainId};
use taskmint_proto::progress::ProgressSnapshot;

const PERIOD: Duration = Duration::from_millis(10_000);

const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
const BOB: &str = "0x0000000000000000000000000000000000000b0b";

fn addr(raw: &str) -> Address {
    Address::parse(raw).unwrap()
}

fn app(authority: &Arc<MemoryRewardAuthority>, notifier: Notifier) -> App<MemoryTaskStore, MemoryRewardAuthority> {
    let config = ClientConfig {
        poll_interval: PERIOD,
        ..ClientConfig::default()
    };
    App::new(
        Arc::new(MemoryTaskStore::new()),
        Arc::clone(authority),
        &config,
        notifier,
    )
}

/// Yields long enough for spawned tasks to run without reaching a tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn late_response_for_previous_identity_is_dropped() {
    let authority = Arc::new(MemoryRewardAuthority::new());
    authority.set_progress(&addr(ALICE), ProgressSnapshot::derive(25, 0, 10).unwrap());
    authority.set_progress(&addr(BOB), ProgressSnapshot::derive(4, 0, 10).unwrap());
    authority.set_progress_delay(&addr(ALICE), Duration::from_secs(3));
    let app = app(&authority, Notifier::disabled());

    // Alice's first fetch is dispatched and parked for three seconds.
    app.identity.handle_accounts_changed(&[addr(ALICE)]);
    settle().await;
    assert_eq!(authority.progress_calls(&addr(ALICE)), 1);

    // Switch to Bob before it resolves.
    app.identity.handle_accounts_changed(&[addr(BOB)]);
    settle().await;
    assert_eq!(app.progress.active_identity(), Some(addr(BOB)));
    assert_eq!(app.progress.snapshot().completed_count(), 4);

    // Let Alice's response arrive.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = app.progress.snapshot();
    assert_eq!(snapshot.completed_count(), 4);
    assert!(!snapshot.claim_available());
    assert_eq!(app.progress.snapshot_for(&addr(ALICE)), None);

    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn clearing_identity_resets_and_stops_polling() {
    let authority = Arc::new(MemoryRewardAuthority::new());
    authority.set_progress(&addr(ALICE), ProgressSnapshot::derive(21, 1, 10).unwrap());
    let app = app(&authority, Notifier::disabled());

    app.identity.handle_accounts_changed(&[addr(ALICE)]);
    settle().await;
    tokio::time::sleep(PERIOD).await;
    assert_eq!(authority.progress_calls(&addr(ALICE)), 2);
    assert_eq!(app.progress.snapshot().claimable_count(), 1);

    app.identity.disconnect();
    settle().await;
    assert_eq!(app.progress.snapshot(), ProgressSnapshot::default());
    assert!(app.progress.last_synced().is_none());

    tokio::time::sleep(PERIOD * 2).await;
    assert_eq!(authority.total_progress_calls(), 2);

    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn single_cycle_across_rapid_switches() {
    let authority = Arc::new(MemoryRewardAuthority::new());
    let app = app(&authority, Notifier::disabled());

    for _ in 0..5 {
        app.identity.handle_accounts_changed(&[addr(ALICE)]);
        settle().await;
        app.identity.handle_accounts_changed(&[addr(BOB)]);
        settle().await;
    }
    let before = authority.total_progress_calls();

    tokio::time::sleep(PERIOD * 3).await;
    assert_eq!(authority.total_progress_calls(), before + 3);
    assert_eq!(authority.progress_calls(&addr(BOB)), 5 + 3);

    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn poll_failure_keeps_snapshot_and_warns() {
    let authority = Arc::new(MemoryRewardAuthority::new());
    authority.set_progress(&addr(ALICE), ProgressSnapshot::derive(9, 0, 10).unwrap());
    let (notifier, mut notices) = Notifier::channel(16);
    let app = app(&authority, notifier);

    app.identity.handle_accounts_changed(&[addr(ALICE)]);
    settle().await;
    assert_eq!(app.progress.snapshot().completed_count(), 9);

    authority.set_progress_failure(Some(RemoteError::Transport("connection reset".into())));
    tokio::time::sleep(PERIOD).await;
    assert_eq!(app.progress.snapshot().completed_count(), 9);
    assert!(app.progress.is_active());

    let mut warned = false;
    while let Ok(notice) = notices.try_recv() {
        warned |= notice.level == NoticeLevel::Warn;
    }
    assert!(warned);

    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn unsupported_network_clears_progress() {
    let authority = Arc::new(MemoryRewardAuthority::new());
    authority.set_progress(&addr(ALICE), ProgressSnapshot::derive(30, 0, 10).unwrap());
    let app = app(&authority, Notifier::disabled());
    let wallet = LoopbackWallet::new(vec![ALICE.to_string()], ChainId::SEPOLIA);

    app.identity.connect(&wallet).await.unwrap();
    settle().await;
    assert_eq!(app.progress.snapshot().claimable_count(), 3);

    wallet.switch_chain("0x1");
    settle().await;
    assert_eq!(app.identity.current(), None);
    assert!(!app.progress.is_active());
    assert_eq!(app.progress.snapshot(), ProgressSnapshot::default());

    app.shutdown();
}
