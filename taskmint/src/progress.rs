//! Reward-progress polling for the active identity.
//!
//! [`ProgressPoller`] is an explicit `Idle -> Active -> Idle` state
//! machine. While active it fetches the identity's snapshot immediately
//! and then once per period. At most one polling cycle exists: starting
//! a new one aborts the previous cycle before scheduling.
//!
//! Every fetch carries a ticket (identity, epoch, issue sequence). A
//! result is applied only if the epoch is unchanged, the identity is
//! still the active one, and no later-issued fetch has been applied.
//! Late responses for a superseded identity are dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;

use crate::notify::Notifier;
use crate::remote::{RemoteError, RewardAuthority};

/// Reference polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Shortest period a cycle will run with; `interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// What happened to a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The snapshot replaced the current one.
    Applied(ProgressSnapshot),
    /// The fetch failed; the previous snapshot was kept.
    Failed(RemoteError),
    /// The result arrived for a superseded cycle or identity.
    Discarded,
    /// The poller was idle; nothing was fetched.
    Idle,
}

enum Phase {
    Idle,
    Active {
        identity: Address,
        cycle: JoinHandle<()>,
    },
}

struct PollerState {
    phase: Phase,
    /// Incremented on every start and stop.
    epoch: u64,
    /// Sequence number of the most recently issued fetch.
    issued: u64,
    /// Sequence number of the most recently applied fetch.
    applied: u64,
    synced_at: Option<DateTime<Utc>>,
}

struct PollerInner<A: RewardAuthority> {
    authority: Arc<A>,
    period: Duration,
    identity: watch::Receiver<Option<Address>>,
    state: Mutex<PollerState>,
    snapshot_tx: watch::Sender<ProgressSnapshot>,
    notifier: Notifier,
}

impl<A: RewardAuthority> Drop for PollerInner<A> {
    fn drop(&mut self) {
        if let Phase::Active { cycle, .. } = &self.state.get_mut().phase {
            cycle.abort();
        }
    }
}

/// Polls the reward authority for the active identity's progress.
pub struct ProgressPoller<A: RewardAuthority> {
    inner: Arc<PollerInner<A>>,
}

impl<A: RewardAuthority> Clone for ProgressPoller<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: RewardAuthority + 'static> ProgressPoller<A> {
    /// Creates an idle poller.
    ///
    /// `identity` is the identity tracker's view; results are applied
    /// only while it still names the identity they were fetched for.
    /// A zero `period` is raised to one millisecond.
    #[must_use]
    pub fn new(
        authority: Arc<A>,
        period: Duration,
        identity: watch::Receiver<Option<Address>>,
        notifier: Notifier,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            inner: Arc::new(PollerInner {
                authority,
                period: period.max(MIN_POLL_INTERVAL),
                identity,
                state: Mutex::new(PollerState {
                    phase: Phase::Idle,
                    epoch: 0,
                    issued: 0,
                    applied: 0,
                    synced_at: None,
                }),
                snapshot_tx,
                notifier,
            }),
        }
    }

    /// Starts polling for `identity`, replacing any running cycle.
    ///
    /// The first fetch is issued immediately. If the identity differs
    /// from the previous cycle's, the snapshot is reset first so that
    /// no data from the previous identity stays visible.
    pub fn start(&self, identity: Address) {
        let mut state = self.inner.state.lock();
        let previous = match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Active { identity, cycle } => {
                cycle.abort();
                Some(identity)
            }
            Phase::Idle => None,
        };
        state.epoch += 1;
        let epoch = state.epoch;

        if previous.as_ref() != Some(&identity) {
            state.synced_at = None;
            self.inner.snapshot_tx.send_replace(ProgressSnapshot::default());
        }

        let cycle = tokio::spawn(run_cycle(
            Arc::downgrade(&self.inner),
            identity.clone(),
            epoch,
            self.inner.period,
        ));
        tracing::info!(identity = %identity, epoch, "progress polling started");
        state.phase = Phase::Active { identity, cycle };
    }

    /// Stops polling and resets the snapshot to its zero value.
    ///
    /// Results of fetches already in flight are discarded on arrival.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if let Phase::Active { identity, cycle } = std::mem::replace(&mut state.phase, Phase::Idle) {
            cycle.abort();
            tracing::info!(identity = %identity, "progress polling stopped");
        }
        state.epoch += 1;
        state.synced_at = None;
        self.inner.snapshot_tx.send_replace(ProgressSnapshot::default());
    }

    /// Fetches once for the active identity, outside the schedule.
    pub async fn refresh_now(&self) -> FetchOutcome {
        let target = {
            let state = self.inner.state.lock();
            match &state.phase {
                Phase::Active { identity, .. } => Some((identity.clone(), state.epoch)),
                Phase::Idle => None,
            }
        };
        match target {
            Some((identity, epoch)) => self.inner.fetch(&identity, epoch).await,
            None => FetchOutcome::Idle,
        }
    }

    /// Follows identity transitions: starts on set or change, stops on clear.
    ///
    /// The returned task ends when the identity source closes or the
    /// poller is dropped.
    #[must_use]
    pub fn follow(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut rx = self.inner.identity.clone();
        tokio::spawn(async move {
            loop {
                let current = rx.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let poller = Self { inner };
                match current {
                    Some(identity) if poller.active_identity().as_ref() != Some(&identity) => {
                        poller.start(identity);
                    }
                    None if poller.is_active() => poller.stop(),
                    _ => {}
                }
                drop(poller);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// The current snapshot (zero value while idle).
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.inner.snapshot_tx.borrow()
    }

    /// The current snapshot, if it belongs to `identity`.
    #[must_use]
    pub fn snapshot_for(&self, identity: &Address) -> Option<ProgressSnapshot> {
        (self.active_identity().as_ref() == Some(identity)).then(|| self.snapshot())
    }

    /// Subscribes to snapshot replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// When the current snapshot was last replaced by a fetch.
    #[must_use]
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().synced_at
    }

    /// The identity being polled, if active.
    #[must_use]
    pub fn active_identity(&self) -> Option<Address> {
        match &self.inner.state.lock().phase {
            Phase::Active { identity, .. } => Some(identity.clone()),
            Phase::Idle => None,
        }
    }

    /// Whether a polling cycle is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.inner.state.lock().phase, Phase::Active { .. })
    }
}

/// Body of a polling cycle: tick, fetch, repeat.
async fn run_cycle<A: RewardAuthority + 'static>(
    inner: Weak<PollerInner<A>>,
    identity: Address,
    epoch: u64,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.fetch(&identity, epoch).await;
        if inner.state.lock().epoch != epoch {
            break;
        }
    }
}

impl<A: RewardAuthority> PollerInner<A> {
    async fn fetch(&self, identity: &Address, epoch: u64) -> FetchOutcome {
        let Some(seq) = self.issue(epoch) else {
            return FetchOutcome::Discarded;
        };
        tracing::debug!(identity = %identity, epoch, seq, "fetching progress");
        let result = self.authority.progress(identity).await;
        self.apply(identity, epoch, seq, result)
    }

    fn issue(&self, epoch: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return None;
        }
        state.issued += 1;
        Some(state.issued)
    }

    fn apply(
        &self,
        identity: &Address,
        epoch: u64,
        seq: u64,
        result: Result<ProgressSnapshot, RemoteError>,
    ) -> FetchOutcome {
        let mut state = self.state.lock();
        let still_current = state.epoch == epoch
            && matches!(&state.phase, Phase::Active { identity: active, .. } if active == identity)
            && self.identity.borrow().as_ref() == Some(identity);
        if !still_current {
            tracing::debug!(identity = %identity, epoch, seq, "discarding progress for superseded identity");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                if seq <= state.applied {
                    tracing::debug!(seq, applied = state.applied, "discarding out-of-order progress");
                    return FetchOutcome::Discarded;
                }
                state.applied = seq;
                state.synced_at = Some(Utc::now());
                self.snapshot_tx.send_replace(snapshot);
                tracing::debug!(
                    identity = %identity,
                    completed = snapshot.completed_count(),
                    claimable = snapshot.claimable_count(),
                    "progress applied"
                );
                FetchOutcome::Applied(snapshot)
            }
            Err(err) => {
                tracing::warn!(identity = %identity, error = %err, "progress fetch failed, keeping last snapshot");
                self.notifier
                    .warn(format!("Could not refresh reward progress: {}", err.user_message()));
                FetchOutcome::Failed(err)
            }
        }
    }
}
