//! In-process implementations of the remote boundaries.
//!
//! Used by tests and offline runs. Both keep call counters and accept
//! injected failures and delays so that ordering and rollback behavior
//! can be exercised deterministically (delays use [`tokio::time`], so
//! they respect a paused test clock).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use taskmint_proto::claim::{ClaimReceipt, TxHash};
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;
use taskmint_proto::task::{NewTask, Task, TaskFilter, TaskId};

use super::{RemoteError, RewardAuthority, TaskStore};

fn server_error() -> RemoteError {
    RemoteError::Rejected {
        status: 500,
        detail: "Internal Server Error".to_string(),
    }
}

fn not_found() -> RemoteError {
    RemoteError::Rejected {
        status: 404,
        detail: "Todo not found".to_string(),
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Makes every subsequent call fail with a 500 until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every subsequent call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of calls received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current server-side contents.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Server-side copy of one task.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().iter().find(|t| t.id == *id).cloned()
    }

    /// Completed tasks owned by `owner`.
    pub fn completed_by(&self, owner: &Address) -> u64 {
        let count = self
            .tasks
            .lock()
            .iter()
            .filter(|t| t.owner == *owner && t.completed)
            .count();
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    /// Counts the call, waits out the configured delay, and reports
    /// whether it should fail.
    async fn enter(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        pause(delay).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }

    fn update<F: FnOnce(&mut Task)>(&self, id: &TaskId, f: F) -> Result<Task, RemoteError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.iter_mut().find(|t| t.id == *id).ok_or_else(not_found)?;
        f(task);
        Ok(task.clone())
    }
}

impl TaskStore for MemoryTaskStore {
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, RemoteError> {
        self.enter().await?;
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn create(&self, task: &NewTask) -> Result<Task, RemoteError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock();
        if tasks
            .iter()
            .any(|t| t.owner == task.owner && t.text == task.text)
        {
            return Err(RemoteError::Rejected {
                status: 400,
                detail: "Todo with this text already exists".to_string(),
            });
        }
        let created = Task {
            id: TaskId::new(Uuid::now_v7().to_string()),
            text: task.text.clone(),
            completed: false,
            owner: task.owner.clone(),
        };
        tasks.push(created.clone());
        Ok(created)
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, RemoteError> {
        self.enter().await?;
        self.update(id, |t| t.completed = completed)
    }

    async fn set_text(&self, id: &TaskId, text: &str) -> Result<Task, RemoteError> {
        self.enter().await?;
        self.update(id, |t| t.text = text.to_string())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.enter().await?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != *id);
        if tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

/// In-memory reward authority.
///
/// Claims succeed unless an outcome has been scripted with
/// [`script_claim`](Self::script_claim). A successful claim advances
/// the identity's `claimed_milestone` by one.
///
/// Built with [`tracking`](Self::tracking), completed counts are read
/// from a task store instead of the recorded snapshot.
#[derive(Debug, Default)]
pub struct MemoryRewardAuthority {
    progress: Mutex<HashMap<Address, ProgressSnapshot>>,
    ledger: Option<Arc<MemoryTaskStore>>,
    delays: Mutex<HashMap<Address, Duration>>,
    progress_failure: Mutex<Option<RemoteError>>,
    claim_script: Mutex<VecDeque<RemoteError>>,
    claim_delay: Mutex<Duration>,
    progress_calls: Mutex<HashMap<Address, usize>>,
    claim_calls: AtomicUsize,
    minted: AtomicU64,
}

impl MemoryRewardAuthority {
    /// Creates an authority with no recorded progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an authority that counts completed tasks in `store`.
    #[must_use]
    pub fn tracking(store: Arc<MemoryTaskStore>) -> Self {
        Self {
            ledger: Some(store),
            ..Self::default()
        }
    }

    /// Sets the snapshot reported for `address`.
    pub fn set_progress(&self, address: &Address, snapshot: ProgressSnapshot) {
        self.progress.lock().insert(address.clone(), snapshot);
    }

    /// Delays progress responses for `address`.
    pub fn set_progress_delay(&self, address: &Address, delay: Duration) {
        self.delays.lock().insert(address.clone(), delay);
    }

    /// Makes progress fetches fail with `error` (or succeed with `None`).
    pub fn set_progress_failure(&self, error: Option<RemoteError>) {
        *self.progress_failure.lock() = error;
    }

    /// Queues a failure for the next claim.
    pub fn script_claim(&self, error: RemoteError) {
        self.claim_script.lock().push_back(error);
    }

    /// Delays every claim by `delay`.
    pub fn set_claim_delay(&self, delay: Duration) {
        *self.claim_delay.lock() = delay;
    }

    /// Number of progress fetches received for `address`.
    pub fn progress_calls(&self, address: &Address) -> usize {
        self.progress_calls
            .lock()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Total progress fetches across all identities.
    pub fn total_progress_calls(&self) -> usize {
        self.progress_calls.lock().values().sum()
    }

    /// Number of claim requests received.
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    fn snapshot(&self, address: &Address) -> ProgressSnapshot {
        let recorded = self
            .progress
            .lock()
            .get(address)
            .copied()
            .unwrap_or_default();
        let Some(store) = &self.ledger else {
            return recorded;
        };
        ProgressSnapshot::derive(
            store.completed_by(address),
            recorded.claimed_milestone(),
            recorded.unit_size(),
        )
        .unwrap_or(recorded)
    }
}

impl RewardAuthority for MemoryRewardAuthority {
    async fn progress(&self, address: &Address) -> Result<ProgressSnapshot, RemoteError> {
        *self
            .progress_calls
            .lock()
            .entry(address.clone())
            .or_default() += 1;
        let delay = self.delays.lock().get(address).copied().unwrap_or_default();
        pause(delay).await;
        if let Some(err) = self.progress_failure.lock().clone() {
            return Err(err);
        }
        Ok(self.snapshot(address))
    }

    async fn claim(&self, address: &Address) -> Result<ClaimReceipt, RemoteError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.claim_delay.lock();
        pause(delay).await;
        if let Some(err) = self.claim_script.lock().pop_front() {
            return Err(err);
        }

        let current = self.snapshot(address);
        if !current.claim_available() {
            return Err(RemoteError::Rejected {
                status: 400,
                detail: "No reward available to claim".to_string(),
            });
        }
        let next = ProgressSnapshot::derive(
            current.completed_count(),
            current.claimed_milestone() + 1,
            current.unit_size(),
        )
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
        self.set_progress(address, next);

        let serial = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ClaimReceipt {
            transaction_hash: TxHash::new(format!("0x{serial:064x}")),
        })
    }
}
