use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use taskmint_proto::identity::Address;
use taskmint_proto::task::{NewTask, Task, TaskFilter, TaskId, validate_task_text};

use super::TaskError;
use super::cache::{LocalMutation, TaskCache};
use crate::inflight::InFlight;
use crate::notify::Notifier;
use crate::remote::TaskStore;

/// Owns the cached task list and serializes mutations per task.
///
/// Completion toggles are optimistic: the flip is visible as soon as
/// [`toggle_completion`](Self::toggle_completion) starts and is undone
/// if the store rejects it. Creates, edits and deletes are applied once
/// the store confirms them. Successful mutations never re-fetch the
/// list, so other pending flips are not clobbered.
pub struct TaskCoordinator<S: TaskStore> {
    store: Arc<S>,
    identity: watch::Receiver<Option<Address>>,
    cache: Mutex<TaskCache>,
    pending: InFlight<TaskId>,
    notifier: Notifier,
}

/// An optimistic flip that reverts itself unless committed.
///
/// Dropping the toggle future mid-flight drops this guard, so an
/// abandoned flip never outlives its request.
struct PendingFlip<'a> {
    cache: &'a Mutex<TaskCache>,
    mutation: Option<LocalMutation>,
}

impl PendingFlip<'_> {
    /// Accepts the flip and returns the cached task.
    fn commit(mut self, id: &TaskId) -> Option<Task> {
        let mut cache = self.cache.lock();
        if let Some(mutation) = self.mutation.take() {
            cache.commit(mutation);
        }
        cache.get(id).cloned()
    }

    fn revert(mut self) {
        if let Some(mutation) = self.mutation.take() {
            self.cache.lock().revert(mutation);
        }
    }
}

impl Drop for PendingFlip<'_> {
    fn drop(&mut self) {
        if let Some(mutation) = self.mutation.take() {
            tracing::debug!(id = %mutation.id(), "toggle abandoned, reverting");
            self.cache.lock().revert(mutation);
        }
    }
}

impl<S: TaskStore> TaskCoordinator<S> {
    /// Creates a coordinator with an empty cache.
    ///
    /// `identity` decides ownership; call [`refresh`](Self::refresh)
    /// to populate the cache.
    #[must_use]
    pub fn new(store: Arc<S>, identity: watch::Receiver<Option<Address>>, notifier: Notifier) -> Self {
        Self {
            store,
            identity,
            cache: Mutex::new(TaskCache::default()),
            pending: InFlight::new(),
            notifier,
        }
    }

    fn owner(&self) -> Result<Address, TaskError> {
        self.identity.borrow().clone().ok_or(TaskError::NoIdentity)
    }

    /// Checks that `id` is cached and owned by the active identity.
    fn owned(&self, id: &TaskId) -> Result<(Address, Task), TaskError> {
        let owner = self.owner()?;
        let task = self
            .cache
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        if !task.is_owned_by(&owner) {
            return Err(TaskError::NotOwner);
        }
        Ok((owner, task))
    }

    /// Re-lists tasks from the store and makes `filter` the current view.
    ///
    /// The full list is always cached so that duplicate checks see
    /// every task; `filter` is applied locally. Returns the number of
    /// listed tasks matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the listing fails; the cache is
    /// left as it was.
    pub async fn refresh(&self, filter: TaskFilter) -> Result<usize, TaskError> {
        match self.store.list(TaskFilter::All).await {
            Ok(tasks) => {
                let count = tasks.iter().filter(|t| filter.matches(t)).count();
                self.cache.lock().replace(tasks, filter);
                tracing::debug!(count, %filter, "task list refreshed");
                Ok(count)
            }
            Err(err) => {
                tracing::warn!(error = %err, "task listing failed");
                self.notifier.error("Could not load tasks");
                Err(err.into())
            }
        }
    }

    /// Creates a task for the active identity.
    ///
    /// # Errors
    ///
    /// Local checks (`NoIdentity`, `Validation`, `Duplicate`) fail
    /// without a network call.
    pub async fn create(&self, text: &str) -> Result<Task, TaskError> {
        let owner = self.owner()?;
        let text = validate_task_text(text)?;
        if self.cache.lock().has_text(&owner, &text) {
            return Err(TaskError::Duplicate);
        }

        let request = NewTask { text, owner };
        match self.store.create(&request).await {
            Ok(task) => {
                tracing::info!(id = %task.id, "task created");
                self.cache.lock().insert(task.clone());
                self.notifier.success("Task added");
                Ok(task)
            }
            Err(err) => {
                tracing::warn!(error = %err, "task create failed");
                self.notifier.error(err.user_message());
                Err(err.into())
            }
        }
    }

    /// Flips a task's completion flag, optimistically.
    ///
    /// The local flip happens before the first await. On failure the
    /// task is restored to its exact pre-toggle value, and so it is if
    /// the returned future is dropped before the store answers.
    ///
    /// # Errors
    ///
    /// `NoIdentity`, `NotFound`, `NotOwner` and `MutationPending` fail
    /// without touching the cache or the network.
    pub async fn toggle_completion(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.owned(id)?;
        let Some(_marker) = self.pending.try_acquire(id) else {
            return Err(TaskError::MutationPending(id.clone()));
        };

        let mutation = self
            .cache
            .lock()
            .begin_toggle(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        let target = mutation.after();
        let flip = PendingFlip {
            cache: &self.cache,
            mutation: Some(mutation),
        };
        tracing::debug!(id = %id, completed = target, "toggle applied locally");

        match self.store.set_completed(id, target).await {
            Ok(confirmed) => {
                let task = flip.commit(id).unwrap_or(confirmed);
                self.notifier.info("Task status updated");
                Ok(task)
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "toggle failed, reverting");
                flip.revert();
                self.notifier
                    .error(format!("Could not update task: {}", err.user_message()));
                Err(err.into())
            }
        }
    }

    /// Replaces a task's text.
    ///
    /// Text equal to the current value after trimming is a no-op and
    /// returns the cached task without a network call.
    ///
    /// # Errors
    ///
    /// `NoIdentity`, `NotFound`, `NotOwner`, `Validation` and
    /// `MutationPending` fail without a network call.
    pub async fn edit_text(&self, id: &TaskId, text: &str) -> Result<Task, TaskError> {
        let (_, current) = self.owned(id)?;
        let text = validate_task_text(text)?;
        if text == current.text.trim() {
            return Ok(current);
        }
        let Some(_marker) = self.pending.try_acquire(id) else {
            return Err(TaskError::MutationPending(id.clone()));
        };

        match self.store.set_text(id, &text).await {
            Ok(stored) => {
                let mut cache = self.cache.lock();
                cache.set_text(id, stored.text);
                let task = cache.get(id).cloned();
                drop(cache);
                self.notifier.success("Task edited");
                task.ok_or_else(|| TaskError::NotFound(id.clone()))
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "edit failed");
                self.notifier
                    .error(format!("Could not edit task: {}", err.user_message()));
                Err(err.into())
            }
        }
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// `NoIdentity`, `NotFound`, `NotOwner` and `MutationPending` fail
    /// without a network call.
    pub async fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.owned(id)?;
        let Some(_marker) = self.pending.try_acquire(id) else {
            return Err(TaskError::MutationPending(id.clone()));
        };

        match self.store.delete(id).await {
            Ok(()) => {
                self.cache.lock().remove(id);
                tracing::info!(id = %id, "task deleted");
                self.notifier.success("Task deleted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "delete failed");
                self.notifier.error(err.user_message());
                Err(err.into())
            }
        }
    }

    /// Tasks visible to the active identity under `filter`.
    #[must_use]
    pub fn tasks(&self, filter: TaskFilter) -> Vec<Task> {
        match self.identity.borrow().as_ref() {
            Some(owner) => self.cache.lock().visible(owner, filter),
            None => Vec::new(),
        }
    }

    /// Completed tasks of the active identity in the cached list.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        match self.identity.borrow().as_ref() {
            Some(owner) => self.cache.lock().completed_count(owner),
            None => 0,
        }
    }

    /// View filter set by the last successful refresh.
    #[must_use]
    pub fn filter(&self) -> TaskFilter {
        self.cache.lock().filter()
    }

    /// Whether a mutation of `id` is in flight.
    #[must_use]
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.pending.contains(id)
    }
}
