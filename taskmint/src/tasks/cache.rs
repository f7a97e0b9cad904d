//! Transient copy of the remote task list.

use std::collections::HashMap;

use taskmint_proto::identity::Address;
use taskmint_proto::task::{Task, TaskFilter, TaskId};

/// An applied-but-unconfirmed completion flip.
///
/// Must be resolved with [`TaskCache::commit`] or [`TaskCache::revert`].
#[derive(Debug)]
#[must_use = "an optimistic flip must be committed or reverted"]
pub struct LocalMutation {
    id: TaskId,
    before: bool,
    after: bool,
}

impl LocalMutation {
    /// The flipped task.
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// The value visible before the flip.
    pub const fn before(&self) -> bool {
        self.before
    }

    /// The value requested from the store.
    pub const fn after(&self) -> bool {
        self.after
    }
}

/// Cached tasks plus the optimistic deltas layered on them.
#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
    filter: TaskFilter,
    /// Optimistic completion values for tasks with a flip in flight.
    optimistic: HashMap<TaskId, bool>,
}

impl TaskCache {
    /// Replaces the cached list with a fresh, unfiltered listing and
    /// records `filter` as the current view.
    ///
    /// Tasks with a flip in flight keep their optimistic value; the
    /// listing may predate the store applying it.
    pub fn replace(&mut self, mut tasks: Vec<Task>, filter: TaskFilter) {
        for task in &mut tasks {
            if let Some(&pending) = self.optimistic.get(&task.id) {
                task.completed = pending;
            }
        }
        self.tasks = tasks;
        self.filter = filter;
    }

    /// The current view filter.
    pub const fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    /// Appends a task confirmed by the store.
    pub fn insert(&mut self, task: Task) {
        self.tasks.retain(|t| t.id != task.id);
        self.tasks.push(task);
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == *id)?;
        Some(self.tasks.remove(index))
    }

    /// Replaces a task's text with the stored value.
    pub fn set_text(&mut self, id: &TaskId, text: String) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == *id) {
            task.text = text;
        }
    }

    /// Flips `id`'s completion flag locally.
    ///
    /// Returns `None` if the task is not cached.
    pub fn begin_toggle(&mut self, id: &TaskId) -> Option<LocalMutation> {
        let task = self.tasks.iter_mut().find(|t| t.id == *id)?;
        let before = task.completed;
        let after = !before;
        task.completed = after;
        self.optimistic.insert(id.clone(), after);
        Some(LocalMutation {
            id: id.clone(),
            before,
            after,
        })
    }

    /// Accepts the flip as the confirmed state.
    pub fn commit(&mut self, mutation: LocalMutation) {
        self.optimistic.remove(&mutation.id);
    }

    /// Restores the value seen before the flip.
    pub fn revert(&mut self, mutation: LocalMutation) {
        self.optimistic.remove(&mutation.id);
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == mutation.id) {
            task.completed = mutation.before;
        }
    }

    /// Tasks owned by `owner` that match `filter`, in listing order.
    pub fn visible(&self, owner: &Address, filter: TaskFilter) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.is_owned_by(owner) && filter.matches(t))
            .cloned()
            .collect()
    }

    /// Whether `owner` already has a task with exactly `text`.
    pub fn has_text(&self, owner: &Address, text: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.is_owned_by(owner) && t.text.trim() == text)
    }

    pub fn completed_count(&self, owner: &Address) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.is_owned_by(owner) && t.completed)
            .count()
    }
}
