//! Task list synchronization with optimistic completion toggles.

mod cache;
mod coordinator;

pub use cache::{LocalMutation, TaskCache};
pub use coordinator::TaskCoordinator;

use taskmint_proto::task::{TaskId, TextError};

use crate::remote::RemoteError;

/// Why a task operation did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The text failed validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] TextError),

    /// The owner already has a task with this text.
    #[error("a task with this text already exists")]
    Duplicate,

    /// No identity is connected.
    #[error("no wallet connected")]
    NoIdentity,

    /// The task belongs to another identity.
    #[error("task belongs to another account")]
    NotOwner,

    /// The task is not in the cached list.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Another mutation of this task is still in flight.
    #[error("task {0} is still being updated")]
    MutationPending(TaskId),

    /// The store refused or the request failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl TaskError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(err) => err.user_message(),
            Self::NoIdentity => "Connect your wallet to manage tasks".to_string(),
            other => {
                let text = other.to_string();
                let mut chars = text.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            }
        }
    }
}
