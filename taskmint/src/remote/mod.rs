//! Boundaries to the two remote collaborators.
//!
//! Defines the [`TaskStore`] and [`RewardAuthority`] traits consumed by
//! the synchronization core. Concrete implementations:
//! - [`rest::RestTaskStore`] / [`rest::RestRewardAuthority`]: JSON over HTTP
//! - [`memory::MemoryTaskStore`] / [`memory::MemoryRewardAuthority`]: in-process, for tests

pub mod memory;
pub mod rest;

use taskmint_proto::claim::ClaimReceipt;
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;
use taskmint_proto::task::{NewTask, Task, TaskFilter, TaskId};

/// Errors returned by remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    #[error("request rejected ({status}): {detail}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// The server's `detail`, verbatim.
        detail: String,
    },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The request could not be delivered or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// An endpoint URL could not be built.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Text to show the user: the server's detail for rejections, a
    /// generic message otherwise.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { detail, .. } => detail.clone(),
            Self::Timeout => "The server took too long to respond".to_string(),
            Self::Transport(_) | Self::Decode(_) | Self::InvalidUrl(_) => {
                "Something went wrong talking to the server".to_string()
            }
        }
    }
}

impl From<taskmint_proto::codec::CodecError> for RemoteError {
    fn from(err: taskmint_proto::codec::CodecError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// CRUD façade over the remote task list.
///
/// Every method returns the resource as the store recorded it. The
/// store is the sole source of truth; callers hold transient copies.
pub trait TaskStore: Send + Sync {
    /// `GET /todos[?completed=bool]`.
    fn list(
        &self,
        filter: TaskFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    /// `POST /todos`.
    fn create(
        &self,
        task: &NewTask,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// `PATCH /todos/{id}` with the new completion flag.
    fn set_completed(
        &self,
        id: &TaskId,
        completed: bool,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// `PUT /todos/{id}` with new text.
    fn set_text(
        &self,
        id: &TaskId,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// `DELETE /todos/{id}`.
    fn delete(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;
}

/// The authority that tracks reward progress and mints rewards.
pub trait RewardAuthority: Send + Sync {
    /// `GET /nft-status/{address}`.
    fn progress(
        &self,
        address: &Address,
    ) -> impl std::future::Future<Output = Result<ProgressSnapshot, RemoteError>> + Send;

    /// `POST /claim-nft/{address}`. Not idempotent.
    fn claim(
        &self,
        address: &Address,
    ) -> impl std::future::Future<Output = Result<ClaimReceipt, RemoteError>> + Send;
}
