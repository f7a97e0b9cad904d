//! HTTP implementations of the remote boundaries.
//!
//! Both clients share one request path: build the endpoint with
//! [`url::Url`], send with [`reqwest`], read the whole body, and map
//! non-success statuses to [`RemoteError::Rejected`] carrying the
//! server's `detail`.

use std::time::Duration;

use url::Url;

use taskmint_proto::claim::ClaimReceipt;
use taskmint_proto::codec;
use taskmint_proto::error::ErrorBody;
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;
use taskmint_proto::task::{CompletionPatch, NewTask, Task, TaskFilter, TaskId, TextPatch};

use super::{RemoteError, RewardAuthority, TaskStore};

/// Builds an HTTP client with a whole-request timeout.
fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Transport(e.to_string()))
}

/// Parses a base URL such as `http://127.0.0.1:8000`.
fn parse_base(base_url: &str) -> Result<Url, RemoteError> {
    let base = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{base_url}: {e}")))?;
    if base.cannot_be_a_base() {
        return Err(RemoteError::InvalidUrl(base_url.to_string()));
    }
    Ok(base)
}

/// Appends path segments to `base`, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| RemoteError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_transport(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Transport(err.to_string())
    }
}

/// Sends a request and returns the body of a successful response.
async fn execute(request: reqwest::RequestBuilder) -> Result<Vec<u8>, RemoteError> {
    let response = request.send().await.map_err(|e| map_transport(&e))?;
    let status = response.status();
    let body = response.bytes().await.map_err(|e| map_transport(&e))?;

    if status.is_success() {
        return Ok(body.to_vec());
    }

    let detail = codec::decode::<ErrorBody>(&body).map_or_else(
        |_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        },
        |b| b.message(),
    );
    tracing::debug!(status = status.as_u16(), detail = %detail, "request rejected");
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

/// Task store client for `{base}/todos`.
#[derive(Debug, Clone)]
pub struct RestTaskStore {
    client: reqwest::Client,
    base: Url,
}

impl RestTaskStore {
    /// Creates a client for the task store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if `base_url` is not an
    /// absolute URL, or [`RemoteError::Transport`] if the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            base: parse_base(base_url)?,
        })
    }

    fn todos(&self, id: Option<&TaskId>) -> Result<Url, RemoteError> {
        match id {
            Some(id) => endpoint(&self.base, &["todos", id.as_str()]),
            None => endpoint(&self.base, &["todos"]),
        }
    }
}

impl TaskStore for RestTaskStore {
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, RemoteError> {
        let mut url = self.todos(None)?;
        if let Some(completed) = filter.completed_param() {
            url.query_pairs_mut()
                .append_pair("completed", if completed { "true" } else { "false" });
        }
        tracing::debug!(%url, "listing tasks");
        let body = execute(self.client.get(url)).await?;
        Ok(codec::decode(&body)?)
    }

    async fn create(&self, task: &NewTask) -> Result<Task, RemoteError> {
        let url = self.todos(None)?;
        let body = execute(self.client.post(url).json(task)).await?;
        Ok(codec::decode(&body)?)
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, RemoteError> {
        let url = self.todos(Some(id))?;
        let body = execute(self.client.patch(url).json(&CompletionPatch { completed })).await?;
        Ok(codec::decode(&body)?)
    }

    async fn set_text(&self, id: &TaskId, text: &str) -> Result<Task, RemoteError> {
        let url = self.todos(Some(id))?;
        let patch = TextPatch {
            text: text.to_string(),
        };
        let body = execute(self.client.put(url).json(&patch)).await?;
        Ok(codec::decode(&body)?)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        let url = self.todos(Some(id))?;
        execute(self.client.delete(url)).await?;
        Ok(())
    }
}

/// Reward authority client for `{base}/nft-status` and `{base}/claim-nft`.
#[derive(Debug, Clone)]
pub struct RestRewardAuthority {
    client: reqwest::Client,
    base: Url,
}

impl RestRewardAuthority {
    /// Creates a client for the reward authority at `base_url`.
    ///
    /// # Errors
    ///
    /// Same as [`RestTaskStore::new`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            base: parse_base(base_url)?,
        })
    }
}

impl RewardAuthority for RestRewardAuthority {
    async fn progress(&self, address: &Address) -> Result<ProgressSnapshot, RemoteError> {
        let url = endpoint(&self.base, &["nft-status", address.as_str()])?;
        let body = execute(self.client.get(url)).await?;
        Ok(codec::decode(&body)?)
    }

    async fn claim(&self, address: &Address) -> Result<ClaimReceipt, RemoteError> {
        let url = endpoint(&self.base, &["claim-nft", address.as_str()])?;
        let body = execute(self.client.post(url)).await?;
        Ok(codec::decode(&body)?)
    }
}
