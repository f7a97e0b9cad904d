//! Application context and command parsing.
//!
//! [`App`] wires the identity tracker, progress poller, claim gate and
//! task coordinator together and owns the background task that keeps
//! the poller in step with identity changes. [`Command`] is the REPL's
//! line grammar.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use taskmint_proto::claim::ClaimReceipt;
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;
use taskmint_proto::task::{TaskFilter, TaskId};

use crate::claim::{ClaimError, ClaimGate};
use crate::config::ClientConfig;
use crate::identity::IdentityTracker;
use crate::notify::Notifier;
use crate::progress::ProgressPoller;
use crate::remote::{RewardAuthority, TaskStore};
use crate::tasks::TaskCoordinator;

/// Shared state holders for one session.
pub struct App<S: TaskStore, A: RewardAuthority> {
    /// Active account.
    pub identity: Arc<IdentityTracker>,
    /// Reward progress for the active account.
    pub progress: ProgressPoller<A>,
    /// Claim gating.
    pub claims: ClaimGate<A>,
    /// Cached task list.
    pub tasks: TaskCoordinator<S>,
    follower: JoinHandle<()>,
}

/// Point-in-time view for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Active account, if any.
    pub identity: Option<Address>,
    /// Latest reward progress.
    pub snapshot: ProgressSnapshot,
    /// When progress was last synced.
    pub last_synced: Option<DateTime<Utc>>,
    /// Whether a claim is outstanding.
    pub claim_pending: bool,
    /// Completed tasks in the cached list.
    pub completed_tasks: usize,
}

impl<S: TaskStore, A: RewardAuthority + 'static> App<S, A> {
    /// Builds the context and starts following identity changes.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<S>, authority: Arc<A>, config: &ClientConfig, notifier: Notifier) -> Self {
        let identity = Arc::new(IdentityTracker::new(config.chain_id, notifier.clone()));
        let progress = ProgressPoller::new(
            Arc::clone(&authority),
            config.poll_interval,
            identity.subscribe(),
            notifier.clone(),
        );
        let claims = ClaimGate::new(
            authority,
            progress.clone(),
            config.claim_timeout,
            notifier.clone(),
        );
        let tasks = TaskCoordinator::new(store, identity.subscribe(), notifier);
        let follower = progress.follow();

        Self {
            identity,
            progress,
            claims,
            tasks,
            follower,
        }
    }

    /// Claims a reward for the active account.
    ///
    /// # Errors
    ///
    /// See [`ClaimError`].
    pub async fn claim(&self) -> Result<ClaimReceipt, ClaimError> {
        let identity = self.identity.current();
        self.claims.attempt_claim(identity.as_ref()).await
    }

    #[must_use]
    pub fn status(&self) -> Status {
        let identity = self.identity.current();
        let claim_pending = identity
            .as_ref()
            .is_some_and(|id| self.claims.is_pending(id));
        Status {
            identity,
            snapshot: self.progress.snapshot(),
            last_synced: self.progress.last_synced(),
            claim_pending,
            completed_tasks: self.tasks.completed_count(),
        }
    }

    /// Stops polling and background listeners.
    pub fn shutdown(&self) {
        self.follower.abort();
        self.progress.stop();
        self.identity.shutdown();
        tracing::info!("session shut down");
    }
}

impl<S: TaskStore, A: RewardAuthority> Drop for App<S, A> {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `list [all|active|completed]`
    List(Option<TaskFilter>),
    /// `add <text>`
    Add(String),
    /// `toggle <id>`
    Toggle(TaskId),
    /// `edit <id> <text>`
    Edit(TaskId, String),
    /// `rm <id>`
    Remove(TaskId),
    /// `status`
    Status,
    /// `claim`
    Claim,
    /// `connect`
    Connect,
    /// `switch [address...]`; no addresses empties the account list.
    Switch(Vec<String>),
    /// `chain <id>`, decimal or `0x` hex.
    Chain(String),
    /// `disconnect`
    Disconnect,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// Errors from parsing a REPL line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    BadFilter(String),
}

impl Command {
    /// Parses one input line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for blank lines, unknown verbs and
    /// missing arguments.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        match verb {
            "" => Err(CommandError::Empty),
            "list" | "ls" => {
                if rest.is_empty() {
                    Ok(Self::List(None))
                } else {
                    rest.parse()
                        .map(|filter| Self::List(Some(filter)))
                        .map_err(CommandError::BadFilter)
                }
            }
            "add" => Ok(Self::Add(rest.to_string())),
            "toggle" | "done" => single_id(rest, "toggle <id>").map(Self::Toggle),
            "rm" | "delete" => single_id(rest, "rm <id>").map(Self::Remove),
            "edit" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage("edit <id> <text>"))?;
                Ok(Self::Edit(TaskId::new(id), text.to_string()))
            }
            "status" => Ok(Self::Status),
            "claim" => Ok(Self::Claim),
            "connect" => Ok(Self::Connect),
            "switch" => Ok(Self::Switch(
                rest.split_whitespace().map(str::to_string).collect(),
            )),
            "chain" if !rest.is_empty() => Ok(Self::Chain(rest.to_string())),
            "chain" => Err(CommandError::Usage("chain <id>")),
            "disconnect" => Ok(Self::Disconnect),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn single_id(rest: &str, usage: &'static str) -> Result<TaskId, CommandError> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [id] => Ok(TaskId::new(*id)),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// Help text for the REPL.
pub const HELP: &str = "\
commands:
  list [all|active|completed]   show your tasks
  add <text>                    create a task
  toggle <id>                   flip completion
  edit <id> <text>              change text
  rm <id>                       delete a task
  status                        reward progress
  claim                         claim the next reward
  connect                       connect the wallet
  switch [address...]           change wallet accounts
  chain <id>                    change wallet network
  disconnect                    forget the wallet
  quit                          exit";
