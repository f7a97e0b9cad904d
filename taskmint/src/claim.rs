//! Reward claim gating.
//!
//! [`can_claim`] decides eligibility from a snapshot. [`ClaimGate`]
//! re-checks eligibility against the poller's latest snapshot at call
//! time, allows one outstanding claim per identity, and triggers a
//! single out-of-band progress refresh after a successful claim.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use taskmint_proto::claim::ClaimReceipt;
use taskmint_proto::identity::Address;
use taskmint_proto::progress::ProgressSnapshot;

use crate::inflight::InFlight;
use crate::notify::Notifier;
use crate::progress::ProgressPoller;
use crate::remote::{RemoteError, RewardAuthority};

/// Default upper bound on a single claim round trip.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(120);

/// Whether `snapshot` permits a claim.
#[must_use]
pub const fn can_claim(snapshot: &ProgressSnapshot) -> bool {
    snapshot.claim_available()
}

/// Why a claim did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// No identity is connected.
    #[error("no wallet connected")]
    NoIdentity,

    /// The latest snapshot shows nothing claimable.
    #[error("not eligible yet: {remaining} more tasks to complete")]
    NotEligible {
        /// Tasks left until the next milestone.
        remaining: u64,
    },

    /// A claim for this identity is already outstanding.
    #[error("a claim is already in progress")]
    AlreadyPending,

    /// The user declined the request in their wallet.
    #[error("claim rejected in wallet")]
    UserRejected,

    /// The account is not allowed to mint.
    #[error("account is not authorized to claim")]
    NotAuthorized,

    /// The claim did not complete in time.
    #[error("claim timed out")]
    Timeout,

    /// The authority refused the claim.
    #[error("claim rejected: {detail}")]
    Rejected {
        /// The authority's detail, verbatim.
        detail: String,
    },

    /// Anything else.
    #[error("claim failed: {0}")]
    Unknown(String),
}

impl ClaimError {
    /// Maps a remote failure onto the claim taxonomy.
    #[must_use]
    pub fn classify(err: RemoteError) -> Self {
        match err {
            RemoteError::Timeout => Self::Timeout,
            RemoteError::Rejected { status, detail } => {
                let lowered = detail.to_lowercase();
                if detail.contains("ACTION_REJECTED") || lowered.contains("user rejected") {
                    Self::UserRejected
                } else if status == 401
                    || status == 403
                    || lowered.contains("caller is not the owner")
                {
                    Self::NotAuthorized
                } else {
                    Self::Rejected { detail }
                }
            }
            RemoteError::Transport(msg) | RemoteError::Decode(msg) | RemoteError::InvalidUrl(msg) => {
                Self::Unknown(msg)
            }
        }
    }

    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoIdentity => "Connect your wallet first".to_string(),
            Self::NotEligible { remaining } => {
                format!("Complete {remaining} more tasks to earn a reward")
            }
            Self::AlreadyPending => "A claim is already in progress".to_string(),
            Self::UserRejected => "The transaction was rejected in your wallet".to_string(),
            Self::NotAuthorized => {
                "This account is not allowed to claim rewards".to_string()
            }
            Self::Timeout => "The claim took too long; check your progress before retrying".to_string(),
            Self::Rejected { detail } => detail.clone(),
            Self::Unknown(_) => "Could not claim the reward".to_string(),
        }
    }
}

/// Gates claims behind the poller's reconciled snapshot.
pub struct ClaimGate<A: RewardAuthority> {
    authority: Arc<A>,
    poller: ProgressPoller<A>,
    pending: InFlight<Address>,
    timeout: Duration,
    notifier: Notifier,
}

impl<A: RewardAuthority + 'static> ClaimGate<A> {
    /// Creates a gate reading eligibility from `poller`.
    ///
    /// Each claim round trip is bounded by `timeout`.
    #[must_use]
    pub fn new(
        authority: Arc<A>,
        poller: ProgressPoller<A>,
        timeout: Duration,
        notifier: Notifier,
    ) -> Self {
        Self {
            authority,
            poller,
            pending: InFlight::new(),
            timeout,
            notifier,
        }
    }

    /// Whether the current snapshot permits a claim.
    #[must_use]
    pub fn can_claim(&self) -> bool {
        can_claim(&self.poller.snapshot())
    }

    /// Whether a claim for `identity` is outstanding.
    #[must_use]
    pub fn is_pending(&self, identity: &Address) -> bool {
        self.pending.contains(identity)
    }

    /// Claims the next reward for `identity`.
    ///
    /// Local preconditions fail without a network call. On success the
    /// poller is refreshed once before the receipt is returned; on
    /// failure the snapshot is left untouched.
    ///
    /// # Errors
    ///
    /// See [`ClaimError`].
    pub async fn attempt_claim(&self, identity: Option<&Address>) -> Result<ClaimReceipt, ClaimError> {
        let identity = identity.ok_or(ClaimError::NoIdentity)?;

        let snapshot = self.poller.snapshot_for(identity).unwrap_or_default();
        if !can_claim(&snapshot) {
            return Err(ClaimError::NotEligible {
                remaining: snapshot.tasks_until_next(),
            });
        }

        let Some(_marker) = self.pending.try_acquire(identity) else {
            tracing::debug!(identity = %identity, "claim already outstanding");
            return Err(ClaimError::AlreadyPending);
        };

        let attempt = Uuid::now_v7();
        let span = tracing::info_span!("claim", %attempt, identity = %identity);
        self.submit(identity).instrument(span).await
    }

    async fn submit(&self, identity: &Address) -> Result<ClaimReceipt, ClaimError> {
        tracing::info!("submitting claim");
        let outcome = match tokio::time::timeout(self.timeout, self.authority.claim(identity)).await {
            Ok(result) => result.map_err(ClaimError::classify),
            Err(_) => Err(ClaimError::Timeout),
        };

        match outcome {
            Ok(receipt) => {
                tracing::info!(tx = %receipt.transaction_hash, "claim confirmed");
                self.notifier.success(format!(
                    "Reward claimed! Transaction {}",
                    receipt.transaction_hash
                ));
                self.poller.refresh_now().await;
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(error = %err, "claim failed");
                match err {
                    ClaimError::UserRejected => self.notifier.warn(err.user_message()),
                    _ => self.notifier.error(err.user_message()),
                }
                Err(err)
            }
        }
    }
}
