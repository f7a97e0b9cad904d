//! Reward progress as reported by the reward authority.
//!
//! A [`ProgressSnapshot`] is authority-sourced: the client never
//! advances it locally. `claim_available` is always derived from
//! `claimable_count` and cannot be set independently.

use serde::{Deserialize, Serialize};

/// Tasks required per reward when nothing else is known.
pub const DEFAULT_UNIT_SIZE: u64 = 10;

/// Errors raised when a snapshot would violate its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// `unit_size` must be positive.
    #[error("unit size must be positive")]
    ZeroUnitSize,
}

/// Wire form of `GET /nft-status/{address}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotWire {
    completed_count: u64,
    claimed_milestone: u64,
    unit_size: u64,
    claimable_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claim_available: Option<bool>,
}

/// Reward progress for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotWire", into = "SnapshotWire")]
pub struct ProgressSnapshot {
    completed_count: u64,
    claimed_milestone: u64,
    unit_size: u64,
    claimable_count: u64,
    claim_available: bool,
}

impl ProgressSnapshot {
    /// Builds a snapshot from authority-reported counters.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ZeroUnitSize`] if `unit_size` is zero.
    pub const fn new(
        completed_count: u64,
        claimed_milestone: u64,
        unit_size: u64,
        claimable_count: u64,
    ) -> Result<Self, SnapshotError> {
        if unit_size == 0 {
            return Err(SnapshotError::ZeroUnitSize);
        }
        Ok(Self {
            completed_count,
            claimed_milestone,
            unit_size,
            claimable_count,
            claim_available: claimable_count > 0,
        })
    }

    /// Builds a snapshot whose claimable count is computed from the
    /// other counters: every full unit of completed tasks earns one
    /// reward, minus rewards already claimed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ZeroUnitSize`] if `unit_size` is zero.
    pub const fn derive(
        completed_count: u64,
        claimed_milestone: u64,
        unit_size: u64,
    ) -> Result<Self, SnapshotError> {
        if unit_size == 0 {
            return Err(SnapshotError::ZeroUnitSize);
        }
        let earned = completed_count / unit_size;
        Self::new(
            completed_count,
            claimed_milestone,
            unit_size,
            earned.saturating_sub(claimed_milestone),
        )
    }

    /// Number of completed tasks.
    #[must_use]
    pub const fn completed_count(&self) -> u64 {
        self.completed_count
    }

    /// Number of rewards already claimed.
    #[must_use]
    pub const fn claimed_milestone(&self) -> u64 {
        self.claimed_milestone
    }

    /// Tasks required per reward. Always positive.
    #[must_use]
    pub const fn unit_size(&self) -> u64 {
        self.unit_size
    }

    /// Rewards currently claimable.
    #[must_use]
    pub const fn claimable_count(&self) -> u64 {
        self.claimable_count
    }

    /// Whether a claim may be attempted now.
    #[must_use]
    pub const fn claim_available(&self) -> bool {
        self.claim_available
    }

    /// Tasks left before the next milestone, in `1..=unit_size`.
    #[must_use]
    pub const fn tasks_until_next(&self) -> u64 {
        self.unit_size - self.completed_count % self.unit_size
    }

    /// Progress towards the next milestone, in `[0, 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_fraction(&self) -> f64 {
        (self.completed_count % self.unit_size) as f64 / self.unit_size as f64
    }

    /// Completed-task count at which the next milestone is reached.
    #[must_use]
    pub const fn next_milestone(&self) -> u64 {
        self.completed_count + self.tasks_until_next()
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            completed_count: 0,
            claimed_milestone: 0,
            unit_size: DEFAULT_UNIT_SIZE,
            claimable_count: 0,
            claim_available: false,
        }
    }
}

impl TryFrom<SnapshotWire> for ProgressSnapshot {
    type Error = SnapshotError;

    fn try_from(wire: SnapshotWire) -> Result<Self, Self::Error> {
        Self::new(
            wire.completed_count,
            wire.claimed_milestone,
            wire.unit_size,
            wire.claimable_count,
        )
    }
}

impl From<ProgressSnapshot> for SnapshotWire {
    fn from(s: ProgressSnapshot) -> Self {
        Self {
            completed_count: s.completed_count,
            claimed_milestone: s.claimed_milestone,
            unit_size: s.unit_size,
            claimable_count: s.claimable_count,
            claim_available: Some(s.claim_available),
        }
    }
}
