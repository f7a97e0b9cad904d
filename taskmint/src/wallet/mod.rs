//! Wallet provider boundary.
//!
//! The wallet extension itself is an external collaborator. This module
//! defines the narrow surface the [`IdentityTracker`] consumes: an
//! account request, the current network, and a stream of raw
//! notifications.
//!
//! [`IdentityTracker`]: crate::identity::IdentityTracker

pub mod loopback;

use tokio::sync::mpsc;

use taskmint_proto::identity::ChainId;

/// Raw notifications from the wallet provider.
///
/// Payloads are kept as the provider sends them; the identity tracker
/// parses and validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The exposed account list changed. Empty means disconnected.
    AccountsChanged(Vec<String>),
    /// The active network changed. Carries the hex chain id.
    ChainChanged(String),
}

/// Errors reported by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// No wallet provider is installed.
    #[error("no wallet provider detected")]
    Unavailable,

    /// The user declined the request.
    #[error("request rejected by the user")]
    Rejected,

    /// Any other provider failure.
    #[error("wallet provider error: {0}")]
    Provider(String),
}

/// The operations the identity tracker needs from a wallet.
pub trait WalletProvider: Send + Sync {
    /// Asks the user to expose their accounts; returns them primary first.
    fn request_accounts(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, WalletError>> + Send;

    /// Returns the network the wallet is currently connected to.
    fn chain_id(&self) -> impl std::future::Future<Output = Result<ChainId, WalletError>> + Send;

    /// Registers a listener for account and network notifications.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Unavailable`] if no provider is installed.
    fn subscribe(&self) -> Result<mpsc::Receiver<WalletEvent>, WalletError>;
}
