//! Identity tracking for the active wallet account.
//!
//! [`IdentityTracker`] owns the single active identity and translates
//! wallet notifications into identity transitions. Subscribers (the
//! progress poller, the task coordinator) observe the identity through
//! a [`watch`] channel; every set, change or clear is a restart signal.
//!
//! Duplicate notifications that leave the identity unchanged do not
//! wake subscribers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use taskmint_proto::identity::{Address, AddressError, ChainId};

use crate::notify::Notifier;
use crate::wallet::{WalletError, WalletEvent, WalletProvider};

/// Errors that can occur while connecting a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// No wallet provider is installed.
    #[error("no wallet detected, install one to use rewards")]
    WalletUnavailable,

    /// The user declined to expose their accounts.
    #[error("wallet access was not granted")]
    AccessDenied,

    /// The wallet granted access but exposed no accounts.
    #[error("wallet exposed no accounts")]
    NoAccounts,

    /// The wallet is connected to a network rewards are not minted on.
    #[error("wallet is on {found}, switch to {expected}")]
    UnsupportedNetwork {
        /// The network the wallet reported.
        found: String,
        /// The supported network.
        expected: String,
    },

    /// The wallet reported an account in an unexpected format.
    #[error("wallet reported an invalid account: {0}")]
    InvalidAccount(#[from] AddressError),

    /// Any other provider failure.
    #[error("wallet error: {0}")]
    Wallet(String),
}

impl From<WalletError> for IdentityError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unavailable => Self::WalletUnavailable,
            WalletError::Rejected => Self::AccessDenied,
            WalletError::Provider(msg) => Self::Wallet(msg),
        }
    }
}

/// Outcome of an identity update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    /// The update matched the current identity.
    Unchanged,
    /// An identity became active where there was none.
    Set(Address),
    /// The active identity switched accounts.
    Changed {
        /// Previous identity.
        from: Address,
        /// New identity.
        to: Address,
    },
    /// The active identity was cleared.
    Cleared(Address),
}

/// Owner of the active identity.
pub struct IdentityTracker {
    /// The single network rewards are minted on.
    supported_chain: ChainId,
    /// Active identity; `None` while disconnected.
    identity_tx: watch::Sender<Option<Address>>,
    /// Bumped whenever signer/contract handles must be rebuilt.
    signer_tx: watch::Sender<u64>,
    /// Wallet event listener, registered at most once.
    listener: Mutex<Option<JoinHandle<()>>>,
    notifier: Notifier,
}

impl IdentityTracker {
    /// Creates a tracker with no active identity.
    #[must_use]
    pub fn new(supported_chain: ChainId, notifier: Notifier) -> Self {
        let (identity_tx, _) = watch::channel(None);
        let (signer_tx, _) = watch::channel(0);
        Self {
            supported_chain,
            identity_tx,
            signer_tx,
            listener: Mutex::new(None),
            notifier,
        }
    }

    /// The network rewards are minted on.
    #[must_use]
    pub const fn supported_chain(&self) -> ChainId {
        self.supported_chain
    }

    /// The active identity, if any.
    #[must_use]
    pub fn current(&self) -> Option<Address> {
        self.identity_tx.borrow().clone()
    }

    /// Subscribes to identity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Address>> {
        self.identity_tx.subscribe()
    }

    /// Current signer generation.
    #[must_use]
    pub fn signer_generation(&self) -> u64 {
        *self.signer_tx.borrow()
    }

    /// Subscribes to signer rebuild signals.
    #[must_use]
    pub fn subscribe_signer(&self) -> watch::Receiver<u64> {
        self.signer_tx.subscribe()
    }

    /// Connects through `wallet` and activates its primary account.
    ///
    /// The wallet's event listener is registered on the first
    /// successful connect only; reconnecting reuses it.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the wallet is missing, the user
    /// declines, no account is exposed, the account is malformed, or
    /// the wallet is on an unsupported network. The identity is left
    /// unchanged on error.
    pub async fn connect<W: WalletProvider>(
        self: &Arc<Self>,
        wallet: &W,
    ) -> Result<Address, IdentityError> {
        let accounts = match wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::warn!(error = %err, "wallet connection failed");
                let err = IdentityError::from(err);
                self.notifier.error(err.to_string());
                return Err(err);
            }
        };

        let chain = wallet.chain_id().await?;
        if chain != self.supported_chain {
            let err = IdentityError::UnsupportedNetwork {
                found: chain.label(),
                expected: self.supported_chain.label(),
            };
            self.notifier.warn(err.to_string());
            return Err(err);
        }

        let primary = accounts.first().ok_or(IdentityError::NoAccounts)?;
        let address = Address::parse(primary)?;

        self.ensure_listening(wallet)?;
        self.set(Some(address.clone()));
        self.bump_signer();
        self.notifier
            .success(format!("Wallet {} connected", address.short()));
        Ok(address)
    }

    /// Clears the active identity.
    pub fn disconnect(&self) -> IdentityTransition {
        self.set(None)
    }

    /// Applies an `accountsChanged` notification.
    ///
    /// The first account becomes the active identity; an empty list
    /// clears it.
    pub fn handle_accounts_changed(&self, accounts: &[Address]) -> IdentityTransition {
        let transition = self.set(accounts.first().cloned());
        if transition != IdentityTransition::Unchanged {
            self.bump_signer();
        }
        transition
    }

    /// Applies a `chainChanged` notification.
    ///
    /// An unsupported network clears the identity. The supported
    /// network keeps it and asks dependents to rebuild their signer.
    pub fn handle_chain_changed(&self, chain: ChainId) -> IdentityTransition {
        if chain != self.supported_chain {
            tracing::warn!(%chain, supported = %self.supported_chain, "unsupported network");
            self.notifier.warn(format!(
                "You are connected to {}. Please switch to {}.",
                chain.label(),
                self.supported_chain.label()
            ));
            return self.set(None);
        }
        self.bump_signer();
        self.notifier
            .info(format!("Network changed to {}", chain.label()));
        IdentityTransition::Unchanged
    }

    /// Translates a raw wallet notification.
    pub fn handle_event(&self, event: WalletEvent) -> IdentityTransition {
        match event {
            WalletEvent::AccountsChanged(raw) => {
                let Some(primary) = raw.first() else {
                    return self.handle_accounts_changed(&[]);
                };
                match Address::parse(primary) {
                    Ok(address) => self.handle_accounts_changed(&[address]),
                    Err(err) => {
                        tracing::warn!(error = %err, "wallet reported malformed account");
                        self.handle_accounts_changed(&[])
                    }
                }
            }
            WalletEvent::ChainChanged(raw) => match ChainId::from_hex(&raw) {
                Ok(chain) => self.handle_chain_changed(chain),
                Err(err) => {
                    tracing::warn!(error = %err, "wallet reported malformed chain id");
                    self.handle_chain_changed(ChainId(0))
                }
            },
        }
    }

    /// Stops listening to wallet notifications.
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    /// Registers the wallet listener unless one is already running.
    fn ensure_listening<W: WalletProvider>(self: &Arc<Self>, wallet: &W) -> Result<(), IdentityError> {
        let mut listener = self.listener.lock();
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let rx = wallet.subscribe()?;
        *listener = Some(Self::spawn_listener(Arc::downgrade(self), rx));
        tracing::debug!("wallet listener registered");
        Ok(())
    }

    fn spawn_listener(tracker: Weak<Self>, mut rx: mpsc::Receiver<WalletEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                tracker.handle_event(event);
            }
            tracing::debug!("wallet listener stopped");
        })
    }

    fn bump_signer(&self) {
        self.signer_tx.send_modify(|generation| *generation += 1);
    }

    /// Replaces the identity, notifying subscribers only on change.
    fn set(&self, next: Option<Address>) -> IdentityTransition {
        let mut transition = IdentityTransition::Unchanged;
        self.identity_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            transition = match (current.take(), next.clone()) {
                (None, Some(to)) => IdentityTransition::Set(to),
                (Some(from), Some(to)) => IdentityTransition::Changed { from, to },
                (Some(from), None) => IdentityTransition::Cleared(from),
                (None, None) => IdentityTransition::Unchanged,
            };
            current.clone_from(&next);
            true
        });
        match &transition {
            IdentityTransition::Unchanged => {}
            IdentityTransition::Set(to) => tracing::info!(identity = %to, "identity set"),
            IdentityTransition::Changed { from, to } => {
                tracing::info!(from = %from, to = %to, "identity changed");
            }
            IdentityTransition::Cleared(from) => tracing::info!(from = %from, "identity cleared"),
        }
        transition
    }
}

impl Drop for IdentityTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
