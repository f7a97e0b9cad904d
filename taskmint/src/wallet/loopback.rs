//! Loopback wallet for testing and offline runs.
//!
//! Behaves like a wallet extension that the test (or the CLI) drives by
//! hand: account and network switches are injected through the same
//! handle and delivered to every subscriber as [`WalletEvent`]s.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use taskmint_proto::identity::ChainId;

use super::{WalletError, WalletEvent, WalletProvider};

/// Capacity of each subscriber's event channel.
const EVENT_BUFFER: usize = 32;

#[derive(Debug)]
struct WalletState {
    installed: bool,
    approve: bool,
    accounts: Vec<String>,
    chain: ChainId,
    subscribers: Vec<mpsc::Sender<WalletEvent>>,
}

/// In-process wallet provider.
///
/// Clones share state, so a test can keep one handle to inject events
/// while the identity tracker holds another.
#[derive(Debug, Clone)]
pub struct LoopbackWallet {
    state: Arc<Mutex<WalletState>>,
}

impl LoopbackWallet {
    /// Creates an installed wallet exposing `accounts` on `chain`.
    #[must_use]
    pub fn new(accounts: Vec<String>, chain: ChainId) -> Self {
        Self {
            state: Arc::new(Mutex::new(WalletState {
                installed: true,
                approve: true,
                accounts,
                chain,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Creates a handle that behaves as if no wallet is installed.
    #[must_use]
    pub fn not_installed() -> Self {
        let wallet = Self::new(Vec::new(), ChainId::SEPOLIA);
        wallet.state.lock().installed = false;
        wallet
    }

    /// Whether the simulated user approves account requests.
    pub fn set_approve(&self, approve: bool) {
        self.state.lock().approve = approve;
    }

    /// Switches accounts and notifies subscribers.
    pub fn switch_accounts(&self, accounts: Vec<String>) {
        let mut state = self.state.lock();
        state.accounts.clone_from(&accounts);
        Self::emit(&mut state, &WalletEvent::AccountsChanged(accounts));
    }

    /// Switches network and notifies subscribers with the hex payload.
    ///
    /// The payload is delivered verbatim even if it does not parse.
    pub fn switch_chain(&self, chain_hex: &str) {
        let mut state = self.state.lock();
        if let Ok(chain) = ChainId::from_hex(chain_hex) {
            state.chain = chain;
        }
        Self::emit(&mut state, &WalletEvent::ChainChanged(chain_hex.to_string()));
    }

    /// Number of live listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn emit(state: &mut WalletState, event: &WalletEvent) {
        state.subscribers.retain(|tx| !tx.is_closed());
        for tx in &state.subscribers {
            if tx.try_send(event.clone()).is_err() {
                tracing::warn!(?event, "wallet listener is lagging, event dropped");
            }
        }
    }
}

impl WalletProvider for LoopbackWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        let state = self.state.lock();
        if !state.installed {
            return Err(WalletError::Unavailable);
        }
        if !state.approve {
            return Err(WalletError::Rejected);
        }
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<ChainId, WalletError> {
        let state = self.state.lock();
        if !state.installed {
            return Err(WalletError::Unavailable);
        }
        Ok(state.chain)
    }

    fn subscribe(&self) -> Result<mpsc::Receiver<WalletEvent>, WalletError> {
        let mut state = self.state.lock();
        if !state.installed {
            return Err(WalletError::Unavailable);
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        state.subscribers.push(tx);
        Ok(rx)
    }
}
