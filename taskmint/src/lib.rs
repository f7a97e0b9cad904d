//! `TaskMint`: task tracker client whose completed tasks unlock rewards.
//!
//! The crate holds the client-side synchronization core: identity
//! tracking, reward-progress polling, claim gating and optimistic task
//! mutation, plus the boundaries to the wallet and the REST backends.

pub mod app;
pub mod claim;
pub mod config;
pub mod identity;
pub mod inflight;
pub mod notify;
pub mod progress;
pub mod remote;
pub mod tasks;
pub mod wallet;
