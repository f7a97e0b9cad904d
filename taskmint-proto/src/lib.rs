//! Shared wire definitions for the `TaskMint` task store and reward authority.

pub mod claim;
pub mod codec;
pub mod error;
pub mod identity;
pub mod progress;
pub mod task;
