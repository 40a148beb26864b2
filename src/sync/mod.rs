//! GitHub synchronization for board tasks.
//!
//! Keeps board tasks consistent with GitHub issues, coordinates task
//! branches and pull requests, assists with merge conflicts, merges with
//! bounded retries and reconciles unlinked tasks and issues in bulk. The
//! module follows hexagonal architecture:
//!
//! - Domain types and state machines in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
