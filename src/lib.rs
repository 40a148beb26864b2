//! Boardsync: task board and GitHub synchronization engine.
//!
//! The crate links collaboration-board tasks to GitHub issues, tracks
//! whether each pair has drifted, and coordinates branches, pull requests,
//! conflict resolution and merges for a team's connected repository.
//!
//! # Architecture
//!
//! Boardsync follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`sync`]: Mappings, column rules, reconciliation, pull requests and merges
//! - [`config`]: TOML configuration with environment overrides
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod sync;
pub mod telemetry;
