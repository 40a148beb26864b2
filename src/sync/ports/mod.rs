//! Port contracts for GitHub synchronization.
//!
//! Ports define infrastructure-agnostic interfaces used by sync services.

pub mod advisor;
pub mod board;
pub mod delay;
pub mod events;
pub mod github;
pub mod mapping_repository;
pub mod remote;

pub use advisor::ConflictAdvisor;
pub use board::{TaskBoard, TeamDirectory};
pub use delay::{Delay, TokioDelay};
pub use events::SyncEventPublisher;
pub use github::{GitHubGateway, MergeReceipt};
pub use mapping_repository::{MappingRepository, MappingRepositoryError, MappingRepositoryResult};
pub use remote::{RemoteError, RemoteResult};
