//! In-memory adapters for tests, demos and single-process embedding.

mod advisor;
mod board;
mod delay;
mod github;
mod mapping;

pub use advisor::InMemoryConflictAdvisor;
pub use board::InMemoryWorkspace;
pub use delay::RecordingDelay;
pub use github::{FailingOperation, InMemoryGitHub};
pub use mapping::InMemoryMappingRepository;

use crate::sync::ports::RemoteError;

fn poisoned(err: impl std::fmt::Display) -> RemoteError {
    RemoteError::Transport(format!("in-memory state poisoned: {err}"))
}
