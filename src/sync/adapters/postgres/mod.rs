//! `PostgreSQL` adapter for task/issue mapping persistence.

mod models;
mod repository;
mod schema;

pub use repository::{MappingPgPool, PostgresMappingRepository};
