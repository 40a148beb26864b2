//! Adapter implementations for synchronization ports.

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
