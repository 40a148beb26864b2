//! Unit tests for the synchronization module.

mod mapping_service_tests;
mod support;
