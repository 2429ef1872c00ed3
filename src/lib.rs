//! repoprobe — LLM-generated tests, mocks and bug reports for GitHub
//! repositories, cached per commit (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod env;
pub mod generator;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod source;
