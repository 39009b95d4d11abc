//! # Quiver
//!
//! A transactional full-text indexing engine for Rust domain models.
//!
//! ## Features
//!
//! - Explicit entity-to-document mapping, no runtime reflection
//! - Transaction-scoped work queues flushed on commit, dropped on rollback
//! - Synchronous or pooled asynchronous batch execution
//! - Deadlock-free multi-directory batches
//! - Pluggable directory providers (file system, in-memory, slave replica)
//! - Local or forwarded (remote) backend processing
//! - Term queries resolving hits back to live entities

pub mod analysis;
pub mod backend;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod factory;
pub mod index;
pub mod query;
pub mod store;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
