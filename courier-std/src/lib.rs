//! # courier-std
//!
//! Standard implementations for the courier request dispatch engine.
//!
//! This crate provides:
//! - **Service container**: [`container::ServiceCollection`],
//!   [`container::ServiceProvider`], [`container::ServiceScope`]
//! - **Standard behaviors**: Logging, Caching, Validation, Timeout
//! - **Cache providers**: [`cache::MemoryCache`]
//! - **Handler decorators**: [`handlers::Retry`]
//! - **Testing utilities**: [`testing`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use courier_core;

// Modules
pub mod behaviors;
pub mod cache;
pub mod container;
pub mod handlers;
pub mod testing;
