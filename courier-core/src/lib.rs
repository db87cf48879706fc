//! # courier-core
//!
//! Core contracts for the courier request dispatch engine.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! libraries that provide handlers, behaviors or cache providers without
//! pulling in the dispatcher itself.
//!
//! # Pipeline Anatomy
//!
//! Every dispatch runs one request through an ordered chain of behaviors
//! that ends in exactly one handler:
//!
//! ```text
//! caller -> b_n -> ... -> b_1 -> handler
//! ```
//!
//! ## Requests ([`Request`], [`StreamRequest`])
//!
//! Immutable values whose type selects the handler. The associated
//! `Response` (or `Item`) type fixes what the caller gets back.
//!
//! ## Handlers ([`Handler`], [`StreamHandler`])
//!
//! The terminal point of the pipeline, where business logic executes.
//!
//! ## Behaviors ([`Behavior`], [`RequestBehavior`], [`StreamBehavior`])
//!
//! Cross-cutting stages wrapping the handler. Open behaviors apply to every
//! request through the erased [`RequestContext`]; closed behaviors are
//! written for one request type.
//!
//! ## Container ([`Container`])
//!
//! The resolution boundary: handlers and behaviors are produced by a
//! container, either reused, per call, or per resource scope
//! ([`Lifetime`]).
//!
//! # Error Types
//!
//! - [`CourierError`] - Top-level error type
//! - [`ConfigError`] - Missing or conflicting registrations
//! - [`ValidationError`] - Aggregated validation failures
//! - [`ResolveError`] - Container failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod behavior;
mod cache;
mod container;
mod context;
mod error;
mod handler;
mod request;
mod stream;
mod validation;

// Re-exports
pub use behavior::{
    Behavior, ClosedBehavior, DynBehavior, Next, RequestBehavior, TypedNext, downcast_response,
};
pub use cache::{CachePolicy, CacheProvider, CacheValue, DynCacheProvider, ErasedCachePolicy};
pub use container::{AnyArc, Container, ContainerId, Lifetime, ServiceKey};
pub use context::{Payload, RequestContext};
pub use error::{
    BoxError, ConfigError, CourierError, ResolveError, ValidationError, ValidationFailure,
};
pub use handler::{DynHandler, Handler, StreamHandler};
pub use request::{AnyRequest, Request, StreamRequest};
pub use stream::{
    ClosedStreamBehavior, PayloadStream, RequestStreamBehavior, StreamBehavior, StreamNext,
    TypedStreamNext, downcast_item,
};
pub use validation::{DynValidator, Validator};

/// Re-exported so downstream crates name the same token type.
pub use tokio_util::sync::CancellationToken;
