//! Error types for courier.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`CourierError`] - Top-level error returned by every dispatch
//! - [`ConfigError`] - Setup problems (missing or duplicate bindings)
//! - [`ValidationError`] - Aggregated field-level validation failures
//! - [`ResolveError`] - Failures reported by the service container

use std::{borrow::Cow, fmt, time::Duration};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all dispatch operations.
///
/// Callers receive handler errors unchanged inside [`CourierError::Handler`];
/// use [`CourierError::downcast_handler_ref`] to recover the original type.
#[derive(Error, Debug)]
pub enum CourierError {
    /// The dispatcher is misconfigured for this request.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The request was rejected by one or more validators.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service container could not produce a handler or behavior.
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// The call observed its cancellation signal and unwound.
    #[error("operation was cancelled")]
    Cancelled,

    /// A timeout behavior gave up waiting for the rest of the pipeline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A handler or behavior failed with a domain error.
    #[error(transparent)]
    Handler(BoxError),
}

impl CourierError {
    /// Wrap a domain error raised by a handler or behavior.
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Handler(Box::new(err))
    }

    /// Wrap a plain message as a domain error.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        CourierError::Handler(message.into())
    }

    /// Returns `true` if this error is the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CourierError::Cancelled)
    }

    /// Returns `true` for errors that are never worth repeating: configuration,
    /// validation, resolution and cancellation failures.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CourierError::Config(_)
                | CourierError::Validation(_)
                | CourierError::Resolve(_)
                | CourierError::Cancelled
        )
    }

    /// Borrow the validation failures, if this is a validation error.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            CourierError::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Downcast a wrapped domain error to its concrete type.
    pub fn downcast_handler_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            CourierError::Handler(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<BoxError> for CourierError {
    fn from(err: BoxError) -> Self {
        CourierError::Handler(err)
    }
}

/// Errors caused by how the dispatcher was set up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No handler was registered for the request type.
    #[error("no handler registered for request `{request}`; expected an implementation of `{contract}`")]
    HandlerNotFound {
        /// The request type that could not be routed.
        request: &'static str,
        /// The contract a handler must implement.
        contract: Cow<'static, str>,
    },

    /// A second handler was registered for the same request type.
    #[error("request `{request}` already has handler `{existing}`; refusing to also bind `{rejected}`")]
    DuplicateHandler {
        /// The request type.
        request: &'static str,
        /// The handler registered first.
        existing: &'static str,
        /// The handler that was rejected.
        rejected: &'static str,
    },

    /// The same validator type was registered twice for one request type.
    #[error("validator `{validator}` is already registered for request `{request}`")]
    DuplicateValidator {
        /// The request type.
        request: &'static str,
        /// The validator type.
        validator: &'static str,
    },

    /// The caching behavior is in use but no cache provider was configured.
    #[error("caching behavior registered without a cache provider; call `configure_caching` first")]
    MissingCacheProvider,

    /// A behavior replaced the response with a value of another type.
    #[error("pipeline for `{request}` produced a response that is not `{expected}`")]
    ResponseTypeMismatch {
        /// The request type.
        request: &'static str,
        /// The response type the caller expects.
        expected: &'static str,
    },
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// The offending field (or an empty string for request-level rules).
    pub field: Cow<'static, str>,
    /// Human readable description of the broken rule.
    pub message: Cow<'static, str>,
}

impl ValidationFailure {
    /// Create a new failure for `field`.
    pub fn new(field: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// The complete set of failures produced by every validator of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    failures: Vec<ValidationFailure>,
}

impl ValidationError {
    /// Create a validation error from collected failures.
    pub fn new(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    /// All failures, in validator registration order.
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Failures reported for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationFailure> {
        self.failures.iter().filter(move |f| f.field == field)
    }

    /// Consume the error, returning the failures.
    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.failures
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} error(s)", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors reported by a [`Container`](crate::Container).
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Nothing is registered under the requested key.
    #[error("no service registered for `{service}`")]
    NotRegistered {
        /// The requested service.
        service: &'static str,
    },

    /// The service is scope-bound and the container is a root container.
    #[error("service `{service}` is scoped and cannot be resolved from a root container")]
    ScopeRequired {
        /// The requested service.
        service: &'static str,
    },

    /// The registered instance does not have the requested type.
    #[error("service `{service}` resolved to an instance of an unexpected type")]
    TypeMismatch {
        /// The requested service.
        service: &'static str,
    },

    /// The service factory failed.
    #[error("factory for `{service}` failed")]
    Factory {
        /// The requested service.
        service: &'static str,
        /// The factory's error.
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// Returns `true` if the container refused because it is not a scope.
    pub fn is_scope_required(&self) -> bool {
        matches!(self, ResolveError::ScopeRequired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("out of stock")]
    struct OutOfStock;

    #[test]
    fn test_handler_error_downcasts() {
        let err = CourierError::handler(OutOfStock);
        assert!(err.downcast_handler_ref::<OutOfStock>().is_some());
        assert_eq!(err.to_string(), "out of stock");
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_validation_error_lists_every_failure() {
        let err = ValidationError::new(vec![
            ValidationFailure::new("name", "must not be empty"),
            ValidationFailure::new("age", "must be positive"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("name: must not be empty"));
        assert!(text.contains("age: must be positive"));
        assert_eq!(err.for_field("age").count(), 1);
    }

    #[test]
    fn test_not_found_names_request_and_contract() {
        let err = CourierError::from(ConfigError::HandlerNotFound {
            request: "app::GetUser",
            contract: "Handler<app::GetUser>".into(),
        });
        let text = err.to_string();
        assert!(text.contains("app::GetUser"));
        assert!(text.contains("Handler<app::GetUser>"));
        assert!(err.is_permanent());
    }
}
