//! Validator contract.
//!
//! Validators only report; the validation behavior in `courier-std` runs
//! them and turns a non-empty set of failures into
//! [`CourierError::Validation`](crate::CourierError::Validation).

use crate::{error::ValidationFailure, request::Request};
use std::{future::Future, pin::Pin};
use tokio_util::sync::CancellationToken;

/// Checks one request type and reports every broken rule.
///
/// An empty result means the request is valid.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot validate requests of type `{R}`",
    label = "missing `Validator<{R}>` implementation",
    note = "Validators must implement `validate(&self, request, cancel)` for `{R}`."
)]
pub trait Validator<R: Request>: Send + Sync + 'static {
    /// Collect all failures for `request`.
    fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Vec<ValidationFailure>> + Send;
}

/// Dynamic object-safe version of [`Validator`].
pub trait DynValidator<R: Request>: Send + Sync + 'static {
    /// Collect all failures (dynamic dispatch version).
    fn validate_dyn<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Vec<ValidationFailure>> + Send + 'a>>;
}

impl<R: Request, T: Validator<R>> DynValidator<R> for T {
    fn validate_dyn<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Vec<ValidationFailure>> + Send + 'a>> {
        Box::pin(self.validate(request, cancel))
    }
}
