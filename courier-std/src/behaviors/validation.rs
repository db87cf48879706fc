//! Request validation.

use courier_core::{
    Behavior, ConfigError, CourierError, Next, Payload, Request, RequestContext, ValidationError,
    ValidationFailure, Validator,
};
use futures::{
    FutureExt,
    future::{self, BoxFuture, join_all},
};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    marker::PhantomData,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;

trait ErasedValidator: Send + Sync + 'static {
    fn validate_erased<'a>(
        &'a self,
        request: &'a (dyn Any + Send + Sync),
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<ValidationFailure>>;
}

struct TypedValidator<R, V> {
    validator: V,
    _request: PhantomData<fn(&R)>,
}

impl<R, V> ErasedValidator for TypedValidator<R, V>
where
    R: Request,
    V: Validator<R>,
{
    fn validate_erased<'a>(
        &'a self,
        request: &'a (dyn Any + Send + Sync),
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<ValidationFailure>> {
        match request.downcast_ref::<R>() {
            Some(request) => self.validator.validate(request, cancel).boxed(),
            None => future::ready(Vec::new()).boxed(),
        }
    }
}

struct ValidatorEntry {
    type_id: TypeId,
    validator: Arc<dyn ErasedValidator>,
}

/// Every registered validator, grouped by request type.
///
/// Validators for one request type keep their registration order.
#[derive(Default)]
pub struct ValidatorTable {
    by_request: HashMap<TypeId, Vec<ValidatorEntry>>,
}

impl ValidatorTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator for `R`.
    ///
    /// The same validator type may only be registered once per request type.
    pub fn add<R, V>(&mut self, validator: V) -> Result<(), ConfigError>
    where
        R: Request,
        V: Validator<R>,
    {
        let entries = self.by_request.entry(TypeId::of::<R>()).or_default();
        if entries.iter().any(|entry| entry.type_id == TypeId::of::<V>()) {
            return Err(ConfigError::DuplicateValidator {
                request: std::any::type_name::<R>(),
                validator: std::any::type_name::<V>(),
            });
        }
        entries.push(ValidatorEntry {
            type_id: TypeId::of::<V>(),
            validator: Arc::new(TypedValidator {
                validator,
                _request: PhantomData::<fn(&R)>,
            }),
        });
        Ok(())
    }

    /// The number of validators registered for `R`.
    pub fn count_for<R: Request>(&self) -> usize {
        self.by_request
            .get(&TypeId::of::<R>())
            .map_or(0, Vec::len)
    }

    /// Returns `true` if no validator is registered.
    pub fn is_empty(&self) -> bool {
        self.by_request.values().all(Vec::is_empty)
    }

    /// Run every validator for the request in `cx` concurrently.
    ///
    /// Failures are returned in validator registration order.
    pub async fn validate(&self, cx: &RequestContext<'_>) -> Vec<ValidationFailure> {
        let Some(entries) = self.by_request.get(&cx.request_type()) else {
            return Vec::new();
        };
        let request = cx.request();
        let cancel = cx.cancellation();
        join_all(
            entries
                .iter()
                .map(|entry| entry.validator.validate_erased(request, cancel)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

impl std::fmt::Debug for ValidatorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorTable")
            .field("request_types", &self.by_request.len())
            .finish()
    }
}

/// Runs every validator registered for the request before the rest of the
/// pipeline.
///
/// All failures are collected; if there are any, the call fails with
/// [`CourierError::Validation`] and the handler never runs.
#[derive(Debug, Clone)]
pub struct ValidationBehavior {
    table: Arc<ValidatorTable>,
}

impl ValidationBehavior {
    /// Create a validation behavior over `table`.
    pub fn new(table: Arc<ValidatorTable>) -> Self {
        Self { table }
    }

    /// The validators this behavior runs.
    pub fn table(&self) -> &ValidatorTable {
        &self.table
    }
}

impl Behavior for ValidationBehavior {
    async fn handle(&self, cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        let failures = self.table.validate(cx).await;
        if !failures.is_empty() {
            tracing::debug!(
                request = %cx.request_name(),
                failures = failures.len(),
                "request rejected by validation"
            );
            return Err(ValidationError::new(failures).into());
        }
        next.run().await
    }
}
