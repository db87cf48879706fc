#![allow(dead_code)]

use courier::{
    CachePolicy, CancellationToken, Container, CourierError, DispatcherBuilder, Handler, Lifetime,
    Request, RequestBehavior, StreamHandler, StreamRequest, TypedNext, ValidationFailure,
    Validator, testing::CallCounter,
};
use futures::{StreamExt, stream::BoxStream};
use std::{sync::Arc, time::Duration};

// ============================================================================
// Plain requests
// ============================================================================

pub struct Ping;

impl Request for Ping {
    type Response = &'static str;
}

#[derive(Default)]
pub struct PingHandler {
    pub calls: CallCounter,
}

impl Handler<Ping> for PingHandler {
    async fn handle(&self, _request: &Ping, _cancel: &CancellationToken) -> Result<&'static str, CourierError> {
        self.calls.increment();
        Ok("pong")
    }
}

pub struct Greet(pub &'static str);

impl Request for Greet {
    type Response = String;
}

pub struct GreetHandler;

impl Handler<Greet> for GreetHandler {
    async fn handle(&self, request: &Greet, _cancel: &CancellationToken) -> Result<String, CourierError> {
        Ok(request.0.to_string())
    }
}

/// Wraps the response of [`Greet`] in `[name]..[/name]`.
pub struct Tag(pub &'static str);

impl RequestBehavior<Greet> for Tag {
    async fn handle(
        &self,
        _request: &Greet,
        next: TypedNext<'_, Greet>,
        _cancel: &CancellationToken,
    ) -> Result<String, CourierError> {
        Ok(format!("[{0}]{1}[/{0}]", self.0, next.run().await?))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("boom")]
pub struct Boom;

pub struct Explode;

impl Request for Explode {
    type Response = ();
}

pub struct ExplodeHandler;

impl Handler<Explode> for ExplodeHandler {
    async fn handle(&self, _request: &Explode, _cancel: &CancellationToken) -> Result<(), CourierError> {
        Err(CourierError::handler(Boom))
    }
}

// ============================================================================
// Cacheable requests
// ============================================================================

pub struct GetQuote {
    pub symbol: &'static str,
}

impl Request for GetQuote {
    type Response = u32;

    fn cache_policy(&self) -> Option<CachePolicy<u32>> {
        Some(CachePolicy::new(format!("quote:{}", self.symbol)).with_ttl(Duration::from_secs(60)))
    }
}

/// Answers 100 on the first call, 101 on the second, and so on.
#[derive(Default)]
pub struct QuoteHandler {
    pub calls: CallCounter,
}

impl Handler<GetQuote> for QuoteHandler {
    async fn handle(&self, _request: &GetQuote, _cancel: &CancellationToken) -> Result<u32, CourierError> {
        Ok(100 + self.calls.increment() as u32)
    }
}

// ============================================================================
// Validated requests
// ============================================================================

pub struct CreateUser {
    pub name: &'static str,
    pub email: &'static str,
}

impl Request for CreateUser {
    type Response = u64;
}

#[derive(Default)]
pub struct CreateUserHandler {
    pub calls: CallCounter,
}

impl Handler<CreateUser> for CreateUserHandler {
    async fn handle(&self, _request: &CreateUser, _cancel: &CancellationToken) -> Result<u64, CourierError> {
        self.calls.increment();
        Ok(42)
    }
}

pub struct NameRequired;

impl Validator<CreateUser> for NameRequired {
    async fn validate(&self, request: &CreateUser, _cancel: &CancellationToken) -> Vec<ValidationFailure> {
        if request.name.is_empty() {
            vec![ValidationFailure::new("name", "must not be empty")]
        } else {
            Vec::new()
        }
    }
}

pub struct EmailHasAt;

impl Validator<CreateUser> for EmailHasAt {
    async fn validate(&self, request: &CreateUser, _cancel: &CancellationToken) -> Vec<ValidationFailure> {
        if request.email.contains('@') {
            Vec::new()
        } else {
            vec![ValidationFailure::new("email", "must contain '@'")]
        }
    }
}

// ============================================================================
// Streams
// ============================================================================

/// An endless stream of 0, 1, 2, ...
pub struct Ticks;

impl StreamRequest for Ticks {
    type Item = u64;
}

#[derive(Default)]
pub struct TickHandler {
    pub produced: CallCounter,
}

impl StreamHandler<Ticks> for TickHandler {
    fn handle<'a>(
        &'a self,
        _request: &'a Ticks,
        _cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<u64, CourierError>> {
        futures::stream::unfold(0u64, move |n| async move {
            self.produced.increment();
            Some((Ok(n), n + 1))
        })
        .boxed()
    }
}

/// Counts down from the given number to 1.
pub struct Countdown(pub u32);

impl StreamRequest for Countdown {
    type Item = u32;
}

pub struct CountdownHandler;

impl StreamHandler<Countdown> for CountdownHandler {
    fn handle<'a>(
        &'a self,
        request: &'a Countdown,
        _cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<u32, CourierError>> {
        futures::stream::iter((1..=request.0).rev().map(Ok)).boxed()
    }
}

// ============================================================================
// Scoped resources
// ============================================================================

/// A scoped resource that counts how often it is released.
pub struct UnitOfWork {
    released: CallCounter,
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.released.increment();
    }
}

/// Opened and released counts of [`UnitOfWork`] instances.
#[derive(Clone, Default)]
pub struct ScopeProbe {
    pub opened: CallCounter,
    pub released: CallCounter,
}

impl ScopeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `UnitOfWork` as a scoped service.
    pub fn install(&self, builder: DispatcherBuilder) -> DispatcherBuilder {
        let probe = self.clone();
        builder.configure_services(move |services| {
            services.add_scoped_factory(move |_: &dyn Container| {
                probe.opened.increment();
                Ok(UnitOfWork {
                    released: probe.released.clone(),
                })
            });
        })
    }
}

#[derive(Clone, Copy)]
pub enum Outcome {
    Commit,
    Fail,
    WaitForCancel,
}

pub struct SaveOrder(pub Outcome);

impl Request for SaveOrder {
    type Response = &'static str;
}

pub struct SaveOrderHandler {
    pub work: Arc<UnitOfWork>,
}

impl Handler<SaveOrder> for SaveOrderHandler {
    async fn handle(&self, request: &SaveOrder, cancel: &CancellationToken) -> Result<&'static str, CourierError> {
        match request.0 {
            Outcome::Commit => Ok("saved"),
            Outcome::Fail => Err(CourierError::msg("rollback")),
            Outcome::WaitForCancel => {
                cancel.cancelled().await;
                Err(CourierError::Cancelled)
            }
        }
    }
}

/// An endless stream served from a scoped [`UnitOfWork`].
pub struct WatchOrders;

impl StreamRequest for WatchOrders {
    type Item = u64;
}

pub struct WatchOrdersHandler {
    pub work: Arc<UnitOfWork>,
}

impl StreamHandler<WatchOrders> for WatchOrdersHandler {
    fn handle<'a>(
        &'a self,
        _request: &'a WatchOrders,
        _cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<u64, CourierError>> {
        futures::stream::iter(0u64..).map(Ok).boxed()
    }
}

/// A builder with the scoped order handlers registered.
pub fn scoped_orders(probe: &ScopeProbe) -> DispatcherBuilder {
    probe
        .install(DispatcherBuilder::new())
        .register_handler::<SaveOrder, _, _>(Lifetime::ScopeScoped, |c: &dyn Container| {
            Ok(SaveOrderHandler {
                work: c.resolve::<UnitOfWork>()?,
            })
        })
        .and_then(|builder| {
            builder.register_stream_handler::<WatchOrders, _, _>(Lifetime::ScopeScoped, |c: &dyn Container| {
                Ok(WatchOrdersHandler {
                    work: c.resolve::<UnitOfWork>()?,
                })
            })
        })
        .unwrap()
}
