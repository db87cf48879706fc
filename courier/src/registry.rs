//! Binding registry.
//!
//! Maps a request type to its handler binding and keeps the ordered list
//! of behavior bindings. Built once by the
//! [`DispatcherBuilder`](crate::DispatcherBuilder) and read-only afterward.

use crate::dispatcher::ErasedWrapper;
use courier_core::{
    Container, ConfigError, DynBehavior, DynHandler, Lifetime, Request, ResolveError,
    StreamBehavior, StreamHandler, StreamRequest,
};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

// ============================================================================
// Handler slots - how handlers are stored in the container
// ============================================================================

/// The container service a handler binding resolves.
pub(crate) struct HandlerSlot<R: Request>(pub(crate) Arc<dyn DynHandler<R>>);

/// The container service a stream handler binding resolves.
pub(crate) struct StreamHandlerSlot<R: StreamRequest>(pub(crate) Arc<dyn StreamHandler<R>>);

// ============================================================================
// Bindings
// ============================================================================

/// A handler binding: request type to handler type and lifetime.
///
/// `W` is the wrapper type the binding produces on first dispatch.
pub(crate) struct HandlerBinding<W: ?Sized> {
    pub(crate) request: &'static str,
    pub(crate) handler: &'static str,
    pub(crate) lifetime: Lifetime,
    pub(crate) wrap: fn(&Arc<HandlerBinding<W>>, &BindingRegistry) -> Arc<W>,
}

impl<W: ?Sized> fmt::Debug for HandlerBinding<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("request", &self.request)
            .field("handler", &self.handler)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

pub(crate) type SingleBinding = HandlerBinding<dyn ErasedWrapper>;
pub(crate) type StreamBinding = HandlerBinding<dyn Any + Send + Sync>;

pub(crate) type BehaviorFactory<B> = Arc<dyn Fn(&dyn Container) -> Result<Arc<B>, ResolveError> + Send + Sync>;

/// A behavior binding, in registration order.
///
/// Open behaviors (`scope == None`) apply to every request type; closed
/// ones only to the request type they were registered for.
pub(crate) struct BehaviorBinding<B: ?Sized> {
    name: &'static str,
    scope: Option<TypeId>,
    factory: BehaviorFactory<B>,
}

impl<B: ?Sized> BehaviorBinding<B> {
    pub(crate) fn open(name: &'static str, factory: BehaviorFactory<B>) -> Self {
        Self {
            name,
            scope: None,
            factory,
        }
    }

    pub(crate) fn closed<R: 'static>(name: &'static str, factory: BehaviorFactory<B>) -> Self {
        Self {
            name,
            scope: Some(TypeId::of::<R>()),
            factory,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn applies_to(&self, request: TypeId) -> bool {
        self.scope.is_none_or(|scope| scope == request)
    }

    pub(crate) fn resolve(&self, container: &dyn Container) -> Result<Arc<B>, ResolveError> {
        (self.factory)(container)
    }
}

impl<B: ?Sized> Clone for BehaviorBinding<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            scope: self.scope,
            factory: self.factory.clone(),
        }
    }
}

impl<B: ?Sized> fmt::Debug for BehaviorBinding<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorBinding")
            .field("name", &self.name)
            .field("open", &self.scope.is_none())
            .finish()
    }
}

// ============================================================================
// BindingRegistry
// ============================================================================

/// Every binding known to a dispatcher.
#[derive(Default)]
pub(crate) struct BindingRegistry {
    handlers: HashMap<TypeId, Arc<SingleBinding>>,
    stream_handlers: HashMap<TypeId, Arc<StreamBinding>>,
    behaviors: Vec<BehaviorBinding<dyn DynBehavior>>,
    stream_behaviors: Vec<BehaviorBinding<dyn StreamBehavior>>,
}

impl BindingRegistry {
    pub(crate) fn insert_handler(&mut self, request: TypeId, binding: SingleBinding) -> Result<(), ConfigError> {
        insert_unique(&mut self.handlers, request, binding)
    }

    pub(crate) fn insert_stream_handler(&mut self, request: TypeId, binding: StreamBinding) -> Result<(), ConfigError> {
        insert_unique(&mut self.stream_handlers, request, binding)
    }

    pub(crate) fn push_behavior(&mut self, binding: BehaviorBinding<dyn DynBehavior>) {
        self.behaviors.push(binding);
    }

    pub(crate) fn push_stream_behavior(&mut self, binding: BehaviorBinding<dyn StreamBehavior>) {
        self.stream_behaviors.push(binding);
    }

    pub(crate) fn handler(&self, request: TypeId) -> Option<&Arc<SingleBinding>> {
        self.handlers.get(&request)
    }

    pub(crate) fn stream_handler(&self, request: TypeId) -> Option<&Arc<StreamBinding>> {
        self.stream_handlers.get(&request)
    }

    pub(crate) fn handlers(&self) -> impl Iterator<Item = (TypeId, &Arc<SingleBinding>)> {
        self.handlers.iter().map(|(id, binding)| (*id, binding))
    }

    pub(crate) fn stream_handlers(&self) -> impl Iterator<Item = (TypeId, &Arc<StreamBinding>)> {
        self.stream_handlers.iter().map(|(id, binding)| (*id, binding))
    }

    /// Behaviors that apply to `request`, last registered first.
    pub(crate) fn behaviors_for(&self, request: TypeId) -> Vec<BehaviorBinding<dyn DynBehavior>> {
        reversed_for(&self.behaviors, request)
    }

    /// Stream behaviors that apply to `request`, last registered first.
    pub(crate) fn stream_behaviors_for(&self, request: TypeId) -> Vec<BehaviorBinding<dyn StreamBehavior>> {
        reversed_for(&self.stream_behaviors, request)
    }

    pub(crate) fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    pub(crate) fn stream_behavior_count(&self) -> usize {
        self.stream_behaviors.len()
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("handlers", &self.handlers.len())
            .field("stream_handlers", &self.stream_handlers.len())
            .field("behaviors", &self.behaviors)
            .field("stream_behaviors", &self.stream_behaviors)
            .finish()
    }
}

fn insert_unique<W: ?Sized>(
    bindings: &mut HashMap<TypeId, Arc<HandlerBinding<W>>>,
    request: TypeId,
    binding: HandlerBinding<W>,
) -> Result<(), ConfigError> {
    if let Some(existing) = bindings.get(&request) {
        return Err(ConfigError::DuplicateHandler {
            request: binding.request,
            existing: existing.handler,
            rejected: binding.handler,
        });
    }
    bindings.insert(request, Arc::new(binding));
    Ok(())
}

fn reversed_for<B: ?Sized>(bindings: &[BehaviorBinding<B>], request: TypeId) -> Vec<BehaviorBinding<B>> {
    bindings
        .iter()
        .rev()
        .filter(|binding| binding.applies_to(request))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Behavior, CourierError, Next, Payload, RequestContext};

    struct Noop;

    impl Behavior for Noop {
        async fn handle(&self, _cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
            next.run().await
        }
    }

    struct A;
    struct B;

    fn noop() -> BehaviorFactory<dyn DynBehavior> {
        Arc::new(|_: &dyn Container| Ok(Arc::new(Noop) as Arc<dyn DynBehavior>))
    }

    fn stream_binding(handler: &'static str) -> StreamBinding {
        HandlerBinding {
            request: "A",
            handler,
            lifetime: Lifetime::Reusable,
            wrap: |_, _| Arc::new(()) as Arc<dyn Any + Send + Sync>,
        }
    }

    #[test]
    fn test_behaviors_are_reversed_and_filtered() {
        let mut registry = BindingRegistry::default();
        registry.push_behavior(BehaviorBinding::open("first", noop()));
        registry.push_behavior(BehaviorBinding::closed::<B>("only_b", noop()));
        registry.push_behavior(BehaviorBinding::open("last", noop()));

        let for_a: Vec<_> = registry
            .behaviors_for(TypeId::of::<A>())
            .iter()
            .map(BehaviorBinding::name)
            .collect();
        assert_eq!(for_a, ["last", "first"]);

        let for_b: Vec<_> = registry
            .behaviors_for(TypeId::of::<B>())
            .iter()
            .map(BehaviorBinding::name)
            .collect();
        assert_eq!(for_b, ["last", "only_b", "first"]);
    }

    #[test]
    fn test_second_handler_for_a_request_is_rejected() {
        let mut registry = BindingRegistry::default();
        registry
            .insert_stream_handler(TypeId::of::<A>(), stream_binding("FirstHandler"))
            .unwrap();
        let err = registry
            .insert_stream_handler(TypeId::of::<A>(), stream_binding("SecondHandler"))
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::DuplicateHandler {
                request: "A",
                existing: "FirstHandler",
                rejected: "SecondHandler",
            }
        );
    }
}
