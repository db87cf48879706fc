//! Lifetime resolution.
//!
//! Decides, per dispatch, whether a composed pipeline is reused, built
//! fresh, or built inside a resource scope that is released when the call
//! ends.
//!
//! | Lifetime      | Built from                | Reused across calls      |
//! |---------------|---------------------------|--------------------------|
//! | `Reusable`    | the container             | yes, when built from a root container |
//! | `CallScoped`  | the container             | no                       |
//! | `ScopeScoped` | the container, or a fresh scope when it refuses | no  |

use courier_core::{Container, ContainerId, CourierError, Lifetime};
use dashmap::DashMap;
use std::{fmt, sync::Arc};
use tracing::{debug, trace};

/// The pipeline to run for one call, together with the scope it was built
/// in, if any.
///
/// The scope is released when the resolution is dropped, after the
/// pipeline.
pub(crate) struct Resolution<P> {
    pub(crate) pipeline: Arc<P>,
    pub(crate) scope: Option<Box<dyn Container>>,
}

impl<P> fmt::Debug for Resolution<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}

pub(crate) struct LifetimeResolver<P> {
    lifetime: Lifetime,
    reusable: DashMap<ContainerId, Arc<P>>,
}

impl<P> LifetimeResolver<P> {
    pub(crate) fn new(lifetime: Lifetime) -> Self {
        Self {
            lifetime,
            reusable: DashMap::new(),
        }
    }

    pub(crate) fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Produce the pipeline for one call.
    ///
    /// `build` composes a pipeline from whatever container it is handed.
    pub(crate) fn resolve(
        &self,
        container: &dyn Container,
        build: impl Fn(&dyn Container) -> Result<P, CourierError>,
    ) -> Result<Resolution<P>, CourierError> {
        match self.lifetime {
            // Only root-built pipelines are kept: a pipeline built inside a
            // scope may hold that scope's services.
            Lifetime::Reusable if container.id() == container.root_id() => {
                let root = container.id();
                if let Some(hit) = self.reusable.get(&root) {
                    return Ok(Resolution {
                        pipeline: Arc::clone(hit.value()),
                        scope: None,
                    });
                }
                let built = Arc::new(build(container)?);
                trace!(container = %root, "reusable pipeline composed");
                let pipeline = Arc::clone(self.reusable.entry(root).or_insert(built).value());
                Ok(Resolution { pipeline, scope: None })
            }
            Lifetime::Reusable | Lifetime::CallScoped => Ok(Resolution {
                pipeline: Arc::new(build(container)?),
                scope: None,
            }),
            Lifetime::ScopeScoped => match build(container) {
                Ok(pipeline) => Ok(Resolution {
                    pipeline: Arc::new(pipeline),
                    scope: None,
                }),
                Err(CourierError::Resolve(err)) if err.is_scope_required() => {
                    let scope = container.create_scope()?;
                    debug!(container = %container.id(), scope = %scope.id(), "resource scope opened");
                    let pipeline = Arc::new(build(&*scope)?);
                    Ok(Resolution {
                        pipeline,
                        scope: Some(scope),
                    })
                }
                Err(err) => Err(err),
            },
        }
    }
}

impl<P> fmt::Debug for LifetimeResolver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeResolver")
            .field("lifetime", &self.lifetime)
            .field("reused", &self.reusable.len())
            .finish()
    }
}
