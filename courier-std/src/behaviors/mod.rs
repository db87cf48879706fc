//! Built-in behaviors.
//!
//! - [`LoggingBehavior`] / [`StreamLoggingBehavior`] - structured call logging
//! - [`CachingBehavior`] - serves cacheable requests from a cache provider
//! - [`ValidationBehavior`] - runs every validator before the handler
//! - [`TimeoutBehavior`] - bounds the rest of the pipeline in time

mod caching;
mod logging;
mod timeout;
mod validation;

pub use caching::{CachingBehavior, CachingOptions};
pub use logging::{LoggingBehavior, StreamLoggingBehavior};
pub use timeout::TimeoutBehavior;
pub use validation::{ValidationBehavior, ValidatorTable};
