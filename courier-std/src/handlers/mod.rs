//! Handler decorators.

mod retry;

pub use retry::{Retry, RetryPolicy};
