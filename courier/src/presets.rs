//! Pre-configured behavior combinations for common setups.

use crate::DispatcherBuilder;
use courier_std::behaviors::{LoggingBehavior, StreamLoggingBehavior, TimeoutBehavior};
use std::time::Duration;

impl DispatcherBuilder {
    /// Log every single and stream dispatch at this point of the behavior
    /// order.
    ///
    /// Registered first, logging sits innermost and times the handler
    /// alone; registered last, it times the whole pipeline.
    pub fn use_logging(self) -> Self {
        self.register_behavior_instance(LoggingBehavior::new())
            .register_stream_behavior_instance(StreamLoggingBehavior::new())
    }

    /// Give every single-response dispatch a time budget.
    pub fn use_timeout(self, budget: Duration) -> Self {
        self.register_behavior_instance(TimeoutBehavior::new(budget))
    }
}
