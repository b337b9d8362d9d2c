//! Typed pipeline events, delivered over bounded channels to explicitly
//! registered subscribers.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    IndicatorUpdated {
        indicator_id: String,
        timestamp: DateTime<Utc>,
    },
    CacheInvalidated {
        /// `None` means the whole cache was cleared.
        indicator_id: Option<String>,
    },
}
