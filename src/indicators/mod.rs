pub mod error;
pub mod lifecycle;

pub mod momentum;
pub mod structure;
pub mod trend;
pub mod volatility;

pub use error::IndicatorError;
pub use lifecycle::{IndicatorState, ResultHistory, StreamingIndicator, TrendDirection};
