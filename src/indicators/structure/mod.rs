//! Structure indicators: Parabolic SAR, Pivot Points

pub mod parabolic_sar;
pub mod pivot_points;

pub use parabolic_sar::{ParabolicSar, SarConfig};
pub use pivot_points::{PivotConfig, PivotKind, PivotPoints};
