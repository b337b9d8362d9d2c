pub mod math;
pub mod window;

pub use window::RollingWindow;
