//! Stream combinators for live record feeds

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
