//! Streaming statistics over accepted telemetry.
//!
//! Each numeric field gets a [`FieldAccumulator`] that maintains count, mean
//! and central-moment sums with a single-pass update (Welford's recurrence
//! extended to the third and fourth moments), plus min/max and the retained
//! samples needed for exact quantiles. [`StatisticsAggregator::snapshot`]
//! projects the accumulators into a [`Summary`] without mutating them.
//!
//! ## Usage Example
//!
//! ```rust
//! use slipstream::stats::FieldAccumulator;
//!
//! let mut acc = FieldAccumulator::new();
//! for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     acc.update(x);
//! }
//! let summary = acc.summarize();
//! assert_eq!(summary.count, 5);
//! assert_eq!(summary.median, Some(3.0));
//! assert!((summary.variance - 2.5).abs() < 1e-12);
//! ```

mod accumulator;
mod aggregator;
mod summary;

pub use accumulator::{FieldAccumulator, quantile};
pub use aggregator::StatisticsAggregator;
pub use summary::{FieldSummary, Summary};
