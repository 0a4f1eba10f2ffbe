//! Range math.
//!
//! Splits a resource of known size into one contiguous byte range per
//! fetch unit.

mod range;

pub use range::{plan_ranges, ByteRange, PlanError};
