//! Period aggregation and disaggregation-factor computation.
//!
//! Records are summed into period buckets, buckets are normalized against
//! their parent period, and the resulting factors (or uniformly expanded
//! monthly values) are summarized into cyclical profiles.

pub mod aggregate;
pub mod classify;
pub mod expand;
pub mod factors;
pub mod profile;
pub mod sector;
pub mod types;
pub mod utility;
