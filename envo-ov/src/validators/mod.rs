//! Observation validators
//!
//! Each validator answers one question about a submission and produces a
//! verdict the decision engine records as evidence:
//! - [`range_validator`] - are the structured fields physically possible?
//! - [`geospatial`] - can this observation exist at this location?
//! - [`cross_reference`] - does it agree with independent reference data?

pub mod cross_reference;
pub mod geospatial;
pub mod range_validator;

pub use cross_reference::{CrossCheck, CrossValidator};
pub use geospatial::{GeoVerdict, GeospatialChecker};
pub use range_validator::{validate_ranges, FieldRangeResult, RangeCheck, RangeViolation};
