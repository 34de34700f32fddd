//! # Envo Common Library
//!
//! Shared code for Envo services including:
//! - Observation domain model (categories, trust tiers, structured fields)
//! - Geographic primitives (bounding boxes, great-circle distance)
//! - Quality classification of measured values
//! - TOML configuration loading

pub mod config;
pub mod error;
pub mod geo;
pub mod observation;
pub mod quality;

pub use error::{Error, Result};
pub use geo::BoundingBox;
pub use observation::{Category, FieldValue, Observation, TrustTier};
