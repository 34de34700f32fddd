//! HTTP API handlers for envo-ov

pub mod health;
pub mod ml;
pub mod observe;

pub use health::health_routes;
pub use ml::ml_routes;
pub use observe::observation_routes;
