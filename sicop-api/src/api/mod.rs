//! HTTP API handlers for sicop-api

pub mod health;
pub mod valuation;

pub use health::health_routes;
pub use valuation::valuation_routes;
