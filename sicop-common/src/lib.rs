//! # SICOP Common Library
//!
//! Shared code for the SICOP valuation service:
//! - Error types
//! - Configuration loading
//! - Comuna normalization
//! - API request/response types

pub mod api;
pub mod config;
pub mod error;
pub mod normalize;

pub use error::{Error, Result};
pub use normalize::normalize_comuna;
