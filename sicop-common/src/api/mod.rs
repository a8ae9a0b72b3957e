//! API types shared between the valuation engine and the HTTP layer
//!
//! This module contains ONLY plain serde types (no HTTP framework
//! dependencies). The service crate wraps them with axum extractors.

pub mod types;

pub use types::{
    EstimateResponse, GlobalSegment, LocalSegment, PropertyInput, SegmentResponse,
    SimilarMatch, SimilarResponse, UNDEFINED_SEGMENT,
};
