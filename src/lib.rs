//! Property Estimate Service
//!
//! Produces 10-year regenerative-agriculture financial projections for a
//! property:
//! - Validates the property request (address, acreage, free-text context)
//! - Asks a language model for a projection and normalizes its JSON
//! - Extrapolates short projections and fills missing fields with warnings
//! - Falls back to a locally generated estimate when the model is unavailable
//! - Keeps the raw payload alongside the typed result for auditing
//!
//! FLOW:
//! INQUIRY → QUESTIONNAIRE → GENERATE → NORMALIZE → STORE

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod extrapolator;
pub mod models;
pub mod normalizer;
pub mod providers;
pub mod questionnaire;
pub mod service;
pub mod store;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use providers::{EstimateOutcome, EstimateProvider};
