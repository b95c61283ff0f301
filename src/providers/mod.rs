//! Estimate providers
//!
//! A provider turns a validated request into a full 10-year estimate plus
//! the raw record for audit storage. The production provider calls OpenAI,
//! the mock provider synthesizes figures locally, and the fallback
//! coordinator routes between them.

use crate::audit::RawEstimateRecord;
use crate::models::{EstimateResult, PropertyEstimateRequest};
use crate::Result;
use async_trait::async_trait;

pub mod fallback;
pub mod mock;
pub mod openai;

pub use fallback::{classify_failure, FailureKind, FallbackEstimator};
pub use mock::MockEstimator;
pub use openai::OpenAiEstimator;

/// What a provider hands back for one request
#[derive(Debug, Clone)]
pub struct EstimateOutcome {
    pub estimate: EstimateResult,
    pub raw: RawEstimateRecord,
}

impl EstimateOutcome {
    pub fn new(estimate: EstimateResult, model_used: &str, processing_time_seconds: f64) -> Self {
        let raw = RawEstimateRecord::new(estimate.clone(), model_used, processing_time_seconds);
        Self { estimate, raw }
    }
}

/// Trait for estimate generation backends
#[async_trait]
pub trait EstimateProvider: Send + Sync {
    /// Model identifier recorded in the raw record
    fn model_name(&self) -> &str;

    /// Produce a complete estimate for `request`
    async fn generate(&self, request: &PropertyEstimateRequest) -> Result<EstimateOutcome>;
}
