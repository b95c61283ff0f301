//! Fallback coordinator
//!
//! Tries the production provider once; on failure classifies the error,
//! logs it, and makes a single call to the fallback provider. There is no
//! retry loop beyond that one hop.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::EstimationError;
use crate::models::PropertyEstimateRequest;
use crate::providers::mock::MockEstimator;
use crate::providers::openai::OpenAiEstimator;
use crate::providers::{EstimateOutcome, EstimateProvider};
use crate::Result;

/// Why the production provider failed, judged from its error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rate limit or quota exceeded
    Quota,
    Authentication,
    InsufficientCredit,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Quota => "quota",
            FailureKind::Authentication => "authentication",
            FailureKind::InsufficientCredit => "insufficient credit",
            FailureKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// `insufficient_quota` is checked before the generic quota match, which
/// would otherwise swallow it.
pub fn classify_failure(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();

    if lowered.contains("insufficient_quota") {
        FailureKind::InsufficientCredit
    } else if lowered.contains("429") || lowered.contains("quota") {
        FailureKind::Quota
    } else if lowered.contains("401") || lowered.contains("authentication") {
        FailureKind::Authentication
    } else {
        FailureKind::Other
    }
}

/// Routes each request to production first, then to the fallback provider
pub struct FallbackEstimator {
    production: Option<Arc<dyn EstimateProvider>>,
    fallback: Arc<dyn EstimateProvider>,
}

impl FallbackEstimator {
    pub fn new(
        production: Option<Arc<dyn EstimateProvider>>,
        fallback: Arc<dyn EstimateProvider>,
    ) -> Self {
        Self {
            production,
            fallback,
        }
    }

    pub fn fallback_only(fallback: Arc<dyn EstimateProvider>) -> Self {
        Self::new(None, fallback)
    }

    /// Production is enabled only for a well-formed `sk-` key; any
    /// construction failure leaves the coordinator in mock-only mode.
    pub fn from_settings(settings: &Settings) -> Self {
        let mock: Arc<dyn EstimateProvider> = Arc::new(
            MockEstimator::new().with_delay(settings.mock_delay_min, settings.mock_delay_max),
        );

        let Some(key) = settings.production_key() else {
            info!("Invalid or missing OpenAI API key. Using mock service only.");
            return Self::fallback_only(mock);
        };

        match OpenAiEstimator::new(key) {
            Ok(estimator) => {
                info!("OpenAI production service initialized. Will try OpenAI first, fallback to mock on errors.");
                let estimator = estimator
                    .with_model(settings.openai_model.clone())
                    .with_base_url(settings.openai_base_url.clone());
                Self::new(Some(Arc::new(estimator)), mock)
            }
            Err(e) => {
                warn!("Failed to initialize OpenAI service: {}. Using mock service only.", e);
                Self::fallback_only(mock)
            }
        }
    }

    pub fn has_production(&self) -> bool {
        self.production.is_some()
    }

    async fn call_fallback(
        &self,
        request: &PropertyEstimateRequest,
        start: Instant,
        production_error: Option<String>,
    ) -> Result<EstimateOutcome> {
        match self.fallback.generate(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = match production_error {
                    Some(original) => format!("{}; fallback also failed: {}", original, e),
                    None => e.to_string(),
                };
                Err(EstimationError::Terminal {
                    message,
                    processing_time: start.elapsed().as_secs_f64(),
                })
            }
        }
    }
}

#[async_trait]
impl EstimateProvider for FallbackEstimator {
    fn model_name(&self) -> &str {
        match &self.production {
            Some(p) => p.model_name(),
            None => self.fallback.model_name(),
        }
    }

    async fn generate(&self, request: &PropertyEstimateRequest) -> Result<EstimateOutcome> {
        let start = Instant::now();

        let Some(production) = &self.production else {
            info!("Using mock AI service (no OpenAI available)");
            return self.call_fallback(request, start, None).await;
        };

        info!("Attempting OpenAI production service...");
        let error_message = match production.generate(request).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e.to_string(),
        };

        let kind = classify_failure(&error_message);
        match kind {
            FailureKind::Quota => {
                warn!(kind = %kind, "OpenAI quota exceeded. Using mock service as fallback.")
            }
            FailureKind::Authentication => {
                warn!(kind = %kind, "OpenAI authentication failed. Check your API key. Using mock service.")
            }
            FailureKind::InsufficientCredit => {
                warn!(kind = %kind, "OpenAI account has insufficient credits. Using mock service.")
            }
            FailureKind::Other => {
                warn!(kind = %kind, "OpenAI service failed: {}. Using mock service as fallback.", error_message)
            }
        }

        let mut outcome = self
            .call_fallback(request, start, Some(error_message.clone()))
            .await?;
        outcome
            .raw
            .warnings
            .push(format!("production provider unavailable ({}): {}", kind, error_message));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MOCK_MODEL;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that always fails with a fixed message and counts calls
    struct FailingProvider {
        message: &'static str,
        calls: AtomicUsize,
    }

    impl FailingProvider {
        fn new(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                message,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EstimateProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _request: &PropertyEstimateRequest) -> Result<EstimateOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EstimationError::Provider {
                message: self.message.to_string(),
                processing_time: 0.1,
            })
        }
    }

    fn request() -> PropertyEstimateRequest {
        PropertyEstimateRequest::new("Test Ranch, Texas", Decimal::from(100), None).unwrap()
    }

    fn mock() -> Arc<dyn EstimateProvider> {
        Arc::new(MockEstimator::new().without_delay())
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify_failure("OpenAI estimation failed: API returned 429 Too Many Requests"),
            FailureKind::Quota
        );
        assert_eq!(classify_failure("You exceeded your current QUOTA"), FailureKind::Quota);
        assert_eq!(
            classify_failure("API returned 401 Unauthorized: invalid key"),
            FailureKind::Authentication
        );
        assert_eq!(
            classify_failure("Authentication error: bad token"),
            FailureKind::Authentication
        );
        assert_eq!(
            classify_failure("{\"code\": \"insufficient_quota\"}"),
            FailureKind::InsufficientCredit
        );
        assert_eq!(classify_failure("connection reset by peer"), FailureKind::Other);
    }

    #[tokio::test]
    async fn test_no_production_routes_to_mock() {
        let coordinator = FallbackEstimator::fallback_only(mock());
        assert!(!coordinator.has_production());

        let outcome = coordinator.generate(&request()).await.unwrap();
        assert_eq!(outcome.raw.model_used, MOCK_MODEL);
        assert_eq!(outcome.estimate.yearly_financials().len(), 10);
        assert!(outcome.raw.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_quota_failure_falls_back_to_mock() {
        let production = FailingProvider::new("OpenAI estimation failed: API returned 429 Too Many Requests");
        let coordinator = FallbackEstimator::new(Some(production.clone()), mock());

        let outcome = coordinator.generate(&request()).await.unwrap();

        assert_eq!(production.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.raw.model_used, MOCK_MODEL);
        assert_eq!(outcome.estimate.yearly_financials().len(), 10);
        assert!(outcome.raw.warnings[0].contains("(quota)"));
    }

    #[tokio::test]
    async fn test_both_failing_is_terminal() {
        let production = FailingProvider::new("API returned 401 Unauthorized");
        let fallback = FailingProvider::new("Mock AI estimation failed: boom");
        let coordinator = FallbackEstimator::new(Some(production.clone()), fallback.clone());

        let err = coordinator.generate(&request()).await.unwrap_err();

        assert_eq!(production.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        match err {
            EstimationError::Terminal { message, processing_time } => {
                assert!(message.contains("401 Unauthorized"));
                assert!(message.contains("boom"));
                assert!(processing_time >= 0.0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_only_failure_is_terminal() {
        let coordinator = FallbackEstimator::fallback_only(FailingProvider::new("disk on fire"));
        let err = coordinator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, EstimationError::Terminal { .. }));
        assert!(err.processing_time().is_some());
    }

    #[test]
    fn test_from_settings_requires_real_key() {
        let mut settings = Settings::default();
        assert!(!FallbackEstimator::from_settings(&settings).has_production());

        settings.openai_api_key = Some("sk-test-key-0123456789abcdef".to_string());
        let coordinator = FallbackEstimator::from_settings(&settings);
        assert!(coordinator.has_production());
        assert_eq!(coordinator.model_name(), "gpt-4o-mini");
    }
}
