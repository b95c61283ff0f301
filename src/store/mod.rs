//! Inquiry and estimate persistence
//!
//! Holds inquiries and the single estimate attached to each.
//! Currently uses in-memory; can be replaced with a database-backed store.

use crate::error::EstimationError;
use crate::models::{EstimateRecord, EstimateStatus, Inquiry};
use crate::providers::EstimateOutcome;
use crate::questionnaire::QUESTION_COUNT;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Result of claiming an inquiry for estimate generation
#[derive(Debug, Clone)]
pub enum EstimateClaim {
    /// The estimate is now `Processing`; the caller owns generation
    Started(Inquiry),
    /// A completed estimate already exists
    AlreadyCompleted(EstimateRecord),
}

/// Trait for inquiry persistence
#[async_trait::async_trait]
pub trait InquiryStore: Send + Sync {
    async fn create_inquiry(&self, inquiry: Inquiry) -> Result<Inquiry>;
    async fn get_inquiry(&self, inquiry_id: Uuid) -> Result<Option<Inquiry>>;
    async fn save_response(&self, inquiry_id: Uuid, question: u8, response: String) -> Result<Inquiry>;

    /// Get-or-create the estimate record and move it to `Processing`.
    /// Fails with `Conflict` while another generation is in flight.
    async fn begin_estimate(&self, inquiry_id: Uuid) -> Result<EstimateClaim>;
    async fn complete_estimate(&self, inquiry_id: Uuid, outcome: EstimateOutcome) -> Result<EstimateRecord>;
    async fn fail_estimate(
        &self,
        inquiry_id: Uuid,
        error_message: String,
        processing_time: Option<f64>,
    ) -> Result<EstimateRecord>;
    async fn get_estimate(&self, inquiry_id: Uuid) -> Result<Option<EstimateRecord>>;
}

/// In-memory store for development and tests
pub struct InMemoryInquiryStore {
    inquiries: Arc<RwLock<HashMap<Uuid, Inquiry>>>,
    estimates: Arc<RwLock<HashMap<Uuid, EstimateRecord>>>,
}

impl InMemoryInquiryStore {
    pub fn new() -> Self {
        Self {
            inquiries: Arc::new(RwLock::new(HashMap::new())),
            estimates: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryInquiryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(inquiry_id: Uuid) -> EstimationError {
    EstimationError::NotFound(format!("inquiry {}", inquiry_id))
}

#[async_trait::async_trait]
impl InquiryStore for InMemoryInquiryStore {

    async fn create_inquiry(&self, inquiry: Inquiry) -> Result<Inquiry> {
        let mut inquiries = self.inquiries.write().await;
        if inquiries.contains_key(&inquiry.id) {
            return Err(EstimationError::Conflict(format!(
                "inquiry {} already exists",
                inquiry.id
            )));
        }
        inquiries.insert(inquiry.id, inquiry.clone());
        Ok(inquiry)
    }

    async fn get_inquiry(&self, inquiry_id: Uuid) -> Result<Option<Inquiry>> {
        let inquiries = self.inquiries.read().await;
        Ok(inquiries.get(&inquiry_id).cloned())
    }

    async fn save_response(&self, inquiry_id: Uuid, question: u8, response: String) -> Result<Inquiry> {
        let mut inquiries = self.inquiries.write().await;
        let inquiry = inquiries
            .get_mut(&inquiry_id)
            .ok_or_else(|| not_found(inquiry_id))?;

        inquiry.questionnaire_responses.insert(question, response);
        inquiry.current_question = inquiry.current_question.max(question);
        if question >= QUESTION_COUNT {
            inquiry.questionnaire_completed = true;
        }
        inquiry.updated_at = Utc::now();

        Ok(inquiry.clone())
    }

    async fn begin_estimate(&self, inquiry_id: Uuid) -> Result<EstimateClaim> {
        let inquiry = {
            let inquiries = self.inquiries.read().await;
            inquiries
                .get(&inquiry_id)
                .cloned()
                .ok_or_else(|| not_found(inquiry_id))?
        };

        let mut estimates = self.estimates.write().await;
        let record = estimates
            .entry(inquiry_id)
            .or_insert_with(|| EstimateRecord::pending(inquiry_id));

        match record.status {
            EstimateStatus::Completed => Ok(EstimateClaim::AlreadyCompleted(record.clone())),
            EstimateStatus::Processing => Err(EstimationError::Conflict(format!(
                "estimate for inquiry {} is already processing",
                inquiry_id
            ))),
            EstimateStatus::Pending | EstimateStatus::Failed => {
                record.status = EstimateStatus::Processing;
                record.error_message = None;
                record.updated_at = Utc::now();
                Ok(EstimateClaim::Started(inquiry))
            }
        }
    }

    async fn complete_estimate(&self, inquiry_id: Uuid, outcome: EstimateOutcome) -> Result<EstimateRecord> {
        let mut estimates = self.estimates.write().await;
        let record = estimates
            .get_mut(&inquiry_id)
            .ok_or_else(|| not_found(inquiry_id))?;

        record.status = EstimateStatus::Completed;
        record.model_used = Some(outcome.raw.model_used.clone());
        record.processing_time_seconds = Some(outcome.raw.processing_time_seconds);
        record.estimate = Some(outcome.estimate);
        record.raw_response = Some(outcome.raw);
        record.error_message = None;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn fail_estimate(
        &self,
        inquiry_id: Uuid,
        error_message: String,
        processing_time: Option<f64>,
    ) -> Result<EstimateRecord> {
        let mut estimates = self.estimates.write().await;
        let record = estimates
            .entry(inquiry_id)
            .or_insert_with(|| EstimateRecord::pending(inquiry_id));

        record.status = EstimateStatus::Failed;
        record.error_message = Some(error_message);
        if processing_time.is_some() {
            record.processing_time_seconds = processing_time;
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn get_estimate(&self, inquiry_id: Uuid) -> Result<Option<EstimateRecord>> {
        let estimates = self.estimates.read().await;
        Ok(estimates.get(&inquiry_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyEstimateRequest;
    use crate::providers::MockEstimator;
    use rust_decimal::Decimal;

    fn inquiry() -> Inquiry {
        let request =
            PropertyEstimateRequest::new("Test Farm, Test State", Decimal::from(25), None).unwrap();
        Inquiry::new(&request)
    }

    fn outcome(inquiry: &Inquiry) -> EstimateOutcome {
        let request = inquiry.estimate_request().unwrap();
        let estimate = MockEstimator::new()
            .generate_detailed_estimate(&request)
            .unwrap();
        EstimateOutcome::new(estimate, "mock-ai-v1", 0.5)
    }

    #[test]
    fn test_create_and_get() {
        let store = InMemoryInquiryStore::new();
        let created = tokio_test::block_on(store.create_inquiry(inquiry())).unwrap();
        let loaded = tokio_test::block_on(store.get_inquiry(created.id)).unwrap().unwrap();
        assert_eq!(loaded.address, "Test Farm, Test State");
        assert!(tokio_test::block_on(store.get_inquiry(Uuid::new_v4())).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_answer_completes_questionnaire() {
        let store = InMemoryInquiryStore::new();
        let created = store.create_inquiry(inquiry()).await.unwrap();

        let after_three = store
            .save_response(created.id, 3, "Can invest $50,000".to_string())
            .await
            .unwrap();
        assert!(!after_three.questionnaire_completed);
        assert_eq!(after_three.current_question, 3);

        let after_four = store
            .save_response(created.id, 4, "Carbon credits".to_string())
            .await
            .unwrap();
        assert!(after_four.questionnaire_completed);
        assert_eq!(after_four.questionnaire_responses.len(), 2);

        // Revisiting an earlier answer keeps progress where it was
        let edited = store
            .save_response(created.id, 1, "Improve soil health".to_string())
            .await
            .unwrap();
        assert_eq!(edited.current_question, 4);
        assert_eq!(edited.progress_percentage(), 100);
        assert!(edited.questionnaire_completed);
    }

    #[tokio::test]
    async fn test_one_estimate_per_inquiry() {
        let store = InMemoryInquiryStore::new();
        let created = store.create_inquiry(inquiry()).await.unwrap();

        let claim = store.begin_estimate(created.id).await.unwrap();
        assert!(matches!(claim, EstimateClaim::Started(_)));

        // Second claim while processing is refused
        assert!(matches!(
            store.begin_estimate(created.id).await,
            Err(EstimationError::Conflict(_))
        ));

        let record = store
            .complete_estimate(created.id, outcome(&created))
            .await
            .unwrap();
        assert_eq!(record.status, EstimateStatus::Completed);
        assert_eq!(record.model_used.as_deref(), Some("mock-ai-v1"));

        match store.begin_estimate(created.id).await.unwrap() {
            EstimateClaim::AlreadyCompleted(existing) => {
                assert_eq!(existing.estimate, record.estimate);
            }
            other => panic!("unexpected claim: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_estimate_can_be_retried() {
        let store = InMemoryInquiryStore::new();
        let created = store.create_inquiry(inquiry()).await.unwrap();

        store.begin_estimate(created.id).await.unwrap();
        let failed = store
            .fail_estimate(created.id, "OpenAI estimation failed".to_string(), Some(1.5))
            .await
            .unwrap();
        assert_eq!(failed.status, EstimateStatus::Failed);
        assert_eq!(failed.processing_time_seconds, Some(1.5));

        let claim = store.begin_estimate(created.id).await.unwrap();
        assert!(matches!(claim, EstimateClaim::Started(_)));
        let record = store.get_estimate(created.id).await.unwrap().unwrap();
        assert_eq!(record.status, EstimateStatus::Processing);
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn test_unknown_inquiry() {
        let store = InMemoryInquiryStore::new();
        assert!(matches!(
            store.begin_estimate(Uuid::new_v4()).await,
            Err(EstimationError::NotFound(_))
        ));
        assert!(matches!(
            store.save_response(Uuid::new_v4(), 1, "x".repeat(10)).await,
            Err(EstimationError::NotFound(_))
        ));
    }
}
