//! Estimate service
//!
//! INQUIRY → QUESTIONNAIRE → GENERATE → RESULTS
//!
//! Owns the request flow around the providers: builds the estimate request
//! from an inquiry and its answers, claims the inquiry's estimate slot, calls
//! the provider once, and records success or failure.

use crate::error::EstimationError;
use crate::models::{AreaUnit, EstimateRecord, EstimateStatus, Inquiry, PropertyEstimateRequest};
use crate::providers::EstimateProvider;
use crate::questionnaire::{self, Question};
use crate::store::{EstimateClaim, InquiryStore};
use crate::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Progress snapshot for polling clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusReport {
    pub status: EstimateStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A question together with the answer given so far
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub question: Question,
    pub current_response: String,
    pub progress: u8,
    pub questionnaire_completed: bool,
}

pub struct EstimateService {
    store: Arc<dyn InquiryStore>,
    provider: Arc<dyn EstimateProvider>,
}

impl EstimateService {
    pub fn new(store: Arc<dyn InquiryStore>, provider: Arc<dyn EstimateProvider>) -> Self {
        Self { store, provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn create_inquiry(
        &self,
        address: &str,
        lot_size: Decimal,
        unit: AreaUnit,
        user_context: Option<String>,
    ) -> Result<Inquiry> {
        let request = PropertyEstimateRequest::new(address, unit.to_acres(lot_size)?, user_context)?;
        let inquiry = self.store.create_inquiry(Inquiry::new(&request)).await?;

        info!(
            inquiry_id = %inquiry.id,
            address = %inquiry.address,
            "Created property inquiry"
        );
        Ok(inquiry)
    }

    pub async fn inquiry(&self, inquiry_id: Uuid) -> Result<Inquiry> {
        self.store
            .get_inquiry(inquiry_id)
            .await?
            .ok_or_else(|| EstimationError::NotFound(format!("inquiry {}", inquiry_id)))
    }

    pub async fn question(&self, inquiry_id: Uuid, number: u8) -> Result<QuestionView> {
        let inquiry = self.inquiry(inquiry_id).await?;
        let question = questionnaire::question(number).copied().ok_or_else(|| {
            EstimationError::NotFound(format!("question {}", number))
        })?;

        Ok(QuestionView {
            question,
            current_response: inquiry
                .questionnaire_responses
                .get(&number)
                .cloned()
                .unwrap_or_default(),
            progress: questionnaire::progress_percentage(number),
            questionnaire_completed: inquiry.questionnaire_completed,
        })
    }

    pub async fn answer_question(&self, inquiry_id: Uuid, number: u8, response: &str) -> Result<Inquiry> {
        let response = questionnaire::validate_answer(number, response)?;
        let inquiry = self.store.save_response(inquiry_id, number, response).await?;

        info!(inquiry_id = %inquiry_id, question = number, "Saved questionnaire response");
        if inquiry.questionnaire_completed {
            info!(inquiry_id = %inquiry_id, "Questionnaire completed");
        }
        Ok(inquiry)
    }

    /// Generate (or return the already-completed) estimate for an inquiry.
    ///
    /// Provider failures are recorded on the estimate and returned as a
    /// `Failed` record rather than an error. Generation runs as its own task,
    /// so a caller that stops waiting (timeout, client disconnect) does not
    /// leave the record stuck in `Processing`.
    pub async fn generate_estimate(&self, inquiry_id: Uuid) -> Result<EstimateRecord> {
        let inquiry = match self.store.begin_estimate(inquiry_id).await? {
            EstimateClaim::AlreadyCompleted(record) => return Ok(record),
            EstimateClaim::Started(inquiry) => inquiry,
        };

        let task = tokio::spawn(run_generation(
            Arc::clone(&self.store),
            Arc::clone(&self.provider),
            inquiry,
        ));

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(inquiry_id = %inquiry_id, "Estimate task aborted: {}", e);
                self.store
                    .fail_estimate(inquiry_id, format!("Estimate task aborted: {}", e), None)
                    .await
            }
        }
    }

    pub async fn status(&self, inquiry_id: Uuid) -> Result<StatusReport> {
        self.inquiry(inquiry_id).await?;

        let report = match self.store.get_estimate(inquiry_id).await? {
            None => StatusReport {
                status: EstimateStatus::Pending,
                progress: 0,
                error: None,
            },
            Some(record) => StatusReport {
                status: record.status,
                progress: match record.status {
                    EstimateStatus::Completed => 100,
                    EstimateStatus::Processing => 75,
                    EstimateStatus::Pending | EstimateStatus::Failed => 0,
                },
                error: match record.status {
                    EstimateStatus::Failed => Some(
                        record
                            .error_message
                            .unwrap_or_else(|| "Unknown error occurred".to_string()),
                    ),
                    _ => None,
                },
            },
        };
        Ok(report)
    }

    pub async fn estimate(&self, inquiry_id: Uuid) -> Result<EstimateRecord> {
        self.store
            .get_estimate(inquiry_id)
            .await?
            .ok_or_else(|| EstimationError::NotFound(format!("estimate for inquiry {}", inquiry_id)))
    }
}

/// Provider call plus the store update that settles the claimed record
async fn run_generation(
    store: Arc<dyn InquiryStore>,
    provider: Arc<dyn EstimateProvider>,
    inquiry: Inquiry,
) -> Result<EstimateRecord> {
    let inquiry_id = inquiry.id;
    let start = Instant::now();
    let result = match inquiry.estimate_request() {
        Ok(request) => provider.generate(&request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            info!(
                inquiry_id = %inquiry_id,
                project_name = %outcome.estimate.project_name(),
                model = %outcome.raw.model_used,
                "Generated estimate"
            );
            store.complete_estimate(inquiry_id, outcome).await
        }
        Err(e) => {
            let processing_time = e
                .processing_time()
                .unwrap_or_else(|| start.elapsed().as_secs_f64());
            error!(inquiry_id = %inquiry_id, "AI estimation failed: {}", e);
            store
                .fail_estimate(inquiry_id, e.to_string(), Some(processing_time))
                .await
        }
    }
}
