//! Raw estimate records for audit storage
//!
//! Every provider call hands back one of these alongside the estimate. The
//! caller stores it as-is; it is never reparsed to rebuild an estimate.

use crate::models::EstimateResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;

/// Everything the caller needs to audit how an estimate was produced.
/// Decimal fields serialize as numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEstimateRecord {
    #[serde(flatten)]
    pub estimate: EstimateResult,
    pub processing_time_seconds: f64,
    pub model_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RawEstimateRecord {
    pub fn new(estimate: EstimateResult, model_used: impl Into<String>, processing_time_seconds: f64) -> Self {
        Self {
            estimate,
            processing_time_seconds,
            model_used: model_used.into(),
            tokens_used: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_tokens(mut self, tokens_used: Option<u32>) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// SHA-256 over the serialized record, hex encoded
    pub fn digest(&self) -> String {
        compute_record_digest(self)
    }
}

/// Streams the JSON form of `record` straight into the hasher.
pub fn compute_record_digest(record: &RawEstimateRecord) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), record).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
