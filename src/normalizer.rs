//! Normalization of model output into a complete estimate
//!
//! The model returns a loosely-structured JSON object. Missing numbers are
//! zero-filled, short series are extrapolated and long ones truncated, so the
//! result always carries exactly ten consistent years.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

use crate::error::EstimationError;
use crate::extrapolator::extrapolate;
use crate::models::{
    EstimateResult, PropertyEstimateRequest, YearlyFinancials, ACRES_TO_HECTARES, PROJECTION_YEARS,
};
use crate::Result;

pub const DEFAULT_PROJECT_NAME: &str = "Regenerative Agriculture Project";
pub const DEFAULT_PROJECT_DESCRIPTION: &str =
    "A comprehensive regenerative agriculture project focused on sustainable farming practices.";

const NUMERIC_FIELDS: [&str; 4] = [
    "agricultural_sales",
    "ecosystem_services",
    "subsidies_incentives",
    "total_costs",
];

/// A normalized estimate plus notes about anything that had to be filled in
#[derive(Debug, Clone)]
pub struct NormalizedEstimate {
    pub estimate: EstimateResult,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelPayload {
    project_name: Option<String>,
    project_description: Option<String>,
    #[serde(default)]
    yearly_projections: Vec<Value>,
}

/// "A, B, C" → "A, C"; no comma → the trimmed address
pub fn format_location(address: &str) -> String {
    let parts: Vec<&str> = address.split(',').collect();
    match (parts.first(), parts.last()) {
        (Some(first), Some(last)) if parts.len() >= 2 => {
            format!("{}, {}", first.trim(), last.trim())
        }
        _ => address.trim().to_string(),
    }
}

/// Acres → hectares, rounded to one decimal place
pub fn area_hectares(lot_size_acres: Decimal) -> Decimal {
    (lot_size_acres * ACRES_TO_HECTARES)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven)
}

/// Turn the model's JSON text into a 10-year estimate for `request`.
///
/// Fails with [`EstimationError::Parse`] when the text is not the expected
/// JSON object, carries no usable projection year, or holds amounts whose
/// totals leave the decimal range.
pub fn normalize_payload(
    response_text: &str,
    request: &PropertyEstimateRequest,
) -> Result<NormalizedEstimate> {
    let cleaned = response_text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let payload: ModelPayload = serde_json::from_str(cleaned)
        .map_err(|e| EstimationError::Parse(format!("invalid model payload: {}", e)))?;

    let mut warnings = Vec::new();

    if payload.yearly_projections.is_empty() {
        return Err(EstimationError::Parse(
            "model payload has no yearly projections".to_string(),
        ));
    }

    if payload.yearly_projections.len() > PROJECTION_YEARS {
        warnings.push(format!(
            "{} projection years returned; kept the first {}",
            payload.yearly_projections.len(),
            PROJECTION_YEARS
        ));
    }

    let mut years = Vec::with_capacity(PROJECTION_YEARS);
    for (index, entry) in payload
        .yearly_projections
        .iter()
        .take(PROJECTION_YEARS)
        .enumerate()
    {
        years.push(parse_year(index, entry, &mut warnings)?);
    }

    if years.len() < PROJECTION_YEARS {
        warnings.push(format!(
            "{} projection years returned; extrapolated the remaining {}",
            years.len(),
            PROJECTION_YEARS - years.len()
        ));
        years = extrapolate(&years, PROJECTION_YEARS)?;
    }

    let project_name = payload
        .project_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
    let project_description = payload
        .project_description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_DESCRIPTION.to_string());

    for w in &warnings {
        warn!(address = %request.address(), "Partial model payload: {}", w);
    }

    let estimate = EstimateResult::new(
        project_name,
        project_description,
        format_location(request.address()),
        area_hectares(request.lot_size()),
        years,
    )?;

    Ok(NormalizedEstimate { estimate, warnings })
}

/// Years are numbered by position so the series is always 1..=10.
fn parse_year(index: usize, entry: &Value, warnings: &mut Vec<String>) -> Result<YearlyFinancials> {
    let year = index as u32 + 1;
    let object = entry.as_object().ok_or_else(|| {
        EstimationError::Parse(format!("projection {} is not an object", year))
    })?;

    if let Some(claimed) = object.get("year").and_then(Value::as_u64) {
        if claimed != u64::from(year) {
            warnings.push(format!("projection {} was labelled year {}", year, claimed));
        }
    }

    let mut values = [Decimal::ZERO; 4];
    for (slot, field) in values.iter_mut().zip(NUMERIC_FIELDS) {
        match object.get(field) {
            None | Some(Value::Null) => {
                warnings.push(format!("year {}: missing {}, treated as 0", year, field));
            }
            Some(v) => *slot = decimal_from_value(v).ok_or_else(|| {
                EstimationError::Parse(format!("year {}: {} is not numeric: {}", year, field, v))
            })?,
        }
    }

    let [agricultural_sales, ecosystem_services, subsidies_incentives, total_costs] = values;
    YearlyFinancials::from_components(
        year,
        agricultural_sales,
        ecosystem_services,
        subsidies_incentives,
        total_costs,
    )
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn request() -> PropertyEstimateRequest {
        PropertyEstimateRequest::new("Test Ranch, Travis County, Texas", dec("10"), None).unwrap()
    }

    fn projection(year: u32) -> Value {
        json!({
            "year": year,
            "agricultural_sales": 1000 * year,
            "ecosystem_services": 100.5,
            "subsidies_incentives": "50",
            "total_costs": 800
        })
    }

    fn payload(years: impl IntoIterator<Item = u32>) -> String {
        json!({
            "project_name": "Green Acres Revival",
            "project_description": "Cover crops and rotational grazing.",
            "yearly_projections": years.into_iter().map(projection).collect::<Vec<_>>()
        })
        .to_string()
    }

    #[test]
    fn test_location_derivation() {
        assert_eq!(
            format_location("São José do Rio Preto, SP, Brazil"),
            "São José do Rio Preto, Brazil"
        );
        assert_eq!(format_location("Plainname"), "Plainname");
        assert_eq!(format_location("  Farm ,  Texas "), "Farm, Texas");
    }

    #[test]
    fn test_area_conversion() {
        assert_eq!(area_hectares(dec("10")), dec("4.0"));
        assert_eq!(area_hectares(dec("10")).to_string(), "4.0");
        assert_eq!(area_hectares(dec("25")), dec("10.1"));
        assert_eq!(area_hectares(dec("100")), dec("40.5"));
    }

    #[test]
    fn test_full_payload() {
        let normalized = normalize_payload(&payload(1..=10), &request()).unwrap();
        let estimate = &normalized.estimate;

        assert_eq!(estimate.project_name(), "Green Acres Revival");
        assert_eq!(estimate.location(), "Test Ranch, Texas");
        assert_eq!(estimate.area_hectares(), dec("4.0"));
        assert_eq!(estimate.yearly_financials().len(), 10);
        assert!(normalized.warnings.is_empty());

        let first = &estimate.yearly_financials()[0];
        assert_eq!(first.total_revenue(), dec("1150.5"));
        assert_eq!(first.net_cash_flow(), dec("350.5"));

        let sum: Decimal = estimate.yearly_financials().iter().map(|y| y.total_revenue()).sum();
        assert_eq!(estimate.total_revenue_10_year(), sum);
    }

    #[test]
    fn test_short_payload_is_extrapolated() {
        let normalized = normalize_payload(&payload(1..=3), &request()).unwrap();
        let years = normalized.estimate.yearly_financials();

        assert_eq!(years.len(), 10);
        assert_eq!(years[3].year(), 4);
        assert_eq!(years[3].agricultural_sales(), dec("3150"));
        assert!(!normalized.warnings.is_empty());
    }

    #[test]
    fn test_long_payload_is_truncated() {
        let normalized = normalize_payload(&payload(1..=14), &request()).unwrap();
        let years = normalized.estimate.yearly_financials();
        assert_eq!(years.len(), 10);
        assert_eq!(years[9].agricultural_sales(), dec("10000"));
    }

    #[test]
    fn test_missing_fields_are_zero_filled() {
        let text = json!({
            "yearly_projections": [{ "year": 1, "agricultural_sales": 500 }]
        })
        .to_string();

        let normalized = normalize_payload(&text, &request()).unwrap();
        let estimate = &normalized.estimate;
        let first = &estimate.yearly_financials()[0];

        assert_eq!(estimate.project_name(), DEFAULT_PROJECT_NAME);
        assert_eq!(estimate.project_description(), DEFAULT_PROJECT_DESCRIPTION);
        assert_eq!(first.ecosystem_services(), Decimal::ZERO);
        assert_eq!(first.total_costs(), Decimal::ZERO);
        assert_eq!(first.net_cash_flow(), dec("500"));
        assert!(normalized.warnings.iter().any(|w| w.contains("missing total_costs")));
    }

    #[test]
    fn test_fenced_payload() {
        let fenced = format!("```json\n{}\n```", payload(1..=10));
        assert!(normalize_payload(&fenced, &request()).is_ok());
    }

    #[test]
    fn test_years_are_renumbered_by_position() {
        let text = json!({ "yearly_projections": [projection(3), projection(7)] }).to_string();
        let normalized = normalize_payload(&text, &request()).unwrap();
        let years: Vec<u32> = normalized.estimate.yearly_financials().iter().map(|y| y.year()).collect();
        assert_eq!(years, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_malformed_payloads_fail_to_parse() {
        let cases = vec![
            "not json at all".to_string(),
            "[1, 2, 3]".to_string(),
            json!({ "project_name": "x" }).to_string(),
            json!({ "yearly_projections": [] }).to_string(),
            json!({ "yearly_projections": [42] }).to_string(),
            json!({ "yearly_projections": [{ "agricultural_sales": "lots" }] }).to_string(),
        ];

        for c in cases {
            assert!(
                matches!(normalize_payload(&c, &request()), Err(EstimationError::Parse(_))),
                "expected parse failure for {}",
                c
            );
        }
    }

    #[test]
    fn test_out_of_range_amounts_fail_to_parse() {
        let huge = "70000000000000000000000000000";

        // Revenue components overflow within a single year
        let one_year = json!({
            "yearly_projections": [{
                "agricultural_sales": huge,
                "ecosystem_services": huge,
                "subsidies_incentives": 0,
                "total_costs": 0
            }]
        })
        .to_string();

        // Each year fits, the 10-year total does not
        let ten_years = json!({
            "yearly_projections": (1..=10)
                .map(|year| json!({
                    "year": year,
                    "agricultural_sales": huge,
                    "ecosystem_services": 0,
                    "subsidies_incentives": 0,
                    "total_costs": 0
                }))
                .collect::<Vec<_>>()
        })
        .to_string();

        for text in [one_year, ten_years] {
            assert!(matches!(
                normalize_payload(&text, &request()),
                Err(EstimationError::Parse(_))
            ));
        }
    }
}
