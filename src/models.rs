//! Core data models for property estimates

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::audit::RawEstimateRecord;
use crate::error::EstimationError;
use crate::questionnaire;
use crate::Result;

/// Number of projection years in every estimate
pub const PROJECTION_YEARS: usize = 10;

/// Acres → hectares (0.404686)
pub const ACRES_TO_HECTARES: Decimal = Decimal::from_parts(404686, 0, 0, false, 6);

/// Hectares → acres (2.47105)
pub const HECTARES_TO_ACRES: Decimal = Decimal::from_parts(247105, 0, 0, false, 5);

const MIN_ADDRESS_LEN: usize = 5;
const MAX_ADDRESS_LEN: usize = 500;

/// Lot sizes are stored with two decimal places, at least 0.01
const LOT_SIZE_DECIMAL_PLACES: u32 = 2;
const MIN_LOT_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Eight integer digits
const MAX_LOT_SIZE_EXCLUSIVE: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

//
// ================= Units =================
//

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    #[default]
    Acres,
    Hectares,
}

impl AreaUnit {
    /// Convert a lot size in this unit to acres. Hectare input is rounded
    /// to the two decimal places acreage is kept at.
    pub fn to_acres(self, value: Decimal) -> Result<Decimal> {
        match self {
            AreaUnit::Acres => Ok(value),
            AreaUnit::Hectares => value
                .checked_mul(HECTARES_TO_ACRES)
                .map(|acres| {
                    acres.round_dp_with_strategy(
                        LOT_SIZE_DECIMAL_PLACES,
                        RoundingStrategy::MidpointNearestEven,
                    )
                })
                .ok_or_else(|| {
                    EstimationError::Validation(format!("Lot size {} hectares is too large", value))
                }),
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AreaUnit::Acres => "acres",
            AreaUnit::Hectares => "hectares",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Request =================
//

/// A validated estimate request. Built per call and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyEstimateRequest {
    address: String,
    lot_size: Decimal,
    user_context: Option<String>,
}

impl PropertyEstimateRequest {
    pub fn new(
        address: impl Into<String>,
        lot_size: Decimal,
        user_context: Option<String>,
    ) -> Result<Self> {
        let address = address.into().trim().to_string();

        if address.is_empty() {
            return Err(EstimationError::Validation(
                "Address cannot be empty".to_string(),
            ));
        }
        let len = address.chars().count();
        if len < MIN_ADDRESS_LEN {
            return Err(EstimationError::Validation(format!(
                "Address must be at least {} characters long",
                MIN_ADDRESS_LEN
            )));
        }
        if len > MAX_ADDRESS_LEN {
            return Err(EstimationError::Validation(format!(
                "Address is too long (maximum {} characters)",
                MAX_ADDRESS_LEN
            )));
        }
        if lot_size < MIN_LOT_SIZE {
            return Err(EstimationError::Validation(format!(
                "Lot size must be at least {} acres",
                MIN_LOT_SIZE
            )));
        }
        if lot_size >= MAX_LOT_SIZE_EXCLUSIVE {
            return Err(EstimationError::Validation(format!(
                "Lot size must be below {} acres",
                MAX_LOT_SIZE_EXCLUSIVE
            )));
        }
        if lot_size.normalize().scale() > LOT_SIZE_DECIMAL_PLACES {
            return Err(EstimationError::Validation(format!(
                "Lot size allows at most {} decimal places",
                LOT_SIZE_DECIMAL_PLACES
            )));
        }

        let user_context = user_context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Self {
            address,
            lot_size,
            user_context,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Lot size in acres
    pub fn lot_size(&self) -> Decimal {
        self.lot_size
    }

    pub fn user_context(&self) -> Option<&str> {
        self.user_context.as_deref()
    }

    /// Unrounded hectare figure
    pub fn lot_size_hectares(&self) -> Decimal {
        self.lot_size * ACRES_TO_HECTARES
    }
}

//
// ================= Yearly Financials =================
//

/// One projection year. Totals are derived from the components on
/// construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "YearlyFinancialsWire")]
pub struct YearlyFinancials {
    year: u32,
    total_revenue: Decimal,
    total_costs: Decimal,
    net_cash_flow: Decimal,
    agricultural_sales: Decimal,
    ecosystem_services: Decimal,
    subsidies_incentives: Decimal,
}

impl YearlyFinancials {
    /// Fails with [`EstimationError::Parse`] when the totals overflow.
    pub fn from_components(
        year: u32,
        agricultural_sales: Decimal,
        ecosystem_services: Decimal,
        subsidies_incentives: Decimal,
        total_costs: Decimal,
    ) -> Result<Self> {
        let overflow = || EstimationError::Parse(format!("year {}: amounts out of range", year));

        let total_revenue = agricultural_sales
            .checked_add(ecosystem_services)
            .and_then(|sum| sum.checked_add(subsidies_incentives))
            .ok_or_else(overflow)?;
        let net_cash_flow = total_revenue.checked_sub(total_costs).ok_or_else(overflow)?;

        Ok(Self {
            year,
            total_revenue,
            total_costs,
            net_cash_flow,
            agricultural_sales,
            ecosystem_services,
            subsidies_incentives,
        })
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn total_revenue(&self) -> Decimal {
        self.total_revenue
    }

    pub fn total_costs(&self) -> Decimal {
        self.total_costs
    }

    pub fn net_cash_flow(&self) -> Decimal {
        self.net_cash_flow
    }

    pub fn agricultural_sales(&self) -> Decimal {
        self.agricultural_sales
    }

    pub fn ecosystem_services(&self) -> Decimal {
        self.ecosystem_services
    }

    pub fn subsidies_incentives(&self) -> Decimal {
        self.subsidies_incentives
    }

    /// Same components, different year number
    pub(crate) fn renumbered(&self, year: u32) -> Self {
        Self { year, ..self.clone() }
    }
}

#[derive(Deserialize)]
struct YearlyFinancialsWire {
    year: u32,
    total_revenue: Decimal,
    total_costs: Decimal,
    net_cash_flow: Decimal,
    agricultural_sales: Decimal,
    ecosystem_services: Decimal,
    subsidies_incentives: Decimal,
}

impl TryFrom<YearlyFinancialsWire> for YearlyFinancials {
    type Error = String;

    fn try_from(wire: YearlyFinancialsWire) -> std::result::Result<Self, Self::Error> {
        let rebuilt = YearlyFinancials::from_components(
            wire.year,
            wire.agricultural_sales,
            wire.ecosystem_services,
            wire.subsidies_incentives,
            wire.total_costs,
        )
        .map_err(|e| e.to_string())?;
        if rebuilt.total_revenue != wire.total_revenue {
            return Err(format!(
                "year {}: total_revenue {} does not match revenue components ({})",
                wire.year, wire.total_revenue, rebuilt.total_revenue
            ));
        }
        if rebuilt.net_cash_flow != wire.net_cash_flow {
            return Err(format!(
                "year {}: net_cash_flow {} does not equal revenue minus costs ({})",
                wire.year, wire.net_cash_flow, rebuilt.net_cash_flow
            ));
        }
        Ok(rebuilt)
    }
}

//
// ================= Estimate Result =================
//

/// Revenue split across the three income categories
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub agricultural_sales: Decimal,
    pub ecosystem_services: Decimal,
    pub subsidies_incentives: Decimal,
}

/// A complete 10-year estimate. The 10-year totals are computed from the
/// yearly series and are never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EstimateResultWire")]
pub struct EstimateResult {
    project_name: String,
    project_description: String,
    location: String,
    area_hectares: Decimal,
    yearly_financials: Vec<YearlyFinancials>,
    total_revenue_10_year: Decimal,
    total_costs_10_year: Decimal,
    total_net_cash_flow_10_year: Decimal,
}

impl EstimateResult {
    /// Build an estimate; the yearly series must hold years 1..=10 in order.
    pub fn new(
        project_name: impl Into<String>,
        project_description: impl Into<String>,
        location: impl Into<String>,
        area_hectares: Decimal,
        yearly_financials: Vec<YearlyFinancials>,
    ) -> Result<Self> {
        if yearly_financials.len() != PROJECTION_YEARS {
            return Err(EstimationError::Validation(format!(
                "Expected {} projection years, got {}",
                PROJECTION_YEARS,
                yearly_financials.len()
            )));
        }
        for (i, y) in yearly_financials.iter().enumerate() {
            if y.year as usize != i + 1 {
                return Err(EstimationError::Validation(format!(
                    "Projection years must run 1..={} in order (position {} holds year {})",
                    PROJECTION_YEARS,
                    i + 1,
                    y.year
                )));
            }
        }

        let overflow = || EstimationError::Parse("10-year totals out of range".to_string());
        let total_revenue_10_year =
            checked_sum(yearly_financials.iter().map(|y| y.total_revenue)).ok_or_else(overflow)?;
        let total_costs_10_year =
            checked_sum(yearly_financials.iter().map(|y| y.total_costs)).ok_or_else(overflow)?;
        let total_net_cash_flow_10_year = total_revenue_10_year
            .checked_sub(total_costs_10_year)
            .ok_or_else(overflow)?;

        Ok(Self {
            project_name: project_name.into(),
            project_description: project_description.into(),
            location: location.into(),
            area_hectares,
            yearly_financials,
            total_revenue_10_year,
            total_costs_10_year,
            total_net_cash_flow_10_year,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_description(&self) -> &str {
        &self.project_description
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn area_hectares(&self) -> Decimal {
        self.area_hectares
    }

    pub fn yearly_financials(&self) -> &[YearlyFinancials] {
        &self.yearly_financials
    }

    pub fn total_revenue_10_year(&self) -> Decimal {
        self.total_revenue_10_year
    }

    pub fn total_costs_10_year(&self) -> Decimal {
        self.total_costs_10_year
    }

    pub fn total_net_cash_flow_10_year(&self) -> Decimal {
        self.total_net_cash_flow_10_year
    }

    /// 10-year ROI as a percentage of total costs (2 dp)
    pub fn roi_percentage(&self) -> Option<Decimal> {
        if self.total_costs_10_year <= Decimal::ZERO {
            return None;
        }
        self.total_net_cash_flow_10_year
            .checked_div(self.total_costs_10_year)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|roi| roi.round_dp(2))
    }

    /// Revenue split for one year, or summed across all years. `None` for an
    /// unknown year or a sum out of range.
    pub fn revenue_breakdown(&self, year: Option<u32>) -> Option<RevenueBreakdown> {
        let split = |y: &YearlyFinancials| RevenueBreakdown {
            agricultural_sales: y.agricultural_sales,
            ecosystem_services: y.ecosystem_services,
            subsidies_incentives: y.subsidies_incentives,
        };

        match year {
            Some(year) => self
                .yearly_financials
                .iter()
                .find(|y| y.year == year)
                .map(split),
            None => Some(RevenueBreakdown {
                agricultural_sales: checked_sum(
                    self.yearly_financials.iter().map(|y| y.agricultural_sales),
                )?,
                ecosystem_services: checked_sum(
                    self.yearly_financials.iter().map(|y| y.ecosystem_services),
                )?,
                subsidies_incentives: checked_sum(
                    self.yearly_financials.iter().map(|y| y.subsidies_incentives),
                )?,
            }),
        }
    }

    /// Per-year series as floats, for plotting
    pub fn chart_data(&self) -> Vec<ChartPoint> {
        let f = |d: Decimal| d.to_f64().unwrap_or_default();
        self.yearly_financials
            .iter()
            .map(|y| ChartPoint {
                year: y.year,
                net_cash_flow: f(y.net_cash_flow),
                total_revenue: f(y.total_revenue),
                total_costs: f(y.total_costs),
                agricultural_sales: f(y.agricultural_sales),
                ecosystem_services: f(y.ecosystem_services),
                subsidies_incentives: f(y.subsidies_incentives),
            })
            .collect()
    }
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// One year of an estimate in chart-friendly form
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub year: u32,
    pub net_cash_flow: f64,
    pub total_revenue: f64,
    pub total_costs: f64,
    pub agricultural_sales: f64,
    pub ecosystem_services: f64,
    pub subsidies_incentives: f64,
}

#[derive(Deserialize)]
struct EstimateResultWire {
    project_name: String,
    project_description: String,
    location: String,
    area_hectares: Decimal,
    yearly_financials: Vec<YearlyFinancials>,
    total_revenue_10_year: Decimal,
    total_costs_10_year: Decimal,
    total_net_cash_flow_10_year: Decimal,
}

impl TryFrom<EstimateResultWire> for EstimateResult {
    type Error = String;

    fn try_from(wire: EstimateResultWire) -> std::result::Result<Self, Self::Error> {
        let rebuilt = EstimateResult::new(
            wire.project_name,
            wire.project_description,
            wire.location,
            wire.area_hectares,
            wire.yearly_financials,
        )
        .map_err(|e| e.to_string())?;

        if rebuilt.total_revenue_10_year != wire.total_revenue_10_year
            || rebuilt.total_costs_10_year != wire.total_costs_10_year
            || rebuilt.total_net_cash_flow_10_year != wire.total_net_cash_flow_10_year
        {
            return Err("10-year totals do not match the yearly series".to_string());
        }
        Ok(rebuilt)
    }
}

//
// ================= Inquiry =================
//

/// A submitted property plus its questionnaire progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: Uuid,
    pub address: String,
    /// Acres
    pub lot_size: Decimal,
    pub user_context: Option<String>,
    pub current_question: u8,
    pub questionnaire_completed: bool,
    pub questionnaire_responses: BTreeMap<u8, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    /// New inquiry from an already-validated request
    pub fn new(request: &PropertyEstimateRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address: request.address().to_string(),
            lot_size: request.lot_size(),
            user_context: request.user_context().map(str::to_string),
            current_question: 1,
            questionnaire_completed: false,
            questionnaire_responses: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn progress_percentage(&self) -> u8 {
        questionnaire::progress_percentage(self.current_question)
    }

    /// Request for the estimate provider, with questionnaire answers folded
    /// into the context
    pub fn estimate_request(&self) -> Result<PropertyEstimateRequest> {
        let context = questionnaire::build_user_context(
            self.user_context.as_deref(),
            &self.questionnaire_responses,
        );
        PropertyEstimateRequest::new(self.address.clone(), self.lot_size, Some(context))
    }
}

impl fmt::Display for Inquiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.address.chars().take(50).collect();
        write!(f, "Inquiry for {} ({} acres)", short, self.lot_size)
    }
}

//
// ================= Stored Estimate =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EstimateStatus::Pending => "pending",
            EstimateStatus::Processing => "processing",
            EstimateStatus::Completed => "completed",
            EstimateStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// The single estimate attached to an inquiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub inquiry_id: Uuid,
    pub status: EstimateStatus,
    pub estimate: Option<EstimateResult>,
    pub raw_response: Option<RawEstimateRecord>,
    pub model_used: Option<String>,
    pub processing_time_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EstimateRecord {
    pub fn pending(inquiry_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            inquiry_id,
            status: EstimateStatus::Pending,
            estimate: None,
            raw_response: None,
            model_used: None,
            processing_time_seconds: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
