//! Extrapolation of truncated projection series
//!
//! Each missing year is derived from the one before it with fixed ratios:
//! agricultural sales grow 5 %, ecosystem services 10 %, subsidies taper 5 %
//! and operating costs rise 2 %.

use rust_decimal::Decimal;

use crate::error::EstimationError;
use crate::models::YearlyFinancials;
use crate::Result;

const AGRICULTURAL_GROWTH: Decimal = Decimal::from_parts(105, 0, 0, false, 2);
const ECOSYSTEM_GROWTH: Decimal = Decimal::from_parts(110, 0, 0, false, 2);
const SUBSIDY_DECAY: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const COST_GROWTH: Decimal = Decimal::from_parts(102, 0, 0, false, 2);

/// Pad `existing` to `target` years. An empty input stays empty, since there
/// is nothing to anchor the series to.
///
/// Fails with [`EstimationError::Parse`] if a derived amount goes out of range.
pub fn extrapolate(existing: &[YearlyFinancials], target: usize) -> Result<Vec<YearlyFinancials>> {
    let mut years = existing.to_vec();

    while years.len() < target {
        let Some(last) = years.last() else {
            break;
        };
        let next = next_year(last)?;
        years.push(next);
    }

    years.truncate(target);
    Ok(years)
}

fn next_year(previous: &YearlyFinancials) -> Result<YearlyFinancials> {
    let year = previous.year() + 1;
    let grow = |amount: Decimal, ratio: Decimal| {
        amount.checked_mul(ratio).ok_or_else(|| {
            EstimationError::Parse(format!("year {}: extrapolated amount out of range", year))
        })
    };

    YearlyFinancials::from_components(
        year,
        grow(previous.agricultural_sales(), AGRICULTURAL_GROWTH)?,
        grow(previous.ecosystem_services(), ECOSYSTEM_GROWTH)?,
        grow(previous.subsidies_incentives(), SUBSIDY_DECAY)?,
        grow(previous.total_costs(), COST_GROWTH)?,
    )
}
