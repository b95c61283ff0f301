//! Mock estimate provider
//!
//! Synthesizes a plausible 10-year projection scaled by the property's
//! hectares. No external call is made; an artificial delay stands in for
//! model latency.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::error::EstimationError;
use crate::models::{EstimateResult, PropertyEstimateRequest, YearlyFinancials, PROJECTION_YEARS};
use crate::normalizer::{area_hectares, format_location};
use crate::providers::{EstimateOutcome, EstimateProvider};
use crate::Result;

pub const MOCK_MODEL: &str = "mock-ai-v1";

const DEFAULT_DELAY_MIN: Duration = Duration::from_secs(2);
const DEFAULT_DELAY_MAX: Duration = Duration::from_secs(5);

const PROJECT_NAMES: &[&str] = &[
    "Regenerative Agricultural Initiative",
    "Sustainable Farming Project",
    "Carbon Sequestration Agriculture Program",
    "Biodiversity Enhancement Farm",
    "Soil Restoration Project",
];

/// Per-hectare yearly ranges in USD
const AGRICULTURAL_RANGE: (f64, f64) = (800.0, 1500.0);
const ECOSYSTEM_RANGE: (f64, f64) = (50.0, 200.0);
const EARLY_SUBSIDY_RANGE: (f64, f64) = (40.0, 80.0);
const LATE_SUBSIDY_RANGE: (f64, f64) = (20.0, 40.0);
const COST_RANGE: (f64, f64) = (600.0, 1000.0);

/// Mock provider for offline use, tests, and as the universal fallback
#[derive(Debug, Clone)]
pub struct MockEstimator {
    delay_min: Duration,
    delay_max: Duration,
    seed: Option<u64>,
}

impl MockEstimator {
    pub fn new() -> Self {
        Self {
            delay_min: DEFAULT_DELAY_MIN,
            delay_max: DEFAULT_DELAY_MAX,
            seed: None,
        }
    }

    /// Delay is drawn uniformly from `min..=max`
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.delay_min = min;
        self.delay_max = max.max(min);
        self
    }

    pub fn without_delay(self) -> Self {
        self.with_delay(Duration::ZERO, Duration::ZERO)
    }

    /// Every call draws from a fresh RNG seeded with `seed`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn draw_delay(&self) -> Duration {
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        let secs = self
            .rng()
            .gen_range(self.delay_min.as_secs_f64()..=self.delay_max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Build the synthetic estimate without any delay
    pub fn generate_detailed_estimate(
        &self,
        request: &PropertyEstimateRequest,
    ) -> Result<EstimateResult> {
        let hectares = request.lot_size_hectares().to_f64().ok_or_else(|| {
            EstimationError::Validation(format!(
                "lot size {} cannot be scaled",
                request.lot_size()
            ))
        })?;

        let mut rng = self.rng();
        let project_name = PROJECT_NAMES
            .choose(&mut rng)
            .copied()
            .unwrap_or(PROJECT_NAMES[0]);

        let description = format!(
            "This {:.1}-hectare regenerative agriculture project focuses on sustainable farming \
             practices, soil restoration, and carbon sequestration. The initiative combines modern \
             agricultural techniques with environmental stewardship to create a profitable and \
             sustainable farming operation. Key components include cover crop rotation, integrated \
             pest management, livestock integration, and agroforestry systems. The project is \
             designed to improve soil health, increase biodiversity, and generate multiple revenue \
             streams while contributing to climate change mitigation through carbon sequestration.",
            hectares
        );

        let years = (1..=PROJECTION_YEARS as u32)
            .map(|year| synthesize_year(&mut rng, year, hectares))
            .collect::<Result<Vec<_>>>()?;

        EstimateResult::new(
            project_name,
            description,
            format_location(request.address()),
            area_hectares(request.lot_size()),
            years,
        )
    }
}

impl Default for MockEstimator {
    fn default() -> Self {
        Self::new()
    }
}

fn uniform(rng: &mut StdRng, (low, high): (f64, f64)) -> f64 {
    rng.gen_range(low..high)
}

fn whole_dollars(value: f64) -> Decimal {
    Decimal::from(value.trunc() as i64)
}

fn synthesize_year(rng: &mut StdRng, year: u32, hectares: f64) -> Result<YearlyFinancials> {
    let elapsed = f64::from(year - 1);
    let growth_factor = 1.0 + elapsed * 0.15;

    let agricultural_sales =
        whole_dollars(hectares * uniform(rng, AGRICULTURAL_RANGE) * growth_factor);

    // Drawn every year so the sequence of draws does not depend on the branch
    let ecosystem_base = hectares * uniform(rng, ECOSYSTEM_RANGE) * growth_factor.powf(1.5);
    let ecosystem_services = if year <= 2 {
        Decimal::ZERO
    } else {
        whole_dollars(ecosystem_base)
    };

    let subsidy_range = if year <= 5 {
        EARLY_SUBSIDY_RANGE
    } else {
        LATE_SUBSIDY_RANGE
    };
    let subsidies = whole_dollars(hectares * uniform(rng, subsidy_range));

    let cost_factor = 1.1 - elapsed * 0.02;
    let total_costs = whole_dollars(hectares * uniform(rng, COST_RANGE) * cost_factor);

    YearlyFinancials::from_components(
        year,
        agricultural_sales,
        ecosystem_services,
        subsidies,
        total_costs,
    )
}

#[async_trait]
impl EstimateProvider for MockEstimator {
    fn model_name(&self) -> &str {
        MOCK_MODEL
    }

    async fn generate(&self, request: &PropertyEstimateRequest) -> Result<EstimateOutcome> {
        let start = Instant::now();

        tokio::time::sleep(self.draw_delay()).await;

        match self.generate_detailed_estimate(request) {
            Ok(estimate) => {
                let processing_time = start.elapsed().as_secs_f64();
                info!(
                    address = %request.address(),
                    "Mock AI estimate generated in {:.2}s",
                    processing_time
                );
                Ok(EstimateOutcome::new(estimate, MOCK_MODEL, processing_time))
            }
            Err(e) => {
                let processing_time = start.elapsed().as_secs_f64();
                let message = format!("Mock AI estimation failed: {}", e);
                error!("{} (processing_time: {:.2}s)", message, processing_time);
                Err(EstimationError::Provider {
                    message,
                    processing_time,
                })
            }
        }
    }
}
