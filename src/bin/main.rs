use regen_estimate::{
    config::Settings,
    models::{AreaUnit, Inquiry, PropertyEstimateRequest},
    providers::{EstimateProvider, FallbackEstimator},
};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: estimate <address> <lot_size> [context] [--hectares]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let unit = match args.iter().position(|a| a == "--hectares") {
        Some(i) => {
            args.remove(i);
            AreaUnit::Hectares
        }
        None => AreaUnit::Acres,
    };

    let (Some(address), Some(lot_size)) = (args.first(), args.get(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let lot_size: Decimal = lot_size
        .parse()
        .map_err(|_| format!("invalid lot size: {}", lot_size))?;
    let context = args.get(2).cloned();

    let settings = Settings::from_env()?;
    let provider = FallbackEstimator::from_settings(&settings);

    let request = PropertyEstimateRequest::new(address.as_str(), unit.to_acres(lot_size)?, context)?;
    info!(
        inquiry = %Inquiry::new(&request),
        model = %provider.model_name(),
        "Generating estimate"
    );

    let outcome = provider.generate(&request).await?;

    info!(
        project_name = %outcome.estimate.project_name(),
        digest = %outcome.raw.digest(),
        "Estimate ready"
    );
    println!("{}", serde_json::to_string_pretty(&outcome.raw)?);

    Ok(())
}
