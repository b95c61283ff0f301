use regen_estimate::{
    api::start_server,
    config::Settings,
    providers::{EstimateProvider, FallbackEstimator},
    service::EstimateService,
    store::InMemoryInquiryStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env before reading the environment
    let settings = Settings::from_env()?;

    info!("Property Estimate Service - API Server");
    info!("Port: {}", settings.port);

    let provider = Arc::new(FallbackEstimator::from_settings(&settings));
    info!(
        model = %provider.model_name(),
        production = provider.has_production(),
        "Estimate provider ready"
    );

    let store = Arc::new(InMemoryInquiryStore::new());
    let service = Arc::new(EstimateService::new(store, provider));

    start_server(service, settings.port).await?;

    Ok(())
}
