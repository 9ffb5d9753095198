use kyc_verification_engine::{
    api::{start_server, ApiState},
    orchestrator::{Collaborators, KycOrchestrator},
    segmentation::RegionSegmenter,
    session::{spawn_sweeper, InMemorySessionStore, SessionStore},
    workflow::SessionWorkflow,
    KycConfig,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env as well
    let config = Arc::new(KycConfig::from_env()?);

    info!("KYC Verification Engine - API Server");
    info!("Port: {}", config.api_port);

    let services = &config.services;
    if services.compliance_api_key.is_none() {
        warn!("COMPLYADVANTAGE_API_KEY not set; screening will report errors");
    }
    if services.facepp_api_key.is_none() || services.facepp_api_secret.is_none() {
        warn!("FACEPP_API_KEY / FACEPP_API_SECRET not set; face matching will fail");
    }
    if services.ocr_api_url.is_none() {
        warn!("OCR_API_BASE_URL not set; one-shot KYC runs will fail at OCR");
    }

    // Create components
    let collaborators = Collaborators::from_config(&config)?;
    let store = Arc::new(InMemorySessionStore::new(config.session_ttl));
    let sweeper_store: Arc<dyn SessionStore> = store.clone();
    spawn_sweeper(sweeper_store, config.session_sweep_interval);

    let workflow = SessionWorkflow::from_config(&config, store, collaborators.faces.clone());
    let orchestrator = KycOrchestrator::new(config.clone(), collaborators);

    let state = ApiState {
        orchestrator: Arc::new(orchestrator),
        workflow: Arc::new(workflow),
        segmenter: RegionSegmenter::from_config(&config),
        config: config.clone(),
    };

    info!("Components initialized");

    start_server(state, config.api_port).await?;

    Ok(())
}
