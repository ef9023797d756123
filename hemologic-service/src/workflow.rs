use hemo_flow::{
    AgentService, AnalysisRunner, ConfigStore, DocumentWorkflow, FileConfigStore, HttpAgentClient,
    HttpOcrClient, InMemoryConfigStore, OcrService, Revealer, http_client,
};
use std::sync::Arc;
use tracing::info;

use crate::service::AppState;
use crate::settings::{DEFAULT_MAX_UPLOAD_BYTES, ServiceSettings};

pub fn create_config_store(settings: &ServiceSettings) -> Arc<dyn ConfigStore> {
    match &settings.config_path {
        Some(path) => {
            info!("Using file-backed endpoint configuration at {}", path.display());
            Arc::new(FileConfigStore::new(path.clone()))
        }
        None => {
            info!("Using in-memory endpoint configuration");
            Arc::new(InMemoryConfigStore::new())
        }
    }
}

pub fn create_app_state(settings: &ServiceSettings) -> anyhow::Result<AppState> {
    let client = http_client(settings.request_timeout)?;
    let ocr: Arc<dyn OcrService> = Arc::new(HttpOcrClient::new(client.clone()));
    let agent: Arc<dyn AgentService> = Arc::new(HttpAgentClient::new(client));

    let mut state = build_app_state(
        create_config_store(settings),
        ocr,
        agent,
        Revealer::new(settings.reveal_interval),
    );
    state.max_upload_bytes = settings.max_upload_bytes;
    Ok(state)
}

pub fn build_app_state(
    config: Arc<dyn ConfigStore>,
    ocr: Arc<dyn OcrService>,
    agent: Arc<dyn AgentService>,
    revealer: Revealer,
) -> AppState {
    let analysis = AnalysisRunner::new(agent, config.clone(), revealer);
    AppState {
        documents: Arc::new(DocumentWorkflow::new(ocr, config.clone(), analysis)),
        config,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}
