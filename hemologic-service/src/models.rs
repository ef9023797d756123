use hemo_flow::{AnalysisView, EndpointSettings, TriggerOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub accepted: bool,
    pub session_id: String,
    pub message: String,
}

impl From<TriggerOutcome> for TriggerResponse {
    fn from(outcome: TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::Accepted { session_id } => Self {
                accepted: true,
                session_id,
                message: "Analysis requested".to_string(),
            },
            TriggerOutcome::Busy { session_id } => Self {
                accepted: false,
                session_id,
                message: "An analysis is already in progress".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub view: AnalysisView,
    /// Whether the analysis action should be enabled for the user.
    pub can_trigger: bool,
}

impl From<AnalysisView> for AnalysisResponse {
    fn from(view: AnalysisView) -> Self {
        Self {
            can_trigger: view.state.accepts_trigger(),
            view,
        }
    }
}

/// Admin view of the endpoint configuration. The API key itself is never
/// echoed back.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub ocr_endpoint: String,
    pub agent_endpoint: String,
    pub sendto_endpoint: String,
    pub api_key: String,
    pub has_api_key: bool,
}

impl From<&EndpointSettings> for ConfigResponse {
    fn from(settings: &EndpointSettings) -> Self {
        Self {
            ocr_endpoint: settings.ocr_endpoint.clone(),
            agent_endpoint: settings.agent_endpoint.clone(),
            sendto_endpoint: settings.sendto_endpoint.clone(),
            api_key: settings.masked_api_key().to_string(),
            has_api_key: !settings.api_key.is_empty(),
        }
    }
}
