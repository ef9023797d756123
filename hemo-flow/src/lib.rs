pub mod client;
pub mod config;
pub mod error;
pub mod measurement;
pub mod normalize;
pub mod range;
pub mod reveal;
pub mod runner;
pub mod session;
pub mod submission;

// Re-export commonly used types
pub use client::{
    AgentService, DocumentUpload, HttpAgentClient, HttpOcrClient, OcrService, http_client,
};
pub use config::{
    ConfigStore, EndpointConfig, EndpointSettings, FileConfigStore, InMemoryConfigStore,
};
pub use error::{AnalysisError, ConfigError, Result, SubmissionError, UpstreamError};
pub use measurement::{DisplayMeasurement, Measurement, Status};
pub use normalize::{normalize, normalize_all};
pub use range::{evaluate, reference_range_text};
pub use reveal::Revealer;
pub use runner::{AnalysisRunner, TriggerOutcome};
pub use session::{AnalysisSession, AnalysisState, AnalysisView};
pub use submission::{DocumentResult, DocumentWorkflow, analysis_request_body};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    struct CannedOcr;

    #[async_trait]
    impl OcrService for CannedOcr {
        async fn extract(
            &self,
            _endpoint: &str,
            _document: &DocumentUpload,
        ) -> std::result::Result<Vec<Measurement>, UpstreamError> {
            Ok(vec![Measurement::from_value(&json!({
                "name": "Glucose",
                "value": "105",
                "unit": "mg/dL",
                "lower_limit": 70,
                "upper_limit": 100
            }))])
        }
    }

    struct RefusingAgent;

    #[async_trait]
    impl AgentService for RefusingAgent {
        async fn analyze(
            &self,
            _endpoint: &str,
            _body: &Value,
        ) -> std::result::Result<Option<String>, UpstreamError> {
            Err(UpstreamError::Network("connection refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_analysis_leaves_measurements_alone() {
        let store = Arc::new(InMemoryConfigStore::new());
        EndpointSettings {
            ocr_endpoint: "http://ocr.local".to_string(),
            agent_endpoint: "http://agent.local".to_string(),
            ..EndpointSettings::default()
        }
        .save(store.as_ref())
        .await
        .unwrap();

        let analysis = AnalysisRunner::new(
            Arc::new(RefusingAgent),
            store.clone(),
            Revealer::default(),
        );
        let documents = DocumentWorkflow::new(Arc::new(CannedOcr), store, analysis);

        let shown = documents
            .submit(DocumentUpload::new("labor.jpg", "image/jpeg", vec![0xFF, 0xD8]))
            .await
            .unwrap();
        documents.request_analysis().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let view = documents.analysis().view().await;
        assert_eq!(view.state, AnalysisState::Failed);
        assert_eq!(view.visible_text, session::ANALYSIS_FAILED_TEXT);

        let still_shown = documents.current().await.unwrap();
        assert_eq!(still_shown.measurements, shown.measurements);
        assert_eq!(still_shown.measurements[0].status, Status::High);
    }
}
