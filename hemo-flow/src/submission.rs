use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{DocumentUpload, OcrService};
use crate::config::{ConfigStore, EndpointConfig};
use crate::error::{Result, SubmissionError};
use crate::measurement::DisplayMeasurement;
use crate::normalize::normalize_all;
use crate::runner::{AnalysisRunner, TriggerOutcome};

/// The result set currently on display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: String,
    pub source_filename: String,
    pub processed_at: DateTime<Utc>,
    pub measurements: Vec<DisplayMeasurement>,
}

/// Body sent to the agent endpoint: the displayed measurements when a
/// document is loaded, an empty object otherwise.
pub fn analysis_request_body(document: Option<&DocumentResult>) -> Value {
    match document {
        Some(document) => json!({
            "document_id": document.document_id,
            "source_filename": document.source_filename,
            "measurements": document.measurements,
        }),
        None => json!({}),
    }
}

/// Accept a document, run it through the OCR service and keep the
/// normalized result for display.
///
/// Only the newest submission may write the displayed result. An older one
/// that completes late reports [`SubmissionError::Superseded`] to its caller
/// and leaves the display alone. Failed submissions never touch the
/// displayed result either.
///
/// The workflow also owns the analysis of the displayed result. Replacing
/// or clearing the result tears the analysis down under the same write lock
/// that changes the display, and [`DocumentWorkflow::request_analysis`]
/// snapshots the display and triggers under the read lock, so an analysis
/// always describes the result set shown next to it.
pub struct DocumentWorkflow {
    ocr: Arc<dyn OcrService>,
    config: Arc<dyn ConfigStore>,
    analysis: AnalysisRunner,
    current: RwLock<Option<DocumentResult>>,
    generation: AtomicU64,
}

impl DocumentWorkflow {
    pub fn new(
        ocr: Arc<dyn OcrService>,
        config: Arc<dyn ConfigStore>,
        analysis: AnalysisRunner,
    ) -> Self {
        Self {
            ocr,
            config,
            analysis,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn analysis(&self) -> &AnalysisRunner {
        &self.analysis
    }

    pub async fn submit(&self, upload: DocumentUpload) -> Result<DocumentResult> {
        if !upload.has_supported_type() {
            warn!(
                "Rejected {}: unsupported file type {:?}",
                upload.file_name, upload.content_type
            );
            return Err(SubmissionError::InvalidFileType(upload.content_type));
        }

        let endpoint = EndpointConfig::read(self.config.as_ref())
            .await?
            .ocr
            .ok_or(SubmissionError::ConfigurationMissing("OCR"))?;

        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Submitting {} (submission #{})", upload.file_name, ticket);

        let raw = self.ocr.extract(&endpoint, &upload).await.map_err(|e| {
            warn!("OCR extraction failed for {}: {}", upload.file_name, e);
            SubmissionError::from(e)
        })?;

        let result = DocumentResult {
            document_id: Uuid::new_v4().to_string(),
            source_filename: upload.file_name,
            processed_at: Utc::now(),
            measurements: normalize_all(&raw),
        };

        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            info!("Discarding result of superseded submission #{}", ticket);
            return Err(SubmissionError::Superseded);
        }
        *current = Some(result.clone());
        // The previous analysis described a different result set.
        self.analysis.teardown().await;

        info!(
            "Document {} processed: {} measurements ({} flagged)",
            result.source_filename,
            result.measurements.len(),
            result.measurements.iter().filter(|m| m.status.is_flagged()).count()
        );
        Ok(result)
    }

    pub async fn current(&self) -> Option<DocumentResult> {
        self.current.read().await.clone()
    }

    /// Ask for an analysis of whatever is displayed right now.
    pub async fn request_analysis(&self) -> TriggerOutcome {
        let current = self.current.read().await;
        self.analysis
            .trigger(analysis_request_body(current.as_ref()))
            .await
    }

    /// Clear the displayed result, its analysis, and invalidate anything
    /// still in flight.
    pub async fn reset(&self) {
        let mut current = self.current.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *current = None;
        self.analysis.teardown().await;
        info!("Document result cleared");
    }
}
