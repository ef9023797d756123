use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Substituted when the agent answers without any analysis text.
pub const NO_ANALYSIS_TEXT: &str = "No analysis text received.";

/// Shown immediately when the analysis request fails.
pub const ANALYSIS_FAILED_TEXT: &str = "Failed to load analysis from server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Requesting,
    Revealing,
    Done,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Done | AnalysisState::Failed)
    }

    /// Whether a new request may replace a session in this state.
    pub fn accepts_trigger(&self) -> bool {
        matches!(self, AnalysisState::Idle) || self.is_terminal()
    }
}

/// Outcome of one reveal tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    /// One more character is visible; more remain.
    Advanced,
    /// The last character became visible and the session is now done.
    Completed,
    /// The session is not revealing; nothing changed.
    Idle,
}

/// One analysis request and its reveal progress.
///
/// `id` is the identity token every asynchronous completion must present
/// before writing; a replaced session's completions are discarded.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub id: String,
    state: AnalysisState,
    full_text: Option<String>,
    revealed_length: usize,
    revealed_bytes: usize,
    error_message: Option<String>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: AnalysisState::Idle,
            full_text: None,
            revealed_length: 0,
            revealed_bytes: 0,
            error_message: None,
        }
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn full_text(&self) -> Option<&str> {
        self.full_text.as_deref()
    }

    /// Characters revealed so far.
    pub fn revealed_length(&self) -> usize {
        self.revealed_length
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_revealing(&self) -> bool {
        self.state == AnalysisState::Revealing
    }

    /// `idle → requesting`. Returns false (and changes nothing) from any
    /// other state.
    pub fn begin_request(&mut self) -> bool {
        if self.state != AnalysisState::Idle {
            return false;
        }
        self.state = AnalysisState::Requesting;
        debug!(session_id = %self.id, "Analysis session requesting");
        true
    }

    /// `requesting → revealing`. Empty or missing text is replaced by
    /// [`NO_ANALYSIS_TEXT`].
    pub fn receive(&mut self, analysis: Option<String>) -> bool {
        if self.state != AnalysisState::Requesting {
            return false;
        }
        let text = analysis
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_ANALYSIS_TEXT.to_string());

        debug!(session_id = %self.id, chars = text.chars().count(), "Analysis session revealing");
        self.full_text = Some(text);
        self.revealed_length = 0;
        self.revealed_bytes = 0;
        self.state = AnalysisState::Revealing;
        true
    }

    /// `requesting → failed`. Revealing never starts.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.state != AnalysisState::Requesting {
            return false;
        }
        self.error_message = Some(message.into());
        self.state = AnalysisState::Failed;
        debug!(session_id = %self.id, "Analysis session failed");
        true
    }

    /// Reveal exactly one more character; `revealing → done` on the last one.
    pub fn advance(&mut self) -> RevealStep {
        if self.state != AnalysisState::Revealing {
            return RevealStep::Idle;
        }
        let text = self.full_text.as_deref().unwrap_or_default();

        if let Some(next) = text[self.revealed_bytes..].chars().next() {
            self.revealed_bytes += next.len_utf8();
            self.revealed_length += 1;
        }

        if self.revealed_bytes >= text.len() {
            self.state = AnalysisState::Done;
            debug!(session_id = %self.id, "Analysis reveal completed");
            RevealStep::Completed
        } else {
            RevealStep::Advanced
        }
    }

    /// What the presentation layer may show right now.
    pub fn visible_text(&self) -> &str {
        match self.state {
            AnalysisState::Failed => ANALYSIS_FAILED_TEXT,
            _ => self
                .full_text
                .as_deref()
                .map(|text| &text[..self.revealed_bytes])
                .unwrap_or_default(),
        }
    }

    pub fn view(&self) -> AnalysisView {
        AnalysisView {
            session_id: self.id.clone(),
            state: self.state,
            visible_text: self.visible_text().to_string(),
            is_revealing: self.is_revealing(),
            revealed_length: self.revealed_length,
            total_length: self.full_text.as_deref().map(|t| t.chars().count()),
            error_message: self.error_message.clone(),
        }
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisView {
    pub session_id: String,
    pub state: AnalysisState,
    pub visible_text: String,
    pub is_revealing: bool,
    pub revealed_length: usize,
    pub total_length: Option<usize>,
    pub error_message: Option<String>,
}
