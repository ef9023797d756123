//! AnalysisRunner: owns the one current [`AnalysisSession`] and drives it
//! through request → reveal → done in a single background task.
//!
//! [`crate::DocumentWorkflow`] triggers it for the displayed result and tears
//! it down when that result changes; the presentation layer polls
//! [`AnalysisRunner::view`] to render progress.
//!
//! ## Cancellation
//! Each accepted trigger replaces the session with a fresh one carrying a new
//! identity. The background task of the previous session is aborted, and
//! every write the task makes is conditional on the slot still holding its
//! own session, so a completion that slips through the abort is ignored.
//! [`AnalysisRunner::teardown`] and dropping the runner cancel the same way.

use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::AgentService;
use crate::config::{ConfigStore, EndpointConfig};
use crate::error::AnalysisError;
use crate::reveal::Revealer;
use crate::session::{AnalysisSession, AnalysisView};

/// What happened to a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// A new session started.
    Accepted { session_id: String },
    /// A session is still requesting or revealing; nothing changed.
    Busy { session_id: String },
}

#[derive(Clone)]
pub struct AnalysisRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    session: Arc<RwLock<AnalysisSession>>,
    task: Mutex<Option<JoinHandle<()>>>,
    agent: Arc<dyn AgentService>,
    config: Arc<dyn ConfigStore>,
    revealer: Revealer,
}

impl AnalysisRunner {
    pub fn new(
        agent: Arc<dyn AgentService>,
        config: Arc<dyn ConfigStore>,
        revealer: Revealer,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                session: Arc::new(RwLock::new(AnalysisSession::new())),
                task: Mutex::new(None),
                agent,
                config,
                revealer,
            }),
        }
    }

    /// Start a new analysis unless one is in flight. `body` is sent to the
    /// agent endpoint as-is.
    pub async fn trigger(&self, body: Value) -> TriggerOutcome {
        let mut slot = self.inner.session.write().await;
        if !slot.state().accepts_trigger() {
            info!(session_id = %slot.id, "Analysis already in progress, trigger ignored");
            return TriggerOutcome::Busy {
                session_id: slot.id.clone(),
            };
        }

        self.inner.abort_task();

        let mut session = AnalysisSession::new();
        session.begin_request();
        let session_id = session.id.clone();
        *slot = session;

        let job = AnalysisJob {
            session: self.inner.session.clone(),
            agent: self.inner.agent.clone(),
            config: self.inner.config.clone(),
            revealer: self.inner.revealer,
        };
        let task_session_id = session_id.clone();
        let handle = tokio::spawn(async move {
            job.drive(&task_session_id, body).await;
        });
        *self.inner.lock_task() = Some(handle);

        info!(session_id = %session_id, "Analysis requested");
        TriggerOutcome::Accepted { session_id }
    }

    pub async fn view(&self) -> AnalysisView {
        self.inner.session.read().await.view()
    }

    /// Cancel whatever is pending and go back to a fresh idle session.
    pub async fn teardown(&self) {
        let mut slot = self.inner.session.write().await;
        self.inner.abort_task();
        *slot = AnalysisSession::new();
        info!("Analysis session torn down");
    }
}

impl RunnerInner {
    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn abort_task(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}

impl Drop for RunnerInner {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Everything the background task needs, without a handle back to the
/// runner, so dropping the last runner clone still cancels the task.
struct AnalysisJob {
    session: Arc<RwLock<AnalysisSession>>,
    agent: Arc<dyn AgentService>,
    config: Arc<dyn ConfigStore>,
    revealer: Revealer,
}

impl AnalysisJob {
    async fn drive(&self, session_id: &str, body: Value) {
        let outcome = self.request(&body).await;

        {
            let mut slot = self.session.write().await;
            if slot.id != session_id {
                info!(session_id, "Discarding analysis response for superseded session");
                return;
            }
            match outcome {
                Ok(analysis) => {
                    slot.receive(analysis);
                }
                Err(e) => {
                    warn!(session_id, "Analysis request failed: {}", e);
                    slot.fail(e.to_string());
                    return;
                }
            }
        }

        self.revealer.run(self.session.clone(), session_id).await;
    }

    async fn request(&self, body: &Value) -> Result<Option<String>, AnalysisError> {
        let endpoint = EndpointConfig::read(self.config.as_ref())
            .await?
            .agent
            .ok_or(AnalysisError::ConfigurationMissing("Agent"))?;

        Ok(self.agent.analyze(&endpoint, body).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AGENT_ENDPOINT_KEY, InMemoryConfigStore};
    use crate::error::UpstreamError;
    use crate::session::{ANALYSIS_FAILED_TEXT, AnalysisState, NO_ANALYSIS_TEXT};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(25);

    type AgentReply = Result<Option<String>, UpstreamError>;

    struct FakeAgent {
        calls: AtomicUsize,
        latency: Duration,
        reply: fn(usize) -> AgentReply,
    }

    impl FakeAgent {
        fn new(latency: Duration, reply: fn(usize) -> AgentReply) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                latency,
                reply,
            })
        }
    }

    #[async_trait]
    impl AgentService for FakeAgent {
        async fn analyze(&self, _endpoint: &str, _body: &Value) -> AgentReply {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            (self.reply)(call)
        }
    }

    async fn store_with_agent() -> Arc<InMemoryConfigStore> {
        let store = Arc::new(InMemoryConfigStore::new());
        store
            .set(AGENT_ENDPOINT_KEY, "http://localhost:5001/api/hello".to_string())
            .await
            .unwrap();
        store
    }

    async fn runner_with(agent: Arc<FakeAgent>) -> AnalysisRunner {
        AnalysisRunner::new(agent, store_with_agent().await, Revealer::new(TICK))
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reveals_analysis_then_completes() {
        let agent = FakeAgent::new(Duration::from_millis(100), |_| {
            Ok(Some("Glucose high.".to_string()))
        });
        let runner = runner_with(agent).await;

        let outcome = runner.trigger(json!({})).await;
        assert!(matches!(outcome, TriggerOutcome::Accepted { .. }));
        assert_eq!(runner.view().await.state, AnalysisState::Requesting);

        settle(Duration::from_millis(100) + TICK * 3 + Duration::from_millis(1)).await;
        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Revealing);
        assert_eq!(view.visible_text, "Glu");
        assert!(view.is_revealing);

        settle(Duration::from_secs(5)).await;
        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Done);
        assert_eq!(view.visible_text, "Glucose high.");
        assert!(!view.is_revealing);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_while_busy_is_a_no_op() {
        let agent = FakeAgent::new(Duration::from_millis(100), |_| {
            Ok(Some("abcdefghij".to_string()))
        });
        let runner = runner_with(agent.clone()).await;

        let TriggerOutcome::Accepted { session_id } = runner.trigger(json!({})).await else {
            panic!("first trigger must be accepted");
        };

        // requesting
        assert_eq!(
            runner.trigger(json!({})).await,
            TriggerOutcome::Busy { session_id: session_id.clone() }
        );

        // revealing
        settle(Duration::from_millis(100) + TICK * 4 + Duration::from_millis(1)).await;
        let before = runner.view().await;
        assert_eq!(before.state, AnalysisState::Revealing);
        assert_eq!(
            runner.trigger(json!({})).await,
            TriggerOutcome::Busy { session_id: session_id.clone() }
        );
        let after = runner.view().await;
        assert_eq!(after.session_id, session_id);
        assert_eq!(after.revealed_length, before.revealed_length);
        assert_eq!(after.total_length, Some(10));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_reveals_placeholder() {
        let agent = FakeAgent::new(Duration::ZERO, |_| Ok(None));
        let runner = runner_with(agent).await;

        runner.trigger(json!({})).await;
        settle(Duration::from_millis(1)).await;
        assert_eq!(runner.view().await.state, AnalysisState::Revealing);

        settle(TICK * NO_ANALYSIS_TEXT.chars().count() as u32).await;
        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Done);
        assert_eq!(view.visible_text, NO_ANALYSIS_TEXT);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_fails_immediately() {
        let agent = FakeAgent::new(Duration::from_millis(10), |_| {
            Err(UpstreamError::Network("connection refused".to_string()))
        });
        let runner = runner_with(agent).await;

        runner.trigger(json!({})).await;
        settle(Duration::from_millis(11)).await;

        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Failed);
        assert_eq!(view.visible_text, ANALYSIS_FAILED_TEXT);
        assert!(view.error_message.unwrap().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_agent_endpoint_fails_without_call() {
        let agent = FakeAgent::new(Duration::ZERO, |_| Ok(Some("x".to_string())));
        let runner = AnalysisRunner::new(
            agent.clone(),
            Arc::new(InMemoryConfigStore::new()),
            Revealer::new(TICK),
        );

        runner.trigger(json!({})).await;
        settle(Duration::from_millis(1)).await;

        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Failed);
        assert_eq!(view.error_message.as_deref(), Some("No Agent API endpoint configured"));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_failure_starts_a_new_session() {
        let agent = FakeAgent::new(Duration::ZERO, |call| {
            if call == 0 {
                Err(UpstreamError::Status(503))
            } else {
                Ok(Some("ok".to_string()))
            }
        });
        let runner = runner_with(agent).await;

        let TriggerOutcome::Accepted { session_id: first } = runner.trigger(json!({})).await else {
            panic!("expected acceptance");
        };
        settle(Duration::from_millis(1)).await;
        assert_eq!(runner.view().await.state, AnalysisState::Failed);

        let TriggerOutcome::Accepted { session_id: second } = runner.trigger(json!({})).await else {
            panic!("failed session must accept a retry");
        };
        assert_ne!(first, second);

        settle(Duration::from_secs(1)).await;
        let view = runner.view().await;
        assert_eq!(view.session_id, second);
        assert_eq!(view.state, AnalysisState::Done);
        assert_eq!(view.visible_text, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_reveal() {
        let agent = FakeAgent::new(Duration::ZERO, |_| {
            Ok(Some("a fairly long analysis".to_string()))
        });
        let runner = runner_with(agent).await;

        let TriggerOutcome::Accepted { session_id } = runner.trigger(json!({})).await else {
            panic!("expected acceptance");
        };
        settle(TICK * 3 + Duration::from_millis(1)).await;
        runner.teardown().await;

        settle(Duration::from_secs(5)).await;
        let view = runner.view().await;
        assert_ne!(view.session_id, session_id);
        assert_eq!(view.state, AnalysisState::Idle);
        assert_eq!(view.visible_text, "");
        assert_eq!(view.revealed_length, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_request_discards_late_response() {
        let agent = FakeAgent::new(Duration::from_millis(200), |_| Ok(Some("late".to_string())));
        let runner = runner_with(agent).await;

        runner.trigger(json!({})).await;
        settle(Duration::from_millis(50)).await;
        runner.teardown().await;

        settle(Duration::from_secs(1)).await;
        let view = runner.view().await;
        assert_eq!(view.state, AnalysisState::Idle);
        assert_eq!(view.total_length, None);
    }
}
