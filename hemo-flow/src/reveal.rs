//! Incremental Revealer: exposes a session's analysis text one character
//! per tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::session::{AnalysisSession, RevealStep};

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy)]
pub struct Revealer {
    interval: Duration,
}

impl Revealer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Drive the reveal of session `session_id` held in `slot` until it is
    /// done, or until the slot holds a different session. Returns the
    /// number of characters this call revealed.
    ///
    /// Ticks are strictly sequential: the next sleep starts only after the
    /// previous advance has been applied.
    pub async fn run(&self, slot: Arc<RwLock<AnalysisSession>>, session_id: &str) -> usize {
        let mut advances = 0;
        loop {
            tokio::time::sleep(self.interval).await;

            let mut session = slot.write().await;
            if session.id != session_id {
                debug!(session_id, "Reveal stopped: session superseded");
                break;
            }

            match session.advance() {
                RevealStep::Advanced => advances += 1,
                RevealStep::Completed => {
                    advances += 1;
                    info!(session_id, chars = advances, "Analysis fully revealed");
                    break;
                }
                RevealStep::Idle => break,
            }
        }
        advances
    }
}

impl Default for Revealer {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AnalysisState;
    use tokio::time::Instant;

    fn revealing_slot(text: &str) -> (Arc<RwLock<AnalysisSession>>, String) {
        let mut session = AnalysisSession::new();
        session.begin_request();
        session.receive(Some(text.to_string()));
        let id = session.id.clone();
        (Arc::new(RwLock::new(session)), id)
    }

    #[tokio::test(start_paused = true)]
    async fn reveals_every_character_at_fixed_pace() {
        let text = "Summary: glucose is elevated.";
        let n = text.chars().count();
        let (slot, id) = revealing_slot(text);

        let started = Instant::now();
        let advances = Revealer::default().run(slot.clone(), &id).await;

        assert_eq!(advances, n);
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_REVEAL_INTERVAL * n as u32);
        assert!(elapsed < DEFAULT_REVEAL_INTERVAL * (n as u32 + 1));

        let session = slot.read().await;
        assert_eq!(session.state(), AnalysisState::Done);
        assert_eq!(session.revealed_length(), n);
        assert_eq!(session.visible_text(), text);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_progress_is_visible_mid_reveal() {
        let (slot, id) = revealing_slot("abcdef");
        let revealer = Revealer::new(Duration::from_millis(10));

        let task = {
            let slot = slot.clone();
            tokio::spawn(async move { revealer.run(slot, &id).await })
        };

        tokio::time::sleep(Duration::from_millis(35)).await;
        {
            let session = slot.read().await;
            assert_eq!(session.visible_text(), "abc");
            assert!(session.is_revealing());
        }

        assert_eq!(task.await.unwrap(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_session_is_replaced() {
        let (slot, id) = revealing_slot("a long analysis text");
        let revealer = Revealer::new(Duration::from_millis(10));

        let task = {
            let slot = slot.clone();
            tokio::spawn(async move { revealer.run(slot, &id).await })
        };

        tokio::time::sleep(Duration::from_millis(25)).await;
        *slot.write().await = AnalysisSession::new();

        assert_eq!(task.await.unwrap(), 2);
        let session = slot.read().await;
        assert_eq!(session.state(), AnalysisState::Idle);
        assert_eq!(session.revealed_length(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn does_nothing_for_a_session_that_is_not_revealing() {
        let session = AnalysisSession::new();
        let id = session.id.clone();
        let slot = Arc::new(RwLock::new(session));

        assert_eq!(Revealer::default().run(slot.clone(), &id).await, 0);
        assert_eq!(slot.read().await.state(), AnalysisState::Idle);
    }
}
