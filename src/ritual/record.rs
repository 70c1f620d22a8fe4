use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use super::config::{MiniGameKind, PhaseKind};
use super::state::RitualSession;

pub type RecordFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// One fully completed ritual, as handed to the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
    /// Calendar day in the athlete's timezone; streaks count these.
    pub local_day: NaiveDate,
    pub duration_minutes: u32,
    pub phase_order: [PhaseKind; 3],
    pub mini_game: MiniGameKind,
}

impl CompletionRecord {
    pub fn for_session(
        session: &RitualSession,
        duration_minutes: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session.id.clone(),
            completed_at,
            local_day: completed_at.with_timezone(&Local).date_naive(),
            duration_minutes,
            phase_order: *session.config.order(),
            mini_game: session.config.mini_game(),
        }
    }
}

/// Persistence boundary of the engine. Called at most once per session, and
/// only after the athlete confirms the Done screen.
pub trait SessionRecorder: Send + Sync {
    fn record_completion(&self, record: CompletionRecord) -> RecordFuture<'_>;
}
