use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ritual::{MiniGameKind, PhaseKind};

/// One row of the activity log: a ritual that reached Done and was confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub completed_at: DateTime<Utc>,
    pub local_day: NaiveDate,
    pub duration_minutes: u32,
    pub phase_order: Vec<PhaseKind>,
    pub mini_game: MiniGameKind,
}
