use serde::Serialize;

use super::config::PhaseKind;
use super::state::MacroPhase;

/// Lifecycle notifications broadcast to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RitualEvent {
    #[serde(rename_all = "camelCase")]
    PhaseEntered {
        session_id: String,
        phase: MacroPhase,
        ritual_index: usize,
        target: Option<PhaseKind>,
    },
    Skipped {
        phase: PhaseKind,
    },
    ReadyToTrigger,
    #[serde(rename_all = "camelCase")]
    SessionCompleted {
        session_id: String,
        duration_minutes: u32,
        recorded: bool,
    },
    #[serde(rename_all = "camelCase")]
    SessionAbandoned {
        session_id: String,
        phase: MacroPhase,
    },
}
