use chrono::{DateTime, Utc};
use serde::Serialize;

use super::breathing::BreathState;
use super::config::{MiniGameKind, PhaseKind, RitualConfiguration};
use super::ramp::{RampState, RampStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MacroPhase {
    Intro,
    Countdown,
    Breathing,
    Transition,
    Focus,
    Activate,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusState {
    pub game: MiniGameKind,
    pub elapsed_secs: u64,
    pub remaining_secs: u64,
    pub time_up: bool,
}

/// Sub-state of the active macro-phase. Entering a phase replaces the whole
/// value, so nothing from the previous phase survives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PhaseState {
    Intro { step: usize },
    Countdown { number: u8 },
    Breathing(BreathState),
    Transition { target: PhaseKind, step: usize },
    Focus(FocusState),
    Activate(RampState),
    Done { via_ignition: bool },
}

impl PhaseState {
    pub fn macro_phase(&self) -> MacroPhase {
        match self {
            PhaseState::Intro { .. } => MacroPhase::Intro,
            PhaseState::Countdown { .. } => MacroPhase::Countdown,
            PhaseState::Breathing(_) => MacroPhase::Breathing,
            PhaseState::Transition { .. } => MacroPhase::Transition,
            PhaseState::Focus(_) => MacroPhase::Focus,
            PhaseState::Activate(_) => MacroPhase::Activate,
            PhaseState::Done { .. } => MacroPhase::Done,
        }
    }

    pub fn ramp_step(&self) -> Option<RampStep> {
        match self {
            PhaseState::Activate(ramp) => Some(ramp.step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RitualSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub config: RitualConfiguration,
    /// Position within the configured order; moves only when a transition
    /// completes.
    pub ritual_index: usize,
    pub state: PhaseState,
    pub status: SessionStatus,
    /// Generation of the phase currently driving the session. Work tagged
    /// with an older epoch is stale.
    pub(crate) epoch: u64,
}

impl RitualSession {
    pub fn new(id: String, config: RitualConfiguration, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            config,
            ritual_index: 0,
            state: PhaseState::Intro { step: 0 },
            status: SessionStatus::Running,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> MacroPhase {
        self.state.macro_phase()
    }

    pub fn pending_transition_target(&self) -> Option<PhaseKind> {
        match self.state {
            PhaseState::Transition { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The ritual phase being played, if the session is inside one.
    pub fn current_ritual_phase(&self) -> Option<PhaseKind> {
        match self.phase() {
            MacroPhase::Breathing | MacroPhase::Focus | MacroPhase::Activate => {
                self.config.phase_at(self.ritual_index)
            }
            _ => None,
        }
    }

    pub fn snapshot(&self) -> RitualSnapshot {
        RitualSnapshot {
            session_id: self.id.clone(),
            started_at: self.started_at,
            phase: self.phase(),
            ritual_index: self.ritual_index,
            ritual_phase: self.current_ritual_phase(),
            pending_transition_target: self.pending_transition_target(),
            state: self.state.clone(),
            status: self.status,
            order: *self.config.order(),
            mini_game: self.config.mini_game(),
            sound_enabled: self.config.sound_enabled(),
        }
    }
}

/// Read-only copy of a session taken under the state lock, so every field
/// belongs to the same instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub phase: MacroPhase,
    pub ritual_index: usize,
    pub ritual_phase: Option<PhaseKind>,
    pub pending_transition_target: Option<PhaseKind>,
    pub state: PhaseState,
    pub status: SessionStatus,
    pub order: [PhaseKind; 3],
    pub mini_game: MiniGameKind,
    pub sound_enabled: bool,
}

impl RitualSnapshot {
    pub fn ramp(&self) -> Option<&RampState> {
        match &self.state {
            PhaseState::Activate(ramp) => Some(ramp),
            _ => None,
        }
    }

    pub fn breath(&self) -> Option<&BreathState> {
        match &self.state {
            PhaseState::Breathing(breath) => Some(breath),
            _ => None,
        }
    }

    pub fn focus(&self) -> Option<&FocusState> {
        match &self.state {
            PhaseState::Focus(focus) => Some(focus),
            _ => None,
        }
    }
}
