//! Box-breathing sub-engine.
//!
//! Time is fed in as total elapsed milliseconds since the phase began, so the
//! engine stays deterministic no matter how ticks are scheduled.

use std::time::Duration;

use serde::Serialize;

use crate::cues::{AudioCue, Cue, HapticCue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BreathPhase {
    Inhale,
    HoldIn,
    Exhale,
    HoldOut,
}

impl BreathPhase {
    pub const ALL: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::HoldIn,
        BreathPhase::Exhale,
        BreathPhase::HoldOut,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe in",
            BreathPhase::HoldIn => "Hold",
            BreathPhase::Exhale => "Breathe out",
            BreathPhase::HoldOut => "Hold",
        }
    }
}

/// `t < 0.5 ? 4t³ : 1 - (-2t + 2)³ / 2`, with `t` clamped to `[0, 1]`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathState {
    /// 1-based.
    pub cycle: u8,
    pub phase: BreathPhase,
    pub phase_elapsed_ms: u64,
    pub seconds_remaining: u64,
    /// Box sides finished in the current cycle (0..=4). Always updated in the
    /// same write as `side_progress`.
    pub sides_completed: u8,
    /// Eased trace progress of the side currently animating.
    pub side_progress: f64,
    pub total_elapsed_ms: u64,
}

impl BreathState {
    fn initial(phase_ms: u64) -> Self {
        Self {
            cycle: 1,
            phase: BreathPhase::Inhale,
            phase_elapsed_ms: 0,
            seconds_remaining: phase_ms / 1000,
            sides_completed: 0,
            side_progress: 0.0,
            total_elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreathingEngine {
    cycles: u8,
    phase_ms: u64,
    state: BreathState,
    /// Global index (cycle × 4 + side) of the side currently animating.
    side_index: u64,
    started: bool,
}

impl BreathingEngine {
    pub fn new(cycles: u8, phase: Duration) -> Self {
        let phase_ms = (phase.as_millis() as u64).max(1);
        Self {
            cycles: cycles.max(1),
            phase_ms,
            state: BreathState::initial(phase_ms),
            side_index: 0,
            started: false,
        }
    }

    pub fn state(&self) -> &BreathState {
        &self.state
    }

    pub fn total_ms(&self) -> u64 {
        self.total_sides() * self.phase_ms
    }

    pub fn is_finished(&self) -> bool {
        self.state.total_elapsed_ms >= self.total_ms()
    }

    fn total_sides(&self) -> u64 {
        self.cycles as u64 * BreathPhase::ALL.len() as u64
    }

    /// Cues for the opening inhale. Idempotent.
    pub fn start(&mut self) -> Vec<Cue> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        boundary_cues(0)
    }

    /// Moves the engine to `elapsed_ms` since the phase began and returns the
    /// cues for every sub-phase boundary crossed on the way. Going backwards
    /// is ignored.
    pub fn advance_to(&mut self, elapsed_ms: u64) -> Vec<Cue> {
        let mut cues = self.start();
        let total = self.total_ms();
        let elapsed = elapsed_ms.min(total).max(self.state.total_elapsed_ms);

        let target_side = (elapsed / self.phase_ms).min(self.total_sides());
        while self.side_index < target_side {
            self.side_index += 1;
            if self.side_index < self.total_sides() {
                cues.extend(boundary_cues(self.side_index));
            }
        }

        self.state = if elapsed >= total {
            BreathState {
                cycle: self.cycles,
                phase: BreathPhase::HoldOut,
                phase_elapsed_ms: self.phase_ms,
                seconds_remaining: 0,
                sides_completed: BreathPhase::ALL.len() as u8,
                side_progress: 1.0,
                total_elapsed_ms: total,
            }
        } else {
            let phase_elapsed_ms = elapsed - self.side_index * self.phase_ms;
            let side = (self.side_index % 4) as usize;
            BreathState {
                cycle: (self.side_index / 4) as u8 + 1,
                phase: BreathPhase::ALL[side],
                phase_elapsed_ms,
                seconds_remaining: self.phase_ms / 1000 - phase_elapsed_ms / 1000,
                sides_completed: side as u8,
                side_progress: ease_in_out_cubic(phase_elapsed_ms as f64 / self.phase_ms as f64),
                total_elapsed_ms: elapsed,
            }
        };

        cues
    }
}

fn boundary_cues(side_index: u64) -> Vec<Cue> {
    let mut cues = Vec::with_capacity(3);
    if side_index > 0 && side_index % 4 == 0 {
        cues.push(Cue::Haptic(HapticCue::Medium));
    }
    cues.push(Cue::Haptic(HapticCue::Light));
    match BreathPhase::ALL[(side_index % 4) as usize] {
        BreathPhase::Inhale => cues.push(Cue::Audio(AudioCue::Inhale)),
        BreathPhase::Exhale => cues.push(Cue::Audio(AudioCue::Exhale)),
        BreathPhase::HoldIn | BreathPhase::HoldOut => {}
    }
    cues
}
