mod breathing;
mod config;
mod controller;
mod events;
mod machine;
mod phases;
mod ramp;
mod record;
mod slot;
mod state;
mod timing;

pub use breathing::{ease_in_out_cubic, BreathPhase, BreathState, BreathingEngine};
pub use config::{MiniGameKind, PhaseKind, RitualConfiguration};
pub use controller::{Intent, RitualController};
pub use events::RitualEvent;
pub use machine::{after_ritual_phase, planned_phases, Completion, Route};
pub use ramp::{
    haptic_interval_ticks, reference_ignition, reference_script, stage_ticks, IgnitionBeat,
    IgnitionStep, RampColor, RampEngine, RampStage, RampState, RampStep, RampTick,
};
pub use record::{CompletionRecord, RecordFuture, SessionRecorder};
pub use state::{FocusState, MacroPhase, PhaseState, RitualSession, RitualSnapshot, SessionStatus};
pub use timing::RitualTiming;
