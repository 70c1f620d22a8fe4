//! Haptic and audio cue vocabulary plus the sink capability the ritual engine
//! emits through.
//!
//! Sinks are fire-and-forget: they never return an error and must swallow any
//! device failure themselves, so a missing speaker or haptic motor can never
//! stall phase progression.

#[cfg(feature = "tone-audio")]
pub mod synth;
#[cfg(feature = "tone-audio")]
pub mod tone;

use std::sync::{Arc, Mutex, PoisonError};

use log::info;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tone-audio")]
pub use tone::ToneCueSink;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum HapticCue {
    Light,
    Medium,
    Heavy,
    Rigid,
    Soft,
    Success,
    Warning,
    Error,
    /// Continuous-intensity pulse in `[0, 1]`.
    IntensityPulse(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioCue {
    Tick,
    Inhale,
    Exhale,
    TransitionChime,
    HajimeImpact,
    SoftTap,
    CorrectTap,
    WrongBuzz,
    SuccessChime,
    StartRitual,
}

impl AudioCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCue::Tick => "tick",
            AudioCue::Inhale => "inhale",
            AudioCue::Exhale => "exhale",
            AudioCue::TransitionChime => "transitionChime",
            AudioCue::HajimeImpact => "hajimeImpact",
            AudioCue::SoftTap => "softTap",
            AudioCue::CorrectTap => "correctTap",
            AudioCue::WrongBuzz => "wrongBuzz",
            AudioCue::SuccessChime => "successChime",
            AudioCue::StartRitual => "startRitual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    Haptic(HapticCue),
    Audio(AudioCue),
}

pub trait CueSink: Send + Sync {
    fn emit_haptic(&self, cue: HapticCue);
    fn emit_audio(&self, cue: AudioCue);
}

/// Discards every cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCueSink;

impl CueSink for NullCueSink {
    fn emit_haptic(&self, _cue: HapticCue) {}
    fn emit_audio(&self, _cue: AudioCue) {}
}

/// Writes cues to the log; used by the headless binary when no audio device
/// is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCueSink;

impl CueSink for LogCueSink {
    fn emit_haptic(&self, cue: HapticCue) {
        info!("haptic {:?}", cue);
    }

    fn emit_audio(&self, cue: AudioCue) {
        info!("audio {}", cue.as_str());
    }
}

/// Keeps every emitted cue in order. Useful for asserting on emission
/// sequences and for replaying a session in diagnostics.
#[derive(Debug, Default)]
pub struct RecordingCueSink {
    cues: Mutex<Vec<Cue>>,
}

impl RecordingCueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn audio(&self) -> Vec<AudioCue> {
        self.cues()
            .into_iter()
            .filter_map(|cue| match cue {
                Cue::Audio(audio) => Some(audio),
                Cue::Haptic(_) => None,
            })
            .collect()
    }

    pub fn haptics(&self) -> Vec<HapticCue> {
        self.cues()
            .into_iter()
            .filter_map(|cue| match cue {
                Cue::Haptic(haptic) => Some(haptic),
                Cue::Audio(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, cue: Cue) {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cue);
    }
}

impl CueSink for RecordingCueSink {
    fn emit_haptic(&self, cue: HapticCue) {
        self.push(Cue::Haptic(cue));
    }

    fn emit_audio(&self, cue: AudioCue) {
        self.push(Cue::Audio(cue));
    }
}

/// Session-scoped view of a sink. Audio is dropped when sound is disabled and
/// everything is dropped once the owning token is cancelled.
#[derive(Clone)]
pub struct CueGate {
    sink: Arc<dyn CueSink>,
    sound_enabled: bool,
    cancel: CancellationToken,
}

impl CueGate {
    pub fn new(sink: Arc<dyn CueSink>, sound_enabled: bool, cancel: CancellationToken) -> Self {
        Self {
            sink,
            sound_enabled,
            cancel,
        }
    }

    /// Same sink and sound policy, silenced by a narrower token.
    pub fn scoped(&self, cancel: CancellationToken) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            sound_enabled: self.sound_enabled,
            cancel,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn haptic(&self, cue: HapticCue) {
        if self.is_open() {
            self.sink.emit_haptic(cue);
        }
    }

    pub fn audio(&self, cue: AudioCue) {
        if self.sound_enabled && self.is_open() {
            self.sink.emit_audio(cue);
        }
    }

    pub fn emit(&self, cue: Cue) {
        match cue {
            Cue::Haptic(haptic) => self.haptic(haptic),
            Cue::Audio(audio) => self.audio(audio),
        }
    }

    pub fn emit_all<I>(&self, cues: I)
    where
        I: IntoIterator<Item = Cue>,
    {
        for cue in cues {
            self.emit(cue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(sound_enabled: bool) -> (Arc<RecordingCueSink>, CueGate, CancellationToken) {
        let sink = Arc::new(RecordingCueSink::new());
        let token = CancellationToken::new();
        let gate = CueGate::new(sink.clone(), sound_enabled, token.clone());
        (sink, gate, token)
    }

    #[test]
    fn sound_off_drops_audio_but_keeps_haptics() {
        let (sink, gate, _token) = gate(false);
        gate.emit_all([
            Cue::Haptic(HapticCue::Light),
            Cue::Audio(AudioCue::Tick),
            Cue::Haptic(HapticCue::IntensityPulse(0.4)),
        ]);

        assert!(sink.audio().is_empty());
        assert_eq!(
            sink.haptics(),
            vec![HapticCue::Light, HapticCue::IntensityPulse(0.4)]
        );
    }

    #[test]
    fn cancelled_gate_is_silent() {
        let (sink, gate, token) = gate(true);
        gate.audio(AudioCue::Inhale);
        token.cancel();
        token.cancel();
        gate.audio(AudioCue::Exhale);
        gate.haptic(HapticCue::Heavy);

        assert_eq!(sink.cues(), vec![Cue::Audio(AudioCue::Inhale)]);
    }

    #[test]
    fn scoped_gate_follows_its_own_token() {
        let (sink, session_gate, _session) = gate(true);
        let phase_token = CancellationToken::new();
        let phase_gate = session_gate.scoped(phase_token.clone());

        phase_token.cancel();
        phase_gate.haptic(HapticCue::Light);
        session_gate.haptic(HapticCue::Medium);

        assert_eq!(sink.haptics(), vec![HapticCue::Medium]);
    }

    #[test]
    fn audio_names_are_stable() {
        assert_eq!(AudioCue::HajimeImpact.as_str(), "hajimeImpact");
        assert_eq!(
            serde_json::to_string(&AudioCue::TransitionChime).unwrap(),
            "\"transitionChime\""
        );
    }
}
