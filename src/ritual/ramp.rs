//! Press-and-hold intensity ramp for the Activate phase.
//!
//! Stages only advance on *held* ticks: the driver calls [`RampEngine::tick`]
//! once per tick interval while the athlete is pressing and not at all while
//! released, so releasing freezes every counter in place.

use std::time::Duration;

use serde::Serialize;

use crate::cues::{AudioCue, Cue, HapticCue};

const BASE_PULSE_SPACING: f64 = 18.0;
const MIN_PULSE_SPACING: u32 = 5;
const HEARTBEAT_THRESHOLD: f64 = 0.7;
const HEARTBEAT_OFFSET: u32 = 2;
const HEARTBEAT_ECHO_SCALE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RampColor {
    Indigo,
    Teal,
    Amber,
    Orange,
    Crimson,
    Gold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RampStage {
    pub cue_text: String,
    /// Target intensity in `[0, 1]`.
    pub intensity: f64,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub color: RampColor,
}

impl RampStage {
    pub fn new(cue_text: &str, intensity: f64, duration: Duration, color: RampColor) -> Self {
        Self {
            cue_text: cue_text.to_string(),
            intensity: intensity.clamp(0.0, 1.0),
            duration,
            color,
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

/// The six-stage visualisation script, each stage hotter than the last.
pub fn reference_script() -> Vec<RampStage> {
    vec![
        RampStage::new(
            "Feel the mat under your feet",
            0.20,
            Duration::from_secs(5),
            RampColor::Indigo,
        ),
        RampStage::new(
            "The hall goes quiet",
            0.35,
            Duration::from_secs(5),
            RampColor::Teal,
        ),
        RampStage::new(
            "See your first grip",
            0.50,
            Duration::from_secs(6),
            RampColor::Amber,
        ),
        RampStage::new(
            "Pressure builds in your chest",
            0.62,
            Duration::from_secs(6),
            RampColor::Orange,
        ),
        RampStage::new(
            "Own the centre",
            0.75,
            Duration::from_secs(6),
            RampColor::Crimson,
        ),
        RampStage::new("Hajime", 0.90, Duration::from_secs(5), RampColor::Gold),
    ]
}

/// Ticks between main pulses: `max(5, round(18 × (1 - intensity)))`.
pub fn haptic_interval_ticks(intensity: f64) -> u32 {
    let spacing = (BASE_PULSE_SPACING * (1.0 - intensity.clamp(0.0, 1.0))).round() as u32;
    spacing.max(MIN_PULSE_SPACING)
}

/// Ticks needed to clear a stage at the given tick rate, at least one.
pub fn stage_ticks(stage: &RampStage, tick: Duration) -> u32 {
    let tick_ms = (tick.as_millis() as u64).max(1);
    let stage_ms = stage.duration.as_millis() as u64;
    (stage_ms.div_ceil(tick_ms) as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnitionBeat {
    Burst,
    Aftershock,
    Hold,
    Settled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IgnitionStep {
    /// Wait before this step fires, measured from the previous step.
    pub delay: Duration,
    pub beat: IgnitionBeat,
    pub cues: Vec<Cue>,
}

/// Burst, two aftershocks, a held glow, then the settled success cue.
pub fn reference_ignition() -> Vec<IgnitionStep> {
    vec![
        IgnitionStep {
            delay: Duration::ZERO,
            beat: IgnitionBeat::Burst,
            cues: vec![
                Cue::Haptic(HapticCue::Heavy),
                Cue::Audio(AudioCue::HajimeImpact),
            ],
        },
        IgnitionStep {
            delay: Duration::from_millis(150),
            beat: IgnitionBeat::Aftershock,
            cues: vec![Cue::Haptic(HapticCue::Rigid)],
        },
        IgnitionStep {
            delay: Duration::from_millis(150),
            beat: IgnitionBeat::Aftershock,
            cues: vec![Cue::Haptic(HapticCue::Medium)],
        },
        IgnitionStep {
            delay: Duration::from_millis(300),
            beat: IgnitionBeat::Hold,
            cues: Vec::new(),
        },
        IgnitionStep {
            delay: Duration::from_millis(1500),
            beat: IgnitionBeat::Settled,
            cues: vec![
                Cue::Haptic(HapticCue::Success),
                Cue::Audio(AudioCue::SuccessChime),
            ],
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "step", content = "beat")]
pub enum RampStep {
    Ramping,
    /// Stage text fading out before the next stage starts.
    StageFade,
    /// Final stage cleared; handed back to the controller for routing.
    Complete,
    /// Waiting for the ignition tap.
    ReadyToTrigger,
    Igniting(IgnitionBeat),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RampState {
    pub step: RampStep,
    pub stage_index: usize,
    pub stage_count: usize,
    pub cue_text: String,
    pub color: RampColor,
    pub intensity: f64,
    pub current_tick: u32,
    pub stage_ticks: u32,
    /// Held ticks summed across every stage.
    pub overall_elapsed: u32,
    pub total_ticks: u32,
    pub stage_progress: f64,
    pub overall_progress: f64,
    pub holding: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RampTick {
    pub cues: Vec<Cue>,
    pub stage_complete: bool,
    pub ramp_complete: bool,
}

#[derive(Debug, Clone)]
pub struct RampEngine {
    stages: Vec<RampStage>,
    stage_ticks: Vec<u32>,
    state: RampState,
}

impl RampEngine {
    pub fn new(stages: Vec<RampStage>, tick: Duration) -> Self {
        let stages = if stages.is_empty() {
            reference_script()
        } else {
            stages
        };
        let ticks: Vec<u32> = stages.iter().map(|stage| stage_ticks(stage, tick)).collect();
        let first = &stages[0];

        let state = RampState {
            step: RampStep::Ramping,
            stage_index: 0,
            stage_count: stages.len(),
            cue_text: first.cue_text.clone(),
            color: first.color,
            intensity: first.intensity,
            current_tick: 0,
            stage_ticks: ticks[0],
            overall_elapsed: 0,
            total_ticks: ticks.iter().sum(),
            stage_progress: 0.0,
            overall_progress: 0.0,
            holding: false,
        };

        Self {
            stages,
            stage_ticks: ticks,
            state,
        }
    }

    pub fn state(&self) -> &RampState {
        &self.state
    }

    pub fn set_holding(&mut self, holding: bool) {
        self.state.holding = holding;
    }

    /// One held tick. No-op outside [`RampStep::Ramping`].
    pub fn tick(&mut self) -> RampTick {
        let mut outcome = RampTick::default();
        if self.state.step != RampStep::Ramping {
            return outcome;
        }

        let state = &mut self.state;
        state.current_tick += 1;
        state.overall_elapsed += 1;
        state.stage_progress = state.current_tick as f64 / state.stage_ticks as f64;
        state.overall_progress = state.overall_elapsed as f64 / state.total_ticks as f64;

        let interval = haptic_interval_ticks(state.intensity);
        if state.current_tick % interval == 0 {
            outcome
                .cues
                .push(Cue::Haptic(HapticCue::IntensityPulse(state.intensity)));
        } else if state.intensity > HEARTBEAT_THRESHOLD
            && state.current_tick > HEARTBEAT_OFFSET
            && (state.current_tick - HEARTBEAT_OFFSET) % interval == 0
        {
            outcome.cues.push(Cue::Haptic(HapticCue::IntensityPulse(
                state.intensity * HEARTBEAT_ECHO_SCALE,
            )));
        }

        if state.current_tick >= state.stage_ticks {
            outcome.cues.push(Cue::Haptic(HapticCue::Medium));
            outcome.cues.push(Cue::Audio(AudioCue::SoftTap));
            if state.stage_index + 1 >= self.stages.len() {
                state.step = RampStep::Complete;
                outcome.ramp_complete = true;
            } else {
                state.step = RampStep::StageFade;
                outcome.stage_complete = true;
            }
        }

        outcome
    }

    /// Moves past a faded stage. Returns `false` if there was nothing to
    /// advance.
    pub fn advance_stage(&mut self) -> bool {
        if self.state.step != RampStep::StageFade || self.state.stage_index + 1 >= self.stages.len() {
            return false;
        }

        let index = self.state.stage_index + 1;
        let stage = &self.stages[index];
        self.state.stage_index = index;
        self.state.cue_text = stage.cue_text.clone();
        self.state.color = stage.color;
        self.state.intensity = stage.intensity;
        self.state.current_tick = 0;
        self.state.stage_ticks = self.stage_ticks[index];
        self.state.stage_progress = 0.0;
        self.state.step = RampStep::Ramping;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TICK: Duration = Duration::from_millis(50);

    fn pulses(cues: &[Cue]) -> Vec<f64> {
        cues.iter()
            .filter_map(|cue| match cue {
                Cue::Haptic(HapticCue::IntensityPulse(value)) => Some(*value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interval_formula_matches_reference_points() {
        assert_eq!(haptic_interval_ticks(0.0), 18);
        assert_eq!(haptic_interval_ticks(0.2), 14);
        assert_eq!(haptic_interval_ticks(0.5), 9);
        assert_eq!(haptic_interval_ticks(0.75), 5);
        assert_eq!(haptic_interval_ticks(1.0), 5);
    }

    #[test]
    fn reference_script_gets_denser_until_the_floor() {
        let script = reference_script();
        let intervals: Vec<u32> = script
            .iter()
            .map(|stage| haptic_interval_ticks(stage.intensity))
            .collect();

        for pair in script.windows(2) {
            assert!(pair[1].intensity > pair[0].intensity);
        }
        for pair in intervals.windows(2) {
            assert!(pair[1] < pair[0] || pair[1] == MIN_PULSE_SPACING);
        }
        assert_eq!(*intervals.last().unwrap(), MIN_PULSE_SPACING);
    }

    #[test]
    fn reference_script_takes_33_held_seconds() {
        let engine = RampEngine::new(reference_script(), TICK);
        assert_eq!(engine.state().total_ticks, 660);
        assert_eq!(engine.state().stage_count, 6);
    }

    #[test]
    fn low_intensity_stage_pulses_once_per_interval() {
        let mut engine = RampEngine::new(
            vec![RampStage::new("calm", 0.2, Duration::from_secs(5), RampColor::Indigo)],
            TICK,
        );
        let mut cues = Vec::new();
        for _ in 0..28 {
            cues.extend(engine.tick().cues);
        }
        assert_eq!(pulses(&cues), vec![0.2, 0.2]);
    }

    #[test]
    fn hot_stage_pulses_as_a_heartbeat() {
        let mut engine = RampEngine::new(
            vec![RampStage::new("fire", 0.9, Duration::from_secs(5), RampColor::Gold)],
            TICK,
        );
        let mut pulse_ticks = Vec::new();
        for tick in 1..=12 {
            let outcome = engine.tick();
            for value in pulses(&outcome.cues) {
                pulse_ticks.push((tick, value));
            }
        }

        let echo = 0.9 * HEARTBEAT_ECHO_SCALE;
        assert_eq!(
            pulse_ticks,
            vec![(5, 0.9), (7, echo), (10, 0.9), (12, echo)]
        );
    }

    #[test]
    fn untouched_engine_stays_frozen() {
        let mut engine = RampEngine::new(reference_script(), TICK);
        for _ in 0..10 {
            engine.tick();
        }
        let frozen = engine.state().clone();
        engine.set_holding(false);
        engine.set_holding(true);
        assert_eq!(engine.state().overall_elapsed, frozen.overall_elapsed);
        assert_eq!(engine.state().stage_progress, frozen.stage_progress);

        engine.tick();
        assert_eq!(engine.state().overall_elapsed, 11);
    }

    #[test]
    fn stages_complete_in_order_then_the_ramp() {
        let stages = vec![
            RampStage::new("one", 0.3, Duration::from_millis(100), RampColor::Teal),
            RampStage::new("two", 0.8, Duration::from_millis(150), RampColor::Crimson),
        ];
        let mut engine = RampEngine::new(stages, TICK);

        assert!(!engine.tick().stage_complete);
        let done = engine.tick();
        assert!(done.stage_complete);
        assert!(done.cues.contains(&Cue::Audio(AudioCue::SoftTap)));
        assert_eq!(engine.state().step, RampStep::StageFade);

        // Fading: further ticks do nothing.
        assert_eq!(engine.tick(), RampTick::default());
        assert_eq!(engine.state().overall_elapsed, 2);

        assert!(engine.advance_stage());
        assert_eq!(engine.state().stage_index, 1);
        assert_eq!(engine.state().current_tick, 0);
        assert_eq!(engine.state().color, RampColor::Crimson);

        engine.tick();
        engine.tick();
        let last = engine.tick();
        assert!(last.ramp_complete);
        assert!(!last.stage_complete);
        assert_eq!(engine.state().step, RampStep::Complete);
        assert_eq!(engine.state().overall_progress, 1.0);
        assert!(!engine.advance_stage());
    }

    #[test]
    fn ignition_script_opens_with_a_burst() {
        let script = reference_ignition();
        assert_eq!(script[0].beat, IgnitionBeat::Burst);
        assert_eq!(script[0].delay, Duration::ZERO);
        assert_eq!(script.last().unwrap().beat, IgnitionBeat::Settled);
    }

    proptest! {
        #[test]
        fn interval_never_increases_with_intensity(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(haptic_interval_ticks(hi) <= haptic_interval_ticks(lo));
            prop_assert!(haptic_interval_ticks(hi) >= MIN_PULSE_SPACING);
        }
    }
}
