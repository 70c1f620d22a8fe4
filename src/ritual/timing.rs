use std::time::Duration;

use super::ramp::{reference_ignition, reference_script, IgnitionStep, RampStage};

/// Every duration and tick rate that drives a ritual.
#[derive(Debug, Clone)]
pub struct RitualTiming {
    /// Intro animation steps, played back to back.
    pub intro_steps: Vec<Duration>,

    /// Delay before the first countdown number; shorter than a full tick
    /// because the intro has already faded the counter in.
    pub countdown_lead_in: Duration,
    pub countdown_tick: Duration,
    pub countdown_from: u8,

    pub breath_cycles: u8,
    pub breath_phase: Duration,
    pub breath_tick: Duration,

    pub transition_steps: Vec<Duration>,

    pub focus_duration: Duration,
    pub focus_tick: Duration,

    pub ramp_tick: Duration,
    /// Pause after a ramp stage completes while its text fades out.
    pub stage_gap: Duration,
    pub ramp_stages: Vec<RampStage>,
    pub ignition: Vec<IgnitionStep>,

    /// Minutes credited to the record store for a completed ritual.
    pub credited_minutes: u32,
}

impl Default for RitualTiming {
    fn default() -> Self {
        Self {
            intro_steps: vec![
                Duration::from_millis(700),
                Duration::from_millis(900),
                Duration::from_millis(900),
                Duration::from_millis(500),
            ],
            countdown_lead_in: Duration::from_millis(400),
            countdown_tick: Duration::from_secs(1),
            countdown_from: 3,
            breath_cycles: 3,
            breath_phase: Duration::from_secs(4),
            breath_tick: Duration::from_millis(50),
            transition_steps: vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(500),
            ],
            focus_duration: Duration::from_secs(40),
            focus_tick: Duration::from_secs(1),
            ramp_tick: Duration::from_millis(50),
            stage_gap: Duration::from_millis(600),
            ramp_stages: reference_script(),
            ignition: reference_ignition(),
            credited_minutes: 3,
        }
    }
}

impl RitualTiming {
    pub fn intro_total(&self) -> Duration {
        self.intro_steps.iter().sum()
    }

    pub fn countdown_total(&self) -> Duration {
        self.countdown_lead_in + self.countdown_tick * self.countdown_from as u32
    }

    /// cycles × 4 sub-phases × phase length.
    pub fn breathing_total(&self) -> Duration {
        self.breath_phase * (self.breath_cycles as u32 * 4)
    }

    pub fn transition_total(&self) -> Duration {
        self.transition_steps.iter().sum()
    }

    /// Held time needed to clear every ramp stage, excluding stage gaps.
    pub fn ramp_total(&self) -> Duration {
        self.ramp_stages.iter().map(|stage| stage.duration).sum()
    }

    pub fn ignition_total(&self) -> Duration {
        self.ignition.iter().map(|step| step.delay).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_breathing_is_48_seconds() {
        assert_eq!(RitualTiming::default().breathing_total(), Duration::from_secs(48));
    }

    #[test]
    fn reference_transition_is_about_two_seconds() {
        assert_eq!(RitualTiming::default().transition_total(), Duration::from_secs(2));
    }

    #[test]
    fn countdown_lead_in_is_shorter_than_a_tick() {
        let timing = RitualTiming::default();
        assert!(timing.countdown_lead_in < timing.countdown_tick);
        assert_eq!(timing.countdown_total(), Duration::from_millis(3400));
    }
}
