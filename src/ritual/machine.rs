//! Routing rules of the phase state machine, kept free of timers so they can
//! be checked exhaustively.

use super::config::{PhaseKind, RitualConfiguration};
use super::ramp::RampStep;
use super::state::{MacroPhase, PhaseState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Natural,
    Skipped,
}

/// Where the session goes when the ritual phase at `index` ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Transition { target: PhaseKind },
    /// Last phase was Activate and its stages ran out: wait for ignition.
    ReadyToTrigger,
    Done,
}

pub fn after_ritual_phase(config: &RitualConfiguration, index: usize, how: Completion) -> Route {
    if let Some(target) = config.phase_at(index + 1) {
        return Route::Transition { target };
    }

    match (config.phase_at(index), how) {
        (Some(PhaseKind::Activate), Completion::Natural) => Route::ReadyToTrigger,
        _ => Route::Done,
    }
}

/// Whether an explicit skip applies to the current sub-state. Intro,
/// countdown, transitions, ignition and Done all run to completion.
pub fn accepts_skip(state: &PhaseState) -> bool {
    match state {
        PhaseState::Breathing(_) | PhaseState::Focus(_) => true,
        PhaseState::Activate(ramp) => {
            matches!(ramp.step, RampStep::Ramping | RampStep::StageFade)
        }
        _ => false,
    }
}

pub fn accepts_ignition(state: &PhaseState) -> bool {
    state.ramp_step() == Some(RampStep::ReadyToTrigger)
}

/// Macro-phases a session visits when nothing is abandoned.
pub fn planned_phases(config: &RitualConfiguration) -> Vec<MacroPhase> {
    let mut plan = vec![MacroPhase::Intro, MacroPhase::Countdown];
    for (i, kind) in config.order().iter().enumerate() {
        if i > 0 {
            plan.push(MacroPhase::Transition);
        }
        plan.push(kind.macro_phase());
    }
    plan.push(MacroPhase::Done);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ritual::config::MiniGameKind;
    use crate::ritual::ramp::{reference_script, RampEngine};
    use std::time::Duration;

    fn config(order: [PhaseKind; 3]) -> RitualConfiguration {
        RitualConfiguration::new(&order, MiniGameKind::NumberTap, true).unwrap()
    }

    #[test]
    fn middle_phases_always_transition() {
        let c = config([PhaseKind::Focus, PhaseKind::Activate, PhaseKind::Breathe]);
        assert_eq!(
            after_ritual_phase(&c, 0, Completion::Skipped),
            Route::Transition {
                target: PhaseKind::Activate
            }
        );
        assert_eq!(
            after_ritual_phase(&c, 1, Completion::Natural),
            Route::Transition {
                target: PhaseKind::Breathe
            }
        );
        assert_eq!(after_ritual_phase(&c, 2, Completion::Natural), Route::Done);
    }

    #[test]
    fn final_activate_waits_for_ignition_unless_skipped() {
        let c = RitualConfiguration::default();
        assert_eq!(
            after_ritual_phase(&c, 2, Completion::Natural),
            Route::ReadyToTrigger
        );
        assert_eq!(after_ritual_phase(&c, 2, Completion::Skipped), Route::Done);
    }

    #[test]
    fn plan_has_one_transition_between_each_pair() {
        let plan = planned_phases(&RitualConfiguration::default());
        assert_eq!(
            plan,
            vec![
                MacroPhase::Intro,
                MacroPhase::Countdown,
                MacroPhase::Breathing,
                MacroPhase::Transition,
                MacroPhase::Focus,
                MacroPhase::Transition,
                MacroPhase::Activate,
                MacroPhase::Done,
            ]
        );
    }

    #[test]
    fn skip_only_applies_inside_content_phases() {
        assert!(!accepts_skip(&PhaseState::Intro { step: 0 }));
        assert!(!accepts_skip(&PhaseState::Countdown { number: 2 }));
        assert!(!accepts_skip(&PhaseState::Transition {
            target: PhaseKind::Focus,
            step: 1
        }));
        assert!(!accepts_skip(&PhaseState::Done {
            via_ignition: false
        }));

        let mut ramp = RampEngine::new(reference_script(), Duration::from_millis(50))
            .state()
            .clone();
        assert!(accepts_skip(&PhaseState::Activate(ramp.clone())));
        ramp.step = RampStep::ReadyToTrigger;
        assert!(!accepts_skip(&PhaseState::Activate(ramp.clone())));
        assert!(accepts_ignition(&PhaseState::Activate(ramp)));
    }
}
