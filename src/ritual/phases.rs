//! One async driver per macro-phase.
//!
//! A driver owns nothing but its local sub-engine. Every write to the shared
//! session goes through [`PhaseContext::apply`], which re-checks the task's
//! cancellation token and epoch under the state lock, so a tick that loses
//! the race against a skip or abandon changes nothing and emits nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cues::{AudioCue, Cue, CueGate, HapticCue};
use crate::log_tick;

use super::breathing::BreathingEngine;
use super::controller::Command;
use super::ramp::{RampEngine, RampStep};
use super::state::{FocusState, PhaseState, RitualSession, RitualSnapshot};
use super::timing::RitualTiming;

// Per-tick traces for breathing and ramp; very chatty at 20 Hz.
const ENABLE_LOGS: bool = false;

pub(crate) type SharedSession = Arc<Mutex<Option<RitualSession>>>;

#[derive(Clone)]
pub(crate) struct Publisher {
    snapshots: Arc<watch::Sender<Option<RitualSnapshot>>>,
}

impl Publisher {
    pub fn new(snapshots: Arc<watch::Sender<Option<RitualSnapshot>>>) -> Self {
        Self { snapshots }
    }

    pub fn publish(&self, session: Option<&RitualSession>) {
        self.snapshots
            .send_replace(session.map(RitualSession::snapshot));
    }
}

pub(crate) struct PhaseContext {
    pub epoch: u64,
    pub state: SharedSession,
    pub gate: CueGate,
    pub cancel: CancellationToken,
    pub timing: Arc<RitualTiming>,
    pub notify: mpsc::UnboundedSender<Command>,
    pub publisher: Publisher,
    pub hold: watch::Receiver<bool>,
}

impl PhaseContext {
    /// Applies `update` if this task still owns the session, then emits the
    /// returned cues and publishes a snapshot. Returns `false` once the task
    /// has been superseded.
    async fn apply<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut RitualSession) -> Vec<Cue>,
    {
        let mut guard = self.state.lock().await;
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(session) = guard.as_mut() else {
            return false;
        };
        if session.epoch != self.epoch {
            return false;
        }

        let cues = update(session);
        self.gate.emit_all(cues);
        self.publisher.publish(Some(&*session));
        true
    }

    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = sleep(duration) => !self.cancel.is_cancelled(),
            _ = self.cancel.cancelled() => false,
        }
    }

    fn ticker(&self, period: Duration) -> tokio::time::Interval {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn finish(&self) {
        if !self.cancel.is_cancelled() {
            let _ = self.notify.send(Command::PhaseFinished { epoch: self.epoch });
        }
    }
}

pub(crate) async fn run_intro(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    let opened = ctx
        .apply(|_| {
            vec![
                Cue::Haptic(HapticCue::Medium),
                Cue::Audio(AudioCue::StartRitual),
            ]
        })
        .await;
    if !opened {
        return;
    }

    for (i, step) in timing.intro_steps.iter().enumerate() {
        if !ctx.pause(*step).await {
            return;
        }
        let next = i + 1;
        let advanced = ctx
            .apply(move |session| {
                session.state = PhaseState::Intro { step: next };
                Vec::new()
            })
            .await;
        if !advanced {
            return;
        }
    }

    ctx.finish();
}

pub(crate) async fn run_countdown(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    if !ctx.pause(timing.countdown_lead_in).await {
        return;
    }

    for number in (1..=timing.countdown_from).rev() {
        let shown = ctx
            .apply(move |session| {
                session.state = PhaseState::Countdown { number };
                vec![Cue::Haptic(HapticCue::Light), Cue::Audio(AudioCue::Tick)]
            })
            .await;
        if !shown || !ctx.pause(timing.countdown_tick).await {
            return;
        }
    }

    ctx.finish();
}

pub(crate) async fn run_breathing(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    let mut engine = BreathingEngine::new(timing.breath_cycles, timing.breath_phase);
    let started = Instant::now();

    let opening = engine.start();
    let state = engine.state().clone();
    let opened = ctx
        .apply(move |session| {
            session.state = PhaseState::Breathing(state);
            opening
        })
        .await;
    if !opened {
        return;
    }

    let mut ticker = ctx.ticker(timing.breath_tick);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = ctx.cancel.cancelled() => return,
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let cues = engine.advance_to(elapsed_ms);
        let state = engine.state().clone();
        log_tick!(
            "breath cycle {} {:?} side {} progress {:.3}",
            state.cycle,
            state.phase,
            state.sides_completed,
            state.side_progress
        );

        let applied = ctx
            .apply(move |session| {
                session.state = PhaseState::Breathing(state);
                cues
            })
            .await;
        if !applied {
            return;
        }
        if engine.is_finished() {
            break;
        }
    }

    ctx.finish();
}

pub(crate) async fn run_transition(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    let opened = ctx
        .apply(|_| {
            vec![
                Cue::Haptic(HapticCue::Medium),
                Cue::Audio(AudioCue::TransitionChime),
            ]
        })
        .await;
    if !opened {
        return;
    }

    for (i, step) in timing.transition_steps.iter().enumerate() {
        if !ctx.pause(*step).await {
            return;
        }
        let next = i + 1;
        let advanced = ctx
            .apply(move |session| {
                if let PhaseState::Transition { step, .. } = &mut session.state {
                    *step = next;
                }
                Vec::new()
            })
            .await;
        if !advanced {
            return;
        }
    }

    ctx.finish();
}

/// Runs the fixed focus window. The mini-game's own state never shortens or
/// extends it; an early exit arrives as a skip.
pub(crate) async fn run_focus(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    let total = timing.focus_duration;
    let started = Instant::now();
    let mut ticker = ctx.ticker(timing.focus_tick);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = ctx.cancel.cancelled() => return,
        }

        let elapsed = started.elapsed().min(total);
        let time_up = elapsed >= total;
        let applied = ctx
            .apply(move |session| {
                if let PhaseState::Focus(focus) = &mut session.state {
                    focus.elapsed_secs = elapsed.as_secs();
                    focus.remaining_secs = (total - elapsed).as_secs();
                    focus.time_up = time_up;
                }
                Vec::new()
            })
            .await;
        if !applied {
            return;
        }
        if time_up {
            break;
        }
    }

    ctx.finish();
}

pub(crate) fn focus_entry(timing: &RitualTiming, session: &RitualSession) -> FocusState {
    FocusState {
        game: session.config.mini_game(),
        elapsed_secs: 0,
        remaining_secs: timing.focus_duration.as_secs(),
        time_up: false,
    }
}

fn ramp_update(engine: &RampEngine, cues: Vec<Cue>) -> impl FnOnce(&mut RitualSession) -> Vec<Cue> {
    let state = engine.state().clone();
    move |session| {
        session.state = PhaseState::Activate(state);
        cues
    }
}

/// Drives the ramp while the athlete holds. Released time is never counted:
/// the ticker only exists while the hold signal is true.
pub(crate) async fn run_activate(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    let mut engine = RampEngine::new(timing.ramp_stages.clone(), timing.ramp_tick);
    let mut hold = ctx.hold.clone();

    engine.set_holding(*hold.borrow_and_update());
    if !ctx.apply(ramp_update(&engine, Vec::new())).await {
        return;
    }

    loop {
        while !*hold.borrow_and_update() {
            tokio::select! {
                changed = hold.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = ctx.cancel.cancelled() => return,
            }
        }

        engine.set_holding(true);
        if !ctx.apply(ramp_update(&engine, Vec::new())).await {
            return;
        }

        let mut ticker = ctx.ticker(timing.ramp_tick);
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return,
                changed = hold.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *hold.borrow_and_update() {
                        continue;
                    }
                    engine.set_holding(false);
                    if !ctx.apply(ramp_update(&engine, Vec::new())).await {
                        return;
                    }
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcome = engine.tick();
            let state = engine.state();
            log_tick!(
                "ramp stage {} tick {}/{} overall {}/{}",
                state.stage_index,
                state.current_tick,
                state.stage_ticks,
                state.overall_elapsed,
                state.total_ticks
            );
            if !ctx.apply(ramp_update(&engine, outcome.cues)).await {
                return;
            }

            if outcome.ramp_complete {
                ctx.finish();
                return;
            }

            if outcome.stage_complete {
                if !ctx.pause(timing.stage_gap).await {
                    return;
                }
                engine.advance_stage();
                if !ctx.apply(ramp_update(&engine, Vec::new())).await {
                    return;
                }
                ticker.reset();
            }
        }
    }
}

/// Plays the completion burst. Not skippable; only abandon stops it.
pub(crate) async fn run_ignition(ctx: PhaseContext) {
    let timing = Arc::clone(&ctx.timing);
    for step in &timing.ignition {
        if !step.delay.is_zero() && !ctx.pause(step.delay).await {
            return;
        }
        let beat = step.beat;
        let cues = step.cues.clone();
        let applied = ctx
            .apply(move |session| {
                if let PhaseState::Activate(ramp) = &mut session.state {
                    ramp.step = RampStep::Igniting(beat);
                }
                cues
            })
            .await;
        if !applied {
            return;
        }
    }

    ctx.finish();
}
