use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cues::{CueGate, CueSink, HapticCue};

use super::breathing::BreathingEngine;
use super::config::{PhaseKind, RitualConfiguration};
use super::events::RitualEvent;
use super::machine::{accepts_ignition, accepts_skip, after_ritual_phase, Completion, Route};
use super::phases::{self, PhaseContext, Publisher, SharedSession};
use super::ramp::{IgnitionBeat, RampEngine, RampStep};
use super::record::{CompletionRecord, SessionRecorder};
use super::slot::PhaseSlot;
use super::state::{MacroPhase, PhaseState, RitualSession, RitualSnapshot, SessionStatus};
use super::timing::RitualTiming;

const EVENT_CAPACITY: usize = 64;

/// User gestures forwarded by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Skip,
    HoldBegin,
    HoldEnd,
    Ignite,
    ConfirmDone,
    Abandon,
}

pub(crate) enum Command {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<RitualSnapshot>>,
    },
    PhaseFinished {
        epoch: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Intro,
    Countdown,
    Ritual { index: usize },
    Transition { target: PhaseKind },
    ReadyToTrigger,
    Ignition,
    Done { via_ignition: bool },
}

impl Entry {
    fn after(route: Route) -> Self {
        match route {
            Route::Transition { target } => Entry::Transition { target },
            Route::ReadyToTrigger => Entry::ReadyToTrigger,
            Route::Done => Entry::Done {
                via_ignition: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Driver {
    Intro,
    Countdown,
    Breathing,
    Transition,
    Focus,
    Activate,
    Ignition,
}

/// Front door of the ritual engine. Cheap to clone; every clone talks to the
/// same session.
#[derive(Clone)]
pub struct RitualController {
    state: SharedSession,
    cues: Arc<dyn CueSink>,
    recorder: Arc<dyn SessionRecorder>,
    timing: Arc<RitualTiming>,
    commands: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    snapshots: Arc<watch::Sender<Option<RitualSnapshot>>>,
    events: broadcast::Sender<RitualEvent>,
    live: Arc<AtomicUsize>,
}

impl RitualController {
    pub fn new(cues: Arc<dyn CueSink>, recorder: Arc<dyn SessionRecorder>) -> Self {
        Self::with_timing(cues, recorder, RitualTiming::default())
    }

    pub fn with_timing(
        cues: Arc<dyn CueSink>,
        recorder: Arc<dyn SessionRecorder>,
        timing: RitualTiming,
    ) -> Self {
        let (snapshots, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(None)),
            cues,
            recorder,
            timing: Arc::new(timing),
            commands: Arc::new(Mutex::new(None)),
            snapshots: Arc::new(snapshots),
            events,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn timing(&self) -> &RitualTiming {
        &self.timing
    }

    pub async fn snapshot(&self) -> Option<RitualSnapshot> {
        let guard = self.state.lock().await;
        guard.as_ref().map(RitualSession::snapshot)
    }

    pub fn watch(&self) -> watch::Receiver<Option<RitualSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<RitualEvent> {
        self.events.subscribe()
    }

    /// Phase-driving tasks currently alive. Never more than one.
    pub fn active_phase_tasks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub async fn is_active(&self) -> bool {
        self.commands
            .lock()
            .await
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    pub async fn start(&self, config: RitualConfiguration) -> Result<RitualSnapshot> {
        let mut commands = self.commands.lock().await;
        if commands.as_ref().is_some_and(|sender| !sender.is_closed()) {
            bail!("a ritual is already running");
        }

        let session = RitualSession::new(Uuid::new_v4().to_string(), config, Utc::now());
        info!(
            "Starting ritual {} ({:?}, {})",
            session.id,
            session.config.order(),
            session.config.mini_game().as_str()
        );

        let session_cancel = CancellationToken::new();
        let gate = CueGate::new(
            Arc::clone(&self.cues),
            session.config.sound_enabled(),
            session_cancel.clone(),
        );
        let (hold_tx, hold_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut supervisor = Supervisor {
            state: Arc::clone(&self.state),
            gate,
            session_cancel,
            slot: PhaseSlot::new(Arc::clone(&self.live)),
            timing: Arc::clone(&self.timing),
            notify: tx.clone(),
            publisher: Publisher::new(Arc::clone(&self.snapshots)),
            events: self.events.clone(),
            recorder: Arc::clone(&self.recorder),
            hold_tx,
            hold_rx,
            commands: Arc::clone(&self.commands),
            closed: false,
        };

        let snapshot = {
            let state = Arc::clone(&self.state);
            let mut guard = state.lock().await;
            *guard = Some(session);
            supervisor.enter(&mut guard, Entry::Intro).await;
            guard
                .as_ref()
                .map(RitualSession::snapshot)
                .ok_or_else(|| anyhow!("ritual vanished during start"))?
        };

        tokio::spawn(supervisor.run(rx));
        *commands = Some(tx);
        Ok(snapshot)
    }

    pub async fn skip(&self) -> Result<RitualSnapshot> {
        self.send(Intent::Skip).await
    }

    pub async fn hold_begin(&self) -> Result<RitualSnapshot> {
        self.send(Intent::HoldBegin).await
    }

    pub async fn hold_end(&self) -> Result<RitualSnapshot> {
        self.send(Intent::HoldEnd).await
    }

    pub async fn ignite(&self) -> Result<RitualSnapshot> {
        self.send(Intent::Ignite).await
    }

    /// Dismisses the Done screen. This is the only path that records the
    /// session.
    pub async fn confirm_done(&self) -> Result<RitualSnapshot> {
        self.send(Intent::ConfirmDone).await
    }

    /// Ends the session without credit. A no-op when nothing is running.
    pub async fn abandon(&self) -> Result<()> {
        if !self.is_active().await {
            return Ok(());
        }
        match self.send(Intent::Abandon).await {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!("Abandon raced with session end: {err}");
                Ok(())
            }
        }
    }

    pub async fn send(&self, intent: Intent) -> Result<RitualSnapshot> {
        let sender = self
            .commands
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("no ritual is running"))?;

        let (reply, response) = oneshot::channel();
        sender
            .send(Command::Intent { intent, reply })
            .map_err(|_| anyhow!("ritual has already ended"))?;
        response
            .await
            .map_err(|_| anyhow!("ritual ended before handling {intent:?}"))?
    }
}

/// Single writer for phase changes. Intents and phase completions are
/// serialised through one queue, so routing never races itself.
struct Supervisor {
    state: SharedSession,
    gate: CueGate,
    session_cancel: CancellationToken,
    slot: PhaseSlot,
    timing: Arc<RitualTiming>,
    notify: mpsc::UnboundedSender<Command>,
    publisher: Publisher,
    events: broadcast::Sender<RitualEvent>,
    recorder: Arc<dyn SessionRecorder>,
    hold_tx: watch::Sender<bool>,
    hold_rx: watch::Receiver<bool>,
    commands: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    closed: bool,
}

type SessionGuard<'a> = MutexGuard<'a, Option<RitualSession>>;

impl Supervisor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Intent { intent, reply } => {
                    let result = self.handle_intent(intent).await;
                    let _ = reply.send(result);
                }
                Command::PhaseFinished { epoch } => self.on_phase_finished(epoch).await,
            }
            if self.closed {
                break;
            }
        }
        self.slot.clear().await;
    }

    fn emit(&self, event: RitualEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn handle_intent(&mut self, intent: Intent) -> Result<RitualSnapshot> {
        let state = Arc::clone(&self.state);
        let mut guard = state.lock().await;
        let (phase_state, status) = match guard.as_ref() {
            Some(session) => (session.state.clone(), session.status),
            None => bail!("no ritual is running"),
        };

        match intent {
            Intent::Skip if accepts_skip(&phase_state) => self.skip(&mut guard).await,
            Intent::HoldBegin => self.set_hold(&mut guard, true),
            Intent::HoldEnd => self.set_hold(&mut guard, false),
            Intent::Ignite if accepts_ignition(&phase_state) => {
                info!("Ignition");
                self.enter(&mut guard, Entry::Ignition).await;
            }
            Intent::ConfirmDone if matches!(phase_state, PhaseState::Done { .. }) => {
                return self.complete(guard).await;
            }
            Intent::Abandon => return self.abandon(guard).await,
            ignored => {
                debug!(
                    "Ignoring {ignored:?} in {:?} ({status:?})",
                    phase_state.macro_phase()
                );
            }
        }

        guard
            .as_ref()
            .map(RitualSession::snapshot)
            .ok_or_else(|| anyhow!("no ritual is running"))
    }

    async fn skip(&mut self, guard: &mut SessionGuard<'_>) {
        self.slot.clear().await;

        let Some(session) = guard.as_ref() else {
            return;
        };
        let index = session.ritual_index;
        let route = after_ritual_phase(&session.config, index, Completion::Skipped);
        if let Some(kind) = session.current_ritual_phase() {
            info!("Skipped {}", kind.as_str());
            self.emit(RitualEvent::Skipped { phase: kind });
        }

        self.gate.haptic(HapticCue::Light);
        self.enter(guard, Entry::after(route)).await;
    }

    fn set_hold(&mut self, guard: &mut SessionGuard<'_>, holding: bool) {
        let changed = self.hold_tx.send_if_modified(|current| {
            if *current == holding {
                return false;
            }
            *current = holding;
            true
        });
        if !changed {
            return;
        }

        if let Some(session) = guard.as_mut() {
            if let PhaseState::Activate(ramp) = &mut session.state {
                if matches!(ramp.step, RampStep::Ramping | RampStep::StageFade) {
                    ramp.holding = holding;
                    self.publisher.publish(Some(&*session));
                }
            }
        }
    }

    async fn on_phase_finished(&mut self, epoch: u64) {
        let state = Arc::clone(&self.state);
        let mut guard = state.lock().await;
        let Some(session) = guard.as_ref() else {
            return;
        };
        if session.epoch != epoch {
            debug!("Dropping stale completion for epoch {epoch}");
            return;
        }

        let next = match &session.state {
            PhaseState::Intro { .. } => Entry::Countdown,
            PhaseState::Countdown { .. } => Entry::Ritual { index: 0 },
            PhaseState::Transition { .. } => Entry::Ritual {
                index: session.ritual_index + 1,
            },
            PhaseState::Activate(ramp) if matches!(ramp.step, RampStep::Igniting(_)) => {
                Entry::Done { via_ignition: true }
            }
            PhaseState::Breathing(_) | PhaseState::Focus(_) | PhaseState::Activate(_) => {
                Entry::after(after_ritual_phase(
                    &session.config,
                    session.ritual_index,
                    Completion::Natural,
                ))
            }
            PhaseState::Done { .. } => return,
        };

        self.enter(&mut guard, next).await;
    }

    /// Replaces the current phase. The old task is reaped before anything of
    /// the new phase is written.
    async fn enter(&mut self, guard: &mut SessionGuard<'_>, entry: Entry) {
        self.slot.clear().await;

        let Some(session) = guard.as_mut() else {
            return;
        };
        session.epoch += 1;
        let epoch = session.epoch;

        let driver = match entry {
            Entry::Intro => {
                session.state = PhaseState::Intro { step: 0 };
                Some(Driver::Intro)
            }
            Entry::Countdown => {
                session.state = PhaseState::Countdown {
                    number: self.timing.countdown_from,
                };
                Some(Driver::Countdown)
            }
            Entry::Ritual { index } => {
                session.ritual_index = index;
                match session.config.phase_at(index) {
                    Some(PhaseKind::Breathe) => {
                        let engine = BreathingEngine::new(
                            self.timing.breath_cycles,
                            self.timing.breath_phase,
                        );
                        session.state = PhaseState::Breathing(engine.state().clone());
                        Some(Driver::Breathing)
                    }
                    Some(PhaseKind::Focus) => {
                        session.state =
                            PhaseState::Focus(phases::focus_entry(&self.timing, session));
                        Some(Driver::Focus)
                    }
                    Some(PhaseKind::Activate) => {
                        let engine = RampEngine::new(
                            self.timing.ramp_stages.clone(),
                            self.timing.ramp_tick,
                        );
                        let mut ramp = engine.state().clone();
                        ramp.holding = *self.hold_rx.borrow();
                        session.state = PhaseState::Activate(ramp);
                        Some(Driver::Activate)
                    }
                    None => {
                        error!("Ritual index {index} out of range, finishing");
                        session.state = PhaseState::Done {
                            via_ignition: false,
                        };
                        session.status = SessionStatus::Completed;
                        None
                    }
                }
            }
            Entry::Transition { target } => {
                session.state = PhaseState::Transition { target, step: 0 };
                Some(Driver::Transition)
            }
            Entry::ReadyToTrigger => {
                if let PhaseState::Activate(ramp) = &mut session.state {
                    ramp.step = RampStep::ReadyToTrigger;
                }
                None
            }
            Entry::Ignition => {
                // Leaves ReadyToTrigger before the driver is polled, so a
                // second tap is ignored.
                if let PhaseState::Activate(ramp) = &mut session.state {
                    ramp.step = RampStep::Igniting(IgnitionBeat::Burst);
                }
                Some(Driver::Ignition)
            }
            Entry::Done { via_ignition } => {
                session.state = PhaseState::Done { via_ignition };
                session.status = SessionStatus::Completed;
                None
            }
        };

        self.publisher.publish(Some(&*session));
        match entry {
            Entry::ReadyToTrigger => {
                info!("Ramp complete, waiting for ignition");
                self.emit(RitualEvent::ReadyToTrigger);
            }
            Entry::Ignition => {}
            _ => {
                debug!("Entered {:?} (epoch {epoch})", session.phase());
                self.emit(RitualEvent::PhaseEntered {
                    session_id: session.id.clone(),
                    phase: session.phase(),
                    ritual_index: session.ritual_index,
                    target: session.pending_transition_target(),
                });
            }
        }

        if let Some(driver) = driver {
            self.launch(driver, epoch).await;
        }
    }

    async fn launch(&mut self, driver: Driver, epoch: u64) {
        let cancel = self.session_cancel.child_token();
        let ctx = PhaseContext {
            epoch,
            state: Arc::clone(&self.state),
            gate: self.gate.scoped(cancel.clone()),
            cancel: cancel.clone(),
            timing: Arc::clone(&self.timing),
            notify: self.notify.clone(),
            publisher: self.publisher.clone(),
            hold: self.hold_rx.clone(),
        };

        let slot = &mut self.slot;
        match driver {
            Driver::Intro => {
                slot.spawn(MacroPhase::Intro, cancel, phases::run_intro(ctx))
                    .await
            }
            Driver::Countdown => {
                slot.spawn(MacroPhase::Countdown, cancel, phases::run_countdown(ctx))
                    .await
            }
            Driver::Breathing => {
                slot.spawn(MacroPhase::Breathing, cancel, phases::run_breathing(ctx))
                    .await
            }
            Driver::Transition => {
                slot.spawn(MacroPhase::Transition, cancel, phases::run_transition(ctx))
                    .await
            }
            Driver::Focus => {
                slot.spawn(MacroPhase::Focus, cancel, phases::run_focus(ctx))
                    .await
            }
            Driver::Activate => {
                slot.spawn(MacroPhase::Activate, cancel, phases::run_activate(ctx))
                    .await
            }
            Driver::Ignition => {
                slot.spawn(MacroPhase::Activate, cancel, phases::run_ignition(ctx))
                    .await
            }
        }
    }

    /// Stops every task and cue of the session and frees the controller for
    /// the next start.
    async fn close(&mut self, mut guard: SessionGuard<'_>) {
        self.slot.clear().await;
        self.session_cancel.cancel();
        *guard = None;
        self.publisher.publish(None);
        drop(guard);

        *self.commands.lock().await = None;
        self.closed = true;
    }

    async fn complete(&mut self, guard: SessionGuard<'_>) -> Result<RitualSnapshot> {
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("no ritual is running"))?;
        let minutes = self.timing.credited_minutes;
        let record = CompletionRecord::for_session(session, minutes, Utc::now());
        let session_id = session.id.clone();
        let snapshot = session.snapshot();

        self.close(guard).await;

        let recorded = match self.recorder.record_completion(record).await {
            Ok(()) => {
                info!("Recorded ritual {session_id} ({minutes} min)");
                true
            }
            Err(err) => {
                error!("Failed to record ritual {session_id}: {err:#}");
                false
            }
        };

        self.emit(RitualEvent::SessionCompleted {
            session_id,
            duration_minutes: minutes,
            recorded,
        });
        Ok(snapshot)
    }

    async fn abandon(&mut self, guard: SessionGuard<'_>) -> Result<RitualSnapshot> {
        let mut snapshot = guard
            .as_ref()
            .map(RitualSession::snapshot)
            .ok_or_else(|| anyhow!("no ritual is running"))?;
        snapshot.status = SessionStatus::Abandoned;
        info!("Abandoned ritual {} in {:?}", snapshot.session_id, snapshot.phase);

        self.close(guard).await;
        self.emit(RitualEvent::SessionAbandoned {
            session_id: snapshot.session_id.clone(),
            phase: snapshot.phase,
        });
        Ok(snapshot)
    }
}
