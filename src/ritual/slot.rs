use std::future::Future;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use log::debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::MacroPhase;

struct PhaseTask {
    phase: MacroPhase,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Counts a phase task as live from spawn until its future is dropped,
/// whether it finished or was aborted.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the one task allowed to drive the current macro-phase.
pub(crate) struct PhaseSlot {
    current: Option<PhaseTask>,
    live: Arc<AtomicUsize>,
}

impl PhaseSlot {
    pub fn new(live: Arc<AtomicUsize>) -> Self {
        Self {
            current: None,
            live,
        }
    }

    /// Cancels and reaps the current task. Safe to call on an empty slot and
    /// on a task that has already finished.
    pub async fn clear(&mut self) {
        if let Some(task) = self.current.take() {
            task.cancel.cancel();
            task.handle.abort();
            if let Err(err) = task.handle.await {
                if !err.is_cancelled() {
                    debug!("{:?} task ended abnormally: {err}", task.phase);
                }
            }
        }
    }

    /// Clears the slot, then spawns `fut` as the new phase task.
    pub async fn spawn<F>(&mut self, phase: MacroPhase, cancel: CancellationToken, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.clear().await;

        let guard = LiveGuard::new(Arc::clone(&self.live));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            fut.await;
        });

        self.current = Some(PhaseTask {
            phase,
            handle,
            cancel,
        });
    }
}
