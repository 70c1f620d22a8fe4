use log::{debug, warn};
use rodio::{OutputStream, OutputStreamHandle};
use std::sync::{
    mpsc::{self, Sender},
    Mutex, PoisonError,
};
use std::thread;

use super::synth::CueTone;
use super::{AudioCue, CueSink, HapticCue};

/// Plays synthesised cue tones on the default output device.
///
/// rodio's stream objects are not `Send`, so they live on a dedicated thread
/// that is spawned lazily on the first cue. Each cue goes straight to the
/// output mixer, so a long tone never delays the next one. Device errors are
/// logged once and then swallowed; haptics have no desktop equivalent and are
/// only traced.
pub struct ToneCueSink {
    tx: Mutex<Option<Sender<AudioCue>>>,
}

impl ToneCueSink {
    pub fn new() -> Self {
        Self { tx: Mutex::new(None) }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCue>, String> {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCue>();

        thread::Builder::new()
            .name("cue-audio".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut device_failed = false;

                while let Ok(cue) = rx.recv() {
                    if output.is_none() {
                        match OutputStream::try_default() {
                            Ok(opened) => output = Some(opened),
                            Err(err) => {
                                if !device_failed {
                                    warn!("audio cues unavailable: {err}");
                                    device_failed = true;
                                }
                                continue;
                            }
                        }
                    }

                    if let Some((_, handle)) = output.as_ref() {
                        if let Err(err) = handle.play_raw(CueTone::new(cue)) {
                            debug!("failed to play {}: {err}", cue.as_str());
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }
}

impl Default for ToneCueSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CueSink for ToneCueSink {
    fn emit_haptic(&self, cue: HapticCue) {
        debug!("haptic {:?}", cue);
    }

    fn emit_audio(&self, cue: AudioCue) {
        match self.ensure_thread() {
            Ok(tx) => {
                let _ = tx.send(cue);
            }
            Err(err) => debug!("dropping audio cue {}: {err}", cue.as_str()),
        }
    }
}
