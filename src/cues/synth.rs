use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

use super::AudioCue;

const SAMPLE_RATE: u32 = 44100;
const ATTACK_SECS: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Waveform {
    Sine,
    Square,
}

/// Shape of one synthesised cue: a (possibly sweeping) fundamental with
/// optional overtones and a noise component for percussive hits.
#[derive(Debug, Clone, Copy)]
struct ToneShape {
    start_hz: f32,
    end_hz: f32,
    duration_ms: u32,
    waveform: Waveform,
    overtones: &'static [f32],
    noise: f32,
    gain: f32,
}

fn shape_for(cue: AudioCue) -> ToneShape {
    let base = ToneShape {
        start_hz: 440.0,
        end_hz: 440.0,
        duration_ms: 120,
        waveform: Waveform::Sine,
        overtones: &[],
        noise: 0.0,
        gain: 0.2,
    };

    match cue {
        AudioCue::Tick => ToneShape {
            start_hz: 1200.0,
            end_hz: 1200.0,
            duration_ms: 40,
            ..base
        },
        AudioCue::Inhale => ToneShape {
            start_hz: 220.0,
            end_hz: 330.0,
            duration_ms: 600,
            gain: 0.12,
            ..base
        },
        AudioCue::Exhale => ToneShape {
            start_hz: 330.0,
            end_hz: 220.0,
            duration_ms: 600,
            gain: 0.12,
            ..base
        },
        AudioCue::TransitionChime => ToneShape {
            start_hz: 660.0,
            end_hz: 660.0,
            duration_ms: 700,
            overtones: &[1.5, 2.0],
            gain: 0.15,
            ..base
        },
        AudioCue::HajimeImpact => ToneShape {
            start_hz: 90.0,
            end_hz: 55.0,
            duration_ms: 450,
            noise: 0.35,
            gain: 0.4,
            ..base
        },
        AudioCue::SoftTap => ToneShape {
            start_hz: 880.0,
            end_hz: 880.0,
            duration_ms: 60,
            gain: 0.12,
            ..base
        },
        AudioCue::CorrectTap => ToneShape {
            start_hz: 1320.0,
            end_hz: 1320.0,
            duration_ms: 90,
            ..base
        },
        AudioCue::WrongBuzz => ToneShape {
            start_hz: 140.0,
            end_hz: 140.0,
            duration_ms: 220,
            waveform: Waveform::Square,
            gain: 0.1,
            ..base
        },
        AudioCue::SuccessChime => ToneShape {
            start_hz: 523.25,
            end_hz: 523.25,
            duration_ms: 900,
            overtones: &[1.5, 2.0],
            gain: 0.15,
            ..base
        },
        AudioCue::StartRitual => ToneShape {
            start_hz: 440.0,
            end_hz: 660.0,
            duration_ms: 400,
            ..base
        },
    }
}

/// Finite mono source for a single cue.
pub struct CueTone {
    shape: ToneShape,
    total_samples: usize,
    num_sample: usize,
    phase: f32,
    rng: StdRng,
}

impl CueTone {
    pub fn new(cue: AudioCue) -> Self {
        let shape = shape_for(cue);
        let total_samples = (SAMPLE_RATE as usize * shape.duration_ms as usize) / 1000;
        Self {
            shape,
            total_samples,
            num_sample: 0,
            phase: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    fn envelope(&self, t: f32, length: f32) -> f32 {
        let attack = (t / ATTACK_SECS).min(1.0);
        let release = (1.0 - t / length).max(0.0);
        attack * release * release
    }
}

impl Iterator for CueTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let length = self.shape.duration_ms as f32 / 1000.0;
        let progress = t / length;
        let freq = self.shape.start_hz + (self.shape.end_hz - self.shape.start_hz) * progress;

        self.phase = (self.phase + 2.0 * PI * freq / SAMPLE_RATE as f32) % (2.0 * PI);

        let fundamental = match self.shape.waveform {
            Waveform::Sine => self.phase.sin(),
            Waveform::Square => self.phase.sin().signum(),
        };
        let overtones: f32 = self
            .shape
            .overtones
            .iter()
            .map(|ratio| (self.phase * ratio).sin() * 0.5)
            .sum();
        let noise = if self.shape.noise > 0.0 {
            self.rng.gen_range(-1.0..1.0) * self.shape.noise
        } else {
            0.0
        };

        self.num_sample += 1;

        let sample = (fundamental + overtones + noise) * self.envelope(t, length);
        Some((sample * self.shape.gain).clamp(-1.0, 1.0))
    }
}

impl Source for CueTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples.saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.shape.duration_ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tones_are_finite_and_bounded() {
        for cue in [AudioCue::Tick, AudioCue::HajimeImpact, AudioCue::WrongBuzz] {
            let tone = CueTone::new(cue);
            let expected = tone.total_samples;
            let samples: Vec<f32> = tone.collect();
            assert_eq!(samples.len(), expected);
            assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }
}
