// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
// Core voice mixing logic shared by the cpal and mock output devices.
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::{
    playback::voice::{Voice, VoiceId},
    rate::clamp_speed,
};

/// Raised by the mixer when a voice plays through to the end of its sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceEnded {
    pub voice: VoiceId,
    /// The load generation of the voice when it ended.
    pub generation: u64,
}

/// Mixes every voice at the shared playback rate into an interleaved output
/// buffer. Optionally mirrors each rendered block to a capture tap.
pub struct Mixer {
    channels: u16,
    sample_rate: u32,
    voices: Vec<Voice>,
    /// The applied speed, stored as f32 bits.
    rate: AtomicU32,
    tap: Mutex<Option<crossbeam_channel::Sender<Vec<f32>>>>,
    ended_tx: crossbeam_channel::Sender<VoiceEnded>,
}

impl Mixer {
    pub fn new(
        channels: u16,
        sample_rate: u32,
        voices: Vec<Voice>,
        ended_tx: crossbeam_channel::Sender<VoiceEnded>,
    ) -> Mixer {
        Mixer {
            channels: channels.max(1),
            sample_rate,
            voices,
            rate: AtomicU32::new(1.0f32.to_bits()),
            tap: Mutex::new(None),
            ended_tx,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Applies a speed to every voice. The speed is clamped to the playable range.
    pub fn set_rate(&self, speed: f32) -> f32 {
        let speed = if speed.is_nan() { 1.0 } else { clamp_speed(speed) };
        self.rate.store(speed.to_bits(), Ordering::Release);
        speed
    }

    /// The currently applied speed.
    pub fn rate(&self) -> f32 {
        f32::from_bits(self.rate.load(Ordering::Acquire))
    }

    /// Routes a copy of every rendered block to `tap`. Returns false if a tap is
    /// already attached.
    pub fn attach_tap(&self, tap: crossbeam_channel::Sender<Vec<f32>>) -> bool {
        let mut current = self.tap.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(tap);
        true
    }

    /// Removes the capture tap, if any.
    pub fn detach_tap(&self) {
        self.tap.lock().take();
    }

    pub fn has_tap(&self) -> bool {
        self.tap.lock().is_some()
    }

    /// Renders interleaved frames into `out`, overwriting its contents.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let channels = usize::from(self.channels);
        let rate = self.rate();

        for voice in &self.voices {
            let mut state = voice.lock();
            for frame in out.chunks_exact_mut(channels) {
                if state.mix_frame(frame, rate) {
                    let ended = VoiceEnded {
                        voice: voice.id(),
                        generation: state.generation(),
                    };
                    if self.ended_tx.try_send(ended).is_err() {
                        warn!(voice = %voice.id(), "Unable to report end of playback");
                    }
                }
            }
        }

        let mut tap = self.tap.lock();
        if let Some(sender) = tap.as_ref() {
            if sender.send(out.to_vec()).is_err() {
                // The capture writer went away.
                tap.take();
            }
        }
    }
}
