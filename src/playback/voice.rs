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
use std::{fmt, str::FromStr, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::loader::LoadedSample;

/// Identifies one of the two voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoiceId {
    A,
    B,
}

impl VoiceId {
    pub const ALL: [VoiceId; 2] = [VoiceId::A, VoiceId::B];

    pub fn index(self) -> usize {
        match self {
            VoiceId::A => 0,
            VoiceId::B => 1,
        }
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceId::A => write!(f, "A"),
            VoiceId::B => write!(f, "B"),
        }
    }
}

impl FromStr for VoiceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "1" => Ok(VoiceId::A),
            "b" | "2" => Ok(VoiceId::B),
            _ => Err(format!("unknown voice: {}", s)),
        }
    }
}

/// Transport state of a voice. Shared between the control thread and the mixer.
#[derive(Debug)]
pub struct PlaybackState {
    sample: Option<LoadedSample>,
    /// Fractional frame position of the playhead.
    position: f64,
    playing: bool,
    looping: bool,
    reversed: bool,
    volume: f32,
    /// Incremented on every load.
    generation: u64,
}

impl PlaybackState {
    fn new(looping: bool, volume: f32) -> PlaybackState {
        PlaybackState {
            sample: None,
            position: 0.0,
            playing: false,
            looping,
            reversed: false,
            volume: volume.max(0.0),
            generation: 0,
        }
    }

    /// Where playback starts: the first frame, or the last when reversed.
    fn head(&self) -> f64 {
        match &self.sample {
            Some(sample) if self.reversed => sample.frames().saturating_sub(1) as f64,
            _ => 0.0,
        }
    }

    fn rewind(&mut self) {
        self.position = self.head();
    }

    /// The load generation of the installed sample.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adds one frame of this voice into `frame` and advances the playhead by `rate`.
    /// Returns true if this frame completed a pass through the sample.
    pub fn mix_frame(&mut self, frame: &mut [f32], rate: f32) -> bool {
        if !self.playing {
            return false;
        }
        let Some(sample) = &self.sample else {
            return false;
        };
        let frames = sample.frames() as f64;
        if frames == 0.0 {
            return false;
        }

        for (channel, out) in frame.iter_mut().enumerate() {
            *out += sample.interpolate(self.position, channel) * self.volume;
        }

        let step = f64::from(rate);
        self.position += if self.reversed { -step } else { step };

        if self.position >= 0.0 && self.position < frames {
            return false;
        }
        if self.looping {
            self.position = self.position.rem_euclid(frames);
            return false;
        }

        self.playing = false;
        self.rewind();
        true
    }
}

/// One independently loadable and playable audio source.
#[derive(Clone)]
pub struct Voice {
    id: VoiceId,
    state: Arc<Mutex<PlaybackState>>,
}

impl Voice {
    pub fn new(id: VoiceId, looping: bool, volume: f32) -> Voice {
        Voice {
            id,
            state: Arc::new(Mutex::new(PlaybackState::new(looping, volume))),
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// Locks the playback state for rendering.
    pub fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock()
    }

    /// Replaces the loaded sample. The voice is left stopped at its head and any
    /// completion from the previous sample is forgotten.
    pub fn install(&self, sample: LoadedSample) {
        let mut state = self.state.lock();
        debug!(voice = %self.id, sample = ?sample, "Installing sample");
        state.sample = Some(sample);
        state.playing = false;
        state.generation += 1;
        state.rewind();
    }

    /// Starts playback from the head. Does nothing if no sample is loaded.
    pub fn play(&self) -> bool {
        let mut state = self.state.lock();
        if state.sample.is_none() {
            return false;
        }
        state.rewind();
        state.playing = true;
        true
    }

    /// Halts playback and rewinds.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.rewind();
    }

    pub fn set_looping(&self, looping: bool) {
        self.state.lock().looping = looping;
    }

    /// Reversing takes effect from the next play.
    pub fn set_reversed(&self, reversed: bool) {
        let mut state = self.state.lock();
        state.reversed = reversed;
        if !state.playing {
            state.rewind();
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.state.lock().volume = volume.max(0.0);
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().sample.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn is_reversed(&self) -> bool {
        self.state.lock().reversed
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    /// The load generation, incremented on every install.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// The loaded sample, if any.
    pub fn sample(&self) -> Option<LoadedSample> {
        self.state.lock().sample.clone()
    }

    pub fn position(&self) -> f64 {
        self.state.lock().position
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("loaded", &state.sample.is_some())
            .field("playing", &state.playing)
            .field("looping", &state.looping)
            .field("reversed", &state.reversed)
            .field("volume", &state.volume)
            .finish()
    }
}
