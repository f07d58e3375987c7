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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use super::{audio::Audio, engine::Engine, error::ConfigError, midi::Midi, recording::Recording};

/// The configuration for the sample player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The audio output configuration.
    audio: Option<Audio>,
    /// The MIDI input configuration.
    midi: Option<Midi>,
    /// The playback engine configuration.
    engine: Option<Engine>,
    /// Where captures are written.
    recording: Option<Recording>,
}

impl Player {
    pub fn new(
        audio: Audio,
        midi: Option<Midi>,
        engine: Engine,
        recording: Option<Recording>,
    ) -> Player {
        Player {
            audio: Some(audio),
            midi,
            engine: Some(engine),
            recording,
        }
    }

    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn midi(&self) -> Midi {
        self.midi.clone().unwrap_or_default()
    }

    pub fn engine(&self) -> Engine {
        self.engine.clone().unwrap_or_default()
    }

    pub fn recording(&self) -> Recording {
        self.recording.clone().unwrap_or_default()
    }
}
