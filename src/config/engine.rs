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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_VOICES: u8 = 2;
const DEFAULT_VOLUME: f32 = 1.0;
const DEFAULT_RAMP_DURATION: Duration = Duration::from_millis(300);

/// Parses a duration string such as `300ms`.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::InvalidDuration {
            value: value.to_string(),
            message: e.to_string(),
        })
}

/// Rate ramp configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Ramp {
    /// Whether note changes glide to the new speed.
    enabled: Option<bool>,
    /// How long a glide takes.
    duration: Option<String>,
}

impl Ramp {
    pub fn new(enabled: bool, duration: &str) -> Ramp {
        Ramp {
            enabled: Some(enabled),
            duration: Some(duration.to_string()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn duration(&self) -> Result<Duration, ConfigError> {
        match &self.duration {
            Some(duration) => parse_duration(duration),
            None => Ok(DEFAULT_RAMP_DURATION),
        }
    }
}

/// A YAML representation of the playback engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// The number of voices, one or two.
    voices: Option<u8>,
    /// The initial loop flag of every voice.
    looping: Option<bool>,
    /// The initial volume of every voice.
    volume: Option<f32>,
    ramp: Option<Ramp>,
}

impl Engine {
    pub fn new(voices: u8, ramp: Ramp) -> Engine {
        Engine {
            voices: Some(voices),
            looping: None,
            volume: None,
            ramp: Some(ramp),
        }
    }

    /// Returns the number of voices, clamped to one or two.
    pub fn voices(&self) -> usize {
        usize::from(self.voices.unwrap_or(DEFAULT_VOICES).clamp(1, 2))
    }

    pub fn looping(&self) -> bool {
        self.looping.unwrap_or(true)
    }

    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_VOLUME).max(0.0)
    }

    pub fn ramp(&self) -> Ramp {
        self.ramp.clone().unwrap_or_default()
    }
}
