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
use std::str::FromStr;

use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::SampleFormat;

/// The name that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "default";

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device. Matched as a substring of the device name.
    device: String,

    /// Output sample rate in Hz. Defaults to the device's preferred rate.
    sample_rate: Option<u32>,

    /// Output sample format. Defaults to the device's preferred format.
    sample_format: Option<String>,

    /// Output bits per sample.
    bits_per_sample: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            sample_format: None,
            bits_per_sample: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the requested sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns the requested sample format, if any.
    pub fn sample_format(&self) -> Result<Option<SampleFormat>, ConfigError> {
        self.sample_format
            .as_deref()
            .map(|format| {
                SampleFormat::from_str(format)
                    .map_err(|e| ConfigError::InvalidSampleFormat(e.to_string()))
            })
            .transpose()
    }

    /// Returns the requested bits per sample. When only a format is given, floats
    /// default to 32 bits and integers to 16.
    pub fn bits_per_sample(&self) -> Result<Option<u16>, ConfigError> {
        Ok(match (self.bits_per_sample, self.sample_format()?) {
            (Some(bits), _) => Some(bits),
            (None, Some(SampleFormat::Float)) => Some(32),
            (None, Some(SampleFormat::Int)) => Some(16),
            (None, None) => None,
        })
    }
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_audio_deserialize() {
        let yaml = r#"
            device: mock-device
            sample_rate: 48000
            sample_format: int
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.sample_rate(), Some(48000));
        assert_eq!(audio.sample_format().unwrap(), Some(SampleFormat::Int));
        assert_eq!(audio.bits_per_sample().unwrap(), Some(16));
    }

    #[test]
    fn test_audio_defaults() {
        let audio = Audio::default();
        assert_eq!(audio.device(), DEFAULT_DEVICE);
        assert_eq!(audio.sample_rate(), None);
        assert_eq!(audio.sample_format().unwrap(), None);
        assert_eq!(audio.bits_per_sample().unwrap(), None);
    }

    #[test]
    fn test_invalid_sample_format() {
        let yaml = r#"
            device: mock-device
            sample_format: double
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(matches!(
            audio.sample_format(),
            Err(ConfigError::InvalidSampleFormat(_))
        ));
    }
}
