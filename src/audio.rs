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
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod format;
pub mod mixer;
pub mod mock;

pub use format::SampleFormat;
pub use mixer::{Mixer, VoiceEnded};

/// An audio output. Once started, the device pulls audio from the mixer until stopped.
pub trait Device: fmt::Display + Send + Sync {
    /// The name of the device.
    fn name(&self) -> &str;

    /// The output sample rate.
    fn sample_rate(&self) -> u32;

    /// The number of output channels.
    fn channels(&self) -> u16;

    /// Opens the output stream and starts rendering from the mixer. Starting a
    /// running device does nothing.
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), Box<dyn Error>>;

    /// Closes the output stream. Stopping a stopped device does nothing.
    fn stop(&self);

    /// Returns true while the output stream is open.
    fn is_running(&self) -> bool;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(config)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device(&config::Audio::new("mock-device")).unwrap();
        assert_eq!(device.name(), "mock-device");
        assert_eq!(device.to_string(), "mock-device (Mock)");
        assert!(device.to_mock().is_ok());
        assert!(!device.is_running());
    }
}
