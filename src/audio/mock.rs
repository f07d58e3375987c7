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

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::Mixer;
use crate::config;

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_CHANNELS: u16 = 2;

/// A mock device. Holds on to the mixer but only renders when asked to.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    mixer: Arc<Mutex<Option<Arc<Mixer>>>>,
}

impl Device {
    /// Gets the given mock device. Devices with "fail" in their name refuse to start.
    pub fn get(config: &config::Audio) -> Device {
        Device {
            name: config.device().to_string(),
            sample_rate: config.sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE),
            mixer: Arc::new(Mutex::new(None)),
        }
    }

    /// Pulls `frames` frames from the mixer as the output callback would. Returns
    /// silence when the device is not running.
    #[cfg(test)]
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * usize::from(DEFAULT_CHANNELS)];
        if let Some(mixer) = self.mixer.lock().as_ref() {
            mixer.render(&mut out);
        }
        out
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        DEFAULT_CHANNELS
    }

    fn start(&self, mixer: Arc<Mixer>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (mock)");
        let _enter = span.enter();

        if self.name.contains("fail") {
            return Err(format!("mock device {} failed to open", self.name).into());
        }

        let mut current = self.mixer.lock();
        if current.is_some() {
            return Ok(());
        }
        info!(device = self.name, "Output started.");
        *current = Some(mixer);
        Ok(())
    }

    fn stop(&self) {
        if self.mixer.lock().take().is_some() {
            info!(device = self.name, "Output stopped.");
        }
    }

    fn is_running(&self) -> bool {
        self.mixer.lock().is_some()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
