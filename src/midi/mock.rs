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
use tokio::sync::mpsc::WeakSender;
use tracing::info;

use crate::controller::Command;

/// A mock device. Events are injected by tests instead of arriving from a port.
#[derive(Clone)]
pub struct Device {
    name: String,
    engine: Arc<Mutex<Option<WeakSender<Command>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            engine: Arc::new(Mutex::new(None)),
        }
    }

    /// Delivers the raw event as if it arrived on the port. Returns true if a note
    /// reached the engine.
    #[cfg(test)]
    pub fn mock_event(&self, event: &[u8]) -> bool {
        match self.engine.lock().as_ref() {
            Some(engine) => super::dispatch(engine, event),
            None => false,
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, engine: WeakSender<Command>) -> Result<(), Box<dyn Error>> {
        if self.name.contains("fail") {
            return Err(format!("mock device {} failed to open", self.name).into());
        }

        let mut current = self.engine.lock();
        if current.is_some() {
            return Err("Already watching events.".into());
        }
        info!(device = self.name, "Watching MIDI events.");
        *current = Some(engine);
        Ok(())
    }

    fn stop_watch_events(&self) {
        self.engine.lock().take();
    }

    fn is_watching(&self) -> bool {
        self.engine.lock().is_some()
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
