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
use serde::Deserialize;

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Midi {
    /// The MIDI input port, matched as a substring of the port name. The first
    /// available port is used when omitted.
    device: Option<String>,
}

impl Midi {
    pub fn new(device: Option<&str>) -> Midi {
        Midi {
            device: device.map(str::to_string),
        }
    }

    /// Returns the configured port name, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }
}
