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

use midly::{live::LiveEvent, num::u7, MidiMessage};
use tokio::sync::mpsc::WeakSender;
use tracing::{debug, warn};

use crate::{config, controller::Command};

mod midir;
pub mod mock;

/// A MIDI input that forwards note-ons to the engine.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input and forwards note-ons to the engine. The device only holds
    /// a weak handle, so events arriving after the engine is gone are dropped.
    fn watch_events(&self, engine: WeakSender<Command>) -> Result<(), Box<dyn Error>>;

    /// Stops watching events.
    fn stop_watch_events(&self);

    /// Returns true while events are being watched.
    fn is_watching(&self) -> bool;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Returns the note of a note-on event. Note-offs, note-ons with zero velocity
/// and everything else yield None.
pub fn note_on(raw_event: &[u8]) -> Option<u7> {
    match LiveEvent::parse(raw_event).ok()? {
        LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } if vel.as_int() > 0 => Some(key),
        _ => None,
    }
}

/// Forwards a raw MIDI event to the engine if it is a note-on. Returns true if a
/// note was delivered.
pub fn dispatch(engine: &WeakSender<Command>, raw_event: &[u8]) -> bool {
    let Some(note) = note_on(raw_event) else {
        return false;
    };

    let Some(engine) = engine.upgrade() else {
        debug!(note = note.as_int(), "Engine is gone, dropping note.");
        return false;
    };

    match engine.try_send(Command::NoteOn(note)) {
        Ok(()) => true,
        Err(e) => {
            warn!(note = note.as_int(), err = %e, "Unable to deliver note to engine.");
            false
        }
    }
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets the input described by the configuration. Without a configured name, the
/// first available input is used.
pub fn get_device(config: &config::Midi) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if let Some(name) = config.device() {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Device::get(name)));
        }
    }

    Ok(Arc::new(midir::get(config.device())?))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::testutil::note;

    #[test]
    fn test_note_on() {
        assert_eq!(note_on(&[0x90, 60, 100]), Some(note(60)));
        assert_eq!(note_on(&[0x9F, 127, 1]), Some(note(127)));
        // Zero velocity is a note-off.
        assert_eq!(note_on(&[0x90, 60, 0]), None);
        assert_eq!(note_on(&[0x80, 60, 100]), None);
        // Control change.
        assert_eq!(note_on(&[0xB0, 1, 64]), None);
        assert_eq!(note_on(&[]), None);
    }

    #[test]
    fn test_dispatch() {
        let (tx, mut rx) = mpsc::channel::<Command>(4);
        let weak = tx.downgrade();

        assert!(dispatch(&weak, &[0x90, 72, 90]));
        assert!(matches!(rx.try_recv(), Ok(Command::NoteOn(note)) if note.as_int() == 72));

        assert!(!dispatch(&weak, &[0x80, 72, 0]));
        assert!(rx.try_recv().is_err());

        // Once the engine side is gone, events are dropped.
        drop(tx);
        assert!(!dispatch(&weak, &[0x90, 72, 90]));
    }

    #[test]
    fn test_get_mock_device() {
        let device = get_device(&config::Midi::new(Some("mock-keys"))).unwrap();
        assert_eq!(device.name(), "mock-keys");
        assert!(device.to_mock().is_ok());
    }
}
