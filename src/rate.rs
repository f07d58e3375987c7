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

//! Mapping from MIDI notes to playback speed.
//!
//! Speeds follow the equal-tempered pitch ratio around middle C: every 12
//! semitones doubles (or halves) the playback rate. Raw speeds are never
//! clamped here; clamping happens when a speed is applied to playback.

pub mod ramp;
pub mod ticker;

use midly::num::u7;

/// The note that plays back at normal speed.
pub const REFERENCE_NOTE: u8 = 60;

/// The slowest speed that may be applied to playback.
pub const MIN_SPEED: f32 = 0.25;

/// The fastest speed that may be applied to playback.
pub const MAX_SPEED: f32 = 4.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Returns the raw speed multiplier for the given note: 2^((note - 60) / 12).
pub fn speed_for(note: u7) -> f32 {
    let semitones = i32::from(note.as_int()) - i32::from(REFERENCE_NOTE);
    2f32.powf(semitones as f32 / 12.0)
}

/// Clamps a speed to the range that may be applied to playback.
pub fn clamp_speed(speed: f32) -> f32 {
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Returns the scientific pitch name of the note, e.g. C4 for note 60.
pub fn note_name(note: u7) -> String {
    let note = note.as_int();
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// Formats a speed and note the way the transport display shows them.
pub fn format_speed(speed: f32, note: u7) -> String {
    format!("Speed: {:.2}x ({})", speed, note_name(note))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::note;

    #[test]
    fn test_reference_points() {
        assert_eq!(speed_for(note(60)), 1.0);
        assert_eq!(speed_for(note(72)), 2.0);
        assert_eq!(speed_for(note(48)), 0.5);
        assert_eq!(speed_for(note(84)), 4.0);
        assert_eq!(speed_for(note(36)), 0.25);
    }

    #[test]
    fn test_matches_pitch_ratio_for_every_note() {
        for n in 0..=127u8 {
            let expected = 2f64.powf((f64::from(n) - 60.0) / 12.0);
            let actual = f64::from(speed_for(note(n)));
            assert!(
                ((actual - expected) / expected).abs() < 1e-6,
                "note {}: expected {}, got {}",
                n,
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_raw_speed_is_not_clamped() {
        assert!(speed_for(note(0)) < MIN_SPEED);
        assert!((speed_for(note(0)) - 0.015625).abs() < 1e-6);
        assert!(speed_for(note(127)) > MAX_SPEED);
    }

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(speed_for(note(0))), MIN_SPEED);
        assert_eq!(clamp_speed(speed_for(note(127))), MAX_SPEED);
        assert_eq!(clamp_speed(1.5), 1.5);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(note(60)), "C4");
        assert_eq!(note_name(note(61)), "C#4");
        assert_eq!(note_name(note(69)), "A4");
        assert_eq!(note_name(note(0)), "C-1");
        assert_eq!(note_name(note(127)), "G9");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1.0, note(60)), "Speed: 1.00x (C4)");
        assert_eq!(format_speed(0.25, note(0)), "Speed: 0.25x (C-1)");
    }
}
