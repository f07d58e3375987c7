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
mod audio;
mod engine;
mod error;
mod midi;
mod player;
mod recording;

pub use self::audio::Audio;
pub use self::audio::DEFAULT_DEVICE;
pub use self::engine::parse_duration;
pub use self::engine::Engine;
pub use self::engine::Ramp;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::player::Player;
pub use self::recording::Recording;
