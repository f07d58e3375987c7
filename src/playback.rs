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

//! Voices, sample loading and the engine that ties them to the output rate.

mod engine;
mod error;
pub mod loader;
mod notification;
pub mod voice;

pub use self::engine::PlaybackEngine;
pub use self::error::{EngineStartError, LoadError};
pub use self::loader::{LoadedSample, SamplePreview};
pub use self::notification::{Notification, RateKind};
pub use self::voice::{Voice, VoiceId};
