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
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::decode::DecodeError;

/// Failure to load an audio file into a voice.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to load {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("{} is not a supported audio file", path.display())]
    UnsupportedFile { path: PathBuf },

    #[error("{} contains no audio", path.display())]
    Empty { path: PathBuf },

    #[error("unable to resample {} from {source_rate}Hz to {target_rate}Hz: {message}", path.display())]
    Resample {
        path: PathBuf,
        source_rate: u32,
        target_rate: u32,
        message: String,
    },
}

/// Failure to acquire the audio output or the MIDI input.
#[derive(Debug, Error)]
pub enum EngineStartError {
    #[error("unable to start audio output: {0}")]
    Audio(String),

    #[error("unable to open MIDI input: {0}")]
    Midi(String),
}
