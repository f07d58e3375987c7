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

/// Failure to capture the mixed output.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unable to record: the engine is not started")]
    NotStarted,

    #[error("unable to create capture {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("unable to write capture: {0}")]
    Write(#[from] hound::Error),

    #[error("unable to record: a capture tap is already attached")]
    TapBusy,

    #[error("capture writer exited unexpectedly")]
    WriterPanicked,
}

/// Failure to convert a capture to 16 bit PCM.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("unable to convert {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}
