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
use std::{fmt, path::PathBuf};

use midly::num::u7;

use super::{loader::SamplePreview, voice::VoiceId};
use crate::{rate::format_speed, record::ExportSummary, util};

/// Which path a rate announcement came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateKind {
    /// The clamped speed a note-on is heading to.
    Target,
    /// The speed currently applied by an in-flight ramp.
    Live,
}

/// State changes published by the engine.
#[derive(Clone, Debug)]
pub enum Notification {
    RateChanged { speed: f32, note: u7, kind: RateKind },
    Loading(VoiceId),
    Loaded { voice: VoiceId, preview: SamplePreview },
    LoadFailed { voice: VoiceId, message: String },
    PlaybackEnded(VoiceId),
    RecordingStarted(PathBuf),
    RecordingStopped(Option<PathBuf>),
    RecordFailed(String),
    Exported(ExportSummary),
    ExportFailed(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::RateChanged { speed, note, kind } => match kind {
                RateKind::Target => write!(f, "{}", format_speed(*speed, *note)),
                RateKind::Live => write!(f, "{} (ramping)", format_speed(*speed, *note)),
            },
            Notification::Loading(voice) => write!(f, "Voice {}: loading...", voice),
            Notification::Loaded { voice, preview } => write!(
                f,
                "Voice {}: loaded {} ({}, {} ch, {}Hz)",
                voice,
                preview.name,
                util::format_duration(preview.duration),
                preview.channels,
                preview.sample_rate
            ),
            Notification::LoadFailed { voice, message } => {
                write!(f, "Voice {}: load failed: {}", voice, message)
            }
            Notification::PlaybackEnded(voice) => write!(f, "Voice {}: finished", voice),
            Notification::RecordingStarted(path) => {
                write!(f, "Recording to {}", path.display())
            }
            Notification::RecordingStopped(Some(path)) => {
                write!(f, "Recording saved to {}", path.display())
            }
            Notification::RecordingStopped(None) => write!(f, "Not recording"),
            Notification::RecordFailed(message) => write!(f, "Recording failed: {}", message),
            Notification::Exported(summary) => write!(
                f,
                "Exported {} frames to {}",
                summary.frames,
                summary.destination.display()
            ),
            Notification::ExportFailed(message) => write!(f, "Export failed: {}", message),
        }
    }
}
