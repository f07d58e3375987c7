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

//! Whole-file conversion of captures to 16 bit signed PCM.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use super::error::ExportError;
use crate::audio::decode::decode_file;

/// What an export wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub destination: PathBuf,
    pub frames: usize,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Converts a sample in [-1.0, 1.0] to 16 bit PCM, saturating out of range input.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Reads `source` into memory and writes it to `destination` as interleaved 16 bit
/// little endian PCM at the source's sample rate and channel count.
pub fn export_to_pcm16(source: &Path, destination: &Path) -> Result<ExportSummary, ExportError> {
    let decoded = decode_file(source).map_err(|e| ExportError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    if decoded.channels == 0 || decoded.sample_rate == 0 {
        return Err(ExportError::Format {
            path: source.to_path_buf(),
            message: format!(
                "{} channels at {}Hz",
                decoded.channels, decoded.sample_rate
            ),
        });
    }

    let write_error = |e: hound::Error| ExportError::Write {
        path: destination.to_path_buf(),
        source: e,
    };
    let spec = WavSpec {
        channels: decoded.channels,
        sample_rate: decoded.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(destination, spec).map_err(write_error)?;
    for sample in &decoded.samples {
        writer.write_sample(to_pcm16(*sample)).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;

    let summary = ExportSummary {
        destination: destination.to_path_buf(),
        frames: decoded.frames(),
        channels: decoded.channels,
        sample_rate: decoded.sample_rate,
    };
    info!(
        source = ?source,
        destination = ?destination,
        frames = summary.frames,
        channels = summary.channels,
        sample_rate = summary.sample_rate,
        "Exported 16 bit PCM."
    );
    Ok(summary)
}
