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

//! Loading audio files into memory for voice playback.
//!
//! Files are decoded in full and resampled to the output rate so that a speed
//! of 1.0 plays back at the original pitch.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::info;

use super::error::LoadError;
use crate::{audio::decode::decode_file, util};

/// Number of buckets in a waveform preview.
pub const PREVIEW_BUCKETS: usize = 64;

/// Input block size for the sinc resampler.
const RESAMPLE_BLOCK_SIZE: usize = 1024;

const AUDIO_EXTENSIONS: [&str; 7] = ["wav", "aif", "aiff", "mp3", "m4a", "caf", "flac"];

/// Returns true if the path has the extension of an audio file we can load.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// An audio file held in memory. The sample data is shared, so cloning is cheap.
#[derive(Clone)]
pub struct LoadedSample {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
    path: PathBuf,
}

impl LoadedSample {
    /// Creates a sample from interleaved data.
    pub fn new(data: Vec<f32>, channels: u16, sample_rate: u32, path: PathBuf) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channels: channels.max(1),
            sample_rate,
            path,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name of the sample.
    pub fn name(&self) -> String {
        util::display_name(&self.path)
    }

    /// The number of frames in the sample.
    pub fn frames(&self) -> usize {
        self.data.len() / usize::from(self.channels)
    }

    /// The duration of the sample at its sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Returns the sample at the given frame. Channels beyond the sample's own
    /// channel count wrap around, so a mono sample feeds every output channel.
    pub fn sample_at(&self, frame: usize, channel: usize) -> f32 {
        let channels = usize::from(self.channels);
        self.data
            .get(frame * channels + channel % channels)
            .copied()
            .unwrap_or(0.0)
    }

    /// Linearly interpolates the sample at a fractional frame position.
    pub fn interpolate(&self, position: f64, channel: usize) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let frame = position.floor() as usize;
        let frac = (position - position.floor()) as f32;
        let s0 = self.sample_at(frame, channel);
        if frac == 0.0 || frame + 1 >= self.frames() {
            return s0;
        }
        let s1 = self.sample_at(frame + 1, channel);
        s0 + (s1 - s0) * frac
    }

    /// Summarizes the sample as the peak absolute amplitude of each of `buckets`
    /// equal slices across all channels.
    pub fn peaks(&self, buckets: usize) -> Vec<f32> {
        let frames = self.frames();
        if buckets == 0 || frames == 0 {
            return Vec::new();
        }

        let channels = usize::from(self.channels);
        (0..buckets)
            .map(|bucket| {
                let start = bucket * frames / buckets;
                let end = ((bucket + 1) * frames / buckets).max(start + 1).min(frames);
                self.data[start * channels..end * channels]
                    .iter()
                    .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
            })
            .collect()
    }

    /// Builds the preview handed to listeners when a load completes.
    pub fn preview(&self) -> SamplePreview {
        SamplePreview {
            name: self.name(),
            path: self.path.clone(),
            duration: self.duration(),
            channels: self.channels,
            sample_rate: self.sample_rate,
            peaks: self.peaks(PREVIEW_BUCKETS),
        }
    }
}

impl fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedSample")
            .field("path", &self.path)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// A summary of a loaded sample for display.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePreview {
    pub name: String,
    pub path: PathBuf,
    pub duration: Duration,
    pub channels: u16,
    pub sample_rate: u32,
    pub peaks: Vec<f32>,
}

/// Decodes the file at `path` and resamples it to `target_rate`.
pub fn load_sample(path: &Path, target_rate: u32) -> Result<LoadedSample, LoadError> {
    if !is_audio_file(path) {
        return Err(LoadError::UnsupportedFile {
            path: path.to_path_buf(),
        });
    }

    let decoded = decode_file(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    if decoded.frames() == 0 {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    let (samples, sample_rate) = if target_rate > 0 && decoded.sample_rate != target_rate {
        info!(
            path = ?path,
            source_rate = decoded.sample_rate,
            target_rate,
            "Resampling sample"
        );
        let samples = resample(
            &decoded.samples,
            decoded.channels,
            decoded.sample_rate,
            target_rate,
        )
        .map_err(|message| LoadError::Resample {
            path: path.to_path_buf(),
            source_rate: decoded.sample_rate,
            target_rate,
            message,
        })?;
        (samples, target_rate)
    } else {
        (decoded.samples, decoded.sample_rate)
    };

    let loaded = LoadedSample::new(samples, decoded.channels, sample_rate, path.to_path_buf());
    info!(
        path = ?path,
        channels = loaded.channels(),
        sample_rate = loaded.sample_rate(),
        duration = util::format_duration(loaded.duration()),
        "Sample loaded"
    );
    Ok(loaded)
}

/// Converts interleaved samples between sample rates with a band-limited sinc
/// resampler. The output is trimmed to the resampler's delay so that it lines up with
/// the input, and holds exactly as many frames as the input's duration at the target
/// rate.
fn resample(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, String> {
    let channels = usize::from(channel_count.max(1));
    let source_frames = samples.len() / channels;
    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| {
            samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .copied()
                .collect()
        })
        .collect();

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, RESAMPLE_BLOCK_SIZE, channels)
            .map_err(|e| e.to_string())?;

    let delay = resampler.output_delay();
    let wanted = delay + target_frames;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channels];
    let mut position = 0;

    while output[0].len() < wanted {
        let needed = resampler.input_frames_next();
        let start = position.min(source_frames);
        let end = (position + needed).min(source_frames);
        position += needed;

        let block = if end - start == needed {
            let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[start..end]).collect();
            resampler.process(chunk.as_slice(), None)
        } else if end > start {
            let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[start..end]).collect();
            resampler.process_partial(Some(chunk.as_slice()), None)
        } else {
            // Flush the delay line.
            resampler.process_partial(None::<&[Vec<f32>]>, None)
        }
        .map_err(|e| e.to_string())?;

        let produced = block.first().map(|ch| ch.len()).unwrap_or(0);
        for (out, ch) in output.iter_mut().zip(block) {
            out.extend_from_slice(&ch);
        }
        if produced == 0 {
            break;
        }
    }

    let mut interleaved = Vec::with_capacity(target_frames * channels);
    for frame in delay..wanted {
        for ch in &output {
            interleaved.push(ch.get(frame).copied().unwrap_or(0.0));
        }
    }
    Ok(interleaved)
}
