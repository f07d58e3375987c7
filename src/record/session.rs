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
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use super::error::RecordError;
use crate::{audio::Mixer, util};

/// Global atomic counter for keeping capture names unique within a process.
static CAPTURE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a fresh capture path in the given directory.
fn capture_path(directory: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let counter = CAPTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
    directory.join(format!("speeder-capture-{}-{}.wav", millis, counter))
}

/// An active capture of the mixer output. The mixer hands each rendered block to a
/// writer thread, which appends it to a 32 bit float wav file at the output rate.
pub struct RecordSession {
    path: PathBuf,
    started: Instant,
    writer: thread::JoinHandle<Result<u64, hound::Error>>,
}

impl RecordSession {
    /// Creates the capture file in `directory` and attaches the capture tap.
    pub fn start(mixer: &Mixer, directory: &Path) -> Result<RecordSession, RecordError> {
        let path = capture_path(directory);
        let spec = WavSpec {
            channels: mixer.channels(),
            sample_rate: mixer.sample_rate(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).map_err(|source| RecordError::Create {
            path: path.clone(),
            source,
        })?;

        let (tap_tx, tap_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        if !mixer.attach_tap(tap_tx) {
            drop(writer);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = ?path, err = %e, "Unable to remove unused capture file");
            }
            return Err(RecordError::TapBusy);
        }

        let writer = thread::spawn(move || {
            let mut samples: u64 = 0;
            // Runs until the tap is detached and the channel drains.
            for block in tap_rx {
                for sample in &block {
                    writer.write_sample(*sample)?;
                }
                samples += block.len() as u64;
            }
            writer.finalize()?;
            Ok(samples)
        });

        info!(
            path = ?path,
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            "Recording started."
        );
        Ok(RecordSession {
            path,
            started: Instant::now(),
            writer,
        })
    }

    /// The file being captured to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detaches the tap, waits for the writer to drain and finalizes the file.
    pub fn finish(self, mixer: &Mixer) -> Result<PathBuf, RecordError> {
        mixer.detach_tap();

        let samples = match self.writer.join() {
            Ok(result) => result?,
            Err(_) => return Err(RecordError::WriterPanicked),
        };

        let channels = u64::from(mixer.channels().max(1));
        debug!(samples, "Capture writer finished.");
        info!(
            path = ?self.path,
            frames = samples / channels,
            elapsed = util::format_duration(self.started.elapsed()),
            "Recording stopped."
        );
        Ok(self.path)
    }
}
