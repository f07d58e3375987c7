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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{
    audio::{Device as AudioDevice, Mixer},
    config,
};

/// A small wrapper around a cpal::Device along with the stream format we open it with.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The number of output channels.
    channels: u16,
    /// The output sample rate.
    sample_rate: u32,
    /// The output sample format.
    sample_format: cpal::SampleFormat,
    /// The running output thread, if any.
    output: Mutex<Option<OutputThread>>,
}

/// The thread that owns the cpal stream. Streams are not Send on every host, so the
/// stream is built, played and dropped on this thread.
struct OutputThread {
    stop_tx: crossbeam_channel::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, {}Hz) ({})",
            self.name,
            self.channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

/// Builds an output stream that renders the mixer directly into the cpal buffer.
fn build_f32_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.render(data),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

/// Builds an output stream that renders the mixer into a scratch buffer and converts
/// to the device's sample type.
fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.render(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices at their default output configuration.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device, skipping devices without a usable output configuration.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let name = device.name().ok()?;
        let default_config = device.default_output_config().ok()?;
        Some(Device {
            name,
            host_id,
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate().0,
            sample_format: default_config.sample_format(),
            device,
            output: Mutex::new(None),
        })
    }

    /// Gets the cpal device described by the configuration. The name "default" selects
    /// the default output of the default host; any other name must match exactly one
    /// device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == config::DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device available")?;
            Device::from_cpal(host.id(), device)
                .ok_or("default output device has no usable output configuration")?
        } else {
            let mut matches: Vec<Device> = Device::list_cpal_devices()?
                .into_iter()
                .filter(|device| device.name.contains(name))
                .collect();

            if matches.is_empty() {
                return Err(format!("no device found with name {}", name).into());
            }
            if matches.len() > 1 {
                return Err(format!(
                    "found too many devices that match ({}), use a less ambiguous device name",
                    matches
                        .iter()
                        .map(|device| device.name.as_str())
                        .collect::<Vec<&str>>()
                        .join(", ")
                )
                .into());
            }
            matches.remove(0)
        };

        if let Some(sample_rate) = config.sample_rate() {
            device.sample_rate = sample_rate;
        }
        if let (Some(format), Some(bits)) = (config.sample_format()?, config.bits_per_sample()?) {
            device.sample_format = format.to_cpal(bits)?;
        }

        Ok(device)
    }
}

impl AudioDevice for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&self, mixer: Arc<Mixer>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (cpal)");
        let _enter = span.enter();

        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }

        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let device = self.device.clone();
        let sample_format = self.sample_format;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::spawn(move || {
            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_f32_stream(&device, &config, mixer),
                cpal::SampleFormat::F64 => build_converting_stream::<f64>(&device, &config, mixer),
                cpal::SampleFormat::I16 => build_converting_stream::<i16>(&device, &config, mixer),
                cpal::SampleFormat::I32 => build_converting_stream::<i32>(&device, &config, mixer),
                cpal::SampleFormat::U16 => build_converting_stream::<u16>(&device, &config, mixer),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {}", other)));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start stream: {}", e)));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until stopped.
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    device = self.name,
                    channels = self.channels,
                    sample_rate = self.sample_rate,
                    format = %self.sample_format,
                    "Output started."
                );
                *output = Some(OutputThread { stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err("output thread exited before the stream started".into())
            }
        }
    }

    fn stop(&self) {
        let Some(output) = self.output.lock().take() else {
            return;
        };
        let _ = output.stop_tx.send(());
        if output.handle.join().is_err() {
            error!(device = self.name, "Output thread panicked.");
        }
        info!(device = self.name, "Output stopped.");
    }

    fn is_running(&self) -> bool {
        self.output.lock().is_some()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop();
    }
}
