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
use std::{io, path::PathBuf, sync::Arc, thread, time::Duration};

use midly::num::u7;
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, Receiver, Sender, WeakSender},
    },
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    audio::VoiceEnded,
    playback::{
        loader, EngineStartError, LoadError, LoadedSample, Notification, PlaybackEngine,
        SamplePreview, VoiceId,
    },
    record::{self, ExportError, ExportSummary},
};

pub mod keyboard;

/// How many commands may queue up before senders wait.
const COMMAND_CAPACITY: usize = 256;

/// Everything the control loop acts on. Device callbacks, timers, background work and
/// drivers all talk to the engine through these.
#[derive(Debug)]
pub enum Command {
    /// A MIDI note-on retargets the output speed.
    NoteOn(u7),

    /// Starts the voice from its head.
    Play(VoiceId),

    /// Stops the voice and rewinds it.
    Stop(VoiceId),

    SetLooping(VoiceId, bool),

    SetReversed(VoiceId, bool),

    SetVolume(VoiceId, f32),

    /// Loads a file into the voice off the control loop.
    Load {
        voice: VoiceId,
        path: PathBuf,
        autoplay: bool,
    },

    /// A load finished.
    Loaded {
        voice: VoiceId,
        autoplay: bool,
        result: Result<(LoadedSample, SamplePreview), LoadError>,
    },

    /// Enables or disables speed ramps.
    SetRamp(bool),

    SetRampDuration(Duration),

    /// Posted by the ramp ticker of the given ramp generation.
    RampTick(u64),

    /// A voice played through to the end of its sample.
    PlaybackEnded(VoiceEnded),

    StartRecording,

    StopRecording,

    /// Converts a capture to 16 bit PCM off the control loop.
    Export {
        source: PathBuf,
        destination: PathBuf,
    },

    /// An export finished.
    ExportFinished(Result<ExportSummary, ExportError>),

    /// Stops the engine and ends the control loop.
    Shutdown,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>>;
}

/// Runs the engine on a single control loop.
pub struct Controller {
    commands_tx: Sender<Command>,
    notifications: broadcast::Sender<Notification>,
    handle: JoinHandle<()>,
}

impl Controller {
    /// Starts the engine and hands it to a new control loop, fed by the given driver.
    /// Must be called from within a tokio runtime.
    pub fn new(
        mut engine: PlaybackEngine,
        driver: Option<Arc<dyn Driver>>,
    ) -> Result<Controller, EngineStartError> {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        engine.start(commands_tx.clone())?;

        Controller::forward_ended(engine.ended_events(), commands_tx.downgrade());
        let driver_handle = driver.map(|driver| driver.monitor_events(commands_tx.clone()));
        let notifications = engine.notifier();

        let weak_tx = commands_tx.downgrade();
        let handle = tokio::spawn(
            Controller::run(engine, commands_rx, weak_tx, driver_handle)
                .instrument(span!(Level::INFO, "controller")),
        );

        Ok(Controller {
            commands_tx,
            notifications,
            handle,
        })
    }

    /// A sender for posting commands to the control loop.
    pub fn sender(&self) -> Sender<Command> {
        self.commands_tx.clone()
    }

    /// Subscribes to engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Asks the control loop to stop the engine and exit.
    pub async fn shutdown(&self) {
        if self.commands_tx.send(Command::Shutdown).await.is_err() {
            debug!("Control loop already closed.");
        }
    }

    /// Join will block until the control loop finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Hands end-of-playback events from the mixer to the control loop. Exits when the
    /// mixer goes away or the control loop closes.
    fn forward_ended(
        ended_rx: crossbeam_channel::Receiver<VoiceEnded>,
        commands_tx: WeakSender<Command>,
    ) {
        thread::spawn(move || {
            for ended in ended_rx {
                let Some(commands_tx) = commands_tx.upgrade() else {
                    return;
                };
                if commands_tx
                    .blocking_send(Command::PlaybackEnded(ended))
                    .is_err()
                {
                    return;
                }
            }
        });
    }

    async fn run(
        mut engine: PlaybackEngine,
        mut commands_rx: Receiver<Command>,
        commands_tx: WeakSender<Command>,
        driver_handle: Option<JoinHandle<Result<(), io::Error>>>,
    ) {
        info!(
            sample_rate = engine.sample_rate(),
            voices = engine.voices().len(),
            ramp = engine.ramp_enabled(),
            "Controller started."
        );

        while let Some(command) = commands_rx.recv().await {
            if !Controller::handle(&mut engine, command, &commands_tx) {
                break;
            }
        }

        engine.stop();
        if let Some(driver_handle) = driver_handle {
            if driver_handle.is_finished() {
                match driver_handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(err = %e, "Driver failed."),
                    Err(e) => error!(err = %e, "Error waiting for driver to stop."),
                }
            }
        }
        info!("Controller closing.");
    }

    /// Applies a single command. Returns false once the loop should exit.
    fn handle(
        engine: &mut PlaybackEngine,
        command: Command,
        commands_tx: &WeakSender<Command>,
    ) -> bool {
        if !matches!(command, Command::RampTick(_)) {
            debug!(command = ?command, "Received command.");
        }

        match command {
            Command::NoteOn(note) => engine.handle_note_on(note),
            Command::Play(voice) => {
                if !engine.play(voice) {
                    info!(voice = %voice, "Nothing to play.");
                }
            }
            Command::Stop(voice) => engine.stop_voice(voice),
            Command::SetLooping(voice, looping) => engine.set_looping(voice, looping),
            Command::SetReversed(voice, reversed) => engine.set_reversed(voice, reversed),
            Command::SetVolume(voice, volume) => engine.set_volume(voice, volume),
            Command::Load {
                voice,
                path,
                autoplay,
            } => {
                if engine.begin_load(voice, &path) {
                    let sample_rate = engine.sample_rate();
                    Controller::in_background(commands_tx, move || {
                        let result = loader::load_sample(&path, sample_rate).map(|sample| {
                            let preview = sample.preview();
                            (sample, preview)
                        });
                        Command::Loaded {
                            voice,
                            autoplay,
                            result,
                        }
                    });
                }
            }
            Command::Loaded {
                voice,
                autoplay,
                result,
            } => engine.finish_load(voice, autoplay, result),
            Command::SetRamp(enabled) => engine.set_ramp_enabled(enabled),
            Command::SetRampDuration(duration) => engine.set_ramp_duration(duration),
            Command::RampTick(generation) => engine.handle_ramp_tick(generation),
            Command::PlaybackEnded(ended) => engine.handle_playback_ended(ended),
            Command::StartRecording => {
                if let Err(e) = engine.start_recording() {
                    error!(err = %e, "Unable to start recording.");
                    engine.notify(Notification::RecordFailed(e.to_string()));
                }
            }
            Command::StopRecording => match engine.stop_recording() {
                Ok(Some(_)) => {}
                Ok(None) => engine.notify(Notification::RecordingStopped(None)),
                Err(e) => {
                    error!(err = %e, "Unable to stop recording.");
                    engine.notify(Notification::RecordFailed(e.to_string()));
                }
            },
            Command::Export {
                source,
                destination,
            } => Controller::in_background(commands_tx, move || {
                Command::ExportFinished(record::export_to_pcm16(&source, &destination))
            }),
            Command::ExportFinished(Ok(summary)) => engine.notify(Notification::Exported(summary)),
            Command::ExportFinished(Err(e)) => {
                error!(err = %e, "Export failed.");
                engine.notify(Notification::ExportFailed(e.to_string()));
            }
            Command::Shutdown => {
                info!("Shutting down.");
                return false;
            }
        }
        true
    }

    /// Runs the work on the blocking pool and posts its completion back to the loop.
    fn in_background<F>(commands_tx: &WeakSender<Command>, work: F)
    where
        F: FnOnce() -> Command + Send + 'static,
    {
        let Some(commands_tx) = commands_tx.upgrade() else {
            return;
        };
        tokio::task::spawn_blocking(move || {
            if commands_tx.blocking_send(work()).is_err() {
                debug!("Control loop closed before background work finished.");
            }
        });
    }
}
