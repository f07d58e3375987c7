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
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use midly::num::u7;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, span, warn, Level, Span};

use super::{
    error::{EngineStartError, LoadError},
    loader::{self, LoadedSample, SamplePreview},
    notification::{Notification, RateKind},
    voice::{Voice, VoiceId},
};
use crate::{
    audio::{self, Mixer, VoiceEnded},
    config,
    controller::Command,
    midi,
    rate::{self, ramp::RateRamp, ticker::RampTicker},
    record::{RecordError, RecordSession},
};

/// Capacity of the notification channel. Slow subscribers lag rather than block.
const NOTIFICATION_CAPACITY: usize = 64;

/// The playback engine. Owns the voices, the shared rate node and the ramp, and is
/// driven from a single control loop.
pub struct PlaybackEngine {
    /// The device to play audio through.
    audio: Arc<dyn audio::Device>,
    /// The MIDI device note-ons arrive from.
    midi: Option<Arc<dyn midi::Device>>,
    /// Renders the voices at the shared rate.
    mixer: Arc<Mixer>,
    /// One voice per configured slot, in VoiceId order.
    voices: Vec<Voice>,
    /// End-of-playback events from the mixer.
    ended_rx: crossbeam_channel::Receiver<VoiceEnded>,
    /// The most recent note-on.
    current_note: u7,
    ramp: RateRamp,
    ramp_enabled: bool,
    ramp_duration: Duration,
    /// Posts ramp ticks for the in-flight ramp.
    ticker: Option<RampTicker>,
    /// Incremented for every ramp so stale ticks can be told apart.
    ramp_generation: u64,
    /// The control loop, present while started.
    control_tx: Option<mpsc::Sender<Command>>,
    recording: Option<RecordSession>,
    recording_dir: PathBuf,
    notifications: broadcast::Sender<Notification>,
    started: bool,
    /// The logging span.
    span: Span,
}

impl PlaybackEngine {
    /// Creates a new engine. Nothing is acquired until the engine is started.
    pub fn new(
        config: &config::Player,
        audio: Arc<dyn audio::Device>,
        midi: Option<Arc<dyn midi::Device>>,
    ) -> Result<PlaybackEngine, config::ConfigError> {
        let engine_config = config.engine();
        let ramp_config = engine_config.ramp();

        let voices: Vec<Voice> = VoiceId::ALL
            .iter()
            .take(engine_config.voices())
            .map(|id| Voice::new(*id, engine_config.looping(), engine_config.volume()))
            .collect();

        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        let mixer = Arc::new(Mixer::new(
            audio.channels(),
            audio.sample_rate(),
            voices.clone(),
            ended_tx,
        ));
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Ok(PlaybackEngine {
            audio,
            midi,
            mixer,
            voices,
            ended_rx,
            current_note: u7::from(rate::REFERENCE_NOTE),
            ramp: RateRamp::new(),
            ramp_enabled: ramp_config.enabled(),
            ramp_duration: ramp_config.duration()?,
            ticker: None,
            ramp_generation: 0,
            control_tx: None,
            recording: None,
            recording_dir: config.recording().directory(),
            notifications,
            started: false,
            span: span!(Level::INFO, "playback engine"),
        })
    }

    /// Acquires the audio output and the MIDI input. MIDI note-ons and ramp ticks are
    /// posted to `control_tx`. Starting a started engine does nothing.
    pub fn start(&mut self, control_tx: mpsc::Sender<Command>) -> Result<(), EngineStartError> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.started {
            debug!("Engine already started.");
            return Ok(());
        }

        self.audio
            .start(self.mixer.clone())
            .map_err(|e| EngineStartError::Audio(e.to_string()))?;

        if let Some(midi) = &self.midi {
            if let Err(e) = midi.watch_events(control_tx.downgrade()) {
                self.audio.stop();
                return Err(EngineStartError::Midi(e.to_string()));
            }
        }

        // A ramp begun before starting has no ticker yet.
        if self.ramp.in_flight() && self.ticker.is_none() {
            self.ramp_generation += 1;
            self.ticker = RampTicker::spawn(self.ramp_generation, control_tx.clone());
            debug!(generation = self.ramp_generation, "Resuming ramp.");
        }

        self.control_tx = Some(control_tx);
        self.started = true;
        info!(
            audio = %self.audio,
            midi = self.midi.as_ref().map(|midi| midi.name()),
            voices = self.voices.len(),
            "Engine started."
        );
        Ok(())
    }

    /// Releases the audio output and the MIDI input. Any ramp is dropped and any
    /// recording is finalized. Stopping a stopped engine does nothing.
    pub fn stop(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        if !self.started {
            return;
        }

        self.ramp.cancel();
        self.ticker = None;

        if self.recording.is_some() {
            match self.stop_recording() {
                Ok(_) => {}
                Err(e) => {
                    error!(err = %e, "Unable to finalize recording.");
                    self.notify(Notification::RecordFailed(e.to_string()));
                }
            }
        }

        if let Some(midi) = &self.midi {
            midi.stop_watch_events();
        }
        self.audio.stop();
        self.control_tx = None;
        self.started = false;
        info!("Engine stopped.");
    }

    /// Returns true while the engine holds its devices.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Subscribes to engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// The sending half of the notification channel, for subscribing once the engine
    /// has moved into the control loop.
    pub fn notifier(&self) -> broadcast::Sender<Notification> {
        self.notifications.clone()
    }

    /// Publishes a notification to all subscribers.
    pub fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    /// End-of-playback events rendered by the mixer, to be handed back through
    /// `handle_playback_ended`.
    pub fn ended_events(&self) -> crossbeam_channel::Receiver<VoiceEnded> {
        self.ended_rx.clone()
    }

    /// The output sample rate, which loaded files are converted to.
    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// The speed currently applied to the output.
    pub fn applied_speed(&self) -> f32 {
        self.mixer.rate()
    }

    /// The most recent note-on.
    pub fn current_note(&self) -> u7 {
        self.current_note
    }

    /// Returns true while a ramp is in flight.
    pub fn ramp_in_flight(&self) -> bool {
        self.ramp.in_flight()
    }

    pub fn ramp_enabled(&self) -> bool {
        self.ramp_enabled
    }

    pub fn ramp_duration(&self) -> Duration {
        self.ramp_duration
    }

    /// Clamps and applies the speed to the output. Returns the applied speed.
    pub fn set_rate(&self, speed: f32) -> f32 {
        self.mixer.set_rate(speed)
    }

    /// Retargets the output speed for the given note.
    pub fn handle_note_on(&mut self, note: u7) {
        self.handle_note_on_at(note, Instant::now());
    }

    /// Retargets the output speed for the given note as of `now`.
    pub fn handle_note_on_at(&mut self, note: u7, now: Instant) {
        self.current_note = note;
        let raw = rate::speed_for(note);
        let target = rate::clamp_speed(raw);

        if self.ramp_enabled {
            let current = self.applied_speed();
            self.ramp
                .begin(raw, self.ramp_duration.as_secs_f32(), current, now);
            self.ramp_generation += 1;
            let generation = self.ramp_generation;
            // The previous ticker, if any, is aborted when replaced.
            self.ticker = self
                .control_tx
                .clone()
                .and_then(|tx| RampTicker::spawn(generation, tx));
            debug!(
                note = note.as_int(),
                from = current,
                to = target,
                generation,
                "Ramp started."
            );
        } else {
            self.set_rate(raw);
            debug!(note = note.as_int(), speed = target, "Speed applied.");
        }

        self.notify(Notification::RateChanged {
            speed: target,
            note,
            kind: RateKind::Target,
        });
    }

    /// Handles a tick posted by the ramp ticker. Ticks from superseded ramps and ticks
    /// arriving after the engine stopped are ignored.
    pub fn handle_ramp_tick(&mut self, generation: u64) {
        let current = self.ticker.as_ref().map(|ticker| ticker.generation());
        if !self.started || current != Some(generation) {
            debug!(generation, current, "Ignoring stale ramp tick.");
            return;
        }
        self.tick_ramp_at(Instant::now());
    }

    /// Evaluates the in-flight ramp at `now` and applies the result. Returns the
    /// applied speed, or None if no ramp is in flight.
    pub fn tick_ramp_at(&mut self, now: Instant) -> Option<f32> {
        let step = self.ramp.tick(now)?;
        let applied = self.set_rate(step.speed());

        if step.is_finished() {
            self.ticker = None;
            debug!(speed = applied, "Ramp finished.");
        }

        self.notify(Notification::RateChanged {
            speed: applied,
            note: self.current_note,
            kind: RateKind::Live,
        });
        Some(applied)
    }

    /// Enables or disables ramping. Disabling drops the in-flight ramp and leaves the
    /// applied speed where it is.
    pub fn set_ramp_enabled(&mut self, enabled: bool) {
        if !enabled && self.ramp.in_flight() {
            self.ramp.cancel();
            self.ticker = None;
            debug!(speed = self.applied_speed(), "Ramp cancelled.");
        }
        self.ramp_enabled = enabled;
        info!(enabled, "Ramp setting changed.");
    }

    /// Sets the duration of subsequent ramps.
    pub fn set_ramp_duration(&mut self, duration: Duration) {
        self.ramp_duration = duration;
        info!(duration = ?duration, "Ramp duration changed.");
    }

    /// Gets the voice, if the engine has one in that slot.
    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id.index())
    }

    /// All voices of the engine.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Starts the voice from its head. Returns false if the voice doesn't exist or has
    /// nothing loaded.
    pub fn play(&self, id: VoiceId) -> bool {
        match self.voice(id) {
            Some(voice) => voice.play(),
            None => {
                debug!(voice = %id, "No such voice.");
                false
            }
        }
    }

    pub fn stop_voice(&self, id: VoiceId) {
        if let Some(voice) = self.voice(id) {
            voice.stop();
        }
    }

    pub fn set_looping(&self, id: VoiceId, looping: bool) {
        if let Some(voice) = self.voice(id) {
            voice.set_looping(looping);
        }
    }

    pub fn set_reversed(&self, id: VoiceId, reversed: bool) {
        if let Some(voice) = self.voice(id) {
            voice.set_reversed(reversed);
        }
    }

    pub fn set_volume(&self, id: VoiceId, volume: f32) {
        if let Some(voice) = self.voice(id) {
            voice.set_volume(volume);
        }
    }

    /// Announces that a load for the voice is in flight. Returns false if the voice
    /// doesn't exist.
    pub fn begin_load(&self, id: VoiceId, path: &Path) -> bool {
        if self.voice(id).is_none() {
            debug!(voice = %id, path = ?path, "No such voice, ignoring load.");
            return false;
        }
        self.notify(Notification::Loading(id));
        true
    }

    /// Completes a load. A successful load replaces the voice's sample and leaves it
    /// stopped unless `autoplay` is set; a failed load leaves the voice untouched.
    pub fn finish_load(
        &self,
        id: VoiceId,
        autoplay: bool,
        result: Result<(LoadedSample, SamplePreview), LoadError>,
    ) {
        let voice = match self.voice(id) {
            Some(voice) => voice,
            None => return,
        };

        match result {
            Ok((sample, preview)) => {
                info!(voice = %id, sample = ?sample, "Sample loaded.");
                voice.install(sample);
                if autoplay {
                    voice.play();
                }
                self.notify(Notification::Loaded { voice: id, preview });
            }
            Err(e) => self.load_failed(id, &e),
        }
    }

    /// Loads the file into the voice on the calling thread. The voice is left stopped.
    pub fn load_file(&self, id: VoiceId, path: &Path) -> Result<(), LoadError> {
        if !self.begin_load(id, path) {
            return Ok(());
        }
        match loader::load_sample(path, self.sample_rate()) {
            Ok(sample) => {
                let preview = sample.preview();
                self.finish_load(id, false, Ok((sample, preview)));
                Ok(())
            }
            Err(e) => {
                self.load_failed(id, &e);
                Err(e)
            }
        }
    }

    fn load_failed(&self, id: VoiceId, e: &LoadError) {
        warn!(voice = %id, err = %e, "Unable to load sample.");
        self.notify(Notification::LoadFailed {
            voice: id,
            message: e.to_string(),
        });
    }

    /// Raises the end-of-playback notification, unless the event belongs to a sample
    /// the voice has since replaced.
    pub fn handle_playback_ended(&self, ended: VoiceEnded) {
        let voice = match self.voice(ended.voice) {
            Some(voice) => voice,
            None => return,
        };
        if voice.generation() != ended.generation {
            debug!(
                voice = %ended.voice,
                generation = ended.generation,
                "Ignoring end of a replaced sample."
            );
            return;
        }
        info!(voice = %ended.voice, "Playback ended.");
        self.notify(Notification::PlaybackEnded(ended.voice));
    }

    /// Starts capturing the mixed output. While a capture is active this returns the
    /// active capture's path.
    pub fn start_recording(&mut self) -> Result<PathBuf, RecordError> {
        if !self.started {
            return Err(RecordError::NotStarted);
        }
        if let Some(session) = &self.recording {
            debug!(path = ?session.path(), "Already recording.");
            return Ok(session.path().to_path_buf());
        }

        let session = RecordSession::start(&self.mixer, &self.recording_dir)?;
        let path = session.path().to_path_buf();
        self.recording = Some(session);
        self.notify(Notification::RecordingStarted(path.clone()));
        Ok(path)
    }

    /// Stops capturing and finalizes the capture. Returns None if nothing was being
    /// captured.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>, RecordError> {
        let session = match self.recording.take() {
            Some(session) => session,
            None => return Ok(None),
        };
        let path = session.finish(&self.mixer)?;
        self.notify(Notification::RecordingStopped(Some(path.clone())));
        Ok(Some(path))
    }

    /// Returns true while a capture is active.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, time::Duration};

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::{
        audio::mock,
        config::{Audio, Engine, Midi, Player, Ramp, Recording},
        record,
        testutil::{note, sine, write_wav},
    };

    struct Fixture {
        engine: PlaybackEngine,
        audio: Arc<mock::Device>,
        midi: Arc<midi::mock::Device>,
        dir: tempfile::TempDir,
    }

    fn fixture(voices: u8, ramp: Ramp) -> Result<Fixture, Box<dyn Error>> {
        fixture_with("mock-audio", "mock-midi", voices, ramp)
    }

    fn fixture_with(
        audio_name: &str,
        midi_name: &str,
        voices: u8,
        ramp: Ramp,
    ) -> Result<Fixture, Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let config = Player::new(
            Audio::new(audio_name),
            Some(Midi::new(Some(midi_name))),
            Engine::new(voices, ramp),
            Some(Recording::new(dir.path())),
        );
        let audio = audio::get_device(&config.audio())?;
        let midi = midi::get_device(&config.midi())?;
        let engine = PlaybackEngine::new(&config, audio.clone(), Some(midi.clone()))?;
        Ok(Fixture {
            engine,
            audio: audio.to_mock()?,
            midi: midi.to_mock()?,
            dir,
        })
    }

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(notification) => notifications.push(notification),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return notifications,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn rates(notifications: &[Notification]) -> Vec<(f32, u8, RateKind)> {
        notifications
            .iter()
            .filter_map(|n| match n {
                Notification::RateChanged { speed, note, kind } => {
                    Some((*speed, note.as_int(), *kind))
                }
                _ => None,
            })
            .collect()
    }

    fn write_fixture_wav(dir: &Path, name: &str, frames: usize) -> PathBuf {
        let path = dir.join(name);
        let samples: Vec<i16> = sine(440.0, 48000, frames)
            .iter()
            .map(|s| (s * f32::from(i16::MAX)) as i16)
            .collect();
        write_wav(&path, 1, 48000, &samples).unwrap();
        path
    }

    #[test]
    fn test_direct_note_on() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(false, "300ms"))?;
        let engine = &mut fixture.engine;
        let mut rx = engine.subscribe();

        assert_eq!(engine.applied_speed(), 1.0);
        assert_eq!(engine.current_note().as_int(), 60);

        engine.handle_note_on(note(72));
        assert_eq!(engine.applied_speed(), 2.0);
        assert_eq!(engine.current_note().as_int(), 72);

        engine.handle_note_on(note(48));
        assert_eq!(engine.applied_speed(), 0.5);

        engine.handle_note_on(note(0));
        assert_eq!(engine.applied_speed(), rate::MIN_SPEED);

        engine.handle_note_on(note(127));
        assert_eq!(engine.applied_speed(), rate::MAX_SPEED);
        assert!(!engine.ramp_in_flight());

        assert_eq!(
            rates(&drain(&mut rx)),
            vec![
                (2.0, 72, RateKind::Target),
                (0.5, 48, RateKind::Target),
                (rate::MIN_SPEED, 0, RateKind::Target),
                (rate::MAX_SPEED, 127, RateKind::Target),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_ramped_note_on() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "300ms"))?;
        let engine = &mut fixture.engine;
        let mut rx = engine.subscribe();
        let start = Instant::now();

        engine.handle_note_on_at(note(72), start);
        // Nothing is applied until the first tick.
        assert_eq!(engine.applied_speed(), 1.0);
        assert!(engine.ramp_in_flight());

        let speed = engine
            .tick_ramp_at(start + Duration::from_millis(100))
            .unwrap();
        assert!(speed > 1.0 && speed < 2.0);
        assert_eq!(engine.applied_speed(), speed);

        assert_eq!(
            engine.tick_ramp_at(start + Duration::from_millis(300)),
            Some(2.0)
        );
        assert_eq!(engine.applied_speed(), 2.0);
        assert!(!engine.ramp_in_flight());

        // Cleared ramps don't tick.
        assert_eq!(engine.tick_ramp_at(start + Duration::from_secs(1)), None);
        assert_eq!(engine.applied_speed(), 2.0);

        assert_eq!(
            rates(&drain(&mut rx)),
            vec![
                (2.0, 72, RateKind::Target),
                (speed, 72, RateKind::Live),
                (2.0, 72, RateKind::Live),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_retrigger_starts_from_current_speed() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "300ms"))?;
        let engine = &mut fixture.engine;
        let mut rx = engine.subscribe();
        let start = Instant::now();

        engine.handle_note_on_at(note(72), start);
        let mid = start + Duration::from_millis(150);
        let halfway = engine.tick_ramp_at(mid).unwrap();
        assert!((halfway - 1.5).abs() < 1e-4);

        engine.handle_note_on_at(note(48), mid);
        let state = *engine.ramp.state().unwrap();
        assert_eq!(state.start_speed, halfway);
        assert_eq!(state.target_speed, 0.5);

        // Live notifications carry the newest note.
        let speed = engine
            .tick_ramp_at(mid + Duration::from_millis(150))
            .unwrap();
        assert!(speed < halfway && speed > 0.5);
        let last = *rates(&drain(&mut rx)).last().unwrap();
        assert_eq!(last, (speed, 48, RateKind::Live));
        Ok(())
    }

    #[test]
    fn test_zero_duration_ramp() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "0s"))?;
        let engine = &mut fixture.engine;
        let start = Instant::now();

        engine.handle_note_on_at(note(84), start);
        assert_eq!(engine.tick_ramp_at(start), Some(4.0));
        assert!(!engine.ramp_in_flight());
        Ok(())
    }

    #[test]
    fn test_disabling_ramp_keeps_speed() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "300ms"))?;
        let engine = &mut fixture.engine;
        let start = Instant::now();

        engine.handle_note_on_at(note(72), start);
        let speed = engine
            .tick_ramp_at(start + Duration::from_millis(100))
            .unwrap();

        engine.set_ramp_enabled(false);
        assert!(!engine.ramp_in_flight());
        assert_eq!(engine.applied_speed(), speed);
        assert_eq!(engine.tick_ramp_at(start + Duration::from_secs(1)), None);

        // Changing the duration leaves an in-flight ramp alone.
        engine.set_ramp_enabled(true);
        engine.handle_note_on_at(note(60), start);
        engine.set_ramp_duration(Duration::from_secs(5));
        assert!((engine.ramp.state().unwrap().duration_secs - 0.3).abs() < 1e-6);
        assert_eq!(engine.ramp_duration(), Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn test_start_and_stop() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, _rx) = mpsc::channel(16);

        fixture.engine.start(tx.clone())?;
        assert!(fixture.engine.is_started());
        assert!(midi::Device::is_watching(fixture.midi.as_ref()));
        assert!(audio::Device::is_running(fixture.audio.as_ref()));

        // Starting twice is harmless.
        fixture.engine.start(tx)?;

        fixture.engine.stop();
        assert!(!fixture.engine.is_started());
        assert!(!midi::Device::is_watching(fixture.midi.as_ref()));
        assert!(!audio::Device::is_running(fixture.audio.as_ref()));

        // As is stopping twice.
        fixture.engine.stop();
        Ok(())
    }

    #[test]
    fn test_start_failures() -> Result<(), Box<dyn Error>> {
        let (tx, _rx) = mpsc::channel(16);

        let mut audio_fails = fixture_with("mock-fail", "mock-midi", 2, Ramp::default())?;
        assert!(matches!(
            audio_fails.engine.start(tx.clone()),
            Err(EngineStartError::Audio(_))
        ));
        assert!(!audio_fails.engine.is_started());

        let mut midi_fails = fixture_with("mock-audio", "mock-fail", 2, Ramp::default())?;
        assert!(matches!(
            midi_fails.engine.start(tx),
            Err(EngineStartError::Midi(_))
        ));
        assert!(!midi_fails.engine.is_started());
        assert!(!audio::Device::is_running(midi_fails.audio.as_ref()));
        Ok(())
    }

    #[test]
    fn test_single_voice_ignores_b() -> Result<(), Box<dyn Error>> {
        let fixture = fixture(1, Ramp::default())?;
        let engine = &fixture.engine;
        let path = write_fixture_wav(fixture.dir.path(), "one.wav", 480);

        assert_eq!(engine.voices().len(), 1);
        assert!(engine.voice(VoiceId::B).is_none());
        assert!(engine.load_file(VoiceId::B, &path).is_ok());
        assert!(!engine.play(VoiceId::B));
        engine.stop_voice(VoiceId::B);
        engine.set_volume(VoiceId::B, 0.5);

        engine.load_file(VoiceId::A, &path)?;
        assert!(engine.play(VoiceId::A));
        Ok(())
    }

    #[test]
    fn test_voice_settings() -> Result<(), Box<dyn Error>> {
        let fixture = fixture(2, Ramp::default())?;
        let engine = &fixture.engine;

        engine.set_looping(VoiceId::B, false);
        engine.set_reversed(VoiceId::B, true);
        engine.set_volume(VoiceId::B, 0.25);

        let b = engine.voice(VoiceId::B).unwrap();
        assert!(!b.is_looping());
        assert!(b.is_reversed());
        assert_eq!(b.volume(), 0.25);

        let a = engine.voice(VoiceId::A).unwrap();
        assert!(a.is_looping());
        assert!(!a.is_reversed());
        assert_eq!(a.volume(), 1.0);
        Ok(())
    }

    #[test]
    fn test_failed_load_keeps_previous_sample() -> Result<(), Box<dyn Error>> {
        let fixture = fixture(2, Ramp::default())?;
        let engine = &fixture.engine;
        let mut rx = engine.subscribe();
        let good = write_fixture_wav(fixture.dir.path(), "good.wav", 480);

        engine.load_file(VoiceId::A, &good)?;
        let voice = engine.voice(VoiceId::A).unwrap();
        assert!(voice.is_loaded());
        assert!(!voice.is_playing());

        let missing = fixture.dir.path().join("missing.wav");
        assert!(engine.load_file(VoiceId::A, &missing).is_err());
        let not_audio = fixture.dir.path().join("notes.txt");
        assert!(matches!(
            engine.load_file(VoiceId::A, &not_audio),
            Err(LoadError::UnsupportedFile { .. })
        ));
        assert_eq!(voice.sample().unwrap().path(), good.as_path());

        let notifications = drain(&mut rx);
        assert!(matches!(
            notifications.as_slice(),
            [
                Notification::Loading(VoiceId::A),
                Notification::Loaded { .. },
                Notification::Loading(VoiceId::A),
                Notification::LoadFailed { .. },
                Notification::Loading(VoiceId::A),
                Notification::LoadFailed { .. },
            ]
        ));
        if let Notification::Loaded { preview, .. } = &notifications[1] {
            assert_eq!(preview.name, "good.wav");
            assert_eq!(preview.channels, 1);
            assert_eq!(preview.peaks.len(), loader::PREVIEW_BUCKETS);
        }
        Ok(())
    }

    #[test]
    fn test_autoplay_load() -> Result<(), Box<dyn Error>> {
        let fixture = fixture(2, Ramp::default())?;
        let engine = &fixture.engine;
        let path = write_fixture_wav(fixture.dir.path(), "auto.wav", 480);

        let sample = loader::load_sample(&path, engine.sample_rate())?;
        let preview = sample.preview();
        engine.finish_load(VoiceId::B, true, Ok((sample, preview)));
        assert!(engine.voice(VoiceId::B).unwrap().is_playing());
        Ok(())
    }

    #[test]
    fn test_playback_ended() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;
        let mut rx = fixture.engine.subscribe();
        let ended_rx = fixture.engine.ended_events();
        let path = write_fixture_wav(fixture.dir.path(), "short.wav", 100);

        fixture.engine.load_file(VoiceId::A, &path)?;
        fixture.engine.set_looping(VoiceId::A, false);
        assert!(fixture.engine.play(VoiceId::A));
        fixture.audio.render(256);

        let ended = ended_rx.try_recv()?;
        assert_eq!(ended.voice, VoiceId::A);
        assert!(ended_rx.try_recv().is_err());
        assert!(!fixture.engine.voice(VoiceId::A).unwrap().is_playing());

        drain(&mut rx);
        fixture.engine.handle_playback_ended(ended);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Notification::PlaybackEnded(VoiceId::A)]
        ));

        // An end reported for a sample that has since been replaced is dropped.
        fixture.engine.load_file(VoiceId::A, &path)?;
        drain(&mut rx);
        fixture.engine.handle_playback_ended(ended);
        assert!(drain(&mut rx).is_empty());
        Ok(())
    }

    #[test]
    fn test_looping_never_ends() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;
        let ended_rx = fixture.engine.ended_events();
        let path = write_fixture_wav(fixture.dir.path(), "loop.wav", 100);

        fixture.engine.load_file(VoiceId::A, &path)?;
        fixture.engine.play(VoiceId::A);
        fixture.audio.render(1000);
        assert!(ended_rx.try_recv().is_err());
        assert!(fixture.engine.voice(VoiceId::A).unwrap().is_playing());
        Ok(())
    }

    #[test]
    fn test_recording() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        assert!(matches!(
            fixture.engine.start_recording(),
            Err(RecordError::NotStarted)
        ));
        assert!(fixture.engine.stop_recording()?.is_none());

        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;
        let first = fixture.engine.start_recording()?;
        let second = fixture.engine.start_recording()?;
        assert_eq!(first, second);
        assert!(first.starts_with(fixture.dir.path()));
        assert!(fixture.engine.is_recording());

        fixture.audio.render(128);
        assert_eq!(fixture.engine.stop_recording()?, Some(first.clone()));
        assert!(fixture.engine.stop_recording()?.is_none());

        let reader = hound::WavReader::open(&first)?;
        assert_eq!(reader.len(), 256);
        Ok(())
    }

    #[test]
    fn test_stop_finalizes_recording() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;
        let mut rx = fixture.engine.subscribe();

        let path = fixture.engine.start_recording()?;
        fixture.engine.stop();
        assert!(!fixture.engine.is_recording());
        assert!(hound::WavReader::open(&path).is_ok());
        assert!(drain(&mut rx)
            .iter()
            .any(|n| matches!(n, Notification::RecordingStopped(Some(_)))));
        Ok(())
    }

    #[test]
    fn test_export_recorded_capture() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;

        let sample = write_fixture_wav(fixture.dir.path(), "tone.wav", 4800);
        fixture.engine.load_file(VoiceId::A, &sample)?;
        assert!(fixture.engine.play(VoiceId::A));

        let capture = fixture.engine.start_recording()?;
        fixture.audio.render(480);
        fixture.engine.stop_recording()?;

        let destination = fixture.dir.path().join("export.wav");
        let summary = record::export_to_pcm16(&capture, &destination)?;

        let mut captured = hound::WavReader::open(&capture)?;
        let captured_spec = captured.spec();
        assert_eq!(summary.channels, captured_spec.channels);
        assert_eq!(summary.sample_rate, captured_spec.sample_rate);
        assert_eq!(summary.frames as u32, captured.duration());
        assert_eq!(summary.frames, 480);

        let mut exported = hound::WavReader::open(&destination)?;
        let exported_spec = exported.spec();
        assert_eq!(exported_spec.bits_per_sample, 16);
        assert_eq!(exported_spec.channels, captured_spec.channels);
        assert_eq!(exported.duration(), captured.duration());

        let captured: Vec<f32> = captured.samples::<f32>().collect::<Result<_, _>>()?;
        let exported: Vec<i16> = exported.samples::<i16>().collect::<Result<_, _>>()?;
        assert!(captured.iter().any(|s| s.abs() > 0.1));
        let expected: Vec<i16> = captured.iter().map(|s| record::export::to_pcm16(*s)).collect();
        assert_eq!(exported, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_ticker_drives_ramp() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "50ms"))?;
        let (tx, mut rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;

        fixture.engine.handle_note_on(note(72));
        while fixture.engine.ramp_in_flight() {
            let command = tokio::time::timeout(Duration::from_secs(3), rx.recv())
                .await?
                .ok_or("control channel closed")?;
            if let Command::RampTick(generation) = command {
                fixture.engine.handle_ramp_tick(generation);
            }
        }
        assert_eq!(fixture.engine.applied_speed(), 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ramp_begun_before_start_is_driven() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "50ms"))?;
        fixture.engine.handle_note_on(note(72));
        assert!(fixture.engine.ramp_in_flight());
        assert_eq!(fixture.engine.applied_speed(), 1.0);

        let (tx, mut rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;
        while fixture.engine.ramp_in_flight() {
            let command = tokio::time::timeout(Duration::from_secs(3), rx.recv())
                .await?
                .ok_or("control channel closed")?;
            if let Command::RampTick(generation) = command {
                fixture.engine.handle_ramp_tick(generation);
            }
        }
        assert_eq!(fixture.engine.applied_speed(), 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_ticks_are_ignored() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::new(true, "300ms"))?;
        let (tx, _rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;

        fixture.engine.handle_note_on(note(72));
        fixture.engine.handle_note_on(note(84));
        // The first ramp's ticker was replaced.
        fixture.engine.handle_ramp_tick(1);
        assert_eq!(fixture.engine.applied_speed(), 1.0);

        fixture.engine.stop();
        assert!(!fixture.engine.ramp_in_flight());
        fixture.engine.handle_ramp_tick(2);
        assert_eq!(fixture.engine.applied_speed(), 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_midi_note_reaches_control_loop() -> Result<(), Box<dyn Error>> {
        let mut fixture = fixture(2, Ramp::default())?;
        let (tx, mut rx) = mpsc::channel(16);
        fixture.engine.start(tx)?;

        assert!(fixture.midi.mock_event(&[0x90, 72, 100]));
        // Zero velocity is a note-off.
        assert!(!fixture.midi.mock_event(&[0x90, 74, 0]));
        match rx.recv().await {
            Some(Command::NoteOn(n)) => fixture.engine.handle_note_on(n),
            _ => return Err("expected a note-on".into()),
        }
        assert_eq!(fixture.engine.applied_speed(), 2.0);
        assert!(rx.try_recv().is_err());
        Ok(())
    }
}
