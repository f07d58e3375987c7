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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speeder::{
    audio,
    config::{self, Player},
    controller::{keyboard, Command, Controller},
    midi,
    playback::{PlaybackEngine, VoiceId},
    record,
};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI keyboard controlled variable-speed sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Starts the player and reads commands from stdin.
    Run {
        /// The path to the player config. Defaults are used if omitted.
        config_path: Option<PathBuf>,
        /// A file to load into voice A.
        #[arg(short, long)]
        a: Option<PathBuf>,
        /// A file to load into voice B.
        #[arg(short, long)]
        b: Option<PathBuf>,
        /// Overrides the audio device from the config.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Converts a capture to 16 bit PCM.
    Export {
        /// The capture to convert.
        source: PathBuf,
        /// Where to write the converted file.
        destination: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Run {
            config_path,
            a,
            b,
            device,
        } => run(config_path.as_deref(), a, b, device).await?,
        Commands::Export {
            source,
            destination,
        } => {
            let summary = record::export_to_pcm16(&source, &destination)?;
            println!(
                "Exported {} frames ({} ch, {}Hz) to {}",
                summary.frames,
                summary.channels,
                summary.sample_rate,
                summary.destination.display()
            );
        }
    }

    Ok(())
}

async fn run(
    config_path: Option<&Path>,
    a: Option<PathBuf>,
    b: Option<PathBuf>,
    device: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let player = match config_path {
        Some(path) => Player::deserialize(path)?,
        None => Player::default(),
    };
    let audio_config = match device {
        Some(device) => config::Audio::new(&device),
        None => player.audio(),
    };

    let audio_device = audio::get_device(&audio_config)?;
    let midi_device = match midi::get_device(&player.midi()) {
        Ok(midi_device) => Some(midi_device),
        Err(e) => {
            warn!(err = %e, "No MIDI input, continuing without one.");
            None
        }
    };

    let engine = PlaybackEngine::new(&player, audio_device, midi_device)?;
    let mut controller = Controller::new(engine, Some(Arc::new(keyboard::Driver::new())))?;
    let mut notifications = controller.subscribe();

    let sender = controller.sender();
    for (voice, path) in [(VoiceId::A, a), (VoiceId::B, b)] {
        if let Some(path) = path {
            sender
                .send(Command::Load {
                    voice,
                    path,
                    autoplay: true,
                })
                .await?;
        }
    }
    drop(sender);

    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => println!("{}", notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dropped notifications.")
                }
                Err(RecvError::Closed) => return,
            }
        }
    });

    controller.join().await?;
    printer.abort();
    info!("Goodbye.");
    Ok(())
}
