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
use std::{io, path::PathBuf};

use midly::num::u7;
use thiserror::Error;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Command;
use crate::{config, playback::VoiceId};

const PLAY: &str = "play";
const STOP: &str = "stop";
const LOOP: &str = "loop";
const REVERSE: &str = "reverse";
const VOLUME: &str = "volume";
const NOTE: &str = "note";
const RAMP: &str = "ramp";
const RAMP_DURATION: &str = "ramp-duration";
const LOAD: &str = "load";
const RECORD: &str = "record";
const STOP_RECORD: &str = "stop-record";
const EXPORT: &str = "export";
const QUIT: &str = "quit";

/// A line of input that isn't a usable command.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unrecognized command: {0}")]
    Unrecognized(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses a line of input. Blank lines parse to None.
pub fn parse_command(input: &str) -> Result<Option<Command>, CommandError> {
    let mut words = input.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let name = name.to_lowercase();

    let command = match name.as_str() {
        PLAY => Command::Play(voice_arg(&args, "play <a|b>")?),
        STOP => Command::Stop(voice_arg(&args, "stop <a|b>")?),
        LOOP => {
            let usage = "loop <a|b> <on|off>";
            Command::SetLooping(voice_arg(&args, usage)?, switch_arg(args.get(1), usage)?)
        }
        REVERSE => {
            let usage = "reverse <a|b> <on|off>";
            Command::SetReversed(voice_arg(&args, usage)?, switch_arg(args.get(1), usage)?)
        }
        VOLUME => {
            let usage = "volume <a|b> <level>";
            let volume = args
                .get(1)
                .and_then(|v| v.parse::<f32>().ok())
                .ok_or(CommandError::Usage(usage))?;
            Command::SetVolume(voice_arg(&args, usage)?, volume)
        }
        NOTE => {
            let usage = "note <0-127>";
            let note = args
                .first()
                .and_then(|n| n.parse::<u8>().ok())
                .and_then(u7::try_from)
                .ok_or(CommandError::Usage(usage))?;
            Command::NoteOn(note)
        }
        RAMP => Command::SetRamp(switch_arg(args.first(), "ramp <on|off>")?),
        RAMP_DURATION => {
            let usage = "ramp-duration <duration, e.g. 300ms>";
            let duration = args
                .first()
                .and_then(|d| config::parse_duration(d).ok())
                .ok_or(CommandError::Usage(usage))?;
            Command::SetRampDuration(duration)
        }
        LOAD => {
            let usage = "load <a|b> <path>";
            let voice = voice_arg(&args, usage)?;
            // Paths may contain spaces.
            let path = args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
            if path.is_empty() {
                return Err(CommandError::Usage(usage));
            }
            Command::Load {
                voice,
                path: PathBuf::from(path),
                autoplay: true,
            }
        }
        RECORD => Command::StartRecording,
        STOP_RECORD => Command::StopRecording,
        EXPORT => match args.as_slice() {
            [source, destination] => Command::Export {
                source: PathBuf::from(source),
                destination: PathBuf::from(destination),
            },
            _ => return Err(CommandError::Usage("export <source> <destination>")),
        },
        QUIT | "exit" => Command::Shutdown,
        _ => return Err(CommandError::Unrecognized(input.trim().to_string())),
    };
    Ok(Some(command))
}

fn voice_arg(args: &[&str], usage: &'static str) -> Result<VoiceId, CommandError> {
    args.first()
        .and_then(|v| v.parse::<VoiceId>().ok())
        .ok_or(CommandError::Usage(usage))
}

fn switch_arg(arg: Option<&&str>, usage: &'static str) -> Result<bool, CommandError> {
    match arg.map(|a| a.to_lowercase()).as_deref() {
        Some("on") | Some("true") | Some("yes") => Ok(true),
        Some("off") | Some("false") | Some("no") => Ok(false),
        _ => Err(CommandError::Usage(usage)),
    }
}

pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and forwards a single command. Returns false once input is exhausted or
    /// the user quits.
    fn monitor_io<R, W>(
        commands_tx: &Sender<Command>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            info!("Input closed.");
            Self::send(commands_tx, Command::Shutdown)?;
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(Some(command)) => {
                let quit = matches!(command, Command::Shutdown);
                Self::send(commands_tx, command)?;
                Ok(!quit)
            }
            Ok(None) => Ok(true),
            Err(e) => {
                warn!(input = input.trim(), "Unrecognized input");
                writeln!(writer, "{}", e)?;
                writeln!(
                    writer,
                    "Commands: {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
                    PLAY,
                    STOP,
                    LOOP,
                    REVERSE,
                    VOLUME,
                    NOTE,
                    RAMP,
                    RAMP_DURATION,
                    LOAD,
                    RECORD,
                    STOP_RECORD,
                    EXPORT,
                    QUIT
                )?;
                Ok(true)
            }
        }
    }

    fn send(commands_tx: &Sender<Command>, command: Command) -> Result<(), io::Error> {
        commands_tx
            .blocking_send(command)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&commands_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::{
        io::{self, BufReader, BufWriter},
        time::Duration,
    };

    use tokio::sync::mpsc;

    use super::*;

    fn get_command(input: &str) -> Result<(bool, Option<Command>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Command>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::<u8>::new());
        let keep_going = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((keep_going, receiver.blocking_recv()))
    }

    #[test]
    fn test_voice_commands() -> Result<(), CommandError> {
        assert!(matches!(
            parse_command("play a")?,
            Some(Command::Play(VoiceId::A))
        ));
        assert!(matches!(
            parse_command("STOP 2")?,
            Some(Command::Stop(VoiceId::B))
        ));
        assert!(matches!(
            parse_command("loop b off")?,
            Some(Command::SetLooping(VoiceId::B, false))
        ));
        assert!(matches!(
            parse_command("reverse a on")?,
            Some(Command::SetReversed(VoiceId::A, true))
        ));
        assert!(matches!(
            parse_command("volume b 0.5")?,
            Some(Command::SetVolume(VoiceId::B, v)) if v == 0.5
        ));
        match parse_command("load a /samples/my loop.wav")? {
            Some(Command::Load {
                voice,
                path,
                autoplay,
            }) => {
                assert_eq!(voice, VoiceId::A);
                assert_eq!(path, PathBuf::from("/samples/my loop.wav"));
                assert!(autoplay);
            }
            other => panic!("unexpected command {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_engine_commands() -> Result<(), CommandError> {
        assert!(matches!(
            parse_command("note 72")?,
            Some(Command::NoteOn(n)) if n.as_int() == 72
        ));
        assert!(matches!(
            parse_command("ramp on")?,
            Some(Command::SetRamp(true))
        ));
        assert!(matches!(
            parse_command("ramp-duration 150ms")?,
            Some(Command::SetRampDuration(d)) if d == Duration::from_millis(150)
        ));
        assert!(matches!(
            parse_command("record")?,
            Some(Command::StartRecording)
        ));
        assert!(matches!(
            parse_command("stop-record")?,
            Some(Command::StopRecording)
        ));
        assert!(matches!(
            parse_command("export in.wav out.wav")?,
            Some(Command::Export { .. })
        ));
        assert!(matches!(parse_command("quit")?, Some(Command::Shutdown)));
        assert!(parse_command("   ")?.is_none());
        Ok(())
    }

    #[test]
    fn test_bad_commands() {
        assert_eq!(
            parse_command("dance").err(),
            Some(CommandError::Unrecognized("dance".to_string()))
        );
        assert!(matches!(
            parse_command("play c"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse_command("note 128"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse_command("loop a maybe"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse_command("volume a loud"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(parse_command("load b"), Err(CommandError::Usage(_))));
        assert!(matches!(
            parse_command("ramp-duration soon"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse_command("export only.wav"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        let (keep_going, command) = get_command("play b\n")?;
        assert!(keep_going);
        assert!(matches!(command, Some(Command::Play(VoiceId::B))));

        let (keep_going, command) = get_command("nonsense\n")?;
        assert!(keep_going);
        assert!(command.is_none());

        let (keep_going, command) = get_command("quit\n")?;
        assert!(!keep_going);
        assert!(matches!(command, Some(Command::Shutdown)));

        // End of input shuts down.
        let (keep_going, command) = get_command("")?;
        assert!(!keep_going);
        assert!(matches!(command, Some(Command::Shutdown)));
        Ok(())
    }
}
