//! Soundboard: a command-line soundboard manager.
//!
//! Soundboards are named collections of audio clips. Clips are stored inline as base64
//! data URIs in one JSON snapshot under the data directory, so a board is
//! self-contained once its files are added.
//!
//! ## Commands
//! - `list` / `create` / `open` / `back`: manage soundboards and the open one.
//! - `clips` / `add`: show and extend a soundboard's clips.
//! - `play` / `pad`: play clips on the output device. Playing a clip that is already
//!   sounding restarts it from the beginning.

mod cli;
mod config;
mod pad;
mod render;
mod resolve;

use std::io::{self, Write};

use anyhow::{Result, anyhow};
use clap::Parser;
use clip_player::{ClipPlayer, CpalBackend, PlaybackEnd, device};
use soundboard_store::{FileClipSource, FileKeyValueStore, StoreError, SoundboardStore};
use soundboard_types::Soundboard;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command, GlobalArgs};
use crate::config::Settings;
use crate::render::NO_SOUNDBOARD_SELECTED;

type Store = SoundboardStore<FileKeyValueStore>;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,soundboard=info,clip_player=info")
        }))
        .init();

    match args.cmd {
        Command::Devices => list_devices(),
        cmd => run_board_command(cmd, &args.global),
    }
}

/// Run a command that works on the stored soundboards.
fn run_board_command(cmd: Command, global: &GlobalArgs) -> Result<()> {
    let settings = Settings::from_args(global)?;
    tracing::debug!(
        data_dir = %settings.data_dir.display(),
        key = %settings.storage_key,
        "opening store"
    );
    let mut store = SoundboardStore::open_with_key(
        FileKeyValueStore::new(&settings.data_dir),
        settings.storage_key.clone(),
    )?;

    let mut out = io::stdout().lock();
    match cmd {
        Command::List => write!(out, "{}", render::render_soundboard_list(store.state()))?,
        Command::Create { name } => match store.create_soundboard(Some(&name)) {
            Ok(board) => {
                writeln!(out, "Created soundboard {}", board.name)?;
                write!(out, "{}", render::render_soundboard_list(store.state()))?;
            }
            Err(e) => notice(&mut out, e)?,
        },
        Command::Open { board } => {
            let Some(id) = board_id_for(&store, &board) else {
                writeln!(out, "No soundboard matches '{board}'.")?;
                return Ok(());
            };
            match store.select(Some(&id)) {
                Ok(()) => {
                    if let Some(board) = store.selected_soundboard() {
                        write!(out, "{}", render::render_clip_grid(board))?;
                    }
                }
                Err(e) => notice(&mut out, e)?,
            }
        }
        Command::Back => {
            store.select(None)?;
            write!(out, "{}", render::render_soundboard_list(store.state()))?;
        }
        Command::Clips { board } => match target_board(&store, board.as_deref()) {
            Ok(board) => write!(out, "{}", render::render_clip_grid(board))?,
            Err(message) => writeln!(out, "{message}")?,
        },
        Command::Add { files, board } => {
            let id = match target_board(&store, board.as_deref()) {
                Ok(board) => board.id.clone(),
                Err(message) => {
                    writeln!(out, "{message}")?;
                    return Ok(());
                }
            };
            let sources: Vec<FileClipSource> = files.into_iter().map(FileClipSource::new).collect();
            match store.add_clips(&id, sources) {
                Ok(report) => {
                    for added in &report.added {
                        writeln!(out, "Added {}", added.name)?;
                    }
                    for skipped in &report.skipped {
                        writeln!(out, "Skipped {}: {}", skipped.file_name, skipped.reason)?;
                    }
                    if let Some(board) = store.soundboard(&id) {
                        write!(out, "{}", render::render_clip_grid(board))?;
                    }
                }
                Err(e) => notice(&mut out, e)?,
            }
        }
        Command::Play { clip, board } => {
            let board = match target_board(&store, board.as_deref()) {
                Ok(board) => board,
                Err(message) => {
                    writeln!(out, "{message}")?;
                    return Ok(());
                }
            };
            let Some(clip) = resolve::find_clip(board, &clip) else {
                writeln!(out, "No clip matches '{clip}'.")?;
                return Ok(());
            };

            let mut player = ClipPlayer::new(backend(&settings));
            player.play(&clip.id, &clip.audio_data)?;
            writeln!(out, "Playing {}", clip.name)?;
            out.flush()?;
            for event in player.wait_idle() {
                if let PlaybackEnd::Failed(reason) = event.end {
                    return Err(anyhow!("playback of {} failed: {reason}", clip.name));
                }
            }
        }
        Command::Pad { board } => {
            let board_id = match board {
                Some(query) => match pad::open_board(&mut store, &query)? {
                    Some(id) => Some(id),
                    None => {
                        writeln!(out, "No soundboard matches '{query}'.")?;
                        return Ok(());
                    }
                },
                None => store.selected_soundboard().map(|b| b.id.clone()),
            };
            drop(out);
            let mut player = ClipPlayer::new(backend(&settings));
            pad::run(&mut store, &mut player, board_id)?;
        }
        Command::Devices => list_devices()?,
    }

    Ok(())
}

fn backend(settings: &Settings) -> CpalBackend {
    CpalBackend::new(settings.device.clone(), settings.playback.clone())
}

fn board_id_for(store: &Store, query: &str) -> Option<String> {
    resolve::find_soundboard(store.state(), query).map(|board| board.id.clone())
}

/// The board named by `--board`, or the open one.
fn target_board<'a>(store: &'a Store, query: Option<&str>) -> Result<&'a Soundboard, String> {
    match query {
        Some(query) => resolve::find_soundboard(store.state(), query)
            .ok_or_else(|| format!("No soundboard matches '{query}'.")),
        None => store
            .selected_soundboard()
            .ok_or_else(|| NO_SOUNDBOARD_SELECTED.to_string()),
    }
}

/// Print expected outcomes as a notice; storage failures end the command with an error.
fn notice(out: &mut impl Write, err: StoreError) -> Result<()> {
    if !err.is_notice() {
        return Err(err.into());
    }
    writeln!(out, "{}", notice_text(&err))?;
    Ok(())
}

fn notice_text(err: &StoreError) -> String {
    match err {
        StoreError::Cancelled | StoreError::EmptyName => {
            "Soundboard not created: a name is required.".to_string()
        }
        other => format!("{}.", capitalize(&other.to_string())),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    let default = device::default_device_name(&host);
    for (i, name) in device::output_device_names(&host)?.into_iter().enumerate() {
        let marker = if Some(&name) == default.as_ref() { '*' } else { ' ' };
        println!("{marker} #{i}: {name}");
    }
    Ok(())
}
