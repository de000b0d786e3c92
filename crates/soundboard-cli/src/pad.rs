//! Interactive pad: one line of input triggers one clip.
//!
//! Stdin lines, clip end reports and Ctrl-C are funneled into a single channel and
//! handled on the calling thread, which is the only place the store and the player's
//! handle map are touched.

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::Result;
use clip_player::{ClipPlayer, PlaybackBackend, PlaybackEvent};
use crossbeam_channel::Sender;
use soundboard_store::{KeyValueStore, SoundboardStore};

use crate::render::{self, NO_SOUNDBOARD_SELECTED};
use crate::resolve;

const HELP: &str = "\
Type a clip number or name to play it. Pressing it again restarts it.
  open <BOARD>  open another soundboard
  back          close the soundboard and show the list
  list          show the soundboards
  help          show this help
  quit          leave the pad";

enum PadInput {
    Line(String),
    Ended(PlaybackEvent),
    StdinClosed,
    Interrupted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PadFlow {
    Continue,
    Quit,
}

/// Command interpreter behind the pad loop.
pub struct Pad<'a, K, B: PlaybackBackend, W> {
    store: &'a mut SoundboardStore<K>,
    player: &'a mut ClipPlayer<B>,
    out: W,
    board_id: Option<String>,
}

impl<'a, K: KeyValueStore, B: PlaybackBackend, W: Write> Pad<'a, K, B, W> {
    pub fn new(
        store: &'a mut SoundboardStore<K>,
        player: &'a mut ClipPlayer<B>,
        out: W,
        board_id: Option<String>,
    ) -> Self {
        Self {
            store,
            player,
            out,
            board_id,
        }
    }

    /// Print the current view.
    pub fn show(&mut self) -> Result<()> {
        let view = match self.board_id.as_deref().and_then(|id| self.store.soundboard(id)) {
            Some(board) => render::render_clip_grid(board),
            None => render::render_soundboard_list(self.store.state()),
        };
        write!(self.out, "{view}")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn handle_line(&mut self, line: &str) -> Result<PadFlow> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => self.show()?,
            "q" | "quit" | "exit" => return Ok(PadFlow::Quit),
            "?" | "help" => writeln!(self.out, "{HELP}")?,
            "list" | "ls" => {
                write!(self.out, "{}", render::render_soundboard_list(self.store.state()))?
            }
            "back" => {
                self.store.select(None)?;
                self.board_id = None;
                self.show()?;
            }
            "open" if !rest.is_empty() => self.open(rest)?,
            _ => self.trigger(line)?,
        }
        self.out.flush()?;
        Ok(PadFlow::Continue)
    }

    fn open(&mut self, query: &str) -> Result<()> {
        let Some(id) = open_board(self.store, query)? else {
            writeln!(self.out, "No soundboard matches '{query}'.")?;
            return Ok(());
        };
        self.board_id = Some(id);
        self.show()
    }

    fn trigger(&mut self, query: &str) -> Result<()> {
        let Some(board) = self.board_id.as_deref().and_then(|id| self.store.soundboard(id)) else {
            writeln!(self.out, "{NO_SOUNDBOARD_SELECTED}")?;
            return Ok(());
        };
        let Some(clip) = resolve::find_clip(board, query) else {
            writeln!(self.out, "No clip matches '{query}'.")?;
            return Ok(());
        };

        match self.player.play(&clip.id, &clip.audio_data) {
            Ok(()) => writeln!(self.out, "Playing {}", clip.name)?,
            Err(e) => writeln!(self.out, "Could not play {}: {e:#}", clip.name)?,
        }
        Ok(())
    }

    pub fn player_mut(&mut self) -> &mut ClipPlayer<B> {
        self.player
    }
}

/// Open the board matching `query` and record it as the selected one.
///
/// Returns `None`, leaving the selection alone, when nothing matches.
pub fn open_board<K: KeyValueStore>(
    store: &mut SoundboardStore<K>,
    query: &str,
) -> Result<Option<String>> {
    let Some(id) = resolve::find_soundboard(store.state(), query).map(|b| b.id.clone()) else {
        return Ok(None);
    };
    store.select(Some(&id))?;
    Ok(Some(id))
}

/// Run the pad on stdin/stdout until `quit`, Ctrl-C, or end of input.
///
/// At end of input the pad waits for clips that are still playing; Ctrl-C stops them.
pub fn run<K, B>(
    store: &mut SoundboardStore<K>,
    player: &mut ClipPlayer<B>,
    board_id: Option<String>,
) -> Result<()>
where
    K: KeyValueStore,
    B: PlaybackBackend,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    spawn_stdin_reader(tx.clone());
    spawn_event_forwarder(player.events().clone(), tx.clone());

    let interrupt_tx = tx;
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(PadInput::Interrupted);
    }) {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }

    let stdout = io::stdout();
    let mut pad = Pad::new(store, player, stdout.lock(), board_id);
    pad.show()?;

    let mut draining = false;
    while let Ok(input) = rx.recv() {
        match input {
            PadInput::Line(line) => {
                if pad.handle_line(&line)? == PadFlow::Quit {
                    break;
                }
            }
            PadInput::Ended(event) => {
                pad.player_mut().handle_event(&event);
            }
            PadInput::StdinClosed => draining = true,
            PadInput::Interrupted => break,
        }
        if draining && pad.player_mut().active_count() == 0 {
            break;
        }
    }

    pad.player_mut().stop_all();
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<PadInput>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(PadInput::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin read error: {e}");
                    break;
                }
            }
        }
        let _ = tx.send(PadInput::StdinClosed);
    });
}

fn spawn_event_forwarder(events: crossbeam_channel::Receiver<PlaybackEvent>, tx: Sender<PadInput>) {
    thread::spawn(move || {
        while let Ok(event) = events.recv() {
            if tx.send(PadInput::Ended(event)).is_err() {
                return;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clip_player::EndSignal;
    use soundboard_store::{InMemoryClip, MemoryKeyValueStore};
    use soundboard_types::AudioData;

    #[derive(Default)]
    struct RecordingBackend {
        started: Vec<String>,
        restarted: usize,
    }

    impl PlaybackBackend for RecordingBackend {
        type Handle = EndSignal;

        fn start(&mut self, clip_id: &str, _audio: &AudioData, on_end: EndSignal) -> Result<EndSignal> {
            self.started.push(clip_id.to_string());
            Ok(on_end)
        }

        fn restart(&mut self, handle: &mut EndSignal, on_end: EndSignal) -> Result<()> {
            self.restarted += 1;
            *handle = on_end;
            Ok(())
        }
    }

    fn store_with_board() -> (SoundboardStore<MemoryKeyValueStore>, String) {
        let mut store = SoundboardStore::open(MemoryKeyValueStore::new()).unwrap();
        let board = store.create_soundboard(Some("Memes")).unwrap();
        store
            .add_clips(
                &board.id,
                [
                    InMemoryClip::new("laugh.mp3", b"ID3".to_vec()),
                    InMemoryClip::new("horn.wav", b"RIFF".to_vec()),
                ],
            )
            .unwrap();
        (store, board.id)
    }

    fn output(out: &[u8]) -> String {
        String::from_utf8_lossy(out).to_string()
    }

    #[test]
    fn numbers_trigger_clips_and_repeat_restarts() {
        let (mut store, board_id) = store_with_board();
        let mut player = ClipPlayer::new(RecordingBackend::default());
        let mut out = Vec::new();
        {
            let mut pad = Pad::new(&mut store, &mut player, &mut out, Some(board_id));
            pad.handle_line("1").unwrap();
            pad.handle_line("horn.wav").unwrap();
            pad.handle_line(" 1 ").unwrap();
        }

        assert_eq!(player.backend().started.len(), 2);
        assert_eq!(player.backend().restarted, 1);
        assert_eq!(player.active_count(), 2);
        assert!(output(&out).contains("Playing laugh.mp3"));
    }

    #[test]
    fn trigger_without_board_prints_notice() {
        let (mut store, _) = store_with_board();
        let mut player = ClipPlayer::new(RecordingBackend::default());
        let mut out = Vec::new();
        Pad::new(&mut store, &mut player, &mut out, None)
            .handle_line("1")
            .unwrap();

        assert!(output(&out).contains(NO_SOUNDBOARD_SELECTED));
        assert_eq!(player.active_count(), 0);
    }

    #[test]
    fn open_and_back_update_selection() {
        let (mut store, board_id) = store_with_board();
        let mut player = ClipPlayer::new(RecordingBackend::default());
        let mut out = Vec::new();
        {
            let mut pad = Pad::new(&mut store, &mut player, &mut out, None);
            pad.handle_line("open memes").unwrap();
        }
        assert_eq!(store.state().selected_soundboard_id.as_deref(), Some(board_id.as_str()));
        assert!(output(&out).contains("[1] laugh.mp3"));

        {
            let mut pad = Pad::new(&mut store, &mut player, &mut out, Some(board_id));
            pad.handle_line("back").unwrap();
        }
        assert!(store.state().selected_soundboard_id.is_none());
    }

    #[test]
    fn starting_board_is_recorded_as_selected() {
        let (mut store, board_id) = store_with_board();
        store.select(None).unwrap();

        assert_eq!(open_board(&mut store, "nowhere").unwrap(), None);
        assert!(store.state().selected_soundboard_id.is_none());

        assert_eq!(open_board(&mut store, "1").unwrap(), Some(board_id.clone()));
        assert_eq!(store.state().selected_soundboard_id, Some(board_id));
    }

    #[test]
    fn unknown_input_is_reported() {
        let (mut store, board_id) = store_with_board();
        let mut player = ClipPlayer::new(RecordingBackend::default());
        let mut out = Vec::new();
        {
            let mut pad = Pad::new(&mut store, &mut player, &mut out, Some(board_id));
            pad.handle_line("open nowhere").unwrap();
            pad.handle_line("7").unwrap();
            assert_eq!(pad.handle_line("quit").unwrap(), PadFlow::Quit);
        }
        let text = output(&out);
        assert!(text.contains("No soundboard matches 'nowhere'."));
        assert!(text.contains("No clip matches '7'."));
    }
}
