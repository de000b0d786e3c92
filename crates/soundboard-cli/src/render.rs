//! Plain-text views of the soundboard list and a soundboard's clip grid.

use std::fmt::Write;

use soundboard_types::{AppState, Soundboard};

/// Clips per grid row.
pub const GRID_COLUMNS: usize = 3;
/// Longest clip label shown before it is cut short.
const MAX_LABEL_CHARS: usize = 24;

pub const NO_SOUNDBOARDS: &str = "No soundboards yet. Run `soundboard create <NAME>` to add one.";
pub const NO_CLIPS: &str = "No audios yet. Run `soundboard add <FILES>...` to add some.";
pub const NO_SOUNDBOARD_SELECTED: &str = "No soundboard selected.";

/// Numbered soundboard list; the open soundboard is marked with `>`.
pub fn render_soundboard_list(state: &AppState) -> String {
    if state.soundboards.is_empty() {
        return format!("{NO_SOUNDBOARDS}\n");
    }

    let selected = state.selected_soundboard().map(|board| board.id.as_str());
    let width = state.soundboards.len().to_string().len();
    let mut out = String::from("Soundboards\n");
    for (index, board) in state.soundboards.iter().enumerate() {
        let marker = if Some(board.id.as_str()) == selected {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{marker} {:>width$}. {}  ({})",
            index + 1,
            board.name,
            clip_count(board.clips.len()),
        );
    }
    out
}

/// A soundboard's title followed by its clips, [`GRID_COLUMNS`] per row.
pub fn render_clip_grid(board: &Soundboard) -> String {
    let mut out = format!("{}\n", board.name);
    if board.clips.is_empty() {
        let _ = writeln!(out, "{NO_CLIPS}");
        return out;
    }

    let number_width = board.clips.len().to_string().len();
    let cells: Vec<String> = board
        .clips
        .iter()
        .enumerate()
        .map(|(index, clip)| format!("[{:>number_width$}] {}", index + 1, shorten(&clip.name)))
        .collect();
    let cell_width = cells.iter().map(|c| c.chars().count()).max().unwrap_or(0);

    for row in cells.chunks(GRID_COLUMNS) {
        let line = row
            .iter()
            .map(|cell| format!("{cell:<cell_width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

fn clip_count(n: usize) -> String {
    if n == 1 {
        "1 clip".to_string()
    } else {
        format!("{n} clips")
    }
}

fn shorten(name: &str) -> String {
    if name.chars().count() <= MAX_LABEL_CHARS {
        return name.to_string();
    }
    let mut short: String = name.chars().take(MAX_LABEL_CHARS - 3).collect();
    short.push_str("...");
    short
}
