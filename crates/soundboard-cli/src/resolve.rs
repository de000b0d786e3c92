//! Look up soundboards and clips from what the user typed.
//!
//! A query matches, in order: an exact id, an exact name, a case-insensitive name, or a
//! 1-based position as shown by the renderer.

use soundboard_types::{AppState, Clip, Soundboard};

pub fn find_soundboard<'a>(state: &'a AppState, query: &str) -> Option<&'a Soundboard> {
    find_by_query(&state.soundboards, query, |b| b.id.as_str(), |b| b.name.as_str())
}

pub fn find_clip<'a>(board: &'a Soundboard, query: &str) -> Option<&'a Clip> {
    find_by_query(&board.clips, query, |c| c.id.as_str(), |c| c.name.as_str())
}

fn find_by_query<'a, T>(
    items: &'a [T],
    query: &str,
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    items
        .iter()
        .find(|item| id(*item) == query)
        .or_else(|| items.iter().find(|item| name(*item) == query))
        .or_else(|| {
            items
                .iter()
                .find(|item| name(*item).eq_ignore_ascii_case(query))
        })
        .or_else(|| {
            query
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| items.get(index))
        })
}
