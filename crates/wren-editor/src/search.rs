//! Search — regex find and replace over a buffer.
//!
//! Patterns are compiled [`regex::Regex`]es; the find command compiles once
//! and keeps the result in its session arguments, so repeated Down/Up
//! presses don't recompile.
//!
//! Matches are byte ranges into the document. Forward search starts just
//! past the given offset and wraps around to the top; backward search looks
//! for the last match starting before the offset and wraps to the bottom.
//! Either way, a search that finds anything at all always returns a match.

use std::ops::Range;

use regex::Regex;

use crate::buffer::Buffer;

/// The first match that starts after `from`, wrapping to the start of the
/// document.
#[must_use]
pub fn find_next(buf: &Buffer, pattern: &Regex, from: usize) -> Option<Range<usize>> {
    let text = buf.contents();
    let start = next_char_boundary(&text, from);

    pattern
        .find_iter(&text)
        .find(|m| m.start() >= start)
        .or_else(|| pattern.find(&text))
        .map(|m| m.range())
}

/// The last match that starts before `from`, wrapping to the end of the
/// document.
#[must_use]
pub fn find_prev(buf: &Buffer, pattern: &Regex, from: usize) -> Option<Range<usize>> {
    let text = buf.contents();
    let mut before = None;
    let mut last = None;

    for m in pattern.find_iter(&text) {
        if m.start() < from {
            before = Some(m.range());
        }
        last = Some(m.range());
    }
    before.or(last)
}

/// Replace every match of `pattern` with `replacement` and return how many
/// were replaced. `$1`, `${name}` and friends expand to capture groups.
///
/// Leaves the buffer untouched (and unmodified) when nothing matches.
pub fn replace_all(buf: &mut Buffer, pattern: &Regex, replacement: &str) -> usize {
    let text = buf.contents();
    let count = pattern.find_iter(&text).count();
    if count > 0 {
        let replaced = pattern.replace_all(&text, replacement);
        buf.set_contents(&replaced);
    }
    tracing::debug!(target: "command", pattern = pattern.as_str(), count, "replace_all");
    count
}

/// Byte offset of the character after the one at `offset`, or the end of
/// `text`.
fn next_char_boundary(text: &str, offset: usize) -> usize {
    text.get(offset..)
        .and_then(|rest| rest.chars().next())
        .map_or(text.len(), |ch| offset + ch.len_utf8())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
