//! Text buffer — the document, its cursor, scroll and selection.
//!
//! A `Buffer` wraps a [`ropey::Rope`] and keeps the view state that the
//! renderer and the mode handlers share: the cursor, the scroll origin, and
//! the selection while the editor is in mark mode.
//!
//! # Coordinate system
//!
//! - **Offsets are bytes.** Line starts, line ends, selection bounds and the
//!   character iterator all speak UTF-8 byte offsets into the document. They
//!   always fall on character boundaries.
//!
//! - **`Cursor::col` is a byte offset from the line start**, and
//!   `Cursor::gcol` is the same position measured in terminal columns. The
//!   renderer places the terminal cursor with `gcol`.
//!
//! - **Control characters have zero width.** They are stored and saved
//!   verbatim but never drawn, so they take no column.
//!
//! Vertical movement remembers the column it started from, so moving through
//! a short line and back lands where it began.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ropey::{Rope, RopeSlice};
use unicode_width::UnicodeWidthChar;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Cursor, Scroll, Selection
// ---------------------------------------------------------------------------

/// The editing cursor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Line, 0-indexed.
    pub row: usize,
    /// Byte offset from the start of the line.
    pub col: usize,
    /// Terminal column of `col` within the line.
    pub gcol: usize,
}

/// The top-left corner of the visible window, in document coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    /// First visible line.
    pub row: usize,
    /// Terminal columns hidden to the left of the cursor line.
    pub col: usize,
}

/// A selected byte range `[start, end)` and the offset it grows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where the selection was started. One of `start`/`end`.
    pub anchor: usize,
    /// First selected byte.
    pub start: usize,
    /// One past the last selected byte.
    pub end: usize,
}

impl Selection {
    /// The selection between `anchor` and `cursor`, in either order.
    #[must_use]
    pub const fn spanning(anchor: usize, cursor: usize) -> Self {
        if anchor <= cursor {
            Self { anchor, start: anchor, end: cursor }
        } else {
            Self { anchor, start: cursor, end: anchor }
        }
    }

    /// True if no bytes are selected.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `offset` lies inside `[start, end)`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Display width of one character: zero for control characters, otherwise
/// its Unicode width.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    if ch.is_control() {
        0
    } else {
        ch.width().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// A text document backed by a rope, with its cursor and view state.
pub struct Buffer {
    rope: Rope,
    path: Option<PathBuf>,
    modified: bool,
    cursor: Cursor,
    /// Column that vertical movement tries to return to.
    sticky_gcol: usize,
    scroll: Scroll,
    selection: Option<Selection>,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    /// Create an empty buffer with no file path.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rope(Rope::new(), None)
    }

    /// Create a buffer from a string.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_rope(Rope::from_str(text), None)
    }

    /// Load a buffer from a file. The buffer starts unmodified with the
    /// cursor at the top.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or is not UTF-8.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_rope(Rope::from_str(&text), Some(path.to_path_buf())))
    }

    /// Load `path`, or start an empty buffer named `path` if it does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for every failure other than a missing file.
    pub fn open(path: &Path) -> Result<Self> {
        match Self::from_file(path) {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Self::from_rope(Rope::new(), Some(path.to_path_buf())))
            }
            other => other,
        }
    }

    fn from_rope(rope: Rope, path: Option<PathBuf>) -> Self {
        Self {
            rope,
            path,
            modified: false,
            cursor: Cursor::default(),
            sticky_gcol: 0,
            scroll: Scroll::default(),
            selection: None,
        }
    }

    // -- Text access --------------------------------------------------------

    /// Number of lines. An empty buffer has one (empty) line, and a trailing
    /// newline starts one more.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Total byte count.
    #[inline]
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    /// True when the buffer contains no text.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    /// Byte offset where `line` starts. Lines past the end start at the
    /// document end.
    #[must_use]
    pub fn line_start(&self, line: usize) -> usize {
        if line >= self.rope.len_lines() {
            self.rope.len_bytes()
        } else {
            self.rope.line_to_byte(line)
        }
    }

    /// Byte offset of `line`'s line break, or the document end for the last
    /// line.
    #[must_use]
    pub fn line_end(&self, line: usize) -> usize {
        if line >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        let slice = self.rope.line(line);
        self.rope.line_to_byte(line) + slice.len_bytes() - line_break_len(slice)
    }

    /// The characters in `[from, ceiling)` paired with their byte offsets.
    ///
    /// # Panics
    ///
    /// Panics if `from > ceiling` or `ceiling > len_bytes()`.
    pub fn chars(&self, from: usize, ceiling: usize) -> impl Iterator<Item = (usize, char)> + '_ {
        let start = self.rope.byte_to_char(from);
        let end = self.rope.byte_to_char(ceiling);
        self.rope
            .slice(start..end)
            .chars()
            .scan(from, |offset, ch| {
                let at = *offset;
                *offset += ch.len_utf8();
                Some((at, ch))
            })
    }

    /// True if `line` contains any character outside ASCII.
    #[must_use]
    pub fn line_is_multibyte(&self, line: usize) -> bool {
        line < self.rope.len_lines() && self.rope.line(line).bytes().any(|b| b >= 0x80)
    }

    /// The whole document as a `String`.
    #[must_use]
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }

    /// Replace the whole document. The cursor keeps its offset, pulled back
    /// to the document end and onto a character boundary.
    pub fn set_contents(&mut self, text: &str) {
        let offset = self.cursor_offset();
        self.rope = Rope::from_str(text);
        self.modified = true;
        self.selection = None;
        self.place(offset.min(self.rope.len_bytes()));
    }

    // -- Cursor -------------------------------------------------------------

    /// The editing cursor.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Byte offset of the cursor in the document.
    #[inline]
    #[must_use]
    pub fn cursor_offset(&self) -> usize {
        self.line_start(self.cursor.row) + self.cursor.col
    }

    /// Move the cursor to byte `offset`, clamped to the document and snapped
    /// back to a character boundary.
    pub fn set_cursor_offset(&mut self, offset: usize) {
        self.place(offset.min(self.rope.len_bytes()));
    }

    /// Jump to the start of `line` (0-indexed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLine`] if the line does not exist.
    pub fn goto_line(&mut self, line: usize) -> Result<()> {
        if line >= self.line_count() {
            return Err(Error::InvalidLine((line + 1).to_string()));
        }
        self.place(self.line_start(line));
        Ok(())
    }

    /// Set the cursor to `offset` (a character boundary) and remember its
    /// column for vertical movement.
    fn place(&mut self, offset: usize) {
        let offset = self.snap(offset);
        let row = self.rope.byte_to_line(offset);
        let col = offset - self.rope.line_to_byte(row);
        self.cursor = Cursor {
            row,
            col,
            gcol: self.width_between(self.rope.line_to_byte(row), offset),
        };
        self.sticky_gcol = self.cursor.gcol;
        self.update_selection();
    }

    /// Move to `row`, as close to the remembered column as the line allows.
    fn place_vertical(&mut self, row: usize) {
        let start = self.line_start(row);
        let mut offset = start;
        let mut gcol = 0;
        for (at, ch) in self.chars(start, self.line_end(row)) {
            let w = char_width(ch);
            if gcol + w > self.sticky_gcol {
                break;
            }
            gcol += w;
            offset = at + ch.len_utf8();
        }
        self.cursor = Cursor {
            row,
            col: offset - start,
            gcol,
        };
        self.update_selection();
    }

    /// Round `offset` down to the start of the character containing it.
    fn snap(&self, offset: usize) -> usize {
        self.rope.char_to_byte(self.rope.byte_to_char(offset))
    }

    fn width_between(&self, from: usize, to: usize) -> usize {
        self.chars(from, to).map(|(_, ch)| char_width(ch)).sum()
    }

    // -- Movement -----------------------------------------------------------

    /// One character left, wrapping to the end of the previous line.
    pub fn move_left(&mut self) {
        let offset = self.cursor_offset();
        if self.cursor.col > 0 {
            self.place(self.prev_boundary(offset));
        } else if self.cursor.row > 0 {
            self.place(self.line_end(self.cursor.row - 1));
        }
    }

    /// One character right, wrapping to the start of the next line.
    pub fn move_right(&mut self) {
        let offset = self.cursor_offset();
        if offset < self.line_end(self.cursor.row) {
            self.place(self.next_boundary(offset));
        } else if self.cursor.row + 1 < self.line_count() {
            self.place(self.line_start(self.cursor.row + 1));
        }
    }

    /// One line up.
    pub fn move_up(&mut self) {
        if self.cursor.row > 0 {
            self.place_vertical(self.cursor.row - 1);
        }
    }

    /// One line down.
    pub fn move_down(&mut self) {
        if self.cursor.row + 1 < self.line_count() {
            self.place_vertical(self.cursor.row + 1);
        }
    }

    /// Start of the current line.
    pub fn move_home(&mut self) {
        self.place(self.line_start(self.cursor.row));
    }

    /// End of the current line.
    pub fn move_end(&mut self) {
        self.place(self.line_end(self.cursor.row));
    }

    /// `rows` lines up, stopping at the first line.
    pub fn page_up(&mut self, rows: usize) {
        let row = self.cursor.row.saturating_sub(rows.max(1));
        self.scroll.row = self.scroll.row.saturating_sub(rows.max(1));
        self.place_vertical(row);
    }

    /// `rows` lines down, stopping at the last line.
    pub fn page_down(&mut self, rows: usize) {
        let last = self.line_count() - 1;
        let row = (self.cursor.row + rows.max(1)).min(last);
        self.scroll.row = (self.scroll.row + rows.max(1)).min(last);
        self.place_vertical(row);
    }

    fn prev_boundary(&self, offset: usize) -> usize {
        let idx = self.rope.byte_to_char(offset);
        if idx == 0 {
            return 0;
        }
        let prev = self.rope.char_to_byte(idx - 1);
        // \r\n is one step.
        if self.rope.char(idx - 1) == '\n' && idx >= 2 && self.rope.char(idx - 2) == '\r' {
            return self.rope.char_to_byte(idx - 2);
        }
        prev
    }

    fn next_boundary(&self, offset: usize) -> usize {
        let idx = self.rope.byte_to_char(offset);
        if idx >= self.rope.len_chars() {
            return self.rope.len_bytes();
        }
        if self.rope.char(idx) == '\r' && self.rope.get_char(idx + 1) == Some('\n') {
            return self.rope.char_to_byte(idx + 2);
        }
        self.rope.char_to_byte(idx + 1)
    }

    // -- Scroll -------------------------------------------------------------

    /// The top-left corner of the visible window.
    #[inline]
    #[must_use]
    pub const fn scroll(&self) -> Scroll {
        self.scroll
    }

    /// Scroll vertically so the cursor row is inside a window `text_rows`
    /// lines tall.
    pub const fn sync_row_scroll(&mut self, text_rows: usize) {
        let rows = if text_rows == 0 { 1 } else { text_rows };
        if self.cursor.row < self.scroll.row {
            self.scroll.row = self.cursor.row;
        } else if self.cursor.row >= self.scroll.row + rows {
            self.scroll.row = self.cursor.row + 1 - rows;
        }
    }

    /// Scroll horizontally so the cursor column is inside a window
    /// `text_cols` columns wide.
    ///
    /// The scroll column always lands on a character boundary of the cursor
    /// row, so a wide character is never cut in half at the left edge.
    pub fn sync_column_scroll(&mut self, text_cols: usize) {
        let cols = if text_cols == 0 { 1 } else { text_cols };
        if self.cursor.gcol < self.scroll.col {
            self.scroll.col = self.cursor.gcol;
        } else if self.cursor.gcol >= self.scroll.col + cols {
            self.scroll.col = self.cursor.gcol + 1 - cols;
        }
        self.scroll.col = self.column_boundary(self.cursor.row, self.scroll.col);
    }

    /// The first character boundary of `row` at or after column `gcol`.
    fn column_boundary(&self, row: usize, gcol: usize) -> usize {
        let mut col = 0;
        for (_, ch) in self.chars(self.line_start(row), self.line_end(row)) {
            if col >= gcol {
                return col;
            }
            col += char_width(ch);
        }
        col.max(gcol)
    }

    // -- Selection ----------------------------------------------------------

    /// The current selection, present only while one was begun.
    #[inline]
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Anchor an empty selection at the cursor.
    pub fn begin_selection(&mut self) {
        let at = self.cursor_offset();
        self.selection = Some(Selection::spanning(at, at));
    }

    /// Stretch the selection from its anchor to the cursor. No-op without a
    /// selection.
    pub fn update_selection(&mut self) {
        if let Some(sel) = self.selection {
            self.selection = Some(Selection::spanning(sel.anchor, self.cursor_offset()));
        }
    }

    /// Drop the selection.
    pub const fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The selected text, if a non-empty selection exists.
    #[must_use]
    pub fn selected_text(&self) -> Option<String> {
        let sel = self.selection.filter(|s| !s.is_empty())?;
        Some(self.byte_slice(sel.start, sel.end).to_string())
    }

    /// Remove the selected text and return it. The cursor moves to where the
    /// selection started and the selection collapses there.
    pub fn delete_selection(&mut self) -> Option<String> {
        let sel = self.selection.filter(|s| !s.is_empty())?;
        let removed = self.byte_slice(sel.start, sel.end).to_string();
        self.remove(sel.start, sel.end);
        self.selection = Some(Selection::spanning(sel.start, sel.start));
        self.place(sel.start);
        Some(removed)
    }

    fn byte_slice(&self, start: usize, end: usize) -> RopeSlice<'_> {
        self.rope
            .slice(self.rope.byte_to_char(start)..self.rope.byte_to_char(end))
    }

    // -- Editing ------------------------------------------------------------

    /// Insert `text` at the cursor and move past it.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let offset = self.cursor_offset();
        self.rope.insert(self.rope.byte_to_char(offset), text);
        self.modified = true;
        self.place(offset + text.len());
    }

    /// Insert the UTF-8 encoded `bytes` at the cursor. Invalid UTF-8 is
    /// dropped.
    pub fn insert_bytes(&mut self, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.insert_str(text),
            Err(_) => tracing::debug!(target: "input", ?bytes, "dropped_invalid_utf8"),
        }
    }

    /// Split the line at the cursor. With `auto_indent`, the new line starts
    /// with the current line's leading whitespace.
    pub fn insert_newline(&mut self, auto_indent: bool) {
        let mut text = String::from("\n");
        if auto_indent {
            let start = self.line_start(self.cursor.row);
            text.extend(
                self.chars(start, self.cursor_offset())
                    .map(|(_, ch)| ch)
                    .take_while(|ch| *ch == ' ' || *ch == '\t'),
            );
        }
        self.insert_str(&text);
    }

    /// Delete the character before the cursor, joining lines at a line
    /// start. Returns `true` if anything was deleted.
    pub fn backspace(&mut self) -> bool {
        let offset = self.cursor_offset();
        if offset == 0 {
            return false;
        }
        let prev = self.prev_boundary(offset);
        self.remove(prev, offset);
        self.place(prev);
        true
    }

    /// Delete the character under the cursor. Returns `true` if anything was
    /// deleted.
    pub fn delete_forward(&mut self) -> bool {
        let offset = self.cursor_offset();
        if offset >= self.rope.len_bytes() {
            return false;
        }
        let next = self.next_boundary(offset);
        self.remove(offset, next);
        self.place(offset);
        true
    }

    fn remove(&mut self, start: usize, end: usize) {
        let range = self.rope.byte_to_char(start)..self.rope.byte_to_char(end);
        self.rope.remove(range);
        self.modified = true;
    }

    // -- Metadata -----------------------------------------------------------

    /// The file path this buffer is associated with, if any.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set the file path for this buffer.
    #[inline]
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// True if the buffer has been modified since the last load or save.
    #[inline]
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    // -- File I/O -----------------------------------------------------------

    /// Write the buffer to its file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPath`] if the buffer has no path, or
    /// [`Error::Io`] if the write fails.
    pub fn save(&mut self) -> Result<usize> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        self.save_as(&path)
    }

    /// Write the buffer to `path` and adopt it as the buffer's path. Returns
    /// the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails.
    pub fn save_as(&mut self, path: &Path) -> Result<usize> {
        let file = fs::File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        self.rope.write_to(&mut writer)?;
        io::Write::flush(&mut writer)?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        Ok(self.rope.len_bytes())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("bytes", &self.len_bytes())
            .field("cursor", &self.cursor)
            .field("modified", &self.modified)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Byte length of the line break ending `line`, zero if it has none.
fn line_break_len(line: RopeSlice<'_>) -> usize {
    let n = line.len_chars();
    if n == 0 {
        return 0;
    }
    match line.char(n - 1) {
        '\n' if n >= 2 && line.char(n - 2) == '\r' => 2,
        ch @ ('\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}') => {
            ch.len_utf8()
        }
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
