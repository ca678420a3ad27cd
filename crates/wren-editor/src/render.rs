//! Frame renderer — the visible part of the document, the status line and
//! the command row.
//!
//! The screen is split top to bottom into:
//!
//! ```text
//! ┌───────────────────────────────┐
//! │  1 first line                 │  text rows: rows - STATUS_ROWS
//! │  2 second line                │
//! │ ~                             │  past the end of the document
//! ├───────────────────────────────┤
//! │ TEXT  notes.txt +        2:7  │  status line, inverted
//! │ Find: foo                     │  message / prompt / overlay
//! └───────────────────────────────┘
//! ```
//!
//! Each frame rewrites every row in place (cursor move, content, erase to
//! end of line), so nothing from the previous frame survives and the screen
//! is never cleared as a whole.
//!
//! # Selection
//!
//! While a selection exists, each row tracks whether it is currently
//! inverted and toggles only when the next visible character's offset
//! crosses into or out of `[start, end)`. The invert sequence therefore
//! appears right before the first selected character and the revert right
//! before the first unselected one, or at the row end. Every row starts
//! and ends un-inverted, so colors never leak between rows.

use std::io::{self, Write};

use wren_term::ansi;
use wren_term::terminal::Size;

use crate::buffer::{char_width, Buffer};
use crate::command::CommandLine;
use crate::config::Config;
use crate::mode::Mode;

/// Rows below the text: the status line and the command row.
pub const STATUS_ROWS: usize = 2;

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Window size and what needs redrawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub rows: usize,
    pub cols: usize,
    /// The whole frame is stale.
    pub needs_redraw: bool,
    /// The terminal cursor must be repositioned.
    pub needs_cursor: bool,
}

impl Viewport {
    /// A `rows` × `cols` window that has never been drawn.
    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            needs_redraw: true,
            needs_cursor: true,
        }
    }

    /// Adopt a new terminal size and schedule a full redraw.
    pub const fn resize(&mut self, size: Size) {
        self.rows = size.rows as usize;
        self.cols = size.cols as usize;
        self.invalidate();
    }

    /// Mark the frame and the cursor stale.
    pub const fn invalidate(&mut self) {
        self.needs_redraw = true;
        self.needs_cursor = true;
    }

    /// Rows available to document text.
    #[inline]
    #[must_use]
    pub const fn text_rows(&self) -> usize {
        self.rows.saturating_sub(STATUS_ROWS)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// What the bottom row shows.
#[derive(Debug, Clone, Copy)]
pub enum BottomRow<'a> {
    /// A status message (possibly empty).
    Message(&'a str),
    /// A command prompt and the line being typed after it.
    Prompt {
        prompt: &'a str,
        input: &'a CommandLine,
    },
    /// A command's message, shown instead of its prompt.
    Overlay(&'a str),
}

/// Everything one frame draws.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub buffer: &'a Buffer,
    pub config: &'a Config,
    pub mode: Mode,
    pub bottom: BottomRow<'a>,
}

impl Frame<'_> {
    /// Width of the line-number gutter, zero when it is hidden.
    #[must_use]
    pub fn gutter(&self) -> usize {
        if self.config.show_line_numbers {
            gutter_width(self.buffer.line_count())
        } else {
            0
        }
    }
}

/// Columns taken by line numbers for a document of `line_count` lines: the
/// digits of the largest number plus one separator column.
#[must_use]
pub const fn gutter_width(line_count: usize) -> usize {
    let mut digits = 1;
    let mut n = line_count / 10;
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    digits + 1
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Draw the whole frame. Clears `needs_redraw` and sets `needs_cursor`.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn render(out: &mut impl Write, view: &mut Viewport, frame: &Frame<'_>) -> io::Result<()> {
    ansi::cursor_hide(out)?;

    let buf = frame.buffer;
    let first = buf.scroll().row;
    for y in 0..view.text_rows() {
        ansi::cursor_to(out, screen(y + 1), 1)?;
        let line = first + y;
        if line < buf.line_count() {
            draw_line(out, view, frame, line)?;
        } else {
            out.write_all(b"~")?;
        }
        ansi::erase_line(out)?;
    }

    let status_row = view.text_rows() + 1;
    if status_row <= view.rows {
        ansi::cursor_to(out, screen(status_row), 1)?;
        draw_status(out, view, frame)?;
        ansi::erase_line(out)?;
    }
    if status_row < view.rows {
        ansi::cursor_to(out, screen(status_row + 1), 1)?;
        draw_bottom(out, view, frame)?;
        ansi::erase_line(out)?;
    }

    view.needs_redraw = false;
    view.needs_cursor = true;
    tracing::trace!(target: "render", rows = view.rows, cols = view.cols, "frame");
    Ok(())
}

/// One document line: gutter, then the characters that fit.
fn draw_line(out: &mut impl Write, view: &Viewport, frame: &Frame<'_>, line: usize) -> io::Result<()> {
    let buf = frame.buffer;
    let gutter = frame.gutter();
    if gutter > 0 {
        let sep = if frame.config.debug_multibyte && buf.line_is_multibyte(line) {
            '*'
        } else {
            ' '
        };
        write!(out, "{:>width$}{sep}", line + 1, width = gutter - 1)?;
    }

    let text_cols = view.cols.saturating_sub(gutter);
    let skip = if line == buf.cursor().row { buf.scroll().col } else { 0 };
    let selection = buf.selection();

    let mut col = 0;
    let mut used = 0;
    let mut inverted = false;
    let mut enc = [0u8; 4];

    for (offset, ch) in buf.chars(buf.line_start(line), buf.line_end(line)) {
        if ch.is_control() {
            continue;
        }
        let w = char_width(ch);
        if col < skip {
            col += w;
            continue;
        }
        if used + w > text_cols {
            break;
        }

        let selected = selection.is_some_and(|s| s.contains(offset));
        if selected != inverted {
            out.write_all(if selected { ansi::INVERT_ON } else { ansi::INVERT_OFF })?;
            inverted = selected;
        }
        out.write_all(ch.encode_utf8(&mut enc).as_bytes())?;
        col += w;
        used += w;
    }

    if inverted {
        out.write_all(ansi::INVERT_OFF)?;
    }
    Ok(())
}

/// Inverted status line: mode and file on the left, position on the right.
fn draw_status(out: &mut impl Write, view: &Viewport, frame: &Frame<'_>) -> io::Result<()> {
    let buf = frame.buffer;
    let name = buf
        .path()
        .map_or_else(|| "[No Name]".to_string(), |p| p.display().to_string());
    let modified = if buf.is_modified() { " +" } else { "" };
    let left = format!(" {}  {name}{modified}", frame.mode);
    let right = format!("{}:{} ", buf.cursor().row + 1, buf.cursor().gcol + 1);

    let left = truncate(&left, view.cols);
    let left_width = str_width(left);
    let gap = view.cols.saturating_sub(left_width + str_width(&right));

    ansi::invert_on(out)?;
    out.write_all(left.as_bytes())?;
    if left_width + gap + str_width(&right) <= view.cols {
        write!(out, "{:gap$}{right}", "")?;
    } else {
        write!(out, "{:pad$}", "", pad = view.cols - left_width)?;
    }
    ansi::invert_off(out)
}

/// Message, prompt and input, or overlay.
fn draw_bottom(out: &mut impl Write, view: &Viewport, frame: &Frame<'_>) -> io::Result<()> {
    let text = match frame.bottom {
        BottomRow::Message(msg) | BottomRow::Overlay(msg) => msg.to_string(),
        BottomRow::Prompt { prompt, input } => format!("{prompt}{}", input.input()),
    };
    out.write_all(truncate(&text, view.cols).as_bytes())
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Where the terminal cursor belongs, as a 1-based `(row, col)`.
///
/// Document cursors are translated by the scroll origin and the gutter, then
/// clamped into `[1, bound - 1]` on each axis. While a prompt is shown the
/// cursor sits on the bottom row after the typed input.
#[must_use]
pub fn cursor_position(view: &Viewport, frame: &Frame<'_>) -> (u16, u16) {
    if let BottomRow::Prompt { prompt, input } = frame.bottom {
        let row = (view.text_rows() + STATUS_ROWS).min(view.rows).max(1);
        let col = (str_width(prompt) + input.cursor_width() + 1).clamp(1, view.cols.max(1));
        return (screen(row), screen(col));
    }

    let buf = frame.buffer;
    let cursor = buf.cursor();
    let scroll = buf.scroll();
    let row = cursor.row.saturating_sub(scroll.row) + 1;
    let col = cursor.gcol.saturating_sub(scroll.col) + frame.gutter() + 1;
    (
        screen(row.clamp(1, view.rows.saturating_sub(1).max(1))),
        screen(col.clamp(1, view.cols.saturating_sub(1).max(1))),
    )
}

/// Move the terminal cursor into place and show it. Clears `needs_cursor`.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn place_cursor(out: &mut impl Write, view: &mut Viewport, frame: &Frame<'_>) -> io::Result<()> {
    let (row, col) = cursor_position(view, frame);
    ansi::cursor_to(out, row, col)?;
    ansi::cursor_show(out)?;
    view.needs_cursor = false;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn screen(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

fn str_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// The longest prefix of `s` that fits in `cols` columns.
fn truncate(s: &str, cols: usize) -> &str {
    let mut used = 0;
    for (i, ch) in s.char_indices() {
        used += char_width(ch);
        if used > cols {
            return &s[..i];
        }
    }
    s
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ON: &str = "\x1b[7m";
    const OFF: &str = "\x1b[0m";

    fn plain() -> Config {
        Config {
            show_line_numbers: false,
            ..Config::default()
        }
    }

    fn frame<'a>(buffer: &'a Buffer, config: &'a Config) -> Frame<'a> {
        Frame {
            buffer,
            config,
            mode: Mode::Text,
            bottom: BottomRow::Message(""),
        }
    }

    fn draw(view: &mut Viewport, frame: &Frame<'_>) -> String {
        let mut out = Vec::new();
        render(&mut out, view, frame).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// The bytes written for screen row `row`, between its cursor move and
    /// the erase that ends it.
    fn row(output: &str, row: u16) -> String {
        let start = format!("\x1b[{row};1H");
        let from = output.find(&start).expect("row not drawn") + start.len();
        let rest = &output[from..];
        let end = rest.find("\x1b[K").unwrap_or(rest.len());
        rest[..end].to_string()
    }

    // -- Gutter -------------------------------------------------------------

    #[test]
    fn gutter_grows_with_digits() {
        assert_eq!(gutter_width(1), 2);
        assert_eq!(gutter_width(9), 2);
        assert_eq!(gutter_width(10), 3);
        assert_eq!(gutter_width(99), 3);
        assert_eq!(gutter_width(100), 4);
    }

    #[test]
    fn line_numbers_are_right_aligned() {
        let text: String = (1..=10).map(|i| format!("l{i}\n")).collect();
        let buf = Buffer::from_text(&text);
        let config = Config::default();
        let out = draw(&mut Viewport::new(14, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), " 1 l1");
        assert_eq!(row(&out, 10), "10 l10");
        assert_eq!(row(&out, 11), "11 ");
    }

    #[test]
    fn multibyte_lines_flagged_in_debug_mode() {
        let buf = Buffer::from_text("ascii\nnaïve");
        let config = Config {
            debug_multibyte: true,
            ..Config::default()
        };
        let out = draw(&mut Viewport::new(5, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "1 ascii");
        assert_eq!(row(&out, 2), "2*naïve");
    }

    #[test]
    fn multibyte_flag_needs_debug_mode() {
        let buf = Buffer::from_text("naïve");
        let config = Config::default();
        let out = draw(&mut Viewport::new(5, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "1 naïve");
    }

    // -- Text rows ----------------------------------------------------------

    #[test]
    fn rows_past_document_end_show_tilde() {
        let buf = Buffer::from_text("only");
        let config = plain();
        let out = draw(&mut Viewport::new(5, 10), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "only");
        assert_eq!(row(&out, 2), "~");
        assert_eq!(row(&out, 3), "~");
    }

    #[test]
    fn status_rows_are_reserved() {
        let text: String = (0..10).map(|i| format!("{i}\n")).collect();
        let buf = Buffer::from_text(&text);
        let config = plain();
        let out = draw(&mut Viewport::new(4, 10), &frame(&buf, &config));
        assert_eq!(row(&out, 2), "1");
        assert!(!row(&out, 3).contains('2'));
    }

    #[test]
    fn control_characters_are_not_drawn() {
        let buf = Buffer::from_text("a\x01b\tc");
        let config = plain();
        let out = draw(&mut Viewport::new(3, 10), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "abc");
    }

    #[test]
    fn long_lines_are_clipped() {
        let buf = Buffer::from_text("abcdefghij");
        let config = plain();
        let out = draw(&mut Viewport::new(3, 4), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "abcd");
    }

    #[test]
    fn wide_char_that_does_not_fit_is_dropped() {
        let buf = Buffer::from_text("ab界");
        let config = plain();
        let out = draw(&mut Viewport::new(3, 3), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "ab");
    }

    #[test]
    fn horizontal_scroll_shifts_only_the_cursor_row() {
        let buf_text = "0123456789\nabcdefghij";
        let mut buf = Buffer::from_text(buf_text);
        buf.set_cursor_offset(8);
        buf.sync_column_scroll(5);
        assert_eq!(buf.scroll().col, 4);

        let config = plain();
        let out = draw(&mut Viewport::new(4, 5), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "45678");
        assert_eq!(row(&out, 2), "abcde");
    }

    #[test]
    fn scrolled_wide_chars_line_up_with_cursor() {
        let mut buf = Buffer::from_text(&"漢".repeat(10));
        buf.move_end();
        buf.sync_column_scroll(6);

        let config = plain();
        let mut view = Viewport::new(4, 7);
        let frame = frame(&buf, &config);
        let out = draw(&mut view, &frame);
        assert_eq!(row(&out, 1), "漢漢");
        assert_eq!(cursor_position(&view, &frame), (1, 5));
    }

    #[test]
    fn vertical_scroll_starts_at_scroll_row() {
        let text: String = (0..20).map(|i| format!("line{i}\n")).collect();
        let mut buf = Buffer::from_text(&text);
        buf.goto_line(12).unwrap();
        buf.sync_row_scroll(3);
        let config = plain();
        let out = draw(&mut Viewport::new(5, 10), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "line10");
        assert_eq!(row(&out, 3), "line12");
    }

    // -- Selection ----------------------------------------------------------

    #[test]
    fn selection_inverts_exact_range() {
        let mut buf = Buffer::from_text("0123456789abcdef");
        buf.set_cursor_offset(5);
        buf.begin_selection();
        buf.set_cursor_offset(12);
        let config = plain();
        let out = draw(&mut Viewport::new(3, 20), &frame(&buf, &config));
        let line = row(&out, 1);
        assert_eq!(line, format!("01234{ON}56789ab{OFF}cdef"));
        assert_eq!(line.matches(ON).count(), 1);
        assert_eq!(line.matches(OFF).count(), 1);
    }

    #[test]
    fn selection_reverts_at_row_end_and_resumes_next_row() {
        let mut buf = Buffer::from_text("abc\ndef");
        buf.set_cursor_offset(1);
        buf.begin_selection();
        buf.set_cursor_offset(6);
        let config = plain();
        let out = draw(&mut Viewport::new(4, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), format!("a{ON}bc{OFF}"));
        assert_eq!(row(&out, 2), format!("{ON}de{OFF}f"));
    }

    #[test]
    fn empty_selection_draws_plain() {
        let mut buf = Buffer::from_text("abc");
        buf.begin_selection();
        let config = plain();
        let out = draw(&mut Viewport::new(3, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), "abc");
    }

    #[test]
    fn selection_with_line_numbers_leaves_gutter_plain() {
        let mut buf = Buffer::from_text("abc");
        buf.begin_selection();
        buf.move_end();
        let config = Config::default();
        let out = draw(&mut Viewport::new(3, 20), &frame(&buf, &config));
        assert_eq!(row(&out, 1), format!("1 {ON}abc{OFF}"));
    }

    // -- Status & bottom rows -----------------------------------------------

    #[test]
    fn status_line_shows_mode_name_and_position() {
        let mut buf = Buffer::from_text("hello\nworld");
        buf.goto_line(1).unwrap();
        buf.move_right();
        buf.insert_str("x");
        let config = plain();
        let mut f = frame(&buf, &config);
        f.mode = Mode::Mark;
        let out = draw(&mut Viewport::new(4, 30), &f);
        let status = row(&out, 3);
        assert!(status.starts_with(ON));
        assert!(status.contains(" MARK  [No Name] +"));
        assert!(status.contains("2:3 "));
        assert!(status.ends_with(OFF));
    }

    #[test]
    fn status_line_is_truncated_to_width() {
        let buf = Buffer::from_text("");
        let config = plain();
        let out = draw(&mut Viewport::new(3, 8), &frame(&buf, &config));
        let status = row(&out, 2);
        assert_eq!(status, format!("{ON} TEXT  [{OFF}"));
    }

    #[test]
    fn bottom_row_shows_prompt_and_input() {
        let buf = Buffer::from_text("");
        let config = plain();
        let mut input = CommandLine::new();
        input.insert_char('4');
        input.insert_char('2');
        let mut f = frame(&buf, &config);
        f.mode = Mode::Command;
        f.bottom = BottomRow::Prompt {
            prompt: "Line: ",
            input: &input,
        };
        let out = draw(&mut Viewport::new(4, 30), &f);
        assert_eq!(row(&out, 4), "Line: 42");
    }

    #[test]
    fn bottom_row_overlay_replaces_prompt() {
        let buf = Buffer::from_text("");
        let config = plain();
        let mut f = frame(&buf, &config);
        f.bottom = BottomRow::Overlay("invalid line: x");
        let out = draw(&mut Viewport::new(4, 30), &f);
        assert_eq!(row(&out, 4), "invalid line: x");
    }

    // -- Dirty flags --------------------------------------------------------

    #[test]
    fn render_clears_redraw_and_requests_cursor() {
        let buf = Buffer::from_text("x");
        let config = plain();
        let mut view = Viewport::new(3, 10);
        view.needs_cursor = false;
        draw(&mut view, &frame(&buf, &config));
        assert!(!view.needs_redraw);
        assert!(view.needs_cursor);

        let mut out = Vec::new();
        place_cursor(&mut out, &mut view, &frame(&buf, &config)).unwrap();
        assert!(!view.needs_cursor);
        assert_eq!(out, b"\x1b[1;1H\x1b[?25h");
    }

    #[test]
    fn resize_invalidates() {
        let mut view = Viewport::new(3, 10);
        view.needs_redraw = false;
        view.needs_cursor = false;
        view.resize(Size { cols: 100, rows: 40 });
        assert_eq!((view.rows, view.cols, view.text_rows()), (40, 100, 38));
        assert!(view.needs_redraw && view.needs_cursor);
    }

    // -- Cursor placement ---------------------------------------------------

    #[test]
    fn cursor_accounts_for_gutter_and_scroll() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let mut buf = Buffer::from_text(&text);
        buf.goto_line(20).unwrap();
        buf.move_right();
        buf.move_right();
        buf.sync_row_scroll(10);
        let config = Config::default();
        let view = Viewport::new(12, 80);
        // Row 20 with scroll 11 → screen row 10; gcol 2 + gutter 3 → col 6.
        assert_eq!(cursor_position(&view, &frame(&buf, &config)), (10, 6));
    }

    #[test]
    fn cursor_is_clamped_inside_window() {
        let mut buf = Buffer::from_text(&"x".repeat(50));
        buf.move_end();
        let config = plain();
        let view = Viewport::new(5, 10);
        assert_eq!(cursor_position(&view, &frame(&buf, &config)), (1, 9));
    }

    #[test]
    fn cursor_in_tiny_window_stays_at_origin() {
        let buf = Buffer::from_text("abc");
        let config = plain();
        let view = Viewport::new(1, 1);
        assert_eq!(cursor_position(&view, &frame(&buf, &config)), (1, 1));
    }

    #[test]
    fn prompt_cursor_follows_input() {
        let buf = Buffer::from_text("");
        let config = plain();
        let mut input = CommandLine::new();
        for ch in "ab".chars() {
            input.insert_char(ch);
        }
        input.move_left();
        let mut f = frame(&buf, &config);
        f.bottom = BottomRow::Prompt {
            prompt: "Find: ",
            input: &input,
        };
        let view = Viewport::new(10, 40);
        assert_eq!(cursor_position(&view, &f), (10, 8));
    }
}
