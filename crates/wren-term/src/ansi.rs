// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — the renderer decides that. This module
// just knows the byte-level encoding of the handful of terminal commands the
// editor needs.
//
// Cursor coordinates are 1-based, matching the CUP sequence itself. The
// renderer computes terminal coordinates directly, so there is no 0-based
// translation layer here.
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).

use std::io::{self, Write};

// ─── Raw Sequences ──────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J";

/// Move the cursor to the top-left cell (CUP with no parameters).
pub const CURSOR_HOME: &[u8] = b"\x1b[H";

/// Hide the cursor (DECTCEM reset).
pub const HIDE_CURSOR: &[u8] = b"\x1b[?25l";

/// Show the cursor (DECTCEM set).
pub const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

/// Erase from the cursor to the end of the line (EL 0).
pub const ERASE_LINE: &[u8] = b"\x1b[K";

/// Swap foreground and background (SGR 7). Used for selections and the
/// status line.
pub const INVERT_ON: &[u8] = b"\x1b[7m";

/// Back to the terminal's default colors (SGR 0).
///
/// SGR 0 rather than SGR 27: the editor never stacks attributes, so a full
/// reset is the one sequence guaranteed to leave nothing behind.
pub const INVERT_OFF: &[u8] = b"\x1b[0m";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using the CUP (Cursor Position) sequence.
///
/// Both coordinates are 1-based. Zero is passed through unchanged; terminals
/// treat it as 1.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{row};{col}H")
}

/// Hide the cursor.
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(HIDE_CURSOR)
}

/// Show the cursor.
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(SHOW_CURSOR)
}

/// Move the cursor to the top-left cell.
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CURSOR_HOME)
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CLEAR_SCREEN)
}

/// Erase the rest of the current line.
#[inline]
pub fn erase_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(ERASE_LINE)
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// Start inverted colors.
#[inline]
pub fn invert_on(w: &mut impl Write) -> io::Result<()> {
    w.write_all(INVERT_ON)
}

/// Return to default colors.
#[inline]
pub fn invert_off(w: &mut impl Write) -> io::Result<()> {
    w.write_all(INVERT_OFF)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
