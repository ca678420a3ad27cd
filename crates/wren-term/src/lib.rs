// SPDX-License-Identifier: MIT
//
// wren-term — the terminal side of the wren editor.
//
// Everything between the tty and the editor core: raw-mode termios, a
// byte-at-a-time keysym decoder, ANSI output primitives, and the
// single-threaded event loop that paces frames and tells typed keys from
// pasted text.
//
// No TUI framework sits underneath. Input is read straight from fd 0 with
// non-blocking termios settings, and output is plain escape sequences
// gathered into one buffer per frame.

pub mod ansi;
pub mod event_loop;
pub mod input;
pub mod output;
pub mod source;
pub mod terminal;
