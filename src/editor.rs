// SPDX-License-Identifier: MIT
//
// The editor — everything the event loop drives.
//
// `Editor` owns the document, the viewport, the current mode and the command
// state. It implements two traits:
//
//   ModeHost → the mode machine's view of it (handler table, mode storage)
//   App      → the event loop's view of it (resize, keys, frames, quit)
//
// Every key goes through the mode table: the active mode's input handler
// edits state, and may switch modes on the spot. Once per frame the active
// mode's output handler redraws whatever went stale.

use std::io;

use wren_editor::buffer::Buffer;
use wren_editor::command::{CommandOps, CommandSession, CommandState};
use wren_editor::config::Config;
use wren_editor::mode::{self, Mode, ModeHandlers, ModeHost, ModeTable};
use wren_editor::render::{self, BottomRow, Frame, Viewport};
use wren_editor::Error;
use wren_term::event_loop::App;
use wren_term::input::{Key, SpecialKey};
use wren_term::output::OutputBuffer;
use wren_term::terminal::Size;

use crate::commands;

// ─── Key bytes ───────────────────────────────────────────────────────────────

const CTRL_SPACE: u8 = 0x00;
const BACKSPACE: u8 = 0x7F;
const CTRL_H: u8 = 0x08;

// ─── Editor ─────────────────────────────────────────────────────────────────

/// The editor application state.
pub struct Editor {
    pub(crate) buffer: Buffer,
    pub(crate) config: Config,
    pub(crate) view: Viewport,
    mode: Mode,
    pub(crate) command: CommandState<Self>,

    /// Shown on the bottom row outside command mode. Cleared on the next key.
    pub(crate) message: String,

    /// Internal clipboard register filled by copy and cut in Mark mode.
    pub(crate) clipboard: String,

    /// The previous key was a pasted CR, so a pasted LF completes a CRLF.
    pasted_cr: bool,
}

impl Editor {
    /// An editor on `buffer`. The real window size arrives with the first
    /// resize.
    pub fn new(buffer: Buffer, config: Config) -> Self {
        Self {
            buffer,
            config,
            view: Viewport::new(24, 80),
            mode: Mode::Text,
            command: CommandState::new(),
            message: String::new(),
            clipboard: String::new(),
            pasted_cr: false,
        }
    }

    /// Replace the status message.
    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.view.invalidate();
    }

    /// Scroll so the cursor is visible, and schedule a redraw.
    ///
    /// The last screen column is reserved, so the cursor past the end of a
    /// full-width line still lands on a column it can be drawn at.
    pub(crate) fn sync_scroll(&mut self) {
        let gutter = if self.config.show_line_numbers {
            render::gutter_width(self.buffer.line_count())
        } else {
            0
        };
        self.buffer.sync_row_scroll(self.view.text_rows());
        self.buffer
            .sync_column_scroll(self.view.cols.saturating_sub(gutter + 1));
        self.view.invalidate();
    }

    /// Begin a command session and switch to command mode.
    pub(crate) fn start_command(&mut self, prompt: &'static str, ops: &'static CommandOps<Self>) {
        self.command.begin(CommandSession::new(prompt, ops));
        mode::set_mode(self, Mode::Command);
    }

    /// Write the buffer to its file. A buffer without a file name asks for
    /// one instead.
    fn save(&mut self) {
        match self.buffer.save() {
            Ok(bytes) => {
                let name = self
                    .buffer
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.set_message(format!("\"{name}\" {bytes} bytes written"));
            }
            Err(Error::NoPath) => self.start_command("Save as: ", &commands::SAVE_AS),
            Err(e) => {
                tracing::warn!(target: "command", error = %e, "save failed");
                self.set_message(e.to_string());
            }
        }
    }

    /// Insert the clipboard register at the cursor.
    fn paste(&mut self) {
        self.buffer.insert_str(&self.clipboard);
    }

    /// What the bottom row shows this frame.
    fn bottom_row(&self) -> BottomRow<'_> {
        if self.mode == Mode::Command && self.command.is_active() {
            let session = self.command.session();
            return session.overlay().map_or(
                BottomRow::Prompt {
                    prompt: session.prompt(),
                    input: session.input(),
                },
                BottomRow::Overlay,
            );
        }
        BottomRow::Message(&self.message)
    }
}

// ─── Mode table ─────────────────────────────────────────────────────────────

const TEXT: ModeHandlers<Editor> = ModeHandlers {
    input: text_input,
    output: draw,
    on_enter: None,
    on_exit: None,
};

static MODES: ModeTable<Editor> = ModeTable {
    text: TEXT,
    command: ModeHandlers {
        input: command_input,
        output: draw,
        on_enter: None,
        on_exit: Some(command_exit),
    },
    mark: ModeHandlers {
        input: mark_input,
        output: draw,
        on_enter: Some(mark_enter),
        on_exit: Some(mark_exit),
    },
    quit: TEXT.without_hooks(),
};

impl ModeHost for Editor {
    fn mode_table() -> &'static ModeTable<Self> {
        &MODES
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn store_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn invalidate(&mut self) {
        self.view.invalidate();
    }
}

// ─── Output ─────────────────────────────────────────────────────────────────

/// Redraw whatever is stale: the whole frame, then the cursor.
fn draw(ed: &mut Editor, out: &mut OutputBuffer) -> io::Result<()> {
    if !ed.view.needs_redraw && !ed.view.needs_cursor {
        return Ok(());
    }
    let frame = Frame {
        buffer: &ed.buffer,
        config: &ed.config,
        mode: ed.mode,
        bottom: ed.bottom_row(),
    };
    let mut view = ed.view;
    if view.needs_redraw {
        render::render(out, &mut view, &frame)?;
    }
    if view.needs_cursor {
        render::place_cursor(out, &mut view, &frame)?;
    }
    ed.view = view;
    Ok(())
}

// ─── Movement ───────────────────────────────────────────────────────────────

/// Apply a cursor motion key. Delete and Escape don't move.
fn apply_motion(ed: &mut Editor, key: SpecialKey) {
    let page = ed.view.text_rows();
    match key {
        SpecialKey::Up => ed.buffer.move_up(),
        SpecialKey::Down => ed.buffer.move_down(),
        SpecialKey::Left => ed.buffer.move_left(),
        SpecialKey::Right => ed.buffer.move_right(),
        SpecialKey::Home => ed.buffer.move_home(),
        SpecialKey::End => ed.buffer.move_end(),
        SpecialKey::PageUp => ed.buffer.page_up(page),
        SpecialKey::PageDown => ed.buffer.page_down(page),
        SpecialKey::Delete | SpecialKey::Escape => {}
    }
}

// ─── Text mode ──────────────────────────────────────────────────────────────

fn text_input(ed: &mut Editor, key: Key, clipboard: bool) {
    ed.message.clear();
    let after_pasted_cr = std::mem::take(&mut ed.pasted_cr);
    if clipboard && after_pasted_cr && key == Key::Plain(b'\n') {
        return;
    }

    match key {
        k if k.is_ctrl(b'q') => {
            mode::set_mode(ed, Mode::Quit);
            return;
        }
        k if k.is_ctrl(b's') => ed.save(),
        k if k.is_ctrl(b'o') => ed.start_command("Open: ", &commands::OPEN),
        k if k.is_ctrl(b'g') => ed.start_command("Line: ", &commands::GOTO),
        k if k.is_ctrl(b'f') => ed.start_command("Find: ", &commands::FIND),
        k if k.is_ctrl(b'r') => ed.start_command("Replace: ", &commands::REPLACE),
        k if k.is_ctrl(b'v') => ed.paste(),
        Key::Plain(CTRL_SPACE) => mode::set_mode(ed, Mode::Mark),

        Key::Plain(b'\r') if clipboard => {
            ed.pasted_cr = true;
            ed.buffer.insert_newline(false);
        }
        Key::Plain(b'\r' | b'\n') => ed.buffer.insert_newline(!clipboard),
        Key::Plain(b'\t') if clipboard => ed.buffer.insert_str("\t"),
        Key::Plain(b'\t') => ed.buffer.insert_str(&" ".repeat(ed.config.tab_width)),
        Key::Plain(BACKSPACE | CTRL_H) => {
            ed.buffer.backspace();
        }
        Key::Special(SpecialKey::Delete) => {
            ed.buffer.delete_forward();
        }
        Key::Special(motion) => apply_motion(ed, motion),
        Key::Plain(b) if b >= 0x20 => ed.buffer.insert_bytes(&[b]),
        Key::Multibyte(seq) => ed.buffer.insert_bytes(seq.as_bytes()),
        Key::Plain(b) => {
            tracing::trace!(target: "input", byte = b, "unbound control key");
        }
    }

    ed.sync_scroll();
}

// ─── Mark mode ──────────────────────────────────────────────────────────────

fn mark_enter(ed: &mut Editor, _from: Mode) {
    ed.buffer.begin_selection();
}

fn mark_exit(ed: &mut Editor, _to: Mode) {
    ed.buffer.clear_selection();
}

fn mark_input(ed: &mut Editor, key: Key, _clipboard: bool) {
    ed.message.clear();

    match key {
        k if k.is_ctrl(b'q') => {
            mode::set_mode(ed, Mode::Quit);
            return;
        }
        k if k.is_ctrl(b'c') => {
            if let Some(text) = ed.buffer.selected_text() {
                ed.set_message(format!("copied {} bytes", text.len()));
                ed.clipboard = text;
            }
            mode::set_mode(ed, Mode::Text);
        }
        k if k.is_ctrl(b'x') => {
            if let Some(text) = ed.buffer.delete_selection() {
                ed.set_message(format!("cut {} bytes", text.len()));
                ed.clipboard = text;
            }
            mode::set_mode(ed, Mode::Text);
        }
        Key::Plain(CTRL_SPACE) | Key::Special(SpecialKey::Escape) => mode::set_mode(ed, Mode::Text),
        Key::Plain(BACKSPACE | CTRL_H) | Key::Special(SpecialKey::Delete) => {
            ed.buffer.delete_selection();
            mode::set_mode(ed, Mode::Text);
        }
        Key::Special(motion) => apply_motion(ed, motion),
        Key::Plain(b) if b >= 0x20 => {
            ed.buffer.delete_selection();
            ed.buffer.insert_bytes(&[b]);
            mode::set_mode(ed, Mode::Text);
        }
        Key::Multibyte(seq) => {
            ed.buffer.delete_selection();
            ed.buffer.insert_bytes(seq.as_bytes());
            mode::set_mode(ed, Mode::Text);
        }
        Key::Plain(_) => {}
    }

    ed.sync_scroll();
}

// ─── Command mode ───────────────────────────────────────────────────────────

fn command_exit(ed: &mut Editor, _to: Mode) {
    if let Some(on_exit) = ed.command.session().ops().on_exit {
        on_exit(ed);
    }
    ed.command.end();
}

fn command_input(ed: &mut Editor, key: Key, clipboard: bool) {
    ed.view.invalidate();
    if ed.command.session().overlay().is_some() {
        ed.command.replace_overlay(None);
    }

    let ops = ed.command.session().ops();
    if let Some(on_key) = ops.on_key {
        if on_key(ed, key) {
            return;
        }
    }

    match key {
        Key::Special(SpecialKey::Escape) => {
            mode::set_mode(ed, Mode::Text);
            return;
        }
        Key::Plain(b'\r' | b'\n') if clipboard => return,
        Key::Plain(b'\r' | b'\n') => {
            (ops.on_complete)(ed);
            return;
        }
        _ => {}
    }

    let line = ed.command.session_mut().input_mut();
    match key {
        Key::Plain(BACKSPACE | CTRL_H) => {
            line.backspace();
        }
        Key::Special(SpecialKey::Delete) => {
            line.delete();
        }
        Key::Special(SpecialKey::Left) => line.move_left(),
        Key::Special(SpecialKey::Right) => line.move_right(),
        Key::Special(SpecialKey::Home) => line.move_home(),
        Key::Special(SpecialKey::End) => line.move_end(),
        Key::Plain(b) if (0x20..0x7F).contains(&b) => line.insert_char(char::from(b)),
        Key::Multibyte(seq) => {
            if let Some(ch) = seq.to_char() {
                line.insert_char(ch);
            }
        }
        Key::Plain(_) | Key::Special(_) => {}
    }
}

// ─── App implementation ─────────────────────────────────────────────────────

impl App for Editor {
    fn on_resize(&mut self, size: Size) {
        self.view.resize(size);
        self.sync_scroll();
    }

    fn handle_input(&mut self, key: Key, clipboard: bool) {
        mode::dispatch_input(self, key, clipboard);
    }

    fn handle_output(&mut self, out: &mut OutputBuffer) -> io::Result<()> {
        mode::dispatch_output(self, out)
    }

    fn should_quit(&self) -> bool {
        self.mode == Mode::Quit
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
