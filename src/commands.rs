// SPDX-License-Identifier: MIT
//
// Bottom-row commands.
//
// Each command is a static `CommandOps<Editor>`: what Enter does, an
// optional key filter that runs before line editing, and an optional hook
// for when command mode is left. Failures never leave command mode; they
// show an overlay in place of the prompt until the next key.
//
//   Ctrl-O  Open:      load a file
//   Ctrl-G  Line:      jump to a 1-based line
//   Ctrl-F  Find:      regex search, Enter/Down next, Up previous
//   Ctrl-R  Replace:   regex, then With: replacement, replace all
//   Ctrl-S  Save as:   only when the buffer has no file name yet

use std::path::Path;

use regex::Regex;
use wren_editor::buffer::Buffer;
use wren_editor::command::{CommandArgs, CommandOps};
use wren_editor::mode::{self, Mode};
use wren_editor::{search, Error};
use wren_term::input::{Key, SpecialKey};

use crate::editor::Editor;

// ─── Tables ─────────────────────────────────────────────────────────────────

pub static OPEN: CommandOps<Editor> = CommandOps {
    on_complete: open_complete,
    on_key: None,
    on_exit: None,
};

pub static GOTO: CommandOps<Editor> = CommandOps {
    on_complete: goto_complete,
    on_key: None,
    on_exit: None,
};

pub static FIND: CommandOps<Editor> = CommandOps {
    on_complete: find_complete,
    on_key: Some(find_key),
    on_exit: None,
};

pub static REPLACE: CommandOps<Editor> = CommandOps {
    on_complete: replace_complete,
    on_key: None,
    on_exit: Some(replace_exit),
};

pub static SAVE_AS: CommandOps<Editor> = CommandOps {
    on_complete: save_as_complete,
    on_key: None,
    on_exit: None,
};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// The submitted input line, verbatim.
fn input(ed: &Editor) -> String {
    ed.command.session().input().input().to_string()
}

/// The submitted input line without surrounding whitespace.
fn trimmed_input(ed: &Editor) -> String {
    input(ed).trim().to_string()
}

fn overlay(ed: &mut Editor, message: impl Into<String>) {
    let message = message.into();
    tracing::debug!(target: "command", %message, "overlay");
    ed.command.replace_overlay(Some(message));
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

// ─── Open ───────────────────────────────────────────────────────────────────

fn open_complete(ed: &mut Editor) {
    let name = trimmed_input(ed);
    if name.is_empty() {
        overlay(ed, Error::NoPath.to_string());
        return;
    }
    match Buffer::open(Path::new(&name)) {
        Ok(buffer) => {
            tracing::info!(target: "command", path = %name, lines = buffer.line_count(), "open");
            ed.buffer = buffer;
            ed.set_message(format!("\"{name}\" {} lines", ed.buffer.line_count()));
            ed.sync_scroll();
            mode::set_mode(ed, Mode::Text);
        }
        Err(e) => overlay(ed, format!("{name}: {e}")),
    }
}

// ─── Go to line ─────────────────────────────────────────────────────────────

fn goto_complete(ed: &mut Editor) {
    let text = trimmed_input(ed);
    let result = match text.parse::<usize>() {
        Ok(line) if line >= 1 => ed.buffer.goto_line(line - 1),
        _ => Err(Error::InvalidLine(text)),
    };
    match result {
        Ok(()) => {
            ed.sync_scroll();
            mode::set_mode(ed, Mode::Text);
        }
        Err(e) => overlay(ed, e.to_string()),
    }
}

// ─── Find ───────────────────────────────────────────────────────────────────

/// Move to the next (or previous) match of the compiled pattern.
fn jump(ed: &mut Editor, forward: bool) {
    let Some(args) = ed.command.session().args() else {
        return;
    };
    let from = ed.buffer.cursor_offset();
    let found = if forward {
        search::find_next(&ed.buffer, args.pattern(), from)
    } else {
        search::find_prev(&ed.buffer, args.pattern(), from)
    };

    if let Some(range) = found {
        ed.buffer.set_cursor_offset(range.start);
        ed.sync_scroll();
    } else {
        let message = format!("no match for {}", args.pattern());
        overlay(ed, message);
    }
}

fn find_key(ed: &mut Editor, key: Key) -> bool {
    if ed.command.session().args().is_none() {
        return false;
    }
    match key {
        Key::Special(SpecialKey::Down) => jump(ed, true),
        Key::Special(SpecialKey::Up) => jump(ed, false),
        _ => return false,
    }
    true
}

fn find_complete(ed: &mut Editor) {
    let text = input(ed);
    if text.is_empty() {
        mode::set_mode(ed, Mode::Text);
        return;
    }

    let compiled = ed
        .command
        .session()
        .args()
        .is_some_and(|args| args.pattern().as_str() == text);
    if !compiled {
        match Regex::new(&text) {
            Ok(pattern) => ed.command.replace_arguments(Some(CommandArgs::Find { pattern })),
            Err(e) => {
                overlay(ed, Error::from(e).to_string());
                return;
            }
        }
    }
    jump(ed, true);
}

// ─── Replace ────────────────────────────────────────────────────────────────

fn replace_complete(ed: &mut Editor) {
    let text = input(ed);
    let pattern = ed.command.session().args().map(|args| args.pattern().clone());

    let Some(pattern) = pattern else {
        if text.is_empty() {
            mode::set_mode(ed, Mode::Text);
            return;
        }
        match Regex::new(&text) {
            Ok(pattern) => {
                ed.command.replace_arguments(Some(CommandArgs::Replace {
                    pattern,
                    replacement: None,
                }));
                ed.command.set_prompt("With: ");
                ed.command.session_mut().input_mut().clear();
            }
            Err(e) => overlay(ed, Error::from(e).to_string()),
        }
        return;
    };

    let count = search::replace_all(&mut ed.buffer, &pattern, &text);
    ed.command.replace_arguments(Some(CommandArgs::Replace {
        pattern,
        replacement: Some(text),
    }));
    ed.set_message(format!("replaced {count} occurrence{}", plural(count)));
    ed.sync_scroll();
    mode::set_mode(ed, Mode::Text);
}

fn replace_exit(ed: &mut Editor) {
    let done = matches!(
        ed.command.session().args(),
        Some(CommandArgs::Replace {
            replacement: Some(_),
            ..
        })
    );
    if !done {
        ed.set_message("replace cancelled");
    }
}

// ─── Save as ────────────────────────────────────────────────────────────────

fn save_as_complete(ed: &mut Editor) {
    let name = trimmed_input(ed);
    if name.is_empty() {
        overlay(ed, Error::NoPath.to_string());
        return;
    }
    match ed.buffer.save_as(Path::new(&name)) {
        Ok(bytes) => {
            ed.set_message(format!("\"{name}\" {bytes} bytes written"));
            mode::set_mode(ed, Mode::Text);
        }
        Err(e) => overlay(ed, format!("{name}: {e}")),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
