//! Command mode — the prompt on the bottom row and the session behind it.
//!
//! Entering command mode begins a [`CommandSession`]: a borrowed prompt
//! (`"Find: "`, `"Line: "`), an editable [`CommandLine`], an optional
//! overlay message that temporarily replaces the prompt, the [`CommandOps`]
//! of the command being run, and optional [`CommandArgs`] the command has
//! parsed so far.
//!
//! # Lifecycle
//!
//! [`CommandState`] holds at most one session. `begin` while a session is
//! active, and `end` or any accessor while none is, are logic errors and
//! panic. A session's resources are released in a fixed order, overlay
//! first, then arguments, then the input line, exactly once, however the
//! session ends: `end`, `replace`, or the state itself being dropped.
//! Each release is reported on the `command.release` trace target.

use std::fmt;

use unicode_width::UnicodeWidthStr;
use wren_term::input::Key;

// ---------------------------------------------------------------------------
// CommandLine
// ---------------------------------------------------------------------------

/// The command-line input buffer.
///
/// Tracks the text the user is typing and the cursor position within it.
/// The prompt is not stored here; it belongs to the session.
#[derive(Debug, Clone)]
pub struct CommandLine {
    input: String,

    /// Cursor position within `input` (char offset, 0-indexed).
    cursor: usize,
}

impl CommandLine {
    /// Create an empty command line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            input: String::new(),
            cursor: 0,
        }
    }

    /// The current input text.
    #[inline]
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The cursor position within the input (char offset).
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Terminal columns between the start of the input and the cursor.
    #[must_use]
    pub fn cursor_width(&self) -> usize {
        self.input[..self.char_to_byte(self.cursor)].width()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, ch: char) {
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.insert(byte_idx, ch);
        self.cursor += 1;
    }

    /// Delete the character before the cursor (backspace).
    /// Returns `true` if a character was deleted.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.remove(byte_idx);
        true
    }

    /// Delete the character at the cursor (delete key).
    /// Returns `true` if a character was deleted.
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.input.chars().count() {
            return false;
        }
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.remove(byte_idx);
        true
    }

    /// Move the cursor one position to the left.
    pub const fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move the cursor one position to the right.
    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    /// Move the cursor to the beginning.
    pub const fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// Move the cursor to the end.
    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Clear the input and reset the cursor.
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    /// True if the input is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Convert a char offset to a byte offset in `self.input`.
    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map_or(self.input.len(), |(byte_idx, _)| byte_idx)
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CommandOps & CommandArgs
// ---------------------------------------------------------------------------

/// The behavior of one command, bound to the host type `C`.
pub struct CommandOps<C> {
    /// The input line was submitted.
    pub on_complete: fn(&mut C),
    /// Sees each key before line editing; `true` consumes it.
    pub on_key: Option<fn(&mut C, Key) -> bool>,
    /// Command mode is being left, by any path.
    pub on_exit: Option<fn(&mut C)>,
}

impl<C> fmt::Debug for CommandOps<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOps")
            .field("on_key", &self.on_key.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish_non_exhaustive()
    }
}

/// Parameters a command has collected so far.
#[derive(Debug)]
pub enum CommandArgs {
    /// A compiled search pattern.
    Find { pattern: regex::Regex },
    /// A compiled pattern, and its replacement once the second prompt has
    /// been answered.
    Replace {
        pattern: regex::Regex,
        replacement: Option<String>,
    },
}

impl CommandArgs {
    /// The compiled pattern, whichever the variant.
    #[must_use]
    pub const fn pattern(&self) -> &regex::Regex {
        match self {
            Self::Find { pattern } | Self::Replace { pattern, .. } => pattern,
        }
    }

    /// Release everything the arguments own.
    pub fn release(self) {
        match self {
            Self::Find { pattern } => {
                tracing::trace!(target: "command.release", resource = "args", kind = "find", pattern = pattern.as_str());
                drop(pattern);
            }
            Self::Replace { pattern, replacement } => {
                tracing::trace!(target: "command.release", resource = "args", kind = "replace", pattern = pattern.as_str());
                drop(pattern);
                drop(replacement);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CommandSession
// ---------------------------------------------------------------------------

/// Transient state of one run of a command.
pub struct CommandSession<C: 'static> {
    prompt: &'static str,
    overlay: Option<String>,
    input: CommandLine,
    ops: &'static CommandOps<C>,
    args: Option<CommandArgs>,
}

impl<C: 'static> CommandSession<C> {
    /// A fresh session with an empty input line.
    #[must_use]
    pub const fn new(prompt: &'static str, ops: &'static CommandOps<C>) -> Self {
        Self {
            prompt,
            overlay: None,
            input: CommandLine::new(),
            ops,
            args: None,
        }
    }

    /// Text shown before the input line.
    #[inline]
    #[must_use]
    pub const fn prompt(&self) -> &'static str {
        self.prompt
    }

    /// Message shown in place of the prompt and input, if any.
    #[inline]
    #[must_use]
    pub fn overlay(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    /// The input line.
    #[inline]
    #[must_use]
    pub const fn input(&self) -> &CommandLine {
        &self.input
    }

    /// The input line, for editing.
    #[inline]
    pub const fn input_mut(&mut self) -> &mut CommandLine {
        &mut self.input
    }

    /// The running command's behavior.
    #[inline]
    #[must_use]
    pub const fn ops(&self) -> &'static CommandOps<C> {
        self.ops
    }

    /// Arguments collected so far.
    #[inline]
    #[must_use]
    pub const fn args(&self) -> Option<&CommandArgs> {
        self.args.as_ref()
    }

    /// Arguments collected so far, for in-place updates.
    #[inline]
    pub const fn args_mut(&mut self) -> Option<&mut CommandArgs> {
        self.args.as_mut()
    }

    fn release_overlay(&mut self) {
        if let Some(overlay) = self.overlay.take() {
            tracing::trace!(target: "command.release", resource = "overlay", len = overlay.len());
        }
    }

    fn release_args(&mut self) {
        if let Some(args) = self.args.take() {
            args.release();
        }
    }
}

impl<C: 'static> Drop for CommandSession<C> {
    fn drop(&mut self) {
        self.release_overlay();
        self.release_args();
        tracing::trace!(target: "command.release", resource = "input", len = self.input.input().len());
        self.input.clear();
    }
}

impl<C: 'static> fmt::Debug for CommandSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSession")
            .field("prompt", &self.prompt)
            .field("overlay", &self.overlay)
            .field("input", &self.input)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CommandState
// ---------------------------------------------------------------------------

/// Holder of the single optional command session.
pub struct CommandState<C: 'static> {
    session: Option<CommandSession<C>>,
}

impl<C: 'static> CommandState<C> {
    /// No session.
    #[must_use]
    pub const fn new() -> Self {
        Self { session: None }
    }

    /// True while a session exists.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Install `session`.
    ///
    /// # Panics
    ///
    /// Panics if a session is already active.
    pub fn begin(&mut self, session: CommandSession<C>) {
        assert!(self.session.is_none(), "command session already active");
        tracing::debug!(target: "command", prompt = session.prompt, "begin");
        self.session = Some(session);
    }

    /// Tear down the active session.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    pub fn end(&mut self) {
        let Some(session) = self.session.take() else {
            panic!("no active command session");
        };
        tracing::debug!(target: "command", prompt = session.prompt, "end");
        drop(session);
    }

    /// Tear down the active session, if any, then install `session`.
    pub fn replace(&mut self, session: CommandSession<C>) {
        drop(self.session.take());
        self.session = Some(session);
    }

    /// Swap the argument payload, releasing the previous one first.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    pub fn replace_arguments(&mut self, args: Option<CommandArgs>) {
        let session = self.session_mut();
        session.release_args();
        session.args = args;
    }

    /// Swap the overlay message, releasing the previous one first.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    pub fn replace_overlay(&mut self, overlay: Option<String>) {
        let session = self.session_mut();
        session.release_overlay();
        session.overlay = overlay;
    }

    /// Change the prompt, keeping everything else.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    pub fn set_prompt(&mut self, prompt: &'static str) {
        self.session_mut().prompt = prompt;
    }

    /// The active session.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    #[must_use]
    pub fn session(&self) -> &CommandSession<C> {
        match &self.session {
            Some(session) => session,
            None => panic!("no active command session"),
        }
    }

    /// The active session, mutably.
    ///
    /// # Panics
    ///
    /// Panics if no session is active.
    pub fn session_mut(&mut self) -> &mut CommandSession<C> {
        match &mut self.session {
            Some(session) => session,
            None => panic!("no active command session"),
        }
    }
}

impl<C: 'static> Default for CommandState<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> fmt::Debug for CommandState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("session", &self.session)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tracing::dispatcher::{with_default, Dispatch};
    use tracing::field::{Field, Visit};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    // -- Trace capture --------------------------------------------------------

    #[derive(Clone, Default)]
    struct Capture {
        released: Arc<Mutex<Vec<String>>>,
    }

    #[derive(Default)]
    struct ResourceField(Option<String>);

    impl Visit for ResourceField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "resource" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if event.metadata().target() != "command.release" {
                return;
            }
            let mut field = ResourceField::default();
            event.record(&mut field);
            if let Some(resource) = field.0 {
                self.released.lock().unwrap().push(resource);
            }
        }
    }

    /// Run `f` and return the resources released during it, in order.
    fn releases(f: impl FnOnce()) -> Vec<String> {
        let capture = Capture::default();
        let released = capture.released.clone();
        let dispatch = Dispatch::new(Registry::default().with(capture));
        with_default(&dispatch, f);
        let out = released.lock().unwrap().clone();
        out
    }

    // -- Fixtures -------------------------------------------------------------

    struct Host;

    fn complete(_: &mut Host) {}

    static OPS: CommandOps<Host> = CommandOps {
        on_complete: complete,
        on_key: None,
        on_exit: None,
    };

    fn find_args(pattern: &str) -> CommandArgs {
        CommandArgs::Find {
            pattern: regex::Regex::new(pattern).unwrap(),
        }
    }

    fn full_session() -> CommandSession<Host> {
        let mut state = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_overlay(Some("no match".into()));
        state.replace_arguments(Some(find_args("a+")));
        state.session.take().unwrap()
    }

    // -- CommandLine ----------------------------------------------------------

    #[test]
    fn line_insert_and_backspace() {
        let mut cl = CommandLine::new();
        for ch in "héllo".chars() {
            cl.insert_char(ch);
        }
        assert_eq!(cl.input(), "héllo");
        assert_eq!(cl.cursor(), 5);
        assert!(cl.backspace());
        assert_eq!(cl.input(), "héll");
    }

    #[test]
    fn line_editing_in_the_middle() {
        let mut cl = CommandLine::new();
        for ch in "ac".chars() {
            cl.insert_char(ch);
        }
        cl.move_left();
        cl.insert_char('b');
        assert_eq!(cl.input(), "abc");
        cl.move_home();
        assert!(cl.delete());
        assert_eq!(cl.input(), "bc");
        cl.move_end();
        assert!(!cl.delete());
        cl.move_right();
        assert_eq!(cl.cursor(), 2);
    }

    #[test]
    fn line_backspace_at_start_is_noop() {
        let mut cl = CommandLine::new();
        assert!(!cl.backspace());
        cl.move_left();
        assert_eq!(cl.cursor(), 0);
    }

    #[test]
    fn line_cursor_width_counts_columns() {
        let mut cl = CommandLine::new();
        for ch in "a界b".chars() {
            cl.insert_char(ch);
        }
        assert_eq!(cl.cursor_width(), 4);
        cl.move_left();
        assert_eq!(cl.cursor_width(), 3);
    }

    #[test]
    fn line_clear() {
        let mut cl = CommandLine::new();
        cl.insert_char('x');
        cl.clear();
        assert!(cl.is_empty());
        assert_eq!(cl.cursor(), 0);
    }

    // -- CommandArgs ----------------------------------------------------------

    #[test]
    fn args_expose_pattern() {
        assert_eq!(find_args("x+").pattern().as_str(), "x+");
        let replace = CommandArgs::Replace {
            pattern: regex::Regex::new("y").unwrap(),
            replacement: None,
        };
        assert_eq!(replace.pattern().as_str(), "y");
    }

    // -- Lifecycle ------------------------------------------------------------

    #[test]
    fn begin_then_end() {
        let mut state: CommandState<Host> = CommandState::new();
        assert!(!state.is_active());
        state.begin(CommandSession::new("Line: ", &OPS));
        assert!(state.is_active());
        assert_eq!(state.session().prompt(), "Line: ");
        assert!(state.session().overlay().is_none());
        assert!(state.session().args().is_none());
        state.end();
        assert!(!state.is_active());
    }

    #[test]
    #[should_panic(expected = "command session already active")]
    fn double_begin_panics() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("a", &OPS));
        state.begin(CommandSession::new("b", &OPS));
    }

    #[test]
    #[should_panic(expected = "no active command session")]
    fn end_without_session_panics() {
        let mut state: CommandState<Host> = CommandState::new();
        state.end();
    }

    #[test]
    #[should_panic(expected = "no active command session")]
    fn reading_missing_session_panics() {
        let state: CommandState<Host> = CommandState::new();
        let _ = state.session();
    }

    #[test]
    fn end_releases_overlay_then_args_then_input() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_overlay(Some("bad".into()));
        state.replace_arguments(Some(find_args("x")));

        let got = releases(|| state.end());
        assert_eq!(got, vec!["overlay", "args", "input"]);
    }

    #[test]
    fn end_without_optional_fields_releases_only_input() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Line: ", &OPS));
        assert_eq!(releases(|| state.end()), vec!["input"]);
    }

    #[test]
    fn dropping_a_session_releases_exactly_once() {
        let session = full_session();
        assert_eq!(releases(|| drop(session)), vec!["overlay", "args", "input"]);
    }

    #[test]
    fn replace_tears_down_old_before_installing_new() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_overlay(Some("old".into()));
        state.replace_arguments(Some(find_args("old")));

        let got = releases(|| state.replace(CommandSession::new("Line: ", &OPS)));
        assert_eq!(got, vec!["overlay", "args", "input"]);
        assert_eq!(state.session().prompt(), "Line: ");
        assert!(state.session().overlay().is_none());
        assert!(state.session().args().is_none());
    }

    #[test]
    fn end_then_begin_starts_clean() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_overlay(Some("x".into()));
        state.replace_arguments(Some(find_args("x")));
        state.end();
        state.begin(CommandSession::new("Find: ", &OPS));
        assert!(state.session().overlay().is_none());
        assert!(state.session().args().is_none());
    }

    #[test]
    fn replace_overlay_touches_only_the_overlay() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_arguments(Some(find_args("keep")));
        state.session_mut().input_mut().insert_char('k');
        state.replace_overlay(Some("first".into()));

        let got = releases(|| state.replace_overlay(Some("second".into())));
        assert_eq!(got, vec!["overlay"]);
        assert_eq!(state.session().overlay(), Some("second"));
        assert_eq!(state.session().args().unwrap().pattern().as_str(), "keep");
        assert_eq!(state.session().input().input(), "k");
    }

    #[test]
    fn replace_arguments_touches_only_the_args() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        state.replace_overlay(Some("keep".into()));
        state.replace_arguments(Some(find_args("old")));

        let got = releases(|| state.replace_arguments(Some(find_args("new"))));
        assert_eq!(got, vec!["args"]);
        assert_eq!(state.session().args().unwrap().pattern().as_str(), "new");
        assert_eq!(state.session().overlay(), Some("keep"));
    }

    #[test]
    fn clearing_absent_fields_releases_nothing() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Find: ", &OPS));
        let got = releases(|| {
            state.replace_overlay(None);
            state.replace_arguments(None);
        });
        assert!(got.is_empty());
    }

    #[test]
    fn set_prompt_keeps_the_rest() {
        let mut state: CommandState<Host> = CommandState::new();
        state.begin(CommandSession::new("Replace: ", &OPS));
        state.session_mut().input_mut().insert_char('a');
        state.set_prompt("With: ");
        assert_eq!(state.session().prompt(), "With: ");
        assert_eq!(state.session().input().input(), "a");
    }
}
