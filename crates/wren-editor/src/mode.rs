//! Modal editing — the mode enum and its dispatch table.
//!
//! The editor is always in exactly one [`Mode`]. Each mode owns a record of
//! behavior in a static [`ModeTable`]:
//!
//! | Mode    | Input / output      | on enter          | on exit              |
//! |---------|---------------------|-------------------|----------------------|
//! | Text    | editing             | —                 | —                    |
//! | Command | prompt line         | —                 | end the session      |
//! | Mark    | selection editing   | anchor selection  | drop selection       |
//! | Quit    | Text's, never run   | —                 | —                    |
//!
//! The table is generic over the host that owns the editor state, so the
//! handlers are plain `fn` pointers taking `&mut H`. Hooks are `Option`s:
//! "no hook" is a distinct, visible state rather than an empty function.
//!
//! Transitions go through [`set_mode`], which runs the hooks in a fixed
//! order and marks the screen dirty. Switching to the mode already active is
//! a logic error and panics.

use std::fmt;
use std::io;

use wren_term::input::Key;
use wren_term::output::OutputBuffer;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The current interaction context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Default editing. Keys insert text and move the cursor.
    #[default]
    Text,
    /// A prompt on the bottom row collects input for a command.
    Command,
    /// A selection is active; edits apply to the selected range.
    Mark,
    /// Terminal. The main loop unwinds once it sees this.
    Quit,
}

impl Mode {
    /// Human-readable name for the status line.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Command => "COMMAND",
            Self::Mark => "MARK",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Handler table
// ---------------------------------------------------------------------------

/// Handles one decoded key. The flag is set for keys from a pasted burst.
pub type InputHandler<H> = fn(&mut H, Key, bool);

/// Draws the frame for the active mode.
pub type OutputHandler<H> = fn(&mut H, &mut OutputBuffer) -> io::Result<()>;

/// Transition hook. Exit hooks receive the mode being entered, enter hooks
/// the mode being left.
pub type Hook<H> = fn(&mut H, Mode);

/// Behavior of one mode.
pub struct ModeHandlers<H> {
    pub input: InputHandler<H>,
    pub output: OutputHandler<H>,
    pub on_enter: Option<Hook<H>>,
    pub on_exit: Option<Hook<H>>,
}

impl<H> ModeHandlers<H> {
    /// The same input and output handlers with both hooks removed.
    #[must_use]
    pub const fn without_hooks(&self) -> Self {
        Self {
            input: self.input,
            output: self.output,
            on_enter: None,
            on_exit: None,
        }
    }
}

// Manual impls: deriving would require `H: Clone`.
impl<H> Clone for ModeHandlers<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for ModeHandlers<H> {}

impl<H> fmt::Debug for ModeHandlers<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeHandlers")
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish_non_exhaustive()
    }
}

/// One [`ModeHandlers`] record per mode.
#[derive(Debug)]
pub struct ModeTable<H> {
    pub text: ModeHandlers<H>,
    pub command: ModeHandlers<H>,
    pub mark: ModeHandlers<H>,
    pub quit: ModeHandlers<H>,
}

impl<H> ModeTable<H> {
    /// The record for `mode`.
    #[must_use]
    pub const fn get(&self, mode: Mode) -> &ModeHandlers<H> {
        match mode {
            Mode::Text => &self.text,
            Mode::Command => &self.command,
            Mode::Mark => &self.mark,
            Mode::Quit => &self.quit,
        }
    }
}

// ---------------------------------------------------------------------------
// Host & dispatch
// ---------------------------------------------------------------------------

/// State the mode machine needs from the type that owns the editor.
pub trait ModeHost: Sized + 'static {
    /// The static handler table for this host.
    fn mode_table() -> &'static ModeTable<Self>;

    /// The active mode.
    fn mode(&self) -> Mode;

    /// Record `mode` as active. Called only by [`set_mode`].
    fn store_mode(&mut self, mode: Mode);

    /// Mark the screen and the terminal cursor as needing a redraw.
    fn invalidate(&mut self);
}

/// Switch `host` to `next`.
///
/// Runs the current mode's exit hook (given `next`), stores `next`, runs
/// `next`'s enter hook (given the previous mode), then invalidates the
/// screen. Synchronous: the new mode's handlers get the very next key.
///
/// # Panics
///
/// Panics if `next` is already the active mode.
pub fn set_mode<H: ModeHost>(host: &mut H, next: Mode) {
    let prev = host.mode();
    assert_ne!(prev, next, "mode transition to the active mode");

    let table = H::mode_table();
    if let Some(exit) = table.get(prev).on_exit {
        exit(host, next);
    }
    host.store_mode(next);
    if let Some(enter) = table.get(next).on_enter {
        enter(host, prev);
    }
    host.invalidate();

    tracing::debug!(target: "mode", from = %prev, to = %next, "transition");
}

/// Hand one key to the active mode's input handler.
pub fn dispatch_input<H: ModeHost>(host: &mut H, key: Key, clipboard: bool) {
    let input = H::mode_table().get(host.mode()).input;
    input(host, key, clipboard);
}

/// Run the active mode's output handler.
///
/// # Errors
///
/// Propagates write failures from the handler.
pub fn dispatch_output<H: ModeHost>(host: &mut H, out: &mut OutputBuffer) -> io::Result<()> {
    let output = H::mode_table().get(host.mode()).output;
    output(host, out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
