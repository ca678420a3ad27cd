// SPDX-License-Identifier: MIT
//
// Terminal control — window size, raw mode, and getting the shell back.
//
// Safety: termios (tcgetattr/tcsetattr), ioctl(TIOCGWINSZ), isatty and the
// raw write in the panic path are plain POSIX calls with no safe wrapper in
// std. Each one sits in its own small helper below.
#![allow(unsafe_code)]
//
// `Terminal::enter` snapshots the current termios, then applies the raw
// settings from `raw_settings`: no echo, no line buffering, no signals from
// Ctrl-C / Ctrl-Z, no flow control, 8-bit chars, and reads that return
// immediately (VMIN = 0, VTIME = 0). `Terminal::leave` writes the shutdown
// bytes (clear screen, cursor home) and puts the snapshot back.
//
// Once raw mode is on the terminal counts as active, even if clearing the
// screen then fails, and `leave` restores the snapshot even if the shutdown
// write fails. A dead display stream never leaves the tty raw.
//
// A panic can unwind past the owner of the snapshot, so a copy lives in a
// process-wide slot that the panic hook restores from. The hook writes the
// shutdown bytes straight to fd 1: the panicking frame may be holding the
// stdout lock.

use std::io::{self, Write};
use std::sync::{Mutex, Once};

use crate::ansi;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Window dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    /// Used whenever the real size is unknown (pipes, test harnesses).
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };

    /// Ask the kernel for the size of the window on stdout.
    ///
    /// `None` when stdout is not a terminal or reports a zero dimension.
    #[cfg(unix)]
    #[must_use]
    pub fn query() -> Option<Self> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };
        (rc == 0 && ws.ws_col > 0 && ws.ws_row > 0).then_some(Self {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn query() -> Option<Self> {
        None
    }
}

// ─── Shutdown bytes ─────────────────────────────────────────────────────────

/// Reset colors, show the cursor, clear, home: the screen the shell gets.
const SHUTDOWN: [&[u8]; 4] = [
    ansi::INVERT_OFF,
    ansi::SHOW_CURSOR,
    ansi::CLEAR_SCREEN,
    ansi::CURSOR_HOME,
];

fn write_shutdown(w: &mut impl Write) -> io::Result<()> {
    for part in SHUTDOWN {
        w.write_all(part)?;
    }
    w.flush()
}

// ─── termios ────────────────────────────────────────────────────────────────

#[cfg(unix)]
mod termios {
    use std::io;

    pub type Settings = libc::termios;

    /// Whether stdin is a terminal at all.
    pub fn stdin_is_tty() -> bool {
        unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
    }

    pub fn get() -> io::Result<Settings> {
        let mut settings: Settings = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut settings) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(settings)
    }

    /// Apply `settings`, discarding unread input first.
    pub fn set(settings: &Settings) -> io::Result<()> {
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, settings) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Apply `settings` immediately, ignoring failure. Panic path only.
    pub fn set_now(settings: &Settings) {
        unsafe {
            let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, settings);
        }
    }

    /// `original` with the editor's raw-mode flags applied.
    #[must_use]
    pub fn raw_settings(original: &Settings) -> Settings {
        let mut raw = *original;
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_oflag &= !libc::OPOST;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
        raw.c_cflag |= libc::CS8;
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;
        raw
    }

    /// Write `bytes` to fd 1 without touching the stdout lock.
    pub fn write_stdout_raw(bytes: &[u8]) {
        unsafe {
            let _ = libc::write(libc::STDOUT_FILENO, bytes.as_ptr().cast(), bytes.len());
        }
    }
}

/// Copy of the pre-raw settings for the panic hook.
#[cfg(unix)]
static SAVED_SETTINGS: Mutex<Option<termios::Settings>> = Mutex::new(None);

#[cfg(unix)]
fn remember_settings(settings: Option<termios::Settings>) {
    if let Ok(mut slot) = SAVED_SETTINGS.lock() {
        *slot = settings;
    }
}

// ─── Panic hook ─────────────────────────────────────────────────────────────

static PANIC_HOOK: Once = Once::new();

/// Chain a hook in front of the current one that gives the terminal back
/// before the panic message is printed.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_after_panic();
            previous(info);
        }));
    });
}

#[cfg(unix)]
fn restore_after_panic() {
    for part in SHUTDOWN {
        termios::write_stdout_raw(part);
    }
    if let Ok(slot) = SAVED_SETTINGS.lock() {
        if let Some(settings) = slot.as_ref() {
            termios::set_now(settings);
        }
    }
}

#[cfg(not(unix))]
fn restore_after_panic() {
    let _ = write_shutdown(&mut io::stdout());
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Owner of raw mode.
///
/// [`enter`](Self::enter) switches to raw mode and clears the screen;
/// [`leave`](Self::leave) clears it again and restores the old settings.
/// Both are no-ops when repeated. Dropping an entered terminal leaves it.
///
/// ```no_run
/// use wren_term::terminal::Terminal;
///
/// let mut term = Terminal::new();
/// term.enter()?;
/// term.leave()?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    saved: Option<termios::Settings>,
    size: Size,
    active: bool,
}

impl Terminal {
    /// A handle in cooked mode, sized from the window (or the fallback).
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            saved: None,
            size: Size::query().unwrap_or(Size::FALLBACK),
            active: false,
        }
    }

    /// The size as of the last query.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Query the window again. Keeps the previous size if the query fails.
    pub fn refresh_size(&mut self) -> Size {
        if let Some(size) = Size::query() {
            self.size = size;
        }
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Enter raw mode and clear the screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read or applied, or the
    /// screen cannot be cleared.
    pub fn enter(&mut self) -> io::Result<()> {
        self.enter_to(&mut io::stdout().lock())
    }

    fn enter_to(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        install_panic_hook();
        self.make_raw()?;
        self.active = true;
        tracing::debug!(target: "runtime", cols = self.size.cols, rows = self.size.rows, "raw mode on");

        ansi::clear_screen(out)?;
        ansi::cursor_home(out)?;
        out.flush()
    }

    /// Clear the screen, home the cursor, restore the saved settings.
    ///
    /// The settings are restored even when the shutdown write fails.
    ///
    /// # Errors
    ///
    /// Returns the first error from writing to stdout or restoring the
    /// settings.
    pub fn leave(&mut self) -> io::Result<()> {
        self.leave_to(&mut io::stdout().lock())
    }

    fn leave_to(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        let written = write_shutdown(out);
        if let Err(e) = &written {
            tracing::warn!(target: "runtime", error = %e, "shutdown write failed");
        }
        let restored = self.restore();

        self.active = false;
        tracing::debug!(target: "runtime", "raw mode off");
        written.and(restored)
    }

    #[cfg(unix)]
    fn make_raw(&mut self) -> io::Result<()> {
        if !termios::stdin_is_tty() {
            tracing::debug!(target: "runtime", "stdin is not a terminal, staying cooked");
            return Ok(());
        }
        let original = termios::get()?;
        termios::set(&termios::raw_settings(&original))?;
        self.saved = Some(original);
        remember_settings(Some(original));
        Ok(())
    }

    #[cfg(unix)]
    fn restore(&mut self) -> io::Result<()> {
        if let Some(original) = self.saved.take() {
            remember_settings(None);
            termios::set(&original)?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn make_raw(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    fn restore(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A display stream that is gone.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn shutdown_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        write_shutdown(&mut out).unwrap();
        out
    }

    #[test]
    fn fallback_is_80_by_24() {
        assert_eq!(Size::FALLBACK, Size { cols: 80, rows: 24 });
    }

    #[test]
    fn shutdown_clears_then_homes_last() {
        let bytes = shutdown_bytes();
        assert_eq!(bytes, b"\x1b[0m\x1b[?25h\x1b[2J\x1b[H");
    }

    #[cfg(unix)]
    #[test]
    fn raw_settings_disable_echo_lines_and_signals() {
        let mut original: termios::Settings = unsafe { std::mem::zeroed() };
        original.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
        original.c_iflag = libc::ICRNL | libc::IXON;
        original.c_oflag = libc::OPOST;
        original.c_cc[libc::VMIN] = 1;

        let raw = termios::raw_settings(&original);
        assert_eq!(raw.c_lflag & (libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN), 0);
        assert_eq!(raw.c_iflag & (libc::ICRNL | libc::IXON), 0);
        assert_eq!(raw.c_oflag & libc::OPOST, 0);
        assert_eq!(raw.c_cflag & libc::CS8, libc::CS8);
        assert_eq!((raw.c_cc[libc::VMIN], raw.c_cc[libc::VTIME]), (0, 0));
    }

    #[test]
    fn new_terminal_is_cooked_and_sized() {
        let term = Terminal::new();
        assert!(!term.is_active());
        assert!(term.size().cols > 0 && term.size().rows > 0);
    }

    #[test]
    fn enter_and_leave_are_idempotent() {
        let mut term = Terminal::new();
        term.enter().unwrap();
        term.enter().unwrap();
        assert!(term.is_active());
        term.leave().unwrap();
        term.leave().unwrap();
        assert!(!term.is_active());
    }

    #[test]
    fn leave_without_enter_is_noop() {
        let mut term = Terminal::new();
        term.leave().unwrap();
        assert!(!term.is_active());
    }

    #[test]
    fn failed_clear_still_counts_as_entered() {
        let mut term = Terminal::new();
        assert!(term.enter_to(&mut Broken).is_err());
        assert!(term.is_active());

        let mut out = Vec::new();
        term.leave_to(&mut out).unwrap();
        assert!(!term.is_active());
        assert_eq!(out, shutdown_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn failed_shutdown_write_still_restores() {
        let mut term = Terminal::new();
        term.enter_to(&mut Vec::new()).unwrap();
        // Without a tty nothing was saved; stand in the current settings so
        // restoring them is harmless either way.
        if term.saved.is_none() {
            term.saved = Some(termios::get().unwrap_or_else(|_| unsafe { std::mem::zeroed() }));
        }

        let err = term.leave_to(&mut Broken).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(term.saved.is_none());
        assert!(!term.is_active());
    }

    #[test]
    fn refresh_keeps_a_usable_size() {
        let mut term = Terminal::new();
        let size = term.refresh_size();
        assert_eq!(size, term.size());
    }
}
