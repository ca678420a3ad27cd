// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Event loop — the heartbeat of the editor.
//
// One thread, one loop, fixed pacing:
//
//   1. Resize: if SIGWINCH fired since the last iteration, re-query the
//      window size and hand it to the application.
//   2. Input: ask stdin how many bytes are waiting (poll with a zero
//      timeout, then FIONREAD). None → resolve a held ESC as the Escape key
//      and move on. Some → read exactly that many into a burst, classify the
//      burst, and decode every key in it.
//   3. Output: the application draws into an `OutputBuffer`, which goes to
//      the terminal in a single write.
//   4. Pacing: sleep whatever is left of the frame interval (16.7 ms at the
//      default 60 Hz). A frame that overran does not sleep at all.
//
// # Clipboard Heuristic
//
// A human types one key per frame, occasionally two. A terminal paste
// delivers the whole text at once. So a burst of `clipboard_threshold` or
// more bytes is treated as pasted, and every key decoded from it carries
// `clipboard = true`, unless an ESC appears anywhere in the burst: escape
// sequences come from key presses, never from pasted text, so such a burst
// is typed from its first byte to its last.
//
// # SIGWINCH Handling
//
// The signal handler sets an `AtomicBool` and nothing else. The loop swaps
// it back to false once per iteration. This flag is the only state shared
// between the signal context and the rest of the program.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::input::{Decoder, Key, ESC};
use crate::output::OutputBuffer;
use crate::source::{ByteQueue, ByteSource, StdinSource};
use crate::terminal::{Size, Terminal};

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

/// Global flag set by the SIGWINCH handler. Checked each loop iteration.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Install a signal handler for SIGWINCH (terminal resize).
///
/// The handler only stores to [`SIGWINCH_RECEIVED`], which is
/// async-signal-safe.
#[cfg(unix)]
fn install_sigwinch_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigwinch_handler() {}

// ─── App Trait ───────────────────────────────────────────────────────────────

/// Application interface for the event loop.
///
/// Each iteration the loop calls, in order:
///
/// 1. [`on_resize`](App::on_resize) — if the window changed size
/// 2. [`handle_input`](App::handle_input) — once per decoded key
/// 3. [`handle_output`](App::handle_output) — once, after all input
///
/// and stops as soon as [`should_quit`](App::should_quit) returns `true`.
pub trait App {
    /// The window is now `size`. Also called once before the first frame.
    fn on_resize(&mut self, _size: Size) {}

    /// Handle one decoded key. `clipboard` is set when the key arrived in a
    /// burst classified as pasted text.
    fn handle_input(&mut self, key: Key, clipboard: bool);

    /// Write this frame's terminal output.
    ///
    /// # Errors
    ///
    /// Write failures end the loop.
    fn handle_output(&mut self, out: &mut OutputBuffer) -> io::Result<()>;

    /// Whether the loop should stop.
    fn should_quit(&self) -> bool;
}

// ─── Loop Config ─────────────────────────────────────────────────────────────

/// Timing and input classification parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Minimum wall-clock time per iteration. Default: 16 667 µs (60 Hz).
    pub frame_interval: Duration,

    /// Bursts of at least this many bytes count as pasted. Default: 3.
    pub clipboard_threshold: usize,
}

impl LoopConfig {
    /// Default frame interval, one 60th of a second.
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

    /// Default burst size treated as a paste.
    pub const DEFAULT_CLIPBOARD_THRESHOLD: usize = 3;

    /// Config for `frame_rate` frames per second. Zero is treated as one.
    #[must_use]
    pub fn from_frame_rate(frame_rate: u32, clipboard_threshold: usize) -> Self {
        Self {
            frame_interval: Duration::from_secs(1) / frame_rate.max(1),
            clipboard_threshold,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
            clipboard_threshold: Self::DEFAULT_CLIPBOARD_THRESHOLD,
        }
    }
}

// ─── Burst Classification ────────────────────────────────────────────────────

/// Whether a burst of simultaneously available bytes is pasted text.
///
/// True when the burst reaches `threshold` bytes and holds no ESC.
#[must_use]
pub fn is_clipboard_burst(burst: &[u8], threshold: usize) -> bool {
    burst.len() >= threshold && !burst.contains(&ESC)
}

/// Time left to sleep in a frame of `interval` after `elapsed` has passed.
#[must_use]
pub fn frame_remainder(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// The bytes of one burst, drained from `upstream` before decoding.
///
/// Discarding clears both the burst and whatever `upstream` still holds, so
/// an unknown escape sequence drops everything the terminal has sent.
struct Burst<'a, S: ByteSource> {
    bytes: ByteQueue,
    upstream: &'a mut S,
}

impl<S: ByteSource> ByteSource for Burst<'_, S> {
    fn read_byte(&mut self) -> Option<u8> {
        self.bytes.read_byte()
    }

    fn available(&mut self) -> usize {
        self.bytes.len()
    }

    fn discard_pending(&mut self) {
        self.bytes.discard_pending();
        self.upstream.discard_pending();
    }
}

// ─── InputPump ───────────────────────────────────────────────────────────────

/// Moves one iteration's worth of input from a [`ByteSource`] into an
/// [`App`]: read the burst, classify it, decode it, deliver the keys.
pub struct InputPump<S: ByteSource> {
    source: S,
    decoder: Decoder,
    clipboard_threshold: usize,
    scratch: Vec<u8>,
}

impl<S: ByteSource> InputPump<S> {
    /// Create a pump over `source`.
    #[must_use]
    pub const fn new(source: S, clipboard_threshold: usize) -> Self {
        Self {
            source,
            decoder: Decoder::new(),
            clipboard_threshold,
            scratch: Vec::new(),
        }
    }

    /// The underlying byte source.
    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Deliver every key currently available. Returns the number of keys
    /// delivered.
    ///
    /// Stops early, dropping the rest of the burst, once the app asks to
    /// quit.
    pub fn pump(&mut self, app: &mut impl App) -> usize {
        let available = self.source.available();
        if available == 0 {
            return match self.decoder.flush_pending() {
                Some(key) => {
                    app.handle_input(key, false);
                    1
                }
                None => 0,
            };
        }

        self.scratch.clear();
        while self.scratch.len() < available {
            match self.source.read_byte() {
                Some(b) => self.scratch.push(b),
                None => break,
            }
        }

        // A held ESC belongs to this burst's first sequence.
        let clipboard = !self.decoder.has_pending()
            && is_clipboard_burst(&self.scratch, self.clipboard_threshold);
        tracing::trace!(target: "runtime", bytes = self.scratch.len(), clipboard, "burst");

        let mut burst = Burst {
            bytes: ByteQueue::from_bytes(&self.scratch),
            upstream: &mut self.source,
        };

        let mut delivered = 0;
        while !burst.bytes.is_empty() {
            if let Some(key) = self.decoder.decode(&mut burst) {
                app.handle_input(key, clipboard);
                delivered += 1;
                if app.should_quit() {
                    break;
                }
            }
        }
        delivered
    }
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The terminal event loop.
///
/// Owns the terminal, the stdin pump and the frame output buffer. Call
/// [`run`](Self::run) to enter the loop; it returns once the application
/// reports [`should_quit`](App::should_quit).
///
/// # Example
///
/// ```no_run
/// use std::io;
/// use wren_term::event_loop::{App, EventLoop, LoopConfig};
/// use wren_term::input::Key;
/// use wren_term::output::OutputBuffer;
///
/// struct Quitter(bool);
///
/// impl App for Quitter {
///     fn handle_input(&mut self, key: Key, _clipboard: bool) {
///         self.0 = key == Key::Plain(b'q');
///     }
///     fn handle_output(&mut self, _out: &mut OutputBuffer) -> io::Result<()> {
///         Ok(())
///     }
///     fn should_quit(&self) -> bool {
///         self.0
///     }
/// }
///
/// EventLoop::new(LoopConfig::default()).run(&mut Quitter(false))?;
/// # Ok::<(), io::Error>(())
/// ```
pub struct EventLoop {
    terminal: Terminal,
    pump: InputPump<StdinSource>,
    out: OutputBuffer,
    config: LoopConfig,
}

impl EventLoop {
    /// Create an event loop over the process's terminal.
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        Self {
            terminal: Terminal::new(),
            pump: InputPump::new(StdinSource::new(), config.clipboard_threshold),
            out: OutputBuffer::new(),
            config,
        }
    }

    /// The current terminal size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.terminal.size()
    }

    /// The loop's configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> LoopConfig {
        self.config
    }

    /// Run until the application quits.
    ///
    /// Enters raw mode, installs the SIGWINCH handler, runs the loop, and
    /// restores the terminal on the way out, also when the loop failed.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be set or restored, or if writing
    /// a frame fails.
    pub fn run(&mut self, app: &mut impl App) -> io::Result<()> {
        if let Err(e) = self.terminal.enter() {
            let _ = self.terminal.leave();
            return Err(e);
        }
        install_sigwinch_handler();

        let result = self.run_inner(app);

        let left = self.terminal.leave();
        result.and(left)
    }

    fn run_inner(&mut self, app: &mut impl App) -> io::Result<()> {
        app.on_resize(self.terminal.refresh_size());

        loop {
            let frame_start = Instant::now();

            if SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                let size = self.terminal.refresh_size();
                tracing::debug!(target: "runtime", cols = size.cols, rows = size.rows, "resize");
                app.on_resize(size);
            }

            self.pump.pump(app);
            if app.should_quit() {
                tracing::debug!(target: "runtime", "quit");
                return Ok(());
            }

            app.handle_output(&mut self.out)?;
            self.out.flush_stdout()?;

            if let Some(rest) = frame_remainder(self.config.frame_interval, frame_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
