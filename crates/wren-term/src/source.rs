// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Byte sources — where the decoder gets its bytes.
//
// The decoder pulls one byte at a time and must never block: a read that
// finds nothing returns `None`, full stop. Everything that feeds the decoder
// implements [`ByteSource`]:
//
//   StdinSource — the terminal itself. Raw mode is configured with VMIN=0
//   and VTIME=0, so `read()` on stdin returns immediately with 0 bytes when
//   nothing is queued. `poll()` with a zero timeout answers "is anything
//   there", and FIONREAD answers "how much".
//
//   ByteQueue — an in-memory FIFO. The main loop drains each burst from the
//   terminal into one of these before decoding (see `event_loop`), and the
//   tests use it to script input.
//
// There is no reader thread. The loop is single-threaded and polls once per
// frame; the only thing that happens asynchronously is SIGWINCH.

use std::collections::VecDeque;
#[cfg(unix)]
use std::io;

/// A non-blocking source of raw input bytes.
pub trait ByteSource {
    /// Read one byte, or `None` if nothing is available right now.
    fn read_byte(&mut self) -> Option<u8>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Drop every byte that is buffered but not yet read.
    ///
    /// Called by the decoder after an unrecognized escape sequence so the
    /// next read starts on a fresh sequence boundary.
    fn discard_pending(&mut self);
}

// ─── ByteQueue ──────────────────────────────────────────────────────────────

/// In-memory byte FIFO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteQueue {
    bytes: VecDeque<u8>,
}

impl ByteQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: VecDeque::new(),
        }
    }

    /// Create a queue holding `bytes`, read front to back.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }

    /// Append bytes to the back of the queue.
    pub fn push(&mut self, bytes: &[u8]) {
        self.bytes.extend(bytes);
    }

    /// Number of queued bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the queue is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `byte` occurs anywhere in the queue.
    #[must_use]
    pub fn contains(&self, byte: u8) -> bool {
        self.bytes.contains(&byte)
    }
}

impl ByteSource for ByteQueue {
    fn read_byte(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    fn available(&mut self) -> usize {
        self.bytes.len()
    }

    fn discard_pending(&mut self) {
        self.bytes.clear();
    }
}

// ─── StdinSource ────────────────────────────────────────────────────────────

/// The terminal's stdin, read without blocking.
///
/// Only meaningful once raw mode is active with `VMIN = 0, VTIME = 0`
/// (see [`Terminal::enter`](crate::terminal::Terminal::enter)); in canonical
/// mode `read()` would wait for a full line.
#[derive(Debug, Default)]
pub struct StdinSource {
    _private: (),
}

impl StdinSource {
    /// Create a source over the process's stdin.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Whether stdin has data right now. `poll()` with a zero timeout.
    #[cfg(unix)]
    fn ready() -> bool {
        let mut pfd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&raw mut pfd, 1, 0) };
        ready > 0 && pfd.revents & libc::POLLIN != 0
    }
}

#[cfg(unix)]
impl ByteSource for StdinSource {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(libc::STDIN_FILENO, (&raw mut byte).cast(), 1) };
        if n == 1 {
            Some(byte)
        } else {
            // 0 = nothing queued (VMIN=0), -1 = EAGAIN/EINTR. Both mean "no data".
            if n < 0 {
                tracing::trace!(target: "input", error = %io::Error::last_os_error(), "read_failed");
            }
            None
        }
    }

    fn available(&mut self) -> usize {
        if !Self::ready() {
            return 0;
        }
        let mut count: libc::c_int = 0;
        let rc = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::FIONREAD, &raw mut count) };
        if rc != 0 {
            // poll() said readable but the count is unknown; at least one byte.
            return 1;
        }
        usize::try_from(count).unwrap_or(0)
    }

    fn discard_pending(&mut self) {
        unsafe {
            let _ = libc::tcflush(libc::STDIN_FILENO, libc::TCIFLUSH);
        }
    }
}

#[cfg(not(unix))]
impl ByteSource for StdinSource {
    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn available(&mut self) -> usize {
        0
    }

    fn discard_pending(&mut self) {}
}

// ─── Tests ───────────────────────────────────────────────────────────────────
