// SPDX-License-Identifier: MIT
//
// Frame output staging.
//
// A frame (cursor moves, erase and invert sequences, row text) is staged in
// an `OutputBuffer` and handed to the terminal in one write at the end of
// the loop iteration. An idle frame stages nothing and writes nothing.

use std::io::{self, Write};

/// Initial capacity: a full 80x24 screen with escapes fits several times.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Bytes staged for the next terminal write.
#[derive(Debug)]
pub struct OutputBuffer {
    staged: Vec<u8>,
}

impl OutputBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            staged: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Number of staged bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// The staged bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.staged
    }

    /// Drop everything staged, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.staged.clear();
    }

    /// Send the staged bytes to stdout in one write.
    ///
    /// # Errors
    ///
    /// Returns the error from writing or flushing stdout. The staged bytes
    /// are kept in that case.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        self.flush_to(&mut io::stdout().lock())
    }

    /// Send the staged bytes to `w` in one write and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns the error from writing or flushing `w`. The staged bytes are
    /// kept in that case.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        w.write_all(&self.staged)?;
        w.flush()?;
        tracing::trace!(target: "render", bytes = self.staged.len(), "flush");
        self.staged.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Staging only; the terminal sees nothing until [`OutputBuffer::flush_to`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A writer that always fails.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stages_escapes_and_text() {
        let mut out = OutputBuffer::new();
        out.write_all(b"\x1b[1;1H").unwrap();
        write!(out, "{:>3}", 7).unwrap();
        assert_eq!(out.as_bytes(), b"\x1b[1;1H  7");
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn flush_moves_everything_and_clears() {
        let mut out = OutputBuffer::new();
        out.write_all(b"frame").unwrap();
        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"frame");
        assert!(out.is_empty());
    }

    #[test]
    fn idle_frame_writes_nothing() {
        let mut out = OutputBuffer::new();
        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn failed_flush_keeps_frame() {
        let mut out = OutputBuffer::new();
        out.write_all(b"frame").unwrap();
        assert!(out.flush_to(&mut Broken).is_err());
        assert_eq!(out.as_bytes(), b"frame");
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut out = OutputBuffer::new();
        out.write_all(&[b'x'; 64]).unwrap();
        let cap = out.staged.capacity();
        out.clear();
        assert!(out.is_empty());
        assert_eq!(out.staged.capacity(), cap);
    }
}
