// SPDX-License-Identifier: MIT
//
// Keysym decoder.
//
// Turns raw stdin bytes into key events, pulling one byte at a time from a
// `ByteSource`. It recognizes exactly three shapes of input:
//
// - ASCII bytes, delivered as-is (`Key::Plain`)
// - UTF-8 multi-byte characters (`Key::Multibyte`)
// - a small set of CSI / SS3 cursor-key sequences (`Key::Special`)
//
// # Design
//
// There is no lookahead and no internal byte buffer. Every decode call reads
// just enough bytes to finish one key, and a read that finds nothing ends
// the attempt with "no event". The only state carried between calls is a
// single flag: an ESC byte that arrived with nothing behind it. Whether it
// is the Escape key or the start of a sequence split across two reads can't
// be known yet, so it is held. The next call resumes the sequence; if a
// whole tick passes with no input, the main loop calls
// [`Decoder::flush_pending`] and it becomes a real Escape keypress.
//
// Anything unrecognized after ESC discards the source's buffered input.
// Terminals we don't know about may send sequences of arbitrary length;
// dropping the rest of the burst is the only way to be sure the next byte
// read is the start of something.

use std::fmt;

use crate::source::ByteSource;

/// The escape byte that starts every terminal control sequence.
pub const ESC: u8 = 0x1B;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A single byte: printable ASCII or a control character.
    Plain(u8),
    /// One UTF-8 encoded character of 2 to 4 bytes.
    Multibyte(Utf8Seq),
    /// A named key decoded from an escape sequence.
    Special(SpecialKey),
}

impl Key {
    /// The key's raw bytes, if it is text (`Plain` or `Multibyte`).
    #[must_use]
    pub fn text_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Plain(b) => Some(std::slice::from_ref(b)),
            Self::Multibyte(seq) => Some(seq.as_bytes()),
            Self::Special(_) => None,
        }
    }

    /// True for the Ctrl+letter byte of `letter` (`ctrl(b'q')` is 0x11).
    #[must_use]
    pub const fn is_ctrl(&self, letter: u8) -> bool {
        matches!(self, Self::Plain(b) if *b == letter & 0x1F)
    }
}

/// Named keys produced by escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    PageUp,
    PageDown,
    Escape,
}

/// The bytes of one multi-byte UTF-8 character.
///
/// Stored inline (no allocation); `len` is 2, 3 or 4.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Utf8Seq {
    bytes: [u8; 4],
    len: u8,
}

impl Utf8Seq {
    /// Build from a 2–4 byte slice. Returns `None` for any other length.
    #[must_use]
    pub fn from_slice(src: &[u8]) -> Option<Self> {
        if !(2..=4).contains(&src.len()) {
            return None;
        }
        let mut bytes = [0u8; 4];
        bytes[..src.len()].copy_from_slice(src);
        #[allow(clippy::cast_possible_truncation)] // 2..=4 checked above.
        let len = src.len() as u8;
        Some(Self { bytes, len })
    }

    /// The encoded bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of bytes in the sequence.
    #[inline]
    #[must_use]
    #[allow(clippy::len_without_is_empty)] // Never empty.
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// The decoded character, if the bytes are valid UTF-8.
    #[must_use]
    pub fn to_char(&self) -> Option<char> {
        std::str::from_utf8(self.as_bytes())
            .ok()
            .and_then(|s| s.chars().next())
    }
}

impl fmt::Debug for Utf8Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(ch) => write!(f, "Utf8Seq({ch:?})"),
            None => write!(f, "Utf8Seq({:02x?})", self.as_bytes()),
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Pull-based keysym decoder.
///
/// # Example
///
/// ```
/// use wren_term::input::{Decoder, Key, SpecialKey};
/// use wren_term::source::ByteQueue;
///
/// let mut src = ByteQueue::from_bytes(b"\x1b[A");
/// let mut decoder = Decoder::new();
/// assert_eq!(decoder.decode(&mut src), Some(Key::Special(SpecialKey::Up)));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoder {
    /// An ESC byte was read but its follow-up byte wasn't there yet.
    pending_escape: bool,
}

impl Decoder {
    /// Create a decoder with no pending state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending_escape: false,
        }
    }

    /// Is a lone ESC waiting for its next byte?
    #[inline]
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending_escape
    }

    /// Resolve a held ESC as the Escape key.
    ///
    /// Call when a tick passes with no input: the sequence is not coming.
    pub const fn flush_pending(&mut self) -> Option<Key> {
        if self.pending_escape {
            self.pending_escape = false;
            Some(Key::Special(SpecialKey::Escape))
        } else {
            None
        }
    }

    /// Decode at most one key from `src`.
    ///
    /// Returns `None` when input is absent, incomplete or malformed. Never
    /// blocks and never errors.
    pub fn decode(&mut self, src: &mut impl ByteSource) -> Option<Key> {
        if self.pending_escape {
            self.pending_escape = false;
            return self.decode_escape(src);
        }

        let lead = src.read_byte()?;
        if lead == ESC {
            return self.decode_escape(src);
        }

        match utf8_char_len(lead) {
            0 => {
                tracing::trace!(target: "input", byte = lead, "stray_continuation_byte");
                None
            }
            1 => Some(Key::Plain(lead)),
            len => decode_multibyte(src, lead, len),
        }
    }

    /// ESC has been consumed; decode what follows it.
    fn decode_escape(&mut self, src: &mut impl ByteSource) -> Option<Key> {
        let Some(second) = src.read_byte() else {
            self.pending_escape = true;
            return None;
        };

        match second {
            b'[' => decode_csi(src),
            b'O' => decode_ss3(src),
            other => discard(src, &[ESC, other]),
        }
    }
}

// ─── Sequence Decoding ──────────────────────────────────────────────────────

/// `ESC [` has been consumed.
fn decode_csi(src: &mut impl ByteSource) -> Option<Key> {
    let third = src.read_byte()?;
    let key = match third {
        b'A' => SpecialKey::Up,
        b'B' => SpecialKey::Down,
        b'C' => SpecialKey::Right,
        b'D' => SpecialKey::Left,
        b'H' => SpecialKey::Home,
        b'F' => SpecialKey::End,
        b'3' | b'5' | b'6' => {
            let fourth = src.read_byte()?;
            if fourth != b'~' {
                return discard(src, &[ESC, b'[', third, fourth]);
            }
            match third {
                b'3' => SpecialKey::Delete,
                b'5' => SpecialKey::PageUp,
                _ => SpecialKey::PageDown,
            }
        }
        other => return discard(src, &[ESC, b'[', other]),
    };
    Some(Key::Special(key))
}

/// `ESC O` has been consumed. Application cursor mode sends these.
fn decode_ss3(src: &mut impl ByteSource) -> Option<Key> {
    let third = src.read_byte()?;
    let key = match third {
        b'A' => SpecialKey::Up,
        b'B' => SpecialKey::Down,
        b'C' => SpecialKey::Right,
        b'D' => SpecialKey::Left,
        b'H' => SpecialKey::Home,
        b'F' => SpecialKey::End,
        other => return discard(src, &[ESC, b'O', other]),
    };
    Some(Key::Special(key))
}

/// Read the continuation bytes of a `len`-byte UTF-8 character.
fn decode_multibyte(src: &mut impl ByteSource, lead: u8, len: usize) -> Option<Key> {
    let mut buf = [lead, 0, 0, 0];
    for slot in &mut buf[1..len] {
        let Some(b) = src.read_byte() else {
            tracing::trace!(target: "input", lead, len, "truncated_multibyte");
            return None;
        };
        if b & 0xC0 != 0x80 {
            tracing::trace!(target: "input", lead, byte = b, "invalid_continuation");
            return None;
        }
        *slot = b;
    }
    Utf8Seq::from_slice(&buf[..len]).map(Key::Multibyte)
}

/// Drop an unrecognized sequence and everything still buffered behind it.
fn discard(src: &mut impl ByteSource, seen: &[u8]) -> Option<Key> {
    tracing::debug!(target: "input", sequence = ?seen, "unknown_escape_sequence");
    src.discard_pending();
    None
}

/// Total byte length of a UTF-8 character from its lead byte.
///
/// Returns 0 for bytes that cannot start a character (continuation bytes
/// 0x80–0xBF and the never-valid 0xF8–0xFF).
#[must_use]
pub const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
