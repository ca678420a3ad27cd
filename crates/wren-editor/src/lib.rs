//! # wren-editor — Editor core for wren
//!
//! The pieces between decoded keys and bytes on the screen:
//!
//! - **[`buffer`]** — `Buffer` wrapping a rope with cursor, scroll, selection,
//!   editing, and file I/O
//! - **[`mode`]** — the four modes and the static handler table that drives
//!   transitions
//! - **[`command`]** — the prompt line and the single command session behind it
//! - **[`search`]** — regex find and replace over a buffer
//! - **[`render`]** — the frame renderer: gutter, text rows, selection, status
//! - **[`config`]** — `wren.toml`
//!
//! The terminal side (raw mode, key decoding, the main loop) lives in
//! `wren-term`; this crate only writes into its `OutputBuffer`.

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod mode;
pub mod render;
pub mod search;

pub use error::{Error, Result};
