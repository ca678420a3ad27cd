//! Editor configuration — `wren.toml`.
//!
//! Every key is optional; a missing key takes its default, and unknown keys
//! are ignored so older binaries accept newer files.
//!
//! ```toml
//! show_line_numbers = true
//! debug_multibyte = false
//! tab_width = 4
//! clipboard_threshold = 3
//! frame_rate = 60
//! ```
//!
//! Lookup order: an explicit `--config` path, then `./wren.toml`, then
//! `<config dir>/wren/wren.toml`. When none exists the defaults apply. A
//! file that exists but cannot be read or parsed is an error; the binary
//! reports it and carries on with the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// File name searched for in the working and config directories.
pub const FILE_NAME: &str = "wren.toml";

/// Settings read once at startup. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Draw the line-number gutter.
    pub show_line_numbers: bool,
    /// Mark lines holding multi-byte characters with `*` in the gutter.
    pub debug_multibyte: bool,
    /// Spaces inserted by a typed Tab.
    pub tab_width: usize,
    /// Bursts of at least this many bytes are treated as pasted.
    pub clipboard_threshold: usize,
    /// Frames per second the main loop paces itself to.
    pub frame_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_line_numbers: true,
            debug_multibyte: false,
            tab_width: 4,
            clipboard_threshold: 3,
            frame_rate: 60,
        }
    }
}

impl Config {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or mistyped values.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_err = |source: Box<dyn std::error::Error + Send + Sync>| Error::Config {
            path: path.to_path_buf(),
            source,
        };
        let text = fs::read_to_string(path).map_err(|e| config_err(e.into()))?;
        let config = Self::from_toml_str(&text).map_err(|e| config_err(e.into()))?;
        tracing::info!(target: "config", path = %path.display(), "loaded");
        Ok(config)
    }

    /// Find and load the configuration. Returns the defaults and `None` when
    /// no file was found, otherwise the parsed file and its path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the chosen file cannot be read or parsed,
    /// including an `explicit` path that does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let config_dir = dirs::config_dir();
        match discover(explicit, Path::new("."), config_dir.as_deref()) {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => {
                tracing::debug!(target: "config", "no config file, using defaults");
                Ok((Self::default(), None))
            }
        }
    }
}

/// The file [`Config::load`] would read: `explicit` if given, otherwise the
/// first of `cwd/wren.toml` and `config_dir/wren/wren.toml` that exists.
#[must_use]
pub fn discover(explicit: Option<&Path>, cwd: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = cwd.join(FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir
        .map(|dir| dir.join("wren").join(FILE_NAME))
        .filter(|path| path.is_file())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert!(c.show_line_numbers);
        assert!(!c.debug_multibyte);
        assert_eq!(c.tab_width, 4);
        assert_eq!(c.clipboard_threshold, 3);
        assert_eq!(c.frame_rate, 60);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = Config::from_toml_str("show_line_numbers = false\ntab_width = 2\n").unwrap();
        assert_eq!(
            c,
            Config {
                show_line_numbers: false,
                tab_width: 2,
                ..Config::default()
            }
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let c = Config::from_toml_str("theme = \"dark\"\nframe_rate = 30\n").unwrap();
        assert_eq!(c.frame_rate, 30);
    }

    #[test]
    fn mistyped_value_is_an_error() {
        assert!(Config::from_toml_str("tab_width = \"wide\"").is_err());
    }

    // -- Loading ------------------------------------------------------------

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "debug_multibyte = true\n").unwrap();
        assert!(Config::load_from(&path).unwrap().debug_multibyte);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "show_line_numbers = = true").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(&err, Error::Config { path: p, .. } if *p == path));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(Config::load(Some(&path)), Err(Error::Config { .. })));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "clipboard_threshold = 8\n").unwrap();
        let (config, found) = Config::load(Some(&path)).unwrap();
        assert_eq!(config.clipboard_threshold, 8);
        assert_eq!(found, Some(path));
    }

    // -- Discovery ----------------------------------------------------------

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), "").unwrap();
        let explicit = Path::new("/somewhere/else.toml");
        assert_eq!(
            discover(Some(explicit), dir.path(), None),
            Some(explicit.to_path_buf())
        );
    }

    #[test]
    fn working_directory_before_config_dir() {
        let cwd = tempfile::tempdir().unwrap();
        let cfg = tempfile::tempdir().unwrap();
        fs::write(cwd.path().join(FILE_NAME), "").unwrap();
        fs::create_dir_all(cfg.path().join("wren")).unwrap();
        fs::write(cfg.path().join("wren").join(FILE_NAME), "").unwrap();

        assert_eq!(
            discover(None, cwd.path(), Some(cfg.path())),
            Some(cwd.path().join(FILE_NAME))
        );
    }

    #[test]
    fn falls_back_to_config_dir() {
        let cwd = tempfile::tempdir().unwrap();
        let cfg = tempfile::tempdir().unwrap();
        fs::create_dir_all(cfg.path().join("wren")).unwrap();
        fs::write(cfg.path().join("wren").join(FILE_NAME), "").unwrap();

        assert_eq!(
            discover(None, cwd.path(), Some(cfg.path())),
            Some(cfg.path().join("wren").join(FILE_NAME))
        );
    }

    #[test]
    fn nothing_found() {
        let cwd = tempfile::tempdir().unwrap();
        let cfg = tempfile::tempdir().unwrap();
        assert_eq!(discover(None, cwd.path(), Some(cfg.path())), None);
        assert_eq!(discover(None, cwd.path(), None), None);
    }
}
