//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Config | `~/.config/muwasala/` | `~/Library/Application Support/muwasala/` |
//! | Data | `~/.local/share/muwasala/` | `~/Library/Application Support/muwasala/` |
//!
//! `MUWASALA_CONFIG_DIR` and `MUWASALA_DATA_DIR` override either root.

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("MUWASALA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("muwasala"))
        .unwrap_or_else(|| PathBuf::from("/tmp/muwasala-config"))
}

/// Application data directory, home of the search history.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("MUWASALA_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("muwasala"))
        .unwrap_or_else(|| PathBuf::from("/tmp/muwasala-data"))
}

/// Default search history file (`data_dir()/history.jsonl`).
#[must_use]
pub fn history_file() -> PathBuf {
    data_dir().join("history.jsonl")
}
