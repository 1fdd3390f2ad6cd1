//! Waybill configuration.
//!
//! Loaded from `~/.waybill/config.toml`. Every field has a default, so a
//! missing file is a valid empty configuration. The status thresholds are
//! deliberately configuration, not engine invariants: they drive dashboard
//! wording only, never automated action.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Waybill configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Default courier identity, used when `--as` and `WAYBILL_IDENTITY`
    /// are absent.
    pub identity: Option<String>,

    /// Smallest quantity a collection point accepts.
    pub min_quantity: u32,

    /// Largest quantity a collection point accepts.
    pub max_quantity: u32,

    /// Longest comment, in characters, anywhere in the workflow.
    pub max_comment_chars: usize,

    /// Most photos a single lab summary accepts.
    pub max_lab_photos: usize,

    /// Sessions with an event this recent classify as active.
    pub active_window_hours: u32,

    /// Sessions quiet longer than the active window but within this
    /// window classify as paused.
    pub paused_window_hours: u32,

    /// Stale sessions past this completion ratio still classify as paused
    /// ("abandoned near the end") rather than inactive.
    pub near_done_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: None,
            min_quantity: 0,
            max_quantity: 100,
            max_comment_chars: 500,
            max_lab_photos: 10,
            active_window_hours: 2,
            paused_window_hours: 24,
            near_done_ratio: 0.8,
        }
    }
}

impl Config {
    /// Load config from the given path, or defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.waybill/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".waybill").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.max_quantity, 100);
        assert_eq!(config.max_comment_chars, 500);
        assert_eq!(config.active_window_hours, 2);
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "identity = \"vera\"\nmax-quantity = 40\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.identity.as_deref(), Some("vera"));
        assert_eq!(config.max_quantity, 40);
        assert_eq!(config.paused_window_hours, 24);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max-quantity = \"lots\"").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
