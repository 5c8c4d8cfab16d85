//! Engine configuration.
//!
//! ```toml
//! toggle_debounce_ms = 200
//! trigger_threshold = 0.5
//! definition_dirs = ["devices"]
//! preferred_types = ["Warthog", "TestPad"]
//! ```
//!
//! Every key is optional. Unlike definition files, a bad config is an error:
//! it is loaded once, by the host, before anything is bound.

use crate::catalog::DeviceCatalog;
use crate::error::ConfigError;
use crate::toggle::TOGGLE_DEBOUNCE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Trigger results strictly above this fire.
pub const TRIGGER_THRESHOLD: f32 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Minimum time between two toggle-button advances.
    pub toggle_debounce_ms: u64,
    /// Trigger edge threshold.
    pub trigger_threshold: f32,
    /// Directories scanned for `*.toml` / `*.json` definition files.
    pub definition_dirs: Vec<PathBuf>,
    /// Type names tried by [`Manager::bind_preferred`](crate::manager::Manager::bind_preferred).
    pub preferred_types: Vec<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            toggle_debounce_ms: TOGGLE_DEBOUNCE.as_millis() as u64,
            trigger_threshold: TRIGGER_THRESHOLD,
            definition_dirs: vec![PathBuf::from("devices")],
            preferred_types: Vec::new(),
        }
    }
}

impl MapperConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded mapper config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.trigger_threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "trigger_threshold must be finite, got {}",
                self.trigger_threshold
            )));
        }
        Ok(())
    }

    pub fn toggle_debounce(&self) -> Duration {
        Duration::from_millis(self.toggle_debounce_ms)
    }

    /// Build a catalog from every configured definition directory.
    ///
    /// Missing or unreadable directories are logged and skipped.
    pub fn load_catalog(&self) -> DeviceCatalog {
        let mut catalog = DeviceCatalog::new();
        for dir in &self.definition_dirs {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "definition directory not found");
                continue;
            }
            if let Err(e) = catalog.load_dir(dir) {
                warn!(dir = %dir.display(), error = %e, "failed to load definition directory");
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MapperConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, MapperConfig::default());
        assert_eq!(config.toggle_debounce(), Duration::from_millis(200));
        assert_eq!(config.trigger_threshold, 0.5);
    }

    #[test]
    fn overrides() {
        let config = MapperConfig::from_toml_str(
            r#"
            toggle_debounce_ms = 50
            trigger_threshold = 0.25
            definition_dirs = ["a", "b"]
            preferred_types = ["TestPad"]
            "#,
        )
        .expect("valid config");
        assert_eq!(config.toggle_debounce(), Duration::from_millis(50));
        assert_eq!(config.definition_dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(config.preferred_types, vec!["TestPad".to_string()]);
    }

    #[test]
    fn rejects_bad_config() {
        assert!(matches!(
            MapperConfig::from_toml_str("toggle_debounce_ms = -1"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            MapperConfig::from_toml_str("unknown_key = 1"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            MapperConfig::from_toml_str("trigger_threshold = nan"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn loads_catalog_from_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("pad.toml"),
            "[[device]]\nname = \"Pad\"\n[[device.identify]]\nslot = 0\npatterns = [\"Pad*\"]\n",
        )
        .expect("write definition");

        let config = MapperConfig {
            definition_dirs: vec![dir.path().to_path_buf(), dir.path().join("missing")],
            ..MapperConfig::default()
        };
        let catalog = config.load_catalog();
        assert!(catalog.contains("Pad"));
        assert_eq!(catalog.len(), 1);
    }
}
