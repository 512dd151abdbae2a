use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "SketchDeck";

/// Paths and tunables, resolved once at startup and handed to each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sessions_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub library_path: PathBuf,
    /// Edge of the square shape thumbnails, in pixels
    pub thumbnail_size: u32,
    /// Newly placed images are fitted into a square of this size
    pub max_image_extent: f32,
    pub auto_save_interval_secs: u64,
    pub autosave_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = dirs::document_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self::with_base_dir(base)
    }
}

impl AppConfig {
    /// Every path below `base`.
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            sessions_dir: base.join("sessions"),
            cache_dir: base.join("image_cache"),
            library_path: base.join("shape_library").join("library.json"),
            thumbnail_size: 64,
            max_image_extent: 250.0,
            auto_save_interval_secs: 300,
            autosave_file_name: "auto_save.sdm".to_string(),
        }
    }

    /// Read a TOML or JSON config. Whichever format the extension suggests is
    /// tried first. Missing or unreadable files give the defaults.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        };
        let is_toml = path.extension().is_some_and(|e| e == "toml");
        let parsed = if is_toml {
            toml::from_str::<AppConfig>(&text)
                .ok()
                .or_else(|| serde_json::from_str::<AppConfig>(&text).ok())
        } else {
            serde_json::from_str::<AppConfig>(&text)
                .ok()
                .or_else(|| toml::from_str::<AppConfig>(&text).ok())
        };
        parsed.unwrap_or_else(|| {
            log::warn!("Config {} is not valid TOML or JSON, using defaults", path.display());
            Self::default()
        })
    }

    pub fn autosave_path(&self) -> PathBuf {
        self.sessions_dir.join(&self.autosave_file_name)
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_base_dir() {
        let config = AppConfig::with_base_dir("/data");
        assert_eq!(config.autosave_path(), PathBuf::from("/data/sessions/auto_save.sdm"));
        assert_eq!(config.thumbnail_size, 64);
    }

    #[test]
    fn test_toml_overrides_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketchdeck.toml");
        std::fs::write(&path, "thumbnail_size = 96\nauto_save_interval_secs = 60\n").unwrap();
        let config = AppConfig::load(&path);
        assert_eq!(config.thumbnail_size, 96);
        assert_eq!(config.auto_save_interval(), Duration::from_secs(60));
        assert_eq!(config.autosave_file_name, "auto_save.sdm");
    }

    #[test]
    fn test_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketchdeck.json");
        std::fs::write(&path, r#"{"max_image_extent": 400.0}"#).unwrap();
        assert_eq!(AppConfig::load(&path).max_image_extent, 400.0);
    }
}
