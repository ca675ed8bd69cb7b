use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facecam_core::detection::domain::face_detector::DetectorVariant;
use facecam_core::shared::constants::{
    DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_MODELS_DIR, DEFAULT_REFRESH_HZ,
};

/// Persisted defaults. Command-line flags override individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera_index: u32,
    pub width: u32,
    pub height: u32,
    pub detector: DetectorVariant,
    pub confidence: f64,
    pub min_face_size: u32,
    pub refresh_hz: u32,
    pub models_dir: PathBuf,
    pub allow_download: bool,
    /// Byte quota for the clip store. `None` is unlimited.
    pub storage_quota: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            detector: DetectorVariant::Yolo,
            confidence: 0.5,
            min_face_size: 0,
            refresh_hz: DEFAULT_REFRESH_HZ,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            allow_download: true,
            storage_quota: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCam").join("settings.json"))
    }

    /// Settings from the user config file, or defaults when it is missing
    /// or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring invalid settings {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "Resolution must be positive, got {}x{}",
                self.width, self.height
            ));
        }
        if !(1..=240).contains(&self.refresh_hz) {
            return Err(format!(
                "Refresh rate must be between 1 and 240 Hz, got {}",
                self.refresh_hz
            ));
        }
        if self.storage_quota == Some(0) {
            return Err("Storage quota must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_from(&tmp.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_json_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();

        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_remaining_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{ "detector": "blazeface", "refresh_hz": 30 }"#).unwrap();

        let settings = Settings::load_from(&path);

        assert_eq!(settings.detector, DetectorVariant::Blazeface);
        assert_eq!(settings.refresh_hz, 30);
        assert_eq!(settings.width, DEFAULT_CAMERA_WIDTH);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("FaceCam").join("settings.json");
        let settings = Settings {
            camera_index: 2,
            storage_quota: Some(5_000_000),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[rstest]
    #[case::confidence_high(Settings { confidence: 1.5, ..Settings::default() })]
    #[case::confidence_negative(Settings { confidence: -0.1, ..Settings::default() })]
    #[case::zero_width(Settings { width: 0, ..Settings::default() })]
    #[case::zero_refresh(Settings { refresh_hz: 0, ..Settings::default() })]
    #[case::zero_quota(Settings { storage_quota: Some(0), ..Settings::default() })]
    fn test_validate_rejects(#[case] settings: Settings) {
        assert!(settings.validate().is_err());
    }
}
