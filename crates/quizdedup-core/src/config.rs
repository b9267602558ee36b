use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::KeywordClassifier;
use crate::error::{QuizError, Result};
use crate::finder::{DEFAULT_DETECTION_THRESHOLD, DEFAULT_VERIFICATION_THRESHOLD};

/// Root configuration, loaded from `~/.config/quizdedup/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dedup: DedupConfig,
    pub normalize: NormalizeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Defaults to `<stem>_backup.json` next to `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub detection_threshold: f64,
    pub verification_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolutions_path: Option<PathBuf>,
    /// How many pairs listings show before truncating.
    pub listing_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub max_options: usize,
    pub default_category: String,
    pub classifier: KeywordClassifier,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quiz_database.json"),
            backup_path: None,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            verification_threshold: DEFAULT_VERIFICATION_THRESHOLD,
            resolutions_path: None,
            listing_limit: 10,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_options: 4,
            default_category: "Farmacologia".to_string(),
            classifier: KeywordClassifier::default(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/quizdedup/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("QUIZDEDUP_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("quizdedup")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("detection_threshold", self.dedup.detection_threshold),
            ("verification_threshold", self.dedup.verification_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(QuizError::Validation(format!(
                    "{name} must be within 0..=100, got {value}"
                )));
            }
        }
        if self.normalize.max_options == 0 {
            return Err(QuizError::Validation(
                "max_options must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn database_path(&self) -> &Path {
        &self.database.path
    }

    pub fn set_database_path(&mut self, path: PathBuf) {
        self.database.path = path;
    }

    /// Backup location: the configured one, or `<stem>_backup.json`
    /// beside the database file.
    pub fn backup_path(&self) -> PathBuf {
        if let Some(path) = &self.database.backup_path {
            return path.clone();
        }
        default_backup_path(&self.database.path)
    }
}

pub fn default_backup_path(database: &Path) -> PathBuf {
    let stem = database
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "quiz_database".to_string());
    database.with_file_name(format!("{stem}_backup.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.dedup.detection_threshold, 80.0);
        assert_eq!(cfg.dedup.verification_threshold, 85.0);
        assert_eq!(cfg.normalize.max_options, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.dedup.resolutions_path = Some(PathBuf::from("resolutions.toml"));
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dedup]\ndetection_threshold = 75.0\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.dedup.detection_threshold, 75.0);
        assert_eq!(loaded.dedup.verification_threshold, 85.0);
        assert_eq!(loaded.normalize.default_category, "Farmacologia");
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dedup]\nverification_threshold = 185.0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(QuizError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_max_options_is_invalid_input() {
        let mut cfg = AppConfig::default();
        cfg.normalize.max_options = 0;

        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));
        assert_eq!(err.exit_code(), crate::error::ExitCode::InvalidInput);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_quizdedup_config.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_backup_path_defaults_next_to_database() {
        let mut cfg = AppConfig::default();
        cfg.set_database_path(PathBuf::from("/data/quiz_database.json"));
        assert_eq!(cfg.backup_path(), PathBuf::from("/data/quiz_database_backup.json"));

        cfg.database.backup_path = Some(PathBuf::from("/tmp/b.json"));
        assert_eq!(cfg.backup_path(), PathBuf::from("/tmp/b.json"));
    }
}
