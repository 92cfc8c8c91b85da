//! Configuration file support
//!
//! Loads indexing and logging defaults from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{IndexSettings, LogSettings};
use crate::error::{AppError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Indexing settings
    pub indexing: Option<IndexingSection>,
    /// Logging settings
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingSection {
    /// Bit mask of audio tracks to decode (-1 = all)
    pub track_mask: Option<i64>,
    /// Bit mask of audio tracks to write as Wave64 (-1 = all)
    pub dump_mask: Option<i64>,
    /// abort, clear-track, stop-track or ignore
    pub error_handling: Option<ffindex_lib::ErrorHandling>,
    /// Replace existing index files
    pub overwrite: Option<bool>,
    /// Base name for Wave64 files
    pub audio_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let indexing = IndexSettings::default();
        let logging = LogSettings::default();
        Self {
            indexing: Some(IndexingSection {
                track_mask: Some(indexing.track_mask),
                dump_mask: Some(indexing.dump_mask),
                error_handling: Some(indexing.error_handling),
                overwrite: Some(indexing.overwrite),
                audio_base: None,
            }),
            logging: Some(LoggingSection {
                level: Some(logging.level),
                format: Some(logging.format),
            }),
        }
    }

    /// Indexing settings with defaults for anything not in the file
    pub fn index_settings(&self) -> IndexSettings {
        let defaults = IndexSettings::default();
        let section = self.indexing.clone().unwrap_or_default();
        IndexSettings {
            track_mask: section.track_mask.unwrap_or(defaults.track_mask),
            dump_mask: section.dump_mask.unwrap_or(defaults.dump_mask),
            error_handling: section.error_handling.unwrap_or(defaults.error_handling),
            overwrite: section.overwrite.unwrap_or(defaults.overwrite),
            audio_base: section.audio_base.or(defaults.audio_base),
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        let defaults = LogSettings::default();
        let section = self.logging.clone().unwrap_or_default();
        LogSettings {
            level: section.level.unwrap_or(defaults.level),
            format: section.format.unwrap_or(defaults.format),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffindex_lib::ErrorHandling;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            "[indexing]\ntrack_mask = -1\nerror_handling = \"ignore\"\n\n[logging]\nformat = \"json\"\n"
        )
        .unwrap();

        let config = ConfigFile::from_file(temp_file.path()).unwrap();
        let settings = config.index_settings();
        assert_eq!(settings.track_mask, -1);
        assert_eq!(settings.dump_mask, 0);
        assert_eq!(settings.error_handling, ErrorHandling::Ignore);
        assert!(config.log_settings().json());
        assert_eq!(config.log_settings().level, "warn");
    }

    #[test]
    fn test_generate_default_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        generate_default_config(&path).unwrap();

        let loaded = ConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded.index_settings(), IndexSettings::default());
        assert_eq!(loaded.log_settings(), LogSettings::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_or_default(dir.path().join("none.toml")).unwrap();
        assert_eq!(config.index_settings(), IndexSettings::default());
    }

    #[test]
    fn test_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[indexing]\nerror_handling = \"sometimes\"\n").unwrap();
        let err = ConfigFile::from_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
