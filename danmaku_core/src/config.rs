use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::{ProbeConfig, ProbeSet};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{field}` is not a valid pattern: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Runtime switches for which speakers get subtitles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub show_friendly: bool,
    pub show_hostile: bool,
    /// Subtitle the local observer's own voice lines.
    pub show_self: bool,
    /// Voice lines between stale-entry sweeps; 0 disables sweeping.
    pub purge_interval: u32,
    pub probes: ProbeConfig,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            show_friendly: true,
            show_hostile: true,
            show_self: false,
            purge_interval: 32,
            probes: ProbeConfig::default(),
        }
    }
}

impl SubtitleConfig {
    /// Loads a config file. `None` or a path that does not exist yields the
    /// defaults.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::debug!("config {} not found; using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: SubtitleConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config json: {}", path.display()))?;
        config
            .probe_set()
            .with_context(|| format!("invalid probe settings in {}", path.display()))?;
        Ok(config)
    }

    pub fn probe_set(&self) -> Result<ProbeSet, ConfigError> {
        ProbeSet::from_config(&self.probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = SubtitleConfig::from_json_file(Some(&dir.path().join("absent.json")))?;
        assert_eq!(config, SubtitleConfig::default());
        assert_eq!(SubtitleConfig::from_json_file(None)?, SubtitleConfig::default());
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "show_hostile": false, "probes": { "speaker_accessors": ["Mouth"] } }"#,
        )?;

        let config = SubtitleConfig::from_json_file(Some(&path))?;
        assert!(!config.show_hostile);
        assert!(config.show_friendly);
        assert_eq!(config.probes.speaker_accessors, vec!["Mouth".to_string()]);
        assert_eq!(config.probes.max_profile_depth, 3);
        Ok(())
    }

    #[test]
    fn bad_pattern_is_rejected_with_context() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "probes": { "profile_containers": "[" } }"#)?;

        let err = SubtitleConfig::from_json_file(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("invalid probe settings"));
        Ok(())
    }
}
