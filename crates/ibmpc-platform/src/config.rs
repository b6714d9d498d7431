use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChipsetError, Result};

/// How port 0x61 drives the PC speaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerMode {
    /// Gate/data writes are recorded but never reach the audio backend.
    Off,
    /// Gate/data writes are forwarded to the [`crate::Speaker`] backend.
    #[default]
    Emulated,
}

/// Runtime knobs for a [`crate::Chipset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChipsetConfig {
    /// Host ticks a guest may keep interrupts disabled before IF is forced back on. 0 disables
    /// the watchdog.
    pub cli_timeout: u32,
    pub speaker: SpeakerMode,
    /// PIT ticks the scheduler may fall behind before the host is kept from idling.
    pub flood_threshold: u64,
    /// Tone duration handed to the speaker backend for a gated tone, in milliseconds.
    pub speaker_duration_ms: u32,
}

impl Default for ChipsetConfig {
    fn default() -> Self {
        Self {
            cli_timeout: 10,
            speaker: SpeakerMode::Emulated,
            flood_threshold: 50_000,
            speaker_duration_ms: 30_000,
        }
    }
}

impl ChipsetConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ChipsetError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flood_threshold == 0 {
            return Err(ChipsetError::InvalidConfig(
                "flood_threshold must be non-zero".into(),
            ));
        }
        if self.speaker_duration_ms == 0 {
            return Err(ChipsetError::InvalidConfig(
                "speaker_duration_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ChipsetConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ChipsetConfig::default());
        assert_eq!(config.cli_timeout, 10);
        assert_eq!(config.flood_threshold, 50_000);
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            ChipsetConfig::from_json_str(r#"{"cli_timeout": 0, "speaker": "off"}"#).unwrap();
        assert_eq!(config.cli_timeout, 0);
        assert_eq!(config.speaker, SpeakerMode::Off);
        assert_eq!(config.speaker_duration_ms, 30_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ChipsetConfig::from_json_str(r#"{"cli_timeot": 3}"#).unwrap_err();
        assert!(matches!(err, ChipsetError::ConfigParse(_)), "{err}");
    }

    #[test]
    fn zero_flood_threshold_is_invalid() {
        let err = ChipsetConfig::from_json_str(r#"{"flood_threshold": 0}"#).unwrap_err();
        assert!(matches!(err, ChipsetError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ChipsetConfig::load("/nonexistent/ibmpc.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ibmpc.json"), "{err}");
    }
}
