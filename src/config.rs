//! TOML configuration loading
//!
//! A configuration file is a `ProfileDefinition` (constants, calibration,
//! mappings, bindings, startup) plus an `[output]` table for the MIDI side.
//! Missing files fall back to the embedded default profile; unparsable ones
//! do too unless the caller asks to abort. Top-level keys other than
//! `[output]` belong to the profile, and unknown ones are parse errors.

use crate::mapping::{LoadError, Profile, ProfileDefinition};
use crate::output::InstrumentSettings;
use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CONFIG_DIR_NAME: &str = "chordcontroller";
pub const CONFIG_FILE_NAME: &str = "ChordController.toml";

/// Profile used when no user configuration is available
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid profile: {0}")]
    Invalid(#[from] LoadError),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputSettings {
    /// Substring of an existing MIDI port; a virtual port is opened when absent
    #[serde(default)]
    pub port_name: Option<String>,
    #[serde(flatten)]
    pub instrument: InstrumentSettings,
}

pub const OUTPUT_TABLE: &str = "output";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub profile: ProfileDefinition,
    pub output: OutputSettings,
}

impl ConfigFile {
    /// Splits `[output]` off and reads the remaining tables as the profile
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut table: toml::Table = toml::from_str(content)?;
        let output = match table.remove(OUTPUT_TABLE) {
            Some(value) => value.try_into()?,
            None => OutputSettings::default(),
        };
        let profile = toml::Value::Table(table).try_into()?;
        Ok(Self { profile, output })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Default => write!(f, "built-in default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub profile: Arc<Profile>,
    pub output: OutputSettings,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn parse(content: &str, source: ConfigSource) -> Result<Self, ConfigError> {
        let file = ConfigFile::from_toml(content)?;
        let profile = Profile::build(&file.profile)?;
        Ok(Self {
            profile: Arc::new(profile),
            output: file.output,
            source,
        })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(DEFAULT_CONFIG, ConfigSource::Default)
    }
}

/// `<config dir>/chordcontroller/ChordController.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads `path`, falling back to the built-in profile when the file is
/// missing or (unless `quit_on_parse_failure`) cannot be parsed.
pub async fn load_or_default(path: &Path, quit_on_parse_failure: bool) -> Result<LoadedConfig> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

    if !exists {
        warn!(
            "Config file {} does not exist, using default",
            path.display()
        );
        return LoadedConfig::builtin().map_err(|e| eyre!("Failed to load default profile: {}", e));
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    match LoadedConfig::parse(&content, ConfigSource::File(path.to_path_buf())) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            debug!(
                "{} chords, {} bindings",
                config.profile.chords().len(),
                config.profile.bindings().len()
            );
            Ok(config)
        }
        Err(e) if quit_on_parse_failure => Err(eyre!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        )),
        Err(e) => {
            warn!(
                "Failed to parse config file {}: {}; using default",
                path.display(),
                e
            );
            LoadedConfig::builtin().map_err(|e| eyre!("Failed to load default profile: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profile_is_valid() {
        let config = LoadedConfig::builtin().unwrap();
        assert_eq!(config.source, ConfigSource::Default);
        assert!(!config.profile.chords().is_empty());
        assert!(!config.profile.bindings().is_empty());
        assert_eq!(config.output.instrument, InstrumentSettings::default());
    }

    #[test]
    fn output_section_is_read() {
        let config = LoadedConfig::parse(
            r#"
            [output]
            port_name = "FLUID"
            channel = 3
            octave = 4
            "#,
            ConfigSource::Default,
        )
        .unwrap();
        assert_eq!(config.output.port_name.as_deref(), Some("FLUID"));
        assert_eq!(config.output.instrument.channel, 3);
        assert_eq!(config.output.instrument.octave, 4);
        assert_eq!(config.output.instrument.velocity, 127);
    }

    #[test]
    fn errors_are_classified() {
        assert!(matches!(
            LoadedConfig::parse("mappings = 3", ConfigSource::Default),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            LoadedConfig::parse(
                "[axis_calibration]\ndefault = { min = 1.0, max = 1.0 }",
                ConfigSource::Default
            ),
            Err(ConfigError::Invalid(LoadError::DegenerateCalibration { .. }))
        ));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let misspelled = [
            "[[mapings]]\nwhen = [ { button = \"BUTTON_A\" } ]",
            "[[mappings]]\nwhen = [ { button = \"BUTTON_A\", presed = false } ]",
            "[[mappings]]\nwhen = [ { button = \"BUTTON_A\" } ]\non_deactvate = []",
            "[[mappings]]\nwhen = [ { hat = \"HAT_DPAD\", direction = \"N\", button = 0 } ]",
        ];
        for text in misspelled {
            assert!(
                matches!(
                    LoadedConfig::parse(text, ConfigSource::Default),
                    Err(ConfigError::Parse(_))
                ),
                "{text} should not parse"
            );
        }

        let file = ConfigFile::from_toml(
            "[output]\nchannel = 2\n\n[[mappings]]\nwhen = [ { button = 0 } ]",
        )
        .unwrap();
        assert_eq!(file.output.instrument.channel, 2);
        assert_eq!(file.profile.mappings.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("chordcontroller-does-not-exist.toml");
        let config = load_or_default(&path, true).await.unwrap();
        assert_eq!(config.source, ConfigSource::Default);
    }

    #[tokio::test]
    async fn parse_failure_respects_quit_flag() {
        let path = std::env::temp_dir().join(format!(
            "chordcontroller-broken-{}.toml",
            std::process::id()
        ));
        tokio::fs::write(&path, "[[mappings]]\nwhen = [ { button = \"BUTTON_NOPE\" } ]")
            .await
            .unwrap();

        assert!(load_or_default(&path, true).await.is_err());
        let fallback = load_or_default(&path, false).await.unwrap();
        assert_eq!(fallback.source, ConfigSource::Default);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
