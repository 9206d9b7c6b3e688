//! Configuration management
//!
//! Loads the YAML application config: which MIDI ports to attach to,
//! where the mapping CSVs live, and which bank to start in.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    /// Directory holding the mapping CSV files
    #[serde(default = "default_mappings_dir")]
    pub mappings_dir: PathBuf,
    /// Bank activated at startup
    #[serde(default = "default_initial_bank")]
    pub initial_bank: u8,
}

/// MIDI port configuration
///
/// Port entries are case-insensitive substring patterns matched against
/// the names the system reports, so `"nanoKONTROL"` finds
/// `"nanoKONTROL2 28:0"` regardless of the ALSA suffix.
#[derive(Debug, Clone, Deserialize)]
pub struct MidiConfig {
    /// Input ports to listen on; empty means every available port
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output ports every translated message is sent to; empty means
    /// every available port
    #[serde(default)]
    pub outputs: Vec<String>,
}

fn default_mappings_dir() -> PathBuf {
    PathBuf::from("mappings")
}

fn default_initial_bank() -> u8 {
    1
}

impl AppConfig {
    /// Load and parse the configuration file
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
midi:
  inputs: ["nanoKONTROL"]
  outputs: ["UM-ONE", "Prophet"]
mappings_dir: my-mappings
initial_bank: 3
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.midi.inputs, vec!["nanoKONTROL"]);
        assert_eq!(config.midi.outputs, vec!["UM-ONE", "Prophet"]);
        assert_eq!(config.mappings_dir, PathBuf::from("my-mappings"));
        assert_eq!(config.initial_bank, 3);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
midi:
  inputs: ["pad"]
  outputs: ["synth"]
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.mappings_dir, PathBuf::from("mappings"));
        assert_eq!(config.initial_bank, 1);
    }

    #[test]
    fn test_omitted_ports_mean_all() {
        let config: AppConfig = serde_yaml::from_str("midi: {}\n").unwrap();

        assert!(config.midi.inputs.is_empty());
        assert!(config.midi.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "midi:\n  inputs: [\"pad\"]\n  outputs: [\"synth\"]\ninitial_bank: 2\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();

        assert_eq!(config.midi.inputs, vec!["pad"]);
        assert_eq!(config.initial_bank, 2);
        assert!(AppConfig::load(&dir.path().join("missing.yaml")).await.is_err());
    }
}
