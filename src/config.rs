// Configuration management for the corpus builder

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::available_workers;

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one sub-folder of .mid files per composer
    #[serde(default = "default_base_directory")]
    pub base_directory: PathBuf,

    /// Composer folder names to include. Always processed in sorted order.
    #[serde(default = "default_composers")]
    pub composers: Vec<String>,

    /// Number of parallel workers. Defaults to the available CPU parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Where the merged corpus is written
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            composers: default_composers(),
            workers: None,
            output_path: default_output_path(),
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => {
                    match toml::from_str(&contents) {
                        Ok(config) => return config,
                        Err(e) => {
                            log::warn!("Failed to parse config: {}", e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// Worker count to build the pool with
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(available_workers)
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("midi-corpus")
        .join("config.toml")
}

fn default_base_directory() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_composers() -> Vec<String> {
    ["alkan", "handel", "mozart", "scarlatti", "schubert", "victoria"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("midi_data_all.json")
}
