use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub binary: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Regex sources for each recognised line of scanner output.
#[derive(Debug, Deserialize, Clone)]
pub struct GrammarConfig {
    pub start: String,
    pub progress: String,
    pub empty_progress: String,
    pub finished: String,
    pub summary: String,
    pub interrupted: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub checkpoint_path: PathBuf,
    pub grammar: GrammarConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

const DEFAULT_CONFIG: &[u8] = include_bytes!("../config/default.yml");

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)?
    } else {
        DEFAULT_CONFIG.to_vec()
    };

    let config: Config = serde_yaml::from_slice(&bytes)?;
    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}
