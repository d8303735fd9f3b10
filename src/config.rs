use serde::Deserialize;
use std::path::Path;

use crate::airtime::{DEFAULT_BANDWIDTH_HZ, DEFAULT_CODING_RATE, DEFAULT_PREAMBLE_SYMBOLS};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub radio: RadioDefaults,
    pub logging: LoggingConfig,
}

/// Radio parameters applied when the command line does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RadioDefaults {
    pub bandwidth_hz: u32,
    pub coding_rate: u8,
    pub preamble_symbols: u16,
    pub explicit_header: bool,
    pub crc_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }
}

impl Default for RadioDefaults {
    fn default() -> Self {
        Self {
            bandwidth_hz: DEFAULT_BANDWIDTH_HZ,
            coding_rate: DEFAULT_CODING_RATE,
            preamble_symbols: DEFAULT_PREAMBLE_SYMBOLS,
            explicit_header: true,
            crc_enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
