//! Configuration handling for formvalid

use crate::rules::PasswordPolicy;
use crate::validator::Interaction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Invalid attribute prefix: {0:?}")]
    InvalidPrefix(String),
}

/// Default attribute prefix
pub const DEFAULT_PREFIX: &str = "fv-";

/// Display name used when an input has no display, name or id attribute
pub const DEFAULT_FALLBACK_NAME: &str = "input";

const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Runtime validator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix carried by every marker attribute (e.g. "fv-" for `fv-required`)
    pub prefix: String,
    /// Display name used when an input declares none
    pub fallback_name: String,
    /// Interactions that trigger re-validation
    pub listen_events: Vec<Interaction>,
    /// Password policy applied before per-input overrides
    pub password: PasswordPolicy,
    /// Message template overrides: rule id -> template
    pub messages: HashMap<String, String>,
    /// Quality used when re-encoding to JPEG (1-100)
    pub jpeg_quality: u8,
    /// Decode pending image tasks on the rayon pool
    pub parallel_decode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
            listen_events: Interaction::ALL.to_vec(),
            password: PasswordPolicy::default(),
            messages: HashMap::new(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            parallel_decode: true,
        }
    }
}

/// Programmatic overrides merged on top of a loaded config
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    /// Attribute prefix (replaces config if set)
    pub prefix: Option<String>,
    /// Fallback display name (replaces config if set)
    pub fallback_name: Option<String>,
    /// Message templates (added to config, replacing same rule ids)
    pub messages: HashMap<String, String>,
    /// JPEG quality
    pub jpeg_quality: Option<u8>,
    /// Parallel decoding toggle
    pub parallel_decode: Option<bool>,
}

/// Configuration file format (.formvalidrc.json or .formvalidrc.yaml)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Attribute prefix, "fv-" when absent
    #[serde(default)]
    pub prefix: Option<String>,

    /// Fallback display name
    #[serde(default)]
    pub fallback_name: Option<String>,

    /// Interactions to listen to: ["input", "change", "keyup", "paste", "cut", "compositionend"]
    #[serde(default)]
    pub listen_events: Vec<Interaction>,

    /// Default password policy
    #[serde(default)]
    pub password: Option<PasswordPolicy>,

    /// Message overrides: {"required": "{{name}} cannot be empty"}
    #[serde(default)]
    pub messages: HashMap<String, String>,

    /// JPEG re-encoding quality
    #[serde(default)]
    pub jpeg_quality: Option<u8>,

    /// Decode in parallel (default true)
    #[serde(default)]
    pub parallel_decode: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config_file: ConfigFile = if path.extension().is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Self::from_config_file(config_file)
    }

    /// Try to find and load config from standard locations
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let config_names = [
            ".formvalidrc.json",
            ".formvalidrc.yaml",
            ".formvalidrc.yml",
            "formvalid.json",
            "formvalid.yaml",
        ];

        let mut current = start_dir.to_path_buf();
        loop {
            for name in &config_names {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = Self::from_file(&config_path)?;
                    log::debug!("loaded config from {}", config_path.display());
                    return Ok(Some((config_path, config)));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Build config from a ConfigFile
    fn from_config_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let prefix = match file.prefix {
            Some(prefix) => validate_prefix(prefix)?,
            None => defaults.prefix,
        };

        let listen_events = if file.listen_events.is_empty() {
            defaults.listen_events
        } else {
            file.listen_events
        };

        Ok(Self {
            prefix,
            fallback_name: file.fallback_name.unwrap_or(defaults.fallback_name),
            listen_events,
            password: file.password.unwrap_or(defaults.password),
            messages: file.messages,
            jpeg_quality: file.jpeg_quality.map(clamp_quality).unwrap_or(defaults.jpeg_quality),
            parallel_decode: file.parallel_decode.unwrap_or(defaults.parallel_decode),
        })
    }

    /// Merge programmatic overrides into this config (overrides take precedence)
    pub fn merge(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(prefix) = overrides.prefix {
            self.prefix = validate_prefix(prefix)?;
        }

        if let Some(name) = overrides.fallback_name {
            self.fallback_name = name;
        }

        self.messages.extend(overrides.messages);

        if let Some(quality) = overrides.jpeg_quality {
            self.jpeg_quality = clamp_quality(quality);
        }

        if let Some(parallel) = overrides.parallel_decode {
            self.parallel_decode = parallel;
        }

        Ok(())
    }

    /// Full attribute name for a rule or marker (e.g. "required" -> "fv-required")
    pub fn attr(&self, rule: &str) -> String {
        format!("{}{}", self.prefix, rule)
    }

    /// Check if an interaction triggers re-validation
    pub fn is_listened(&self, interaction: Interaction) -> bool {
        self.listen_events.contains(&interaction)
    }
}

fn validate_prefix(prefix: String) -> Result<String, ConfigError> {
    let invalid = prefix
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '=' | '"' | '\'' | '>' | '<' | '/'));
    if invalid {
        return Err(ConfigError::InvalidPrefix(prefix));
    }
    Ok(prefix)
}

fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}
