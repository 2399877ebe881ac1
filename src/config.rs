use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub database: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub max_iterations: Option<usize>,
    pub max_rows: Option<usize>,
    pub tool_output_limit: Option<usize>,
    pub output: Option<String>,
    pub show_steps: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot resolve config path: set SP_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoPath,
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config file '{0}' does not contain a [profiles] section.")]
    NoProfiles(PathBuf),
    #[error("Profile '{name}' not found in config file '{path}'.")]
    UnknownProfile { name: String, path: PathBuf },
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, ConfigError> {
    let path = config_path()?;
    let mut profiles = read_profiles(&path)?;
    profiles
        .remove(name)
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_string(),
            path,
        })
}

/// Parses the config file, optionally checking that one profile exists.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;
    if let Some(name) = profile {
        if !profiles.contains_key(name) {
            return Err(ConfigError::UnknownProfile {
                name: name.to_string(),
                path,
            });
        }
    }
    Ok(path)
}

fn read_profiles(path: &PathBuf) -> Result<HashMap<String, ProfileConfig>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    config
        .profiles
        .ok_or_else(|| ConfigError::NoProfiles(path.clone()))
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty_env("SP_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("sqlpipe").join("config.toml"));
    }

    let home = non_empty_env("HOME").ok_or(ConfigError::NoPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("sqlpipe")
        .join("config.toml"))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ConfigFile, ProfileConfig};

    #[test]
    fn profiles_parse_from_toml() {
        let raw = r#"
            [profiles.supabase]
            provider = "gemini"
            model = "gemini-2.0-flash"
            database = "postgresql://postgres.ref:pw@aws-1-ap-south-1.pooler.supabase.com:5432/postgres"
            max_rows = 20
            show_steps = true
        "#;
        let config: ConfigFile = toml::from_str(raw).expect("valid toml");
        let profile = config
            .profiles
            .and_then(|mut profiles| profiles.remove("supabase"))
            .expect("profile");
        assert_eq!(profile.provider.as_deref(), Some("gemini"));
        assert_eq!(profile.max_rows, Some(20));
        assert_eq!(profile.show_steps, Some(true));
        assert_eq!(profile.temperature, None);
    }

    #[test]
    fn unknown_profile_keys_are_rejected() {
        let raw = "[profiles.x]\nmodle = \"typo\"\n";
        assert!(toml::from_str::<ConfigFile>(raw).is_err());
        assert_eq!(ProfileConfig::default().model, None);
    }
}
