//! # PMOChannel Configuration Module
//!
//! This module provides configuration management for PMOChannel, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let channel = config.get_player_channel()?;
//! let poll_ms = config.get_player_poll_ms()?;
//!
//! // Update configuration values
//! config.set_player_poll_ms(20000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmochannel.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_or_default(""));
}

const ENV_CONFIG_DIR: &str = "PMOCHANNEL_CONFIG";
const ENV_PREFIX: &str = "PMOCHANNEL_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmochannel";

// Default values for configuration
pub const DEFAULT_CHANNEL: &str = "latest";
pub const DEFAULT_POLL_MS: u64 = 15000;
pub const DEFAULT_CONTAINER_ID: &str = "player";
pub const DEFAULT_DESCRIPTOR_BASE_URL: &str = "http://localhost:8080/";
pub const DEFAULT_DESCRIPTOR_TIMEOUT_SECS: u64 = 0;
pub const DEFAULT_ENGINE_ENABLED: bool = true;
pub const DEFAULT_MAX_BUFFER_LENGTH_SECS: u64 = 30;
pub const DEFAULT_NATIVE_COMMAND: &str = "ffplay";
pub const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for PMOChannel
///
/// This structure manages the player configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// A configuration built with [`Config::from_yaml_str`] lives only in memory:
/// setters update it but nothing is written to disk.
#[derive(Debug)]
pub struct Config {
    config_dir: Option<PathBuf>,
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        fs::read_dir(path)?;
        Ok(())
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOCHANNEL_CONFIG` environment variable
    /// 3. `.pmochannel` in the current directory
    /// 4. `.pmochannel` in the user's home directory
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join("config.yaml");

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut config_value = lower_keys_value(config_value);
        apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir: Some(config_dir),
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Loads the configuration, falling back to the embedded defaults
    ///
    /// Used by the global singleton so that a read-only or missing config
    /// directory never prevents the player from starting.
    pub fn load_or_default(directory: &str) -> Self {
        match Self::load_config(directory) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to load configuration ({err}), using embedded defaults");
                let mut value =
                    serde_yaml::from_str(DEFAULT_CONFIG).unwrap_or(Value::Mapping(Mapping::new()));
                value = lower_keys_value(value);
                apply_env_overrides(&mut value);
                Config {
                    config_dir: None,
                    path: None,
                    data: Mutex::new(value),
                }
            }
        }
    }

    /// Builds an in-memory configuration from a YAML document merged over the defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if !yaml.trim().is_empty() {
            let external: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut value, &lower_keys_value(external));
        }

        Ok(Config {
            config_dir: None,
            path: None,
            data: Mutex::new(lower_keys_value(value)),
        })
    }

    /// Directory the configuration was loaded from, if any
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = {
            let data = self.lock()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["player", "poll_ms"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock()?;
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        get_value_internal(&data, path)
    }

    // ========================================================================
    // Player
    // ========================================================================

    impl_string_config!(
        get_player_channel,
        set_player_channel,
        &["player", "channel"],
        DEFAULT_CHANNEL
    );

    impl_u64_config!(
        get_player_poll_ms,
        set_player_poll_ms,
        &["player", "poll_ms"],
        DEFAULT_POLL_MS
    );

    impl_string_config!(
        get_player_container_id,
        set_player_container_id,
        &["player", "container_id"],
        DEFAULT_CONTAINER_ID
    );

    // ========================================================================
    // Descriptor
    // ========================================================================

    impl_string_config!(
        get_descriptor_base_url,
        set_descriptor_base_url,
        &["descriptor", "base_url"],
        DEFAULT_DESCRIPTOR_BASE_URL
    );

    impl_u64_config!(
        get_descriptor_timeout_secs,
        set_descriptor_timeout_secs,
        &["descriptor", "timeout_secs"],
        DEFAULT_DESCRIPTOR_TIMEOUT_SECS
    );

    // ========================================================================
    // Streaming engine
    // ========================================================================

    impl_bool_config!(
        get_engine_enabled,
        set_engine_enabled,
        &["engine", "enabled"],
        DEFAULT_ENGINE_ENABLED
    );

    impl_u64_config!(
        get_engine_max_buffer_length_secs,
        set_engine_max_buffer_length_secs,
        &["engine", "max_buffer_length_secs"],
        DEFAULT_MAX_BUFFER_LENGTH_SECS
    );

    // ========================================================================
    // Native player
    // ========================================================================

    impl_string_config!(
        get_native_command,
        set_native_command,
        &["native", "command"],
        DEFAULT_NATIVE_COMMAND
    );

    /// Extra arguments passed to the native player before the stream URL
    pub fn get_native_args(&self) -> Result<Vec<String>> {
        match self.get_value(&["native", "args"]) {
            Ok(Value::Sequence(seq)) => Ok(seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()),
            Ok(Value::String(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn set_native_args(&self, args: Vec<String>) -> Result<()> {
        let seq = args.into_iter().map(Value::String).collect();
        self.set_value(&["native", "args"], Value::Sequence(seq))
    }

    // ========================================================================
    // Logging
    // ========================================================================

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["log", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );
}

/// Returns the global configuration instance
///
/// The configuration is lazily loaded on first access.
///
/// ```no_run
/// use pmoconfig::get_config;
///
/// let config = get_config();
/// let level = config.get_log_min_level()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(config: &mut Value) {
    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let _ = set_value_internal(config, &key_path, convert_env_value(&value));
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default value.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_player_channel().unwrap(), "latest");
        assert_eq!(config.get_player_poll_ms().unwrap(), 15000);
        assert_eq!(config.get_player_container_id().unwrap(), "player");
        assert_eq!(config.get_descriptor_timeout_secs().unwrap(), 0);
        assert!(config.get_engine_enabled().unwrap());
        assert_eq!(config.get_engine_max_buffer_length_secs().unwrap(), 30);
        assert_eq!(config.get_native_command().unwrap(), "ffplay");
        assert_eq!(
            config.get_native_args().unwrap(),
            vec!["-loglevel".to_string(), "error".to_string()]
        );
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
    }

    #[test]
    fn test_yaml_overrides_merge_with_defaults() {
        let config = Config::from_yaml_str(
            "Player:\n  Channel: news\ndescriptor:\n  base_url: https://cdn.example.org/live/\n",
        )
        .unwrap();
        assert_eq!(config.get_player_channel().unwrap(), "news");
        assert_eq!(config.get_player_poll_ms().unwrap(), 15000);
        assert_eq!(
            config.get_descriptor_base_url().unwrap(),
            "https://cdn.example.org/live/"
        );
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config =
            Config::from_yaml_str("player:\n  poll_ms: soon\n  channel: '  '\nengine:\n  enabled: 3\n")
                .unwrap();
        assert_eq!(config.get_player_poll_ms().unwrap(), DEFAULT_POLL_MS);
        assert_eq!(config.get_player_channel().unwrap(), DEFAULT_CHANNEL);
        assert!(config.get_engine_enabled().unwrap());
    }

    #[test]
    fn test_setters_update_in_memory_config() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_player_poll_ms(20000).unwrap();
        config.set_engine_enabled(false).unwrap();
        config
            .set_native_args(vec!["--no-video".to_string()])
            .unwrap();
        assert_eq!(config.get_player_poll_ms().unwrap(), 20000);
        assert!(!config.get_engine_enabled().unwrap());
        assert_eq!(config.get_native_args().unwrap(), vec!["--no-video"]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.get_value(&["player", "nope"]).is_err());
        assert!(config.get_value(&["player", "channel", "deeper"]).is_err());
    }

    #[test]
    fn test_load_config_from_directory_persists_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "player:\n  poll_ms: 4000\nnative:\n  command: mpv\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_player_poll_ms().unwrap(), 4000);
        assert_eq!(config.get_native_command().unwrap(), "mpv");
        assert_eq!(config.get_player_channel().unwrap(), "latest");
        assert_eq!(config.config_dir(), Some(dir.path()));

        config.set_player_channel("sports".to_string()).unwrap();
        let saved = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(saved.contains("sports"));
        assert!(saved.contains("max_buffer_length_secs"));
    }

    #[test]
    fn test_env_value_conversion() {
        assert_eq!(convert_env_value("42"), Value::Number(Number::from(42)));
        assert_eq!(convert_env_value("true"), Value::Bool(true));
        assert_eq!(convert_env_value("news"), Value::String("news".to_string()));
    }

    #[test]
    fn test_merge_yaml_replaces_sequences() {
        let mut base: Value = serde_yaml::from_str("a:\n  - 1\n  - 2\nb: x\n").unwrap();
        let ext: Value = serde_yaml::from_str("a:\n  - 3\n").unwrap();
        merge_yaml(&mut base, &ext);
        let expected: Value = serde_yaml::from_str("a:\n  - 3\nb: x\n").unwrap();
        assert_eq!(base, expected);
    }
}
