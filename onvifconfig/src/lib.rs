//! # ONVIF Monitor Configuration
//!
//! This crate provides configuration management for the ONVIF monitor:
//! - Loading configuration from YAML files
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters and setters for configuration values
//!
//! ## Usage
//!
//! ```no_run
//! use onvifconfig::Config;
//!
//! let config = Config::load_config("")?;
//!
//! let device = config.get_device_url()?;
//! let interval = config.get_polling_interval()?;
//!
//! config.set_motion_track(false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use tracing::{info, warn};

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("onvifmonitor.yaml");

const ENV_CONFIG_DIR: &str = "ONVIFMONITOR_CONFIG";
const ENV_PREFIX: &str = "ONVIFMONITOR_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".onvifmonitor";

// Default values for configuration
const DEFAULT_MOTION_TRACK: bool = true;
const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLLING_BACKOFF_CAP: Duration = Duration::from_secs(16);
const DEFAULT_POLLING_RETRY_MODE: &str = "exponential";
const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RECONNECT_MIN_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_PLAYER_COMMAND: &[&str] = &["gst-play-1.0", "{uri}"];
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for durations stored as seconds
///
/// Integers and floats are both accepted; anything else falls back to the
/// default.
macro_rules! impl_secs_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<Duration> {
            match self.get_value($path) {
                Ok(value) => Ok(value_to_duration(&value).unwrap_or($default)),
                Err(_) => Ok($default),
            }
        }

        pub fn $setter(&self, duration: Duration) -> Result<()> {
            self.set_value($path, duration_to_value(duration))
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

/// Macro to generate getter/setter for optional string values
macro_rules! impl_opt_string_config {
    ($getter:ident, $setter:ident, $path:expr) => {
        pub fn $getter(&self) -> Option<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Some(s),
                Ok(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        }

        pub fn $setter(&self, value: Option<String>) -> Result<()> {
            self.set_value($path, value.map(Value::String).unwrap_or(Value::Null))
        }
    };
}

/// Configuration manager for the ONVIF monitor
///
/// # Examples
///
/// ```no_run
/// use onvifconfig::Config;
///
/// let config = Config::load_config("/etc/onvifmonitor")?;
/// println!("Monitoring {}", config.get_device_url()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    /// Effective values, environment overrides included
    data: Mutex<Value>,
    /// What `save` writes: defaults, file and setters, never the environment
    persisted: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data().clone();
        let persisted = self.persisted().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
            persisted: Mutex::new(persisted),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(DEFAULT_DIR_NAME).exists() {
            return DEFAULT_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `ONVIFMONITOR_CONFIG` environment variable
    /// 3. `.onvifmonitor` in the current directory
    /// 4. `.onvifmonitor` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);

        Self::validate_config_dir(Path::new(&dir_path))
            .with_context(|| format!("Cannot use configuration directory {}", dir_path))?;

        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration, without the environment overrides
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to search for it
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path, "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path))?;
                if !external_value.is_null() {
                    let external_value = Self::lower_keys_value(external_value);
                    merge_yaml(&mut default_value, &external_value);
                }
            }
            Err(_) => {
                info!(config_file=%path, "Config file not found, using default embedded config");
            }
        }

        let persisted = Self::lower_keys_value(default_value);
        let mut config_value = persisted.clone();
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
            persisted: Mutex::new(persisted),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory the configuration was loaded from
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persisted(&self) -> MutexGuard<'_, Value> {
        self.persisted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// Values coming from `ONVIFMONITOR_CONFIG__*` variables are not written.
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.persisted())?;
        fs::write(&self.path, yaml).with_context(|| format!("Cannot write {}", self.path))?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["polling", "interval"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data();
            Self::set_value_internal(&mut data, path, value.clone())?;
            let mut persisted = self.persisted();
            Self::set_value_internal(&mut persisted, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        let Some((first, rest)) = path.split_first() else {
            *data = value;
            return Ok(());
        };

        if let Value::Mapping(map) = data {
            let key_value = Value::String(first.to_lowercase());
            if rest.is_empty() {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, rest, value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        Self::get_value_internal(&self.data(), path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var=%key, error=%e, "Ignoring configuration override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the device service URL of the camera
    ///
    /// This key is required: an absent or empty value is an error.
    pub fn get_device_url(&self) -> Result<String> {
        match self.get_value(&["device", "url"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(anyhow!(
                "device.url is not configured (set it in config.yaml or {}DEVICE__URL)",
                ENV_PREFIX
            )),
        }
    }

    pub fn set_device_url(&self, url: String) -> Result<()> {
        self.set_value(&["device", "url"], Value::String(url))
    }

    impl_opt_string_config!(
        get_device_username,
        set_device_username,
        &["device", "username"]
    );

    impl_opt_string_config!(
        get_device_password,
        set_device_password,
        &["device", "password"]
    );

    impl_bool_config!(
        get_motion_track,
        set_motion_track,
        &["motion", "track"],
        DEFAULT_MOTION_TRACK
    );

    /// Gets the playback duration after the last motion, if configured
    pub fn get_motion_preview_duration(&self) -> Result<Option<Duration>> {
        match self.get_value(&["motion", "preview_duration"]) {
            Ok(value) => Ok(value_to_duration(&value)),
            Err(_) => Ok(None),
        }
    }

    pub fn set_motion_preview_duration(&self, duration: Option<Duration>) -> Result<()> {
        self.set_value(
            &["motion", "preview_duration"],
            duration.map(duration_to_value).unwrap_or(Value::Null),
        )
    }

    impl_secs_config!(
        get_polling_interval,
        set_polling_interval,
        &["polling", "interval"],
        DEFAULT_POLLING_INTERVAL
    );

    impl_secs_config!(
        get_polling_backoff_cap,
        set_polling_backoff_cap,
        &["polling", "backoff_cap"],
        DEFAULT_POLLING_BACKOFF_CAP
    );

    /// Gets the retry mode name (`exponential` or `fixed`)
    pub fn get_polling_retry_mode(&self) -> Result<String> {
        match self.get_value(&["polling", "retry_mode"]) {
            Ok(Value::String(s)) => Ok(s.trim().to_lowercase()),
            _ => Ok(DEFAULT_POLLING_RETRY_MODE.to_string()),
        }
    }

    pub fn set_polling_retry_mode(&self, mode: String) -> Result<()> {
        self.set_value(&["polling", "retry_mode"], Value::String(mode))
    }

    impl_secs_config!(
        get_network_timeout,
        set_network_timeout,
        &["network", "timeout"],
        DEFAULT_NETWORK_TIMEOUT
    );

    impl_secs_config!(
        get_reconnect_min_delay,
        set_reconnect_min_delay,
        &["reconnect", "min_delay"],
        DEFAULT_RECONNECT_MIN_DELAY
    );

    impl_secs_config!(
        get_reconnect_max_delay,
        set_reconnect_max_delay,
        &["reconnect", "max_delay"],
        DEFAULT_RECONNECT_MAX_DELAY
    );

    /// Gets the player command line
    ///
    /// A single string is split on whitespace; a sequence is taken as is.
    pub fn get_player_command(&self) -> Result<Vec<String>> {
        let command = match self.get_value(&["player", "command"]) {
            Ok(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Ok(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            _ => Vec::new(),
        };

        if command.is_empty() {
            Ok(DEFAULT_PLAYER_COMMAND.iter().map(|s| s.to_string()).collect())
        } else {
            Ok(command)
        }
    }

    pub fn set_player_command(&self, command: Vec<String>) -> Result<()> {
        self.set_value(
            &["player", "command"],
            Value::Sequence(command.into_iter().map(Value::String).collect()),
        )
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Gets the minimum log level
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

fn value_to_duration(value: &Value) -> Option<Duration> {
    let secs = match value {
        Value::Number(n) => match n.as_u64() {
            Some(secs) => return Some(Duration::from_secs(secs)),
            None => n.as_f64()?,
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    // Negative, NaN, infinite or too large for a Duration
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!(value = secs, error = %e, "Invalid duration in configuration, using default");
            None
        }
    }
}

fn duration_to_value(duration: Duration) -> Value {
    if duration.subsec_nanos() == 0 {
        Value::Number(Number::from(duration.as_secs()))
    } else {
        Value::Number(Number::from(duration.as_secs_f64()))
    }
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from `external` are merged into `default`
/// - For scalars and sequences, external values replace default values
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
