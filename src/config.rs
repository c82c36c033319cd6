use crate::core::{DbError, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Environment variable naming the configuration file to load.
pub const CONFIG_ENV: &str = "DBCONTEXT_CONFIG";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection_strings: Vec<ConnectionStringSettings>,
}

/// One named connection-string entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionStringSettings {
    pub name: String,
    pub provider_name: String,
    pub connection_string: String,
}

impl ConnectionStringSettings {
    pub fn new(
        name: impl Into<String>,
        provider_name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        ConnectionStringSettings {
            name: name.into(),
            provider_name: provider_name.into(),
            connection_string: connection_string.into(),
        }
    }
}

/// Ordered connection-string entries; the first entry is the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStrings {
    entries: Vec<ConnectionStringSettings>,
}

impl ConnectionStrings {
    /// Finds an entry by exact name.
    pub fn get(&self, name: &str) -> Option<&ConnectionStringSettings> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn first(&self) -> Option<&ConnectionStringSettings> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConnectionStringSettings> {
        self.entries.iter()
    }
}

impl From<Vec<ConnectionStringSettings>> for ConnectionStrings {
    fn from(entries: Vec<ConnectionStringSettings>) -> Self {
        ConnectionStrings { entries }
    }
}

impl From<Config> for ConnectionStrings {
    fn from(config: Config) -> Self {
        config.connection_strings.into()
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = dbcontext::config::load_config("dbcontext.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "loaded configuration file");
    parse_config(&content)
}

/// Location of the process-wide configuration file, if one applies.
///
/// `DBCONTEXT_CONFIG` wins; otherwise `<config dir>/dbcontext/config.toml`
/// is used when it exists.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("dbcontext").join("config.toml"))
        .filter(|path| path.exists())
}

static CONNECTION_STRINGS: OnceCell<RwLock<ConnectionStrings>> = OnceCell::new();

fn global_settings() -> Result<&'static RwLock<ConnectionStrings>> {
    CONNECTION_STRINGS.get_or_try_init(|| {
        let settings = match default_config_path() {
            Some(path) => {
                info!(path = %path.display(), "loading connection strings");
                load_config(path)?.into()
            }
            None => ConnectionStrings::default(),
        };
        Ok(RwLock::new(settings))
    })
}

/// Snapshot of the process-wide connection strings, loading them on first use.
pub fn connection_strings() -> Result<ConnectionStrings> {
    global_settings()?
        .read()
        .map(|settings| settings.clone())
        .map_err(|_| DbError::Configuration("connection string lock is poisoned".to_string()))
}

/// Replaces the process-wide connection strings.
pub fn install(settings: ConnectionStrings) -> Result<()> {
    if CONNECTION_STRINGS.set(RwLock::new(settings.clone())).is_ok() {
        return Ok(());
    }
    let mut current = global_settings()?
        .write()
        .map_err(|_| DbError::Configuration("connection string lock is poisoned".to_string()))?;
    *current = settings;
    Ok(())
}
