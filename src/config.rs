//! Service settings, read from a TOML file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::DEFAULT_LOOKUP_LOG_INTERVAL;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "DIFFCALC_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub beatmap_folder_path: PathBuf,
    /// Download endpoint; `{id}` is replaced with the beatmap id.
    pub beatmap_download_url: String,
    /// Durable lookups between two progress log lines. Zero disables.
    pub lookup_log_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("difficulty.db"),
            beatmap_folder_path: PathBuf::from("beatmaps"),
            beatmap_download_url: "https://osu.ppy.sh/osu/{id}".to_string(),
            lookup_log_interval: DEFAULT_LOOKUP_LOG_INTERVAL,
        }
    }
}

impl Settings {
    /// Loads the file named by `DIFFCALC_CONFIG`, else `./config.toml` when
    /// present, else the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return load_toml(Path::new(&path));
        }

        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            return load_toml(path);
        }

        log::info!("CONFIG: No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(Self::default())
    }
}

/// Load a TOML file and deserialize it
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match toml::from_str(&content) {
        Ok(data) => {
            log::info!("CONFIG: Loaded {:?}", path);
            Ok(data)
        }
        Err(source) => {
            log::error!("CONFIG: Failed to parse TOML file {:?}: {}", path, source);
            Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
listen_addr = "0.0.0.0:9000"
lookup_log_interval = 0
"#,
        )
        .unwrap();

        assert_eq!(settings.listen_addr, "0.0.0.0:9000");
        assert_eq!(settings.lookup_log_interval, 0);
        assert_eq!(settings.database_path, Settings::default().database_path);
        assert!(settings.beatmap_download_url.contains("{id}"));
    }

    #[test]
    fn test_load_toml_errors() {
        let dir = std::env::temp_dir().join(format!("diffcalc-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.toml");
        assert!(matches!(
            load_toml::<Settings>(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.join("broken.toml");
        fs::write(&broken, "listen_addr = ").unwrap();
        assert!(matches!(
            load_toml::<Settings>(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let valid = dir.join("valid.toml");
        fs::write(&valid, "beatmap_folder_path = \"/srv/beatmaps\"\n").unwrap();
        let settings: Settings = load_toml(&valid).unwrap();
        assert_eq!(settings.beatmap_folder_path, PathBuf::from("/srv/beatmaps"));

        fs::remove_dir_all(&dir).ok();
    }
}
