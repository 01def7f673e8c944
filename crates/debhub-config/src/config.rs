use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use debhub_utils::{
    path::{expand_home, xdg_config_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV: &str = "DEBHUB_CONFIG";
pub const CACHE_DIR_ENV: &str = "DEBHUB_CACHE_DIR";

const DEFAULT_CACHE_DIR: &str = "tmp-cache";
const DEFAULT_PACKAGE_CACHE_SIZE: usize = 10_000;
const DEFAULT_PARALLEL_LIMIT: usize = 4;
const DEFAULT_RETRY_COOLDOWN: &str = "30s";

fn default_suites() -> Vec<String> {
    vec!["bionic".into(), "xenial".into()]
}

/// Application's configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Directory where parsed control blocks are cached between runs.
    /// Overridden by $DEBHUB_CACHE_DIR.
    /// Default: tmp-cache
    pub cache_dir: Option<String>,

    /// Number of packages kept in memory.
    /// Default: 10000
    pub package_cache_size: Option<usize>,

    /// Suite names recognised in package versions and file names, in priority order.
    /// Default: ["bionic", "xenial"]
    pub suites: Option<Vec<String>>,

    /// Number of packages fetched concurrently while building an index.
    /// Default: 4
    pub parallel_limit: Option<usize>,

    /// Delay before a package whose download failed is fetched again.
    /// Default: 30s
    pub retry_cooldown: Option<String>,

    /// Owners whose releases may be published. Empty allows every owner.
    pub allowed_owners: Option<Vec<String>>,

    /// GnuPG key used to sign release manifests. Unsigned when unset.
    pub signing_key: Option<String>,

    /// GnuPG home directory holding `signing_key`.
    pub gpg_home: Option<String>,

    /// User agent sent with every HTTP request.
    pub user_agent: Option<String>,
}

/// Location of the config file: `$DEBHUB_CONFIG`, else `$XDG_CONFIG_HOME/debhub/config.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => xdg_config_home().join("debhub").join("config.toml"),
    }
}

impl Config {
    /// Creates a configuration with every field set to its default.
    pub fn default_config() -> Self {
        Self {
            cache_dir: Some(DEFAULT_CACHE_DIR.into()),
            package_cache_size: Some(DEFAULT_PACKAGE_CACHE_SIZE),
            suites: Some(default_suites()),
            parallel_limit: Some(DEFAULT_PARALLEL_LIMIT),
            retry_cooldown: Some(DEFAULT_RETRY_COOLDOWN.into()),
            allowed_owners: Some(Vec::new()),
            signing_key: None,
            gpg_home: None,
            user_agent: None,
        }
    }

    /// Loads the configuration from `path`, or from [`default_config_path`] when `None`.
    ///
    /// A missing file yields the default configuration. The result is resolved: defaults are
    /// filled in, environment overrides applied and values validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Self::default_config()
            }
            Err(source) => {
                return Err(ConfigError::IoError {
                    path,
                    source,
                })
            }
        };

        config.resolve()?;
        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                self.cache_dir = Some(dir);
            }
        }

        self.cache_dir.get_or_insert_with(|| DEFAULT_CACHE_DIR.into());
        self.suites.get_or_insert_with(default_suites);
        self.allowed_owners.get_or_insert_with(Vec::new);
        self.retry_cooldown
            .get_or_insert_with(|| DEFAULT_RETRY_COOLDOWN.into());

        if *self.package_cache_size.get_or_insert(DEFAULT_PACKAGE_CACHE_SIZE) == 0 {
            return Err(ConfigError::InvalidValue {
                field: "package_cache_size",
                reason: "must be greater than zero".into(),
            });
        }

        if *self.parallel_limit.get_or_insert(DEFAULT_PARALLEL_LIMIT) == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallel_limit",
                reason: "must be greater than zero".into(),
            });
        }

        if let Some(cooldown) = &self.retry_cooldown {
            if parse_duration(cooldown).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "retry_cooldown",
                    reason: format!("`{cooldown}` is not a duration like 30s or 1m"),
                });
            }
        }

        if let Some(suites) = &self.suites {
            if suites.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "suites",
                    reason: "suite names cannot be empty".into(),
                });
            }
        }

        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand_home(self.cache_dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR))
    }

    pub fn package_cache_size(&self) -> usize {
        self.package_cache_size
            .unwrap_or(DEFAULT_PACKAGE_CACHE_SIZE)
    }

    pub fn suites(&self) -> Vec<String> {
        self.suites.clone().unwrap_or_else(default_suites)
    }

    pub fn parallel_limit(&self) -> usize {
        self.parallel_limit.unwrap_or(DEFAULT_PARALLEL_LIMIT)
    }

    pub fn retry_cooldown(&self) -> Duration {
        self.retry_cooldown
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(Duration::from_secs(30))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        std::env::remove_var(CACHE_DIR_ENV);
        let dir = tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("config.toml"))).unwrap();

        assert_eq!(config, Config::default_config());
        assert_eq!(config.cache_dir(), PathBuf::from("tmp-cache"));
        assert_eq!(config.package_cache_size(), 10_000);
        assert_eq!(config.suites(), vec!["bionic", "xenial"]);
        assert_eq!(config.parallel_limit(), 4);
        assert_eq!(config.retry_cooldown(), Duration::from_secs(30));
        assert_eq!(config.allowed_owners, Some(Vec::new()));
    }

    #[test]
    #[serial]
    fn test_load_partial_file() {
        std::env::remove_var(CACHE_DIR_ENV);
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
cache_dir = "/var/cache/debhub"
suites = ["jammy", "focal"]
allowed_owners = ["ayufan"]
retry_cooldown = "1m"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/var/cache/debhub"));
        assert_eq!(config.suites(), vec!["jammy", "focal"]);
        assert_eq!(config.retry_cooldown(), Duration::from_secs(60));
        assert_eq!(config.package_cache_size(), 10_000);
        assert_eq!(config.allowed_owners, Some(vec!["ayufan".to_string()]));
    }

    #[test]
    #[serial]
    fn test_cache_dir_env_override() {
        std::env::set_var(CACHE_DIR_ENV, "/srv/debhub-cache");
        let mut config = Config::default();
        config.resolve().unwrap();
        std::env::remove_var(CACHE_DIR_ENV);

        assert_eq!(config.cache_dir(), PathBuf::from("/srv/debhub-cache"));
    }

    #[test]
    #[serial]
    fn test_invalid_values() {
        std::env::remove_var(CACHE_DIR_ENV);

        let mut config = Config {
            package_cache_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue { field: "package_cache_size", .. })
        ));

        let mut config = Config {
            retry_cooldown: Some("soon".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue { field: "retry_cooldown", .. })
        ));

        let mut config = Config {
            suites: Some(vec!["".into()]),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue { field: "suites", .. })
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "suites = [").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default_config();
        let text = config.to_toml().unwrap();
        assert!(text.contains("cache_dir = \"tmp-cache\""));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    #[serial]
    fn test_default_config_path_env() {
        std::env::set_var(CONFIG_ENV, "/etc/debhub/config.toml");
        assert_eq!(
            default_config_path(),
            PathBuf::from("/etc/debhub/config.toml")
        );
        std::env::remove_var(CONFIG_ENV);
    }
}
