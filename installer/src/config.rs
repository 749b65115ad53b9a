//! Installer configuration loaded from `config.toml`.
//!
//! Every key is optional; omitted keys fall back to the defaults documented
//! on [`InstallerConfig`]. Unknown keys are rejected so that typos surface
//! immediately rather than being silently ignored.

use crate::dirs::BaseDirs;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Release feed queried when no override is configured.
pub const DEFAULT_FEED_URL: &str = "https://updates.backdropcms.org/release-history/backdrop/1.x";

/// Name of the configuration file inside the platform config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Name of the scratch directory created beside the executable.
pub const SCRATCH_DIRNAME: &str = ".tempdir";

/// Errors arising while locating or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file {path} not found")]
    NotFound {
        /// Path that was requested.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or contains unknown keys.
    #[error("invalid configuration file {path}: {source}")]
    Parse {
        /// Path of the malformed file.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A configured value is outside its accepted range.
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A platform directory could not be represented as UTF-8.
    #[error("directory is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the rejected path.
        path: String,
    },
}

/// Settings that shape catalog queries, downloads, and staging.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Release feed endpoint.
    pub feed_url: String,
    /// Scratch directory override; defaults to `.tempdir` beside the
    /// executable.
    pub scratch_dir: Option<Utf8PathBuf>,
    /// Global timeout applied to each HTTP request, in seconds.
    pub timeout_secs: u64,
    /// Upper bound on download attempts for a single acquisition.
    pub max_download_attempts: u32,
    /// Installation directory used when `--install` is not given.
    pub install_dir: Option<Utf8PathBuf>,
}

impl InstallerConfig {
    const fn default_timeout_secs() -> u64 {
        60
    }

    const fn default_max_download_attempts() -> u32 {
        5
    }

    /// Load configuration from `explicit` when given, otherwise from the
    /// platform configuration directory.
    ///
    /// A missing explicit file is an error; a missing default file yields
    /// [`InstallerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is malformed, or
    /// holds out-of-range values.
    pub fn load(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_owned(),
                });
            }
            return Self::load_from(path);
        }

        let Some(config_dir) = dirs.config_dir() else {
            log::debug!("no platform config directory; using defaults");
            return Ok(Self::default());
        };
        let config_dir = utf8_dir(config_dir)?;
        let path = config_dir.join(CONFIG_FILENAME);
        if path.exists() {
            Self::load_from(&path)
        } else {
            log::debug!("no configuration at {path}; using defaults");
            Ok(Self::default())
        }
    }

    /// Read and validate the configuration stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load_from(path: &Utf8Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = toml::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        log::debug!("loaded configuration from {path}");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_download_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_download_attempts",
                reason: "at least one attempt is required".to_owned(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                reason: "timeout must be positive".to_owned(),
            });
        }
        if self.feed_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "feed_url",
                reason: "feed URL must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the scratch directory, falling back to `.tempdir` beside the
    /// executable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when no override is configured
    /// and the executable directory is unknown, or
    /// [`ConfigError::NonUtf8Path`] when it is not UTF-8.
    pub fn scratch_root(&self, dirs: &dyn BaseDirs) -> Result<Utf8PathBuf, ConfigError> {
        if let Some(dir) = &self.scratch_dir {
            return Ok(dir.clone());
        }
        let exe_dir = dirs
            .executable_dir()
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "scratch_dir",
                reason: "could not determine the executable directory; set scratch_dir"
                    .to_owned(),
            })?;
        Ok(utf8_dir(exe_dir)?.join(SCRATCH_DIRNAME))
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_owned(),
            scratch_dir: None,
            timeout_secs: Self::default_timeout_secs(),
            max_download_attempts: Self::default_max_download_attempts(),
            install_dir: None,
        }
    }
}

fn utf8_dir(path: std::path::PathBuf) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| ConfigError::NonUtf8Path {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::MockBaseDirs;
    use rstest::rstest;
    use std::path::PathBuf;

    fn temp_utf8() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    #[rstest]
    fn defaults_point_at_the_public_feed() {
        let config = InstallerConfig::default();
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.max_download_attempts, 5);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.install_dir.is_none());
    }

    #[rstest]
    fn deserialises_overrides_from_toml() {
        let source = concat!(
            "feed_url = \"https://mirror.example/feed.xml\"\n",
            "max_download_attempts = 2\n",
            "install_dir = \"/srv/www\"\n",
        );
        let config =
            toml::from_str::<InstallerConfig>(source).expect("expected configuration to parse");
        assert_eq!(config.feed_url, "https://mirror.example/feed.xml");
        assert_eq!(config.max_download_attempts, 2);
        assert_eq!(config.install_dir, Some(Utf8PathBuf::from("/srv/www")));
        assert_eq!(config.timeout_secs, 60);
    }

    #[rstest]
    fn rejects_unknown_keys() {
        let result = toml::from_str::<InstallerConfig>("feed = \"x\"\n");
        assert!(result.is_err());
    }

    #[rstest]
    #[case::zero_attempts("max_download_attempts = 0\n", "max_download_attempts")]
    #[case::zero_timeout("timeout_secs = 0\n", "timeout_secs")]
    #[case::blank_feed("feed_url = \"  \"\n", "feed_url")]
    fn load_from_rejects_out_of_range_values(#[case] source: &str, #[case] key: &str) {
        let (_temp, dir) = temp_utf8();
        let path = dir.join(CONFIG_FILENAME);
        std::fs::write(&path, source).expect("write config");

        let err = InstallerConfig::load_from(&path).expect_err("expected validation failure");
        assert!(err.to_string().contains(key), "error: {err}");
    }

    #[rstest]
    fn missing_explicit_file_is_an_error() {
        let dirs = MockBaseDirs::new();
        let err = InstallerConfig::load(Some(Utf8Path::new("/nonexistent/config.toml")), &dirs)
            .expect_err("expected missing file error");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[rstest]
    fn missing_default_file_yields_defaults() {
        let (_temp, dir) = temp_utf8();
        let mut dirs = MockBaseDirs::new();
        let config_dir = dir.clone().into_std_path_buf();
        dirs.expect_config_dir()
            .returning(move || Some(config_dir.clone()));

        let config = InstallerConfig::load(None, &dirs).expect("defaults");
        assert_eq!(config, InstallerConfig::default());
    }

    #[rstest]
    fn default_file_is_read_when_present() {
        let (_temp, dir) = temp_utf8();
        std::fs::write(dir.join(CONFIG_FILENAME), "timeout_secs = 5\n").expect("write config");
        let mut dirs = MockBaseDirs::new();
        let config_dir = dir.clone().into_std_path_buf();
        dirs.expect_config_dir()
            .returning(move || Some(config_dir.clone()));

        let config = InstallerConfig::load(None, &dirs).expect("config");
        assert_eq!(config.timeout_secs, 5);
    }

    #[rstest]
    fn scratch_root_defaults_beside_executable() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_executable_dir()
            .returning(|| Some(PathBuf::from("/opt/backdrop-installer")));

        let root = InstallerConfig::default()
            .scratch_root(&dirs)
            .expect("scratch root");
        assert_eq!(root, Utf8PathBuf::from("/opt/backdrop-installer/.tempdir"));
    }

    #[rstest]
    fn scratch_root_prefers_override() {
        let dirs = MockBaseDirs::new();
        let config = InstallerConfig {
            scratch_dir: Some(Utf8PathBuf::from("/var/cache/backdrop")),
            ..InstallerConfig::default()
        };
        let root = config.scratch_root(&dirs).expect("scratch root");
        assert_eq!(root, Utf8PathBuf::from("/var/cache/backdrop"));
    }
}
