use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use supwatch_cmd::{CommandLine, CommandLineParseError};
use thiserror::Error;
use tokio::fs::read_to_string;

use crate::Cli;

const DEFAULT_REFRESH_SECS: u64 = 30;
const DEFAULT_DETAIL_REFRESH_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("bad {name} command line in {path}: {source}")]
    BadCommand {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: CommandLineParseError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigToml {
    kubectl: Option<String>,
    stern: Option<String>,
    refresh_interval_secs: Option<u64>,
    detail_refresh_secs: Option<u64>,
    log: Option<String>,
}

/// Resolved configuration: file values, CLI overrides, then defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub kubectl: CommandLine,
    pub stern: CommandLine,
    pub refresh_interval: Duration,
    pub detail_refresh: Duration,
    pub log: String,
}

impl Config {
    /// A missing file is only an error when the user pointed at one
    /// explicitly; otherwise everything falls back to defaults.
    pub async fn load(path: &Path, cli: &Cli) -> Result<Self, ConfigError> {
        let explicit = cli.config_path.is_some();
        let config = Self::load_config(path, explicit).await?;
        Self::resolve(config, path, cli)
    }

    fn resolve(config: ConfigToml, path: &Path, cli: &Cli) -> Result<Self, ConfigError> {
        let ConfigToml {
            kubectl,
            stern,
            refresh_interval_secs,
            detail_refresh_secs,
            log,
        } = config;

        let kubectl = kubectl
            .as_deref()
            .unwrap_or("kubectl")
            .parse()
            .map_err(|source| ConfigError::BadCommand {
                name: "kubectl",
                path: path.to_owned(),
                source,
            })?;
        let stern = stern
            .as_deref()
            .unwrap_or("stern")
            .parse()
            .map_err(|source| ConfigError::BadCommand {
                name: "stern",
                path: path.to_owned(),
                source,
            })?;

        let refresh_interval =
            Duration::from_secs(refresh_interval_secs.unwrap_or(DEFAULT_REFRESH_SECS).max(1));
        let detail_refresh = Duration::from_secs(
            detail_refresh_secs
                .unwrap_or(DEFAULT_DETAIL_REFRESH_SECS)
                .max(1),
        );

        let log = cli.log.clone().or(log).unwrap_or("info".into());

        Ok(Config {
            kubectl,
            stern,
            refresh_interval,
            detail_refresh,
            log,
        })
    }

    async fn load_config(path: &Path, explicit: bool) -> Result<ConfigToml, ConfigError> {
        let path = if path.is_dir() {
            path.join("supwatch.toml")
        } else {
            path.to_owned()
        };
        let string = match read_to_string(&path).await {
            Ok(string) => string,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return Ok(ConfigToml::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&string).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
