use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::LxdMcpError;
use crate::paths;

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub lxd: LxdConfig,
    #[facet(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct LxdConfig {
    /// Unix socket of the LXD daemon. Resolved from the environment when unset.
    pub socket: Option<String>,
    /// Project every request is scoped to. The daemon's default when unset.
    pub project: Option<String>,
}

impl LxdConfig {
    pub fn socket_path(&self) -> PathBuf {
        match &self.socket {
            Some(socket) => PathBuf::from(socket),
            None => paths::lxd_socket(),
        }
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct LogConfig {
    /// Append logs to this file in addition to stderr.
    pub file: Option<String>,
}

fn validate_config(config: &Config) -> Result<(), LxdMcpError> {
    if let Some(project) = &config.lxd.project
        && project.trim().is_empty()
    {
        return Err(LxdMcpError::Validation {
            message: "lxd.project must not be empty".into(),
        });
    }
    if let Some(socket) = &config.lxd.socket
        && socket.trim().is_empty()
    {
        return Err(LxdMcpError::Validation {
            message: "lxd.socket must not be empty".into(),
        });
    }
    if let Some(file) = &config.log.file
        && file.trim().is_empty()
    {
        return Err(LxdMcpError::Validation {
            message: "log.file must not be empty".into(),
        });
    }
    Ok(())
}

pub fn parse_config(path: &Path, contents: &str) -> Result<Config, LxdMcpError> {
    let config: Config = facet_toml::from_str(contents).map_err(|e| LxdMcpError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Load the config file. An explicit `path` must exist; the default location
/// is optional and falls back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, LxdMcpError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (paths::config_path(), false),
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(LxdMcpError::ConfigLoad {
                path: path.display().to_string(),
                source,
            });
        }
    };

    parse_config(&path, &contents)
}
