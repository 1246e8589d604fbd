//! Configuration types for fruitsync components.
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`~/.config/fruitsync/config.toml` on Linux), then CLI flags and
//! environment variables applied by the binary.
//!
//! ```toml
//! [source]
//! base_url = "https://fruityvice.com"
//!
//! [http]
//! timeout_secs = 30
//!
//! [database]
//! max_connections = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;

/// Public Fruityvice endpoint.
pub const DEFAULT_API_URL: &str = "https://fruityvice.com";

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for the catalog fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("fruitsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where the catalog is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Contents of the optional configuration file. Every section and key may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub source: SourceSection,
    pub http: HttpSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceSection {
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSection {
    pub max_connections: Option<u32>,
}

impl FileConfig {
    pub fn source_config(&self) -> SourceConfig {
        let defaults = SourceConfig::default();
        SourceConfig {
            base_url: self.source.base_url.clone().unwrap_or(defaults.base_url),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            timeout: self
                .http
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: self.http.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        let defaults = DbConfig::default();
        DbConfig {
            max_connections: self
                .database
                .max_connections
                .unwrap_or(defaults.max_connections),
        }
    }
}

/// Default location of the configuration file, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fruitsync").join("config.toml"))
}

/// Loads the configuration file.
///
/// With `path = None` the default location is used. A missing file yields
/// the defaults; an unreadable or malformed one is an error.
pub fn load_config(path: Option<&Path>) -> Result<FileConfig, AppError> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return Ok(FileConfig::default()),
    };

    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(FileConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        AppError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| AppError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("fruitsync/"));
    }

    #[test]
    fn test_source_config_defaults() {
        assert_eq!(SourceConfig::default().base_url, "https://fruityvice.com");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.db_config(), DbConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[source]
base_url = "http://localhost:8080"

[database]
max_connections = 12
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.source_config().base_url, "http://localhost:8080");
        assert_eq!(config.db_config().max_connections, 12);
        assert_eq!(config.http_config(), HttpConfig::default());
    }

    #[test]
    fn test_load_http_section() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[http]\ntimeout_secs = 5").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.http_config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database\nmax_connections = ").unwrap();

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
