//! Configuration for ambit.
//!
//! Root resolution order:
//! 1. Explicit path passed to `Config::with_root()` / `Config::load_from()`
//! 2. AMBIT_ROOT environment variable
//! 3. Platform data directory (`directories`)
//! 4. Fallback: ~/.local/share/ambit

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::provider::DEFAULT_OR_SPLIT_LIMIT;
use crate::{Error, Result};

/// ambit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for all ambit data.
    pub root: PathBuf,

    /// Prefix of every href in result trees.
    #[serde(default = "default_api_root")]
    pub api_root: String,

    /// Most disjuncts of a top-level `Or` fetched separately.
    #[serde(default = "default_or_split_limit")]
    pub or_split_limit: usize,
}

fn default_api_root() -> String {
    "/api/v1".to_string()
}

fn default_or_split_limit() -> usize {
    DEFAULT_OR_SPLIT_LIMIT
}

impl Config {
    /// Create a new config with the given root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            api_root: default_api_root(),
            or_split_limit: default_or_split_limit(),
        }
    }

    /// Create a config using default root resolution.
    pub fn default_location() -> Result<Self> {
        Ok(Self::with_root(resolve_root()?))
    }

    /// Load config from ROOT/config.toml, or create default.
    pub fn load() -> Result<Self> {
        let root = resolve_root()?;
        Self::load_from(&root)
    }

    /// Load config from a specific root.
    pub fn load_from(root: &Path) -> Result<Self> {
        let config_path = root.join("config.toml");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
            // The file may have been moved along with its root
            config.root = root.to_path_buf();
            Ok(config)
        } else {
            Ok(Self::with_root(root))
        }
    }

    /// Save config to ROOT/config.toml.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(self.config_path(), contents)?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the DuckDB database file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join("db/ambit.duckdb")
    }
}

/// Resolve the root directory.
fn resolve_root() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AMBIT_ROOT") {
        return Ok(PathBuf::from(path));
    }

    if let Some(proj_dirs) = ProjectDirs::from("", "", "ambit") {
        return Ok(proj_dirs.data_dir().to_path_buf());
    }

    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;
    Ok(PathBuf::from(home).join(".local/share/ambit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_with_root() {
        let config = Config::with_root("/tmp/test-ambit");
        assert_eq!(config.root, PathBuf::from("/tmp/test-ambit"));
        assert_eq!(config.api_root, "/api/v1");
        assert_eq!(config.or_split_limit, 16);
    }

    #[test]
    fn test_config_paths() {
        let config = Config::with_root("/tmp/test-ambit");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/test-ambit/db/ambit.duckdb"));
        assert_eq!(config.config_path(), PathBuf::from("/tmp/test-ambit/config.toml"));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_root(tmp.path());
        config.api_root = "/api/v2".to_string();
        config.or_split_limit = 4;
        config.save().unwrap();

        let loaded = Config::load_from(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config, Config::with_root(tmp.path()));
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "root = \"/elsewhere\"\nor_split_limit = 3\n",
        )
        .unwrap();

        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config.root, tmp.path());
        assert_eq!(config.api_root, "/api/v1");
        assert_eq!(config.or_split_limit, 3);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "or_split_limit = [").unwrap();
        assert!(matches!(Config::load_from(tmp.path()), Err(Error::Config(_))));
    }
}
