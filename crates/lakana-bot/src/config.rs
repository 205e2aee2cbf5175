//! Runner configuration, read from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lakana_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable naming the config file when no argument is given.
pub const CONFIG_ENV: &str = "LAKANA_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// JSON file holding the roles, applications and channels tables.
    pub workbook_path: PathBuf,
    /// Where the rendered election sheet is written.
    pub document_path: PathBuf,
    pub publish_interval_secs: u64,
    pub sync: SyncConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("lakana.json"),
            document_path: PathBuf::from("vaalilakana.md"),
            publish_interval_secs: 300,
            sync: SyncConfig::default(),
        }
    }
}

impl BotConfig {
    /// Read `path`, or the file named by [`CONFIG_ENV`], or fall back to defaults.
    pub fn load(path: Option<PathBuf>) -> eyre::Result<Self> {
        let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => {
                info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("reading {}: {e}", path.display()))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| eyre::eyre!("parsing {}: {e}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub const fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "workbook_path": "/srv/lakana.json", "sync": {{ "flush_interval_secs": 10 }} }}"#
        )
        .unwrap();

        let config = BotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workbook_path, PathBuf::from("/srv/lakana.json"));
        assert_eq!(config.document_path, PathBuf::from("vaalilakana.md"));
        assert_eq!(config.sync.flush_interval_secs, 10);
        assert_eq!(config.sync.cache_ttl_secs, 300);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = BotConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("parsing"));
    }
}
