//! Engine configuration, optionally stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML).
///
/// Missing fields default to the values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-test budget in milliseconds. No timeout when unset.
    pub test_timeout_ms: Option<u64>,

    /// Fail regular tests that record zero assertions without `expect(0)`.
    pub require_assertions: bool,

    /// Run only tests whose full name contains this text (`!` negates).
    pub filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            test_timeout_ms: None,
            require_assertions: true,
            filter: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.test_timeout_ms == Some(0) {
            return Err(anyhow!("test_timeout_ms must be > 0"));
        }
        if let Some(filter) = &self.filter {
            if filter.trim().trim_start_matches('!').trim().is_empty() {
                return Err(anyhow!("filter must not be blank"));
            }
        }
        Ok(())
    }

    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout_ms.map(Duration::from_millis)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
        assert!(cfg.require_assertions);
    }

    #[test]
    fn write_then_load_preserves_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("suiterun.toml");
        let cfg = EngineConfig {
            test_timeout_ms: Some(250),
            require_assertions: false,
            filter: Some("!slow".to_string()),
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("suiterun.toml");
        fs::write(&path, "test_timeout_ms = 100\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.test_timeout(), Some(Duration::from_millis(100)));
        assert!(cfg.require_assertions);
    }

    #[test]
    fn rejects_zero_timeout_and_blank_filter() {
        let zero = EngineConfig {
            test_timeout_ms: Some(0),
            ..EngineConfig::default()
        };
        assert!(zero.validate().is_err());

        let blank = EngineConfig {
            filter: Some(" ! ".to_string()),
            ..EngineConfig::default()
        };
        assert!(blank.validate().is_err());
    }
}
