//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/leaks.sqlite"
//!
//! [source]
//! root = "/media/leaks"
//! collection = "Collection 1"
//!
//! [pipeline]
//! workers = 50
//! batch_size = 1000
//! ```
//!
//! Every `[pipeline]` key and every `[source]` key except `root` and
//! `collection` has a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Directory holding one sub-directory per collection.
    pub root: PathBuf,
    /// Collection (parent) label; also the directory name under `root`.
    pub collection: String,
    /// Declared source label stored on every leak file.
    #[serde(default = "default_label")]
    pub label: String,
    /// File-name patterns that make a file a job.
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Folder or file names skipped entirely.
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

fn default_label() -> String {
    "unknown".to_string()
}

fn default_include_globs() -> Vec<String> {
    vec!["*.txt".to_string()]
}

fn default_exclude_globs() -> Vec<String> {
    vec!["*.tar*".to_string()]
}

impl SourceConfig {
    /// The directory that is actually walked: `root/collection`.
    pub fn collection_dir(&self) -> PathBuf {
        self.root.join(&self.collection)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
            timeout_secs: default_timeout_secs(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_workers() -> usize {
    50
}
fn default_batch_size() -> usize {
    1000
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_timeout_secs() -> u64 {
    20_000
}
fn default_tick_secs() -> u64 {
    2
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

/// Per-run overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub collection: Option<String>,
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
}

impl Config {
    /// Apply command-line overrides, then re-validate.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(root) = overrides.root {
            self.source.root = root;
        }
        if let Some(collection) = overrides.collection {
            self.source.collection = collection;
        }
        if let Some(workers) = overrides.workers {
            self.pipeline.workers = workers;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.pipeline.batch_size = batch_size;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.source.collection.trim().is_empty() {
            anyhow::bail!("source.collection must not be empty");
        }
        if self.source.include_globs.is_empty() {
            anyhow::bail!("source.include_globs must list at least one pattern");
        }

        let p = &self.pipeline;
        if p.workers == 0 {
            anyhow::bail!("pipeline.workers must be > 0");
        }
        if p.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be > 0");
        }
        if p.queue_capacity == 0 {
            anyhow::bail!("pipeline.queue_capacity must be > 0");
        }
        if p.timeout_secs == 0 {
            anyhow::bail!("pipeline.timeout_secs must be > 0");
        }
        if p.tick_secs == 0 {
            anyhow::bail!("pipeline.tick_secs must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/leaks.sqlite"

[source]
root = "/media/leaks"
collection = "Collection 1"
"#;

    #[test]
    fn defaults_follow_the_batch_tool() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.pipeline.workers, 50);
        assert_eq!(cfg.pipeline.batch_size, 1000);
        assert_eq!(cfg.pipeline.queue_capacity, 1000);
        assert_eq!(cfg.pipeline.timeout(), Duration::from_secs(20_000));
        assert_eq!(cfg.pipeline.tick(), Duration::from_secs(2));
        assert_eq!(cfg.source.include_globs, vec!["*.txt"]);
        assert_eq!(cfg.source.exclude_globs, vec!["*.tar*"]);
        assert_eq!(
            cfg.source.collection_dir(),
            PathBuf::from("/media/leaks/Collection 1")
        );
    }

    #[test]
    fn rejects_zero_workers() {
        let content = format!("{}\n[pipeline]\nworkers = 0\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn overrides_are_applied_and_validated() {
        let cfg = parse_config(MINIMAL).unwrap();
        let cfg = cfg
            .with_overrides(Overrides {
                collection: Some("Collection 2".to_string()),
                workers: Some(4),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(cfg.source.collection, "Collection 2");
        assert_eq!(cfg.pipeline.workers, 4);

        let bad = cfg.with_overrides(Overrides {
            batch_size: Some(0),
            ..Overrides::default()
        });
        assert!(bad.is_err());
    }
}
