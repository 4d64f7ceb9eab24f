use crate::model::{MirrorConfig, SourceConfig};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "gugo.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub mirrors: Vec<MirrorConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("opening config file {}", path.display()))?;
        Self::parse(&data).context("reading config")
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(data).context("parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mirrors.is_empty() {
            bail!("mirrors must have at least one entry");
        }
        if self.concurrency == Some(0) {
            bail!("concurrency must be at least 1");
        }
        for (index, mirror) in self.mirrors.iter().enumerate() {
            validate_mirror(mirror).with_context(|| format!("mirror {index}"))?;
        }
        Ok(())
    }

    /// Per-mirror repository pool size: a positive override wins, then the
    /// file value, then the host's logical CPU count.
    pub fn resolve_concurrency(&self, override_value: Option<usize>) -> NonZeroUsize {
        override_value
            .filter(|value| *value > 0)
            .or(self.concurrency)
            .and_then(NonZeroUsize::new)
            .or_else(|| NonZeroUsize::new(num_cpus::get()))
            .unwrap_or(NonZeroUsize::MIN)
    }
}

fn validate_mirror(mirror: &MirrorConfig) -> anyhow::Result<()> {
    if mirror.clone_to.as_os_str().is_empty() {
        bail!("cloneTo must not be empty");
    }
    let account = mirror.source.account();
    let kind = mirror.source.kind();
    if account.account.trim().is_empty() {
        bail!("{kind} account is empty");
    }
    if let Some(url) = account.url.as_deref() {
        validate_api_url(url).with_context(|| format!("{kind} url"))?;
    }
    Ok(())
}

fn validate_api_url(url: &str) -> anyhow::Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .with_context(|| format!("'{url}' must be an absolute http(s) URL"))?;
    if rest.split('/').next().unwrap_or_default().is_empty() {
        bail!("'{url}' has no host");
    }
    Ok(())
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

impl MirrorConfig {
    pub fn new(source: SourceConfig, clone_to: impl Into<PathBuf>) -> Self {
        Self {
            source,
            clone_to: clone_to.into(),
        }
    }
}
