//! GitHub and GitLab account sources.

pub mod auth;
pub mod github;
mod github_models;
pub mod gitlab;
mod gitlab_models;
mod http;

use auth::TokenLookup;
use github::GitHubAccount;
use gitlab::GitLabAccount;
use gugo_core::model::{MirrorConfig, SourceConfig};
use gugo_core::source::{RepoSource, SourceResolver};
use std::sync::{Arc, Mutex};

/// Builds one source per distinct account configuration and hands the same
/// instance back on later runs, so readiness is only established once.
#[derive(Default)]
pub struct SourceRegistry {
    tokens: TokenLookup,
    sources: Mutex<Vec<(SourceConfig, Arc<dyn RepoSource>)>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenLookup) -> Self {
        Self {
            tokens,
            sources: Mutex::new(Vec::new()),
        }
    }

    fn build(&self, config: &SourceConfig) -> Arc<dyn RepoSource> {
        match config {
            SourceConfig::GitHubAccount(account) => {
                Arc::new(GitHubAccount::with_tokens(account, self.tokens.clone()))
            }
            SourceConfig::GitLabAccount(account) => {
                Arc::new(GitLabAccount::with_tokens(account, self.tokens.clone()))
            }
        }
    }
}

impl SourceResolver for SourceRegistry {
    fn resolve(&self, mirror: &MirrorConfig) -> anyhow::Result<Arc<dyn RepoSource>> {
        let mut sources = self
            .sources
            .lock()
            .map_err(|_| anyhow::anyhow!("source registry lock poisoned"))?;
        if let Some((_, source)) = sources.iter().find(|(config, _)| *config == mirror.source) {
            return Ok(Arc::clone(source));
        }
        let source = self.build(&mirror.source);
        sources.push((mirror.source.clone(), Arc::clone(&source)));
        Ok(source)
    }
}
