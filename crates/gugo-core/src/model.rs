use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    GitHub,
    GitLab,
}

impl SourceKind {
    pub fn as_prefix(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "github",
            SourceKind::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_prefix())
    }
}

/// An account on a code forge, optionally on a self-hosted API base.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Exactly one source per mirror; the YAML key selects the variant.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SourceConfig {
    #[serde(rename = "githubAccount")]
    GitHubAccount(AccountConfig),
    #[serde(rename = "gitlabAccount")]
    GitLabAccount(AccountConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::GitHubAccount(_) => SourceKind::GitHub,
            SourceConfig::GitLabAccount(_) => SourceKind::GitLab,
        }
    }

    pub fn account(&self) -> &AccountConfig {
        match self {
            SourceConfig::GitHubAccount(account) | SourceConfig::GitLabAccount(account) => account,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MirrorConfig {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: SourceConfig,
    pub clone_to: PathBuf,
}

/// Tally of repository outcomes for one mirror. Log-only.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct MirrorSummary {
    pub mirrored: u32,
    pub failed: u32,
    pub cancelled: u32,
}

impl MirrorSummary {
    pub fn total(&self) -> u32 {
        self.mirrored + self.failed + self.cancelled
    }
}
