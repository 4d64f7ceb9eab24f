//! Instrumented fakes for the git and source seams.

use crate::error::{MirrorError, Result};
use crate::git::{GitFuture, GitRunner};
use crate::model::{AccountConfig, MirrorConfig, SourceConfig, SourceKind};
use crate::source::{RepoSource, SourceFuture, SourceResolver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub(crate) struct GitCall {
    pub(crate) cwd: PathBuf,
    pub(crate) args: Vec<String>,
}

#[derive(Default)]
pub(crate) struct RecordingGit {
    calls: Mutex<Vec<GitCall>>,
    failures: Vec<(String, String)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingGit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails `subcommand` for any invocation mentioning `repo`.
    pub(crate) fn fail_on(mut self, subcommand: &str, repo: &str) -> Self {
        self.failures.push((subcommand.to_string(), repo.to_string()));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }

    pub(crate) fn clone_count(&self) -> usize {
        self.count("clone")
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.count("fetch")
    }

    pub(crate) fn lfs_count(&self) -> usize {
        self.count("lfs")
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, cwd: &Path, args: &[&str]) -> bool {
        let cwd = cwd
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.failures.iter().any(|(subcommand, repo)| {
            args.first() == Some(&subcommand.as_str())
                && (cwd.contains(repo.as_str()) || args.iter().any(|arg| arg.contains(repo.as_str())))
        })
    }

    async fn execute(&self, cwd: &Path, args: &[&str], cancel: &CancellationToken) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(MirrorError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.should_fail(cwd, args) {
            return Err(MirrorError::Command {
                command: format!("git {}", args.join(" ")),
                status: ExitStatus::default(),
                output: "fatal: simulated failure".to_string(),
            });
        }
        if args.first() == Some(&"clone") {
            if let Some(target) = args.last() {
                std::fs::create_dir_all(cwd.join(target))
                    .map_err(|err| MirrorError::io("creating fake clone", cwd, err))?;
            }
        }
        Ok(())
    }
}

impl GitRunner for RecordingGit {
    fn run<'a>(
        &'a self,
        cwd: &'a Path,
        args: &'a [&'a str],
        cancel: &'a CancellationToken,
    ) -> GitFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            self.calls.lock().unwrap().push(GitCall {
                cwd: cwd.to_path_buf(),
                args: args.iter().map(|arg| arg.to_string()).collect(),
            });
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            let result = self.execute(cwd, args, cancel).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    account: String,
    repos: Vec<String>,
    list_error: Option<String>,
    ready_error: Option<String>,
    unresolvable: Vec<String>,
    pub(crate) ready_calls: AtomicUsize,
    pub(crate) list_calls: AtomicUsize,
    pub(crate) get_calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(account: &str, repos: &[&str]) -> Self {
        Self {
            account: account.to_string(),
            repos: repos.iter().map(|repo| repo.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_list(account: &str, message: &str) -> Self {
        Self {
            account: account.to_string(),
            list_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_ready(account: &str, message: &str) -> Self {
        Self {
            account: account.to_string(),
            ready_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn unresolvable(mut self, repo: &str) -> Self {
        self.unresolvable.push(repo.to_string());
        self
    }
}

impl RepoSource for FakeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GitHub
    }

    fn account(&self) -> &str {
        &self.account
    }

    fn ensure_ready(&self) -> SourceFuture<'_, ()> {
        Box::pin(async move {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            match &self.ready_error {
                Some(message) => Err(anyhow::anyhow!(message.clone())),
                None => Ok(()),
            }
        })
    }

    fn list_repos(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            match &self.list_error {
                Some(message) => Err(anyhow::anyhow!(message.clone())),
                None => Ok(self.repos.clone()),
            }
        })
    }

    fn get_repo<'a>(&'a self, name: &'a str) -> SourceFuture<'a, String> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if self.unresolvable.iter().any(|repo| repo == name) {
                anyhow::bail!("getting repo '{name}': 404 Not Found");
            }
            Ok(format!("git@example.com:{}/{name}.git", self.account))
        })
    }
}

/// Resolves mirrors by account name; unknown accounts fail to resolve.
#[derive(Default)]
pub(crate) struct FakeResolver {
    sources: HashMap<String, Arc<FakeSource>>,
}

impl FakeResolver {
    pub(crate) fn with(mut self, source: Arc<FakeSource>) -> Self {
        self.sources.insert(source.account.clone(), source);
        self
    }
}

impl SourceResolver for FakeResolver {
    fn resolve(&self, mirror: &MirrorConfig) -> anyhow::Result<Arc<dyn RepoSource>> {
        let account = &mirror.source.account().account;
        match self.sources.get(account) {
            Some(source) => Ok(source.clone() as Arc<dyn RepoSource>),
            None => anyhow::bail!("no source registered for '{account}'"),
        }
    }
}

pub(crate) fn github_mirror(account: &str, clone_to: impl Into<PathBuf>) -> MirrorConfig {
    MirrorConfig::new(
        SourceConfig::GitHubAccount(AccountConfig {
            account: account.to_string(),
            url: None,
        }),
        clone_to,
    )
}
