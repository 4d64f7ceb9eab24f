use crate::error::{MirrorError, Result};
use crate::git::{self, GitRunner};
use crate::lockfile::{LockFile, RunFlag};
use crate::model::{MirrorConfig, MirrorSummary};
use crate::pool::spawn_repo_pool;
use crate::source::{RepoSource, SourceResolver};
use anyhow::Context;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fans a run out over every configured mirror and, within each mirror,
/// over every repository the source lists.
pub struct Orchestrator {
    mirrors: Vec<MirrorConfig>,
    resolver: Arc<dyn SourceResolver>,
    git: Arc<dyn GitRunner>,
    concurrency: NonZeroUsize,
    lock_path: Option<PathBuf>,
    in_flight: RunFlag,
}

impl Orchestrator {
    pub fn new(
        mirrors: Vec<MirrorConfig>,
        resolver: Arc<dyn SourceResolver>,
        git: Arc<dyn GitRunner>,
        concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            mirrors,
            resolver,
            git,
            concurrency,
            lock_path: None,
            in_flight: RunFlag::default(),
        }
    }

    /// Also take an exclusive lock on `path` for the duration of each run.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    pub fn mirrors(&self) -> &[MirrorConfig] {
        &self.mirrors
    }

    /// Runs every mirror once.
    ///
    /// Returns `Ok(false)` without doing anything when another run holds the
    /// in-process flag or the lock file. Repository failures are logged and
    /// never surface here; the first mirror-level failure is returned after
    /// all mirrors have finished.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<bool> {
        let Some(_flag) = self.in_flight.try_enter() else {
            warn!("previous run still in progress; skipping run");
            return Ok(false);
        };
        let _lock = match &self.lock_path {
            Some(path) => match LockFile::try_acquire(path)? {
                Some(lock) => Some(lock),
                None => {
                    warn!(path = %path.display(), "lock already held; skipping run");
                    return Ok(false);
                }
            },
            None => None,
        };

        info!(mirrors = self.mirrors.len(), "processing mirrors");
        let run_token = cancel.child_token();
        let _cancel_on_exit = run_token.clone().drop_guard();

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (index, mirror) in self.mirrors.iter().enumerate() {
            let task = MirrorTask {
                index,
                mirror: mirror.clone(),
                resolver: Arc::clone(&self.resolver),
                git: Arc::clone(&self.git),
                concurrency: self.concurrency,
                cancel: run_token.clone(),
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = task.run().await;
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut first_error = None;
        while let Some((index, result)) = rx.recv().await {
            match result {
                Ok(_) => {}
                Err(err) if err.is_cancelled() => {
                    debug!(mirror = index, "mirror cancelled");
                }
                Err(err) => {
                    error!(mirror = index, error = %err, "error processing mirror");
                    first_error.get_or_insert(err);
                }
            }
        }
        debug!("all mirrors finished");

        match first_error {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }
}

struct MirrorTask {
    index: usize,
    mirror: MirrorConfig,
    resolver: Arc<dyn SourceResolver>,
    git: Arc<dyn GitRunner>,
    concurrency: NonZeroUsize,
    cancel: CancellationToken,
}

impl MirrorTask {
    async fn run(self) -> Result<MirrorSummary> {
        let index = self.index;
        debug!(mirror = index, "processing mirror");

        let source = self.resolver.resolve(&self.mirror).map_err(|err| {
            MirrorError::Config(format!("unable to get mirror {index} source: {err:#}"))
        })?;

        debug!(mirror = index, kind = %source.kind(), account = source.account(), "listing repos");
        until_cancelled(&self.cancel, source.ensure_ready())
            .await?
            .context("initialising source")
            .map_err(|source| MirrorError::Source { index, source })?;
        let names = until_cancelled(&self.cancel, source.list_repos())
            .await?
            .context("listing repos")
            .map_err(|source| MirrorError::Source { index, source })?;
        info!(mirror = index, count = names.len(), "found {} repo(s)", names.len());

        let root = Arc::new(self.mirror.clone_to);
        let git = self.git;
        let repo_cancel = self.cancel.clone();
        let mut outcomes = spawn_repo_pool(names, self.concurrency, &self.cancel, move |name| {
            let source = Arc::clone(&source);
            let git = Arc::clone(&git);
            let root = Arc::clone(&root);
            let cancel = repo_cancel.clone();
            async move { mirror_one(source.as_ref(), git.as_ref(), &root, &name, &cancel).await }
        });

        let mut summary = MirrorSummary::default();
        while let Some(outcome) = outcomes.recv().await {
            match outcome.result {
                Ok(_) => summary.mirrored += 1,
                Err(err) if err.is_cancelled() => summary.cancelled += 1,
                Err(err) => {
                    summary.failed += 1;
                    error!(mirror = index, repo = %outcome.name, error = %err, "mirroring repo failed");
                }
            }
        }
        debug!(mirror = index, "closing mirror channels");
        info!(
            mirror = index,
            mirrored = summary.mirrored,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "mirror finished"
        );
        Ok(summary)
    }
}

async fn mirror_one(
    source: &dyn RepoSource,
    git: &dyn GitRunner,
    root: &Path,
    name: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    info!(repo = name, "mirroring repo '{name}'");
    debug!(repo = name, "getting repo from source");
    let url = until_cancelled(cancel, source.get_repo(name))
        .await?
        .map_err(MirrorError::Resolve)?;
    let path = git::mirror_repo(git, root, name, &url, cancel).await?;
    info!(repo = name, path = %path.display(), "mirrored repo '{name}'");
    Ok(path)
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MirrorError::Cancelled),
        output = future => Ok(output),
    }
}
