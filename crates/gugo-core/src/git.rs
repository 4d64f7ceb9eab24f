use crate::error::{MirrorError, Result};
use anyhow::{Context, bail};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MIRROR_SUFFIX: &str = ".git";
const STAGING_SUFFIX: &str = ".git.partial";

const GIT_FETCH_ALL_ARGS: &[&str] = &["fetch", "--all"];
const GIT_LFS_INSTALL_ARGS: &[&str] = &["lfs", "install", "--local"];

pub type GitFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Runs one git command line. Cancelling the token must stop the command.
pub trait GitRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        cwd: &'a Path,
        args: &'a [&'a str],
        cancel: &'a CancellationToken,
    ) -> GitFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemGit {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks that git and the LFS extension can be run.
    pub async fn preflight(&self) -> anyhow::Result<()> {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => bail!(
                "checking if git was installed: {}",
                combined_output(&output.stdout, &output.stderr)
            ),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                bail!("git must be installed and on your PATH")
            }
            Err(err) => return Err(err).context("checking if git was installed"),
        }

        let output = Command::new(&self.program)
            .args(["lfs", "version"])
            .output()
            .await
            .context("checking if git lfs was installed")?;
        if output.status.success() {
            return Ok(());
        }
        let combined = combined_output(&output.stdout, &output.stderr);
        if combined.contains("not a git command") {
            bail!("git lfs must be installed");
        }
        bail!("checking if git lfs was installed: output: {combined}")
    }
}

impl GitRunner for SystemGit {
    fn run<'a>(
        &'a self,
        cwd: &'a Path,
        args: &'a [&'a str],
        cancel: &'a CancellationToken,
    ) -> GitFuture<'a> {
        Box::pin(async move {
            let command_line = format_command(args);
            let mut command = Command::new(&self.program);
            command
                .args(args)
                .current_dir(cwd)
                .stdin(Stdio::null())
                .kill_on_drop(true);
            debug!(command = %command_line, cwd = %cwd.display(), "running git");

            // Dropping the output future drops the child, which kills it.
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MirrorError::Cancelled),
                output = command.output() => output.map_err(|err| MirrorError::io("spawning git in", cwd, err))?,
            };
            if !output.status.success() {
                return Err(MirrorError::Command {
                    command: command_line,
                    status: output.status,
                    output: combined_output(&output.stdout, &output.stderr),
                });
            }
            Ok(())
        })
    }
}

/// Local bare mirror location for a repository.
pub fn repo_path(root: &Path, repo_name: &str) -> PathBuf {
    root.join(format!("{repo_name}{MIRROR_SUFFIX}"))
}

/// Ensures a complete, up-to-date bare mirror of `remote_url` exists under
/// `root` and returns its path.
pub async fn mirror_repo(
    git: &dyn GitRunner,
    root: &Path,
    repo_name: &str,
    remote_url: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|err| MirrorError::io("creating mirror directory", root, err))?;

    let local = repo_path(root, repo_name);
    debug!(repo = repo_name, url = remote_url, path = %local.display(), "cloning/fetching repo");

    let exists = tokio::fs::try_exists(&local)
        .await
        .map_err(|err| MirrorError::io("checking if repo existed at", &local, err))?;
    if !exists {
        debug!(repo = repo_name, "repo did not exist, cloning");
        clone_mirror(git, root, repo_name, remote_url, cancel).await?;
    }

    debug!(repo = repo_name, "fetching latest changes");
    git.run(&local, GIT_FETCH_ALL_ARGS, cancel).await?;
    git.run(&local, GIT_LFS_INSTALL_ARGS, cancel).await?;
    Ok(local)
}

/// Clones into a staging directory and moves it into place once complete,
/// so an interrupted clone never looks like a finished mirror.
async fn clone_mirror(
    git: &dyn GitRunner,
    root: &Path,
    repo_name: &str,
    remote_url: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let staging_name = format!("{repo_name}{STAGING_SUFFIX}");
    let staging = root.join(&staging_name);
    let stale = tokio::fs::try_exists(&staging)
        .await
        .map_err(|err| MirrorError::io("checking for partial clone at", &staging, err))?;
    if stale {
        debug!(path = %staging.display(), "removing stale partial clone");
        tokio::fs::remove_dir_all(&staging)
            .await
            .map_err(|err| MirrorError::io("removing partial clone", &staging, err))?;
    }

    let args = ["clone", "--mirror", remote_url, staging_name.as_str()];
    git.run(root, &args, cancel).await?;

    let local = repo_path(root, repo_name);
    tokio::fs::rename(&staging, &local)
        .await
        .map_err(|err| MirrorError::io("moving clone into place at", &local, err))
}

fn format_command(args: &[&str]) -> String {
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }
    combined
}
