use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("config: {0}")]
    Config(String),

    #[error("mirror {index}: {source:#}")]
    Source {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("repo '{name}': {source}")]
    Repo {
        name: String,
        #[source]
        source: Box<MirrorError>,
    },

    #[error("resolving repo url: {0:#}")]
    Resolve(anyhow::Error),

    #[error("running {command} ({status})\noutput: {output}")]
    Command {
        command: String,
        status: ExitStatus,
        output: String,
    },

    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl MirrorError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn repo(name: impl Into<String>, source: MirrorError) -> Self {
        Self::Repo {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// True when the error is, or wraps, a cancellation of the run.
    pub fn is_cancelled(&self) -> bool {
        match self {
            MirrorError::Cancelled => true,
            MirrorError::Repo { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
