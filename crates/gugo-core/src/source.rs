use crate::model::{MirrorConfig, SourceKind};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// A code-forge account that owns repositories.
///
/// `ensure_ready` performs one-time client setup and must be safe to call
/// concurrently; `get_repo` is called concurrently by every repository task
/// of a mirror.
pub trait RepoSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn account(&self) -> &str;
    fn ensure_ready(&self) -> SourceFuture<'_, ()>;
    fn list_repos(&self) -> SourceFuture<'_, Vec<String>>;
    fn get_repo<'a>(&'a self, name: &'a str) -> SourceFuture<'a, String>;
}

/// Maps a configured mirror to the capability that serves it.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, mirror: &MirrorConfig) -> anyhow::Result<Arc<dyn RepoSource>>;
}
