use crate::error::{MirrorError, Result};
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RepoOutcome {
    pub name: String,
    pub result: Result<PathBuf>,
}

/// Spawns one task per repository name, at most `limit` of which run `task`
/// at the same time.
///
/// Outcomes arrive on the returned channel in completion order. The channel
/// closes once every task has reported, so draining it doubles as the
/// completion barrier. Tasks still waiting for a slot when `cancel` fires
/// report [`MirrorError::Cancelled`] without running.
pub fn spawn_repo_pool<F, Fut>(
    names: Vec<String>,
    limit: NonZeroUsize,
    cancel: &CancellationToken,
    task: F,
) -> mpsc::UnboundedReceiver<RepoOutcome>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PathBuf>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.get()));
    let task = Arc::new(task);
    let (tx, rx) = mpsc::unbounded_channel();

    for name in names {
        let semaphore = Arc::clone(&semaphore);
        let task = Arc::clone(&task);
        let cancel = cancel.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let result = match permit {
                Some(_permit) if !cancel.is_cancelled() => task(name.clone()).await,
                _ => Err(MirrorError::Cancelled),
            };
            // Receiver gone means the caller stopped listening; nothing to report to.
            let _ = tx.send(RepoOutcome {
                result: result.map_err(|err| MirrorError::repo(name.clone(), err)),
                name,
            });
        });
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("repo-{i}")).collect()
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<RepoOutcome>) -> Vec<RepoOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let limit = NonZeroUsize::new(3).unwrap();

        let rx = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            spawn_repo_pool(names(12), limit, &CancellationToken::new(), move |name| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(PathBuf::from(name))
                }
            })
        };

        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_do_not_stop_siblings() {
        let rx = spawn_repo_pool(
            names(5),
            NonZeroUsize::new(2).unwrap(),
            &CancellationToken::new(),
            |name| async move {
                if name == "repo-2" {
                    return Err(MirrorError::Resolve(anyhow::anyhow!("boom")));
                }
                Ok(PathBuf::from(name))
            },
        );

        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 5);
        let failed: Vec<_> = outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|err| (&outcome.name, err)))
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "repo-2");
        assert!(failed[0].1.to_string().starts_with("repo 'repo-2'"));
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = Arc::new(AtomicUsize::new(0));

        let rx = {
            let started = Arc::clone(&started);
            spawn_repo_pool(names(4), NonZeroUsize::MIN, &cancel, move |name| {
                started.fetch_add(1, Ordering::SeqCst);
                async move { Ok(PathBuf::from(name)) }
            })
        };

        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.result.as_ref().unwrap_err().is_cancelled()));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_admission_of_waiting_tasks() {
        let cancel = CancellationToken::new();
        let started = Arc::new(AtomicUsize::new(0));

        let rx = {
            let started = Arc::clone(&started);
            let cancel_inner = cancel.clone();
            spawn_repo_pool(names(6), NonZeroUsize::MIN, &cancel, move |name| {
                started.fetch_add(1, Ordering::SeqCst);
                let cancel = cancel_inner.clone();
                async move {
                    cancel.cancel();
                    Ok(PathBuf::from(name))
                }
            })
        };

        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 6);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        let succeeded: HashSet<_> = outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| outcome.name.clone())
            .collect();
        assert_eq!(succeeded.len(), 1);
    }

    #[tokio::test]
    async fn empty_list_closes_immediately() {
        let outcomes = drain(spawn_repo_pool(
            Vec::new(),
            NonZeroUsize::MIN,
            &CancellationToken::new(),
            |name| async move { Ok(PathBuf::from(name)) },
        ))
        .await;
        assert!(outcomes.is_empty());
    }
}
