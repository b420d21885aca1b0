//! Bounded worker pool for batch commands

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `task` on every item with at most `workers` in flight.
///
/// Results come back in input order regardless of completion order. A task
/// that panics yields `None` for its slot.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, workers: usize, task: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let task = Arc::new(task);

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(task(item).await)
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.ok().flatten())
        .collect()
}
