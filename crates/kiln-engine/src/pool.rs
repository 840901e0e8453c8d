//! Bounded worker pool for the evaluate and render stages

use kiln_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run `job` over every item on at most `workers` blocking threads.
///
/// Results come back in item order regardless of completion order. The
/// first failure or a cancellation aborts the jobs that have not finished.
pub async fn fan_out<T, R, F>(
    stage: &'static str,
    items: Vec<T>,
    workers: usize,
    cancel: &CancellationToken,
    job: F,
) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Result<R> + Send + Sync + 'static,
{
    if cancel.is_cancelled() {
        return Err(Error::cancelled(stage));
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let count = items.len();
    let workers = workers.clamp(1, count);
    debug!("{}: {} job(s) on {} worker(s)", stage, count, workers);

    let job = Arc::new(job);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let job = Arc::clone(&job);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::cancelled(stage))?;
            let result = tokio::task::spawn_blocking(move || job(index, item))
                .await
                .map_err(|e| Error::render(stage, format!("worker failed: {}", e)))??;
            Ok::<_, Error>((index, result))
        });
    }

    let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                set.abort_all();
                return Err(Error::cancelled(stage));
            }
            next = set.join_next() => next,
        };

        match next {
            None => break,
            Some(Ok(Ok((index, result)))) => slots[index] = Some(result),
            Some(Ok(Err(e))) => {
                set.abort_all();
                return Err(e);
            }
            Some(Err(e)) => {
                set.abort_all();
                return Err(Error::render(stage, format!("worker failed: {}", e)));
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
