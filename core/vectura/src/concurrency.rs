//! Bounded sliding-window concurrency for batch I/O (spec §4.7).
//!
//! Mirrors the semaphore-permit idiom the teacher uses to cap in-flight
//! agent executions (`AGENT_CONCURRENCY` in `master_orchestrator::executor`):
//! acquire a permit before the unit of work, release it on completion. Here
//! the permit pool is sized per call (`max_concurrent`) rather than global,
//! since each `Database`/file-backed `Storage` instance has its own bound.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::VecturaError;

/// One failing item out of a batch operation: its position in the input,
/// the document id it concerned (when known), and a human-readable summary.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub index: usize,
    pub id: Option<Uuid>,
    pub message: String,
}

/// Structured failure for a batch operation (spec §4.7): which items failed
/// and why. Successful items are *not* rolled back — "partial results are
/// retained when at least one subtask succeeded."
#[derive(Debug, Clone)]
pub struct BatchError {
    pub total: usize,
    pub failures: Vec<ItemFailure>,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} batch item(s) failed: ",
            self.failures.len(),
            self.total
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            match failure.id {
                Some(id) => write!(f, "[{}] id={} {}", failure.index, id, failure.message)?,
                None => write!(f, "[{}] {}", failure.index, failure.message)?,
            }
        }
        Ok(())
    }
}

impl From<BatchError> for VecturaError {
    fn from(err: BatchError) -> Self {
        VecturaError::save_failed(err.to_string())
    }
}

/// Runs `task` over `items` under a sliding window of at most `max_concurrent`
/// in-flight futures: exactly `max_concurrent` tasks are seeded up front, and
/// a new one starts each time one completes, until the input is exhausted.
///
/// Returns the successful outputs (in the order their tasks happened to
/// finish — wall-clock order, not input order) and the list of failures.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    id_of: impl Fn(&T) -> Option<Uuid>,
    task: F,
) -> (Vec<R>, Vec<ItemFailure>)
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<R, String>> + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    use futures_util::stream::{FuturesUnordered, StreamExt};

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let task = Arc::new(task);

    let mut pending = FuturesUnordered::new();
    let mut items = items.into_iter().enumerate();

    let spawn_one = |sem: Arc<Semaphore>, task: Arc<F>, index: usize, item: T, id: Option<Uuid>| {
        tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore closed");
            let result = (*task)(item).await;
            (index, id, result)
        })
    };

    for (index, item) in items.by_ref().take(max_concurrent.max(1)) {
        let id = id_of(&item);
        pending.push(spawn_one(semaphore.clone(), task.clone(), index, item, id));
    }

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    let mut remaining = items;

    while let Some(joined) = pending.next().await {
        match joined {
            Ok((_index, _id, Ok(value))) => {
                successes.push(value);
            }
            Ok((index, id, Err(message))) => {
                failures.push(ItemFailure { index, id, message });
            }
            Err(join_err) => {
                failures.push(ItemFailure {
                    index: usize::MAX,
                    id: None,
                    message: format!("task panicked: {join_err}"),
                });
            }
        }

        if let Some((index, item)) = remaining.next() {
            let id = id_of(&item);
            pending.push(spawn_one(semaphore.clone(), task.clone(), index, item, id));
        }
    }

    (successes, failures)
}
