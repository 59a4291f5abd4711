//! Bounded concurrent task runner shared by every fan-out point, plus the
//! run-wide actor-call gate.
//!
//! Scatter/gather: each unit of work returns its own result, results are
//! re-paired with their originating item by index, and the caller merges
//! after the gather completes. No shared accumulator, no locking inside the
//! generation phase. `concurrency <= 1` degrades to strictly sequential
//! execution in input order; failures propagate fail-fast and abort the
//! batch.
//!
//! Fan-outs nest (founders around advisor panels), and each batch has its own
//! semaphore, so batch bounds alone would admit up to concurrency² in-flight
//! generation calls. The [`Gate`] closes that hole: one run-wide permit pool
//! that every generation call draws from, held only for the duration of the
//! call itself. Batch permits and the gate are always acquired in that order,
//! and a gate permit is never held while waiting on a batch, so the nesting
//! cannot deadlock.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::error::EngineResult;

/// Run-wide admission gate: one permit per in-flight generation call,
/// whatever fan-out the call sits inside.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Wait for a call slot. Hold the returned permit across exactly one
    /// generation call, never across another `admit`.
    pub async fn admit(&self) -> OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore closed")
    }
}

/// Apply `f` to every item with at most `concurrency` in-flight tasks.
/// The returned vector corresponds 1:1, in order, with the input items.
pub async fn map_bounded<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    f: F,
) -> EngineResult<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EngineResult<T>> + Send + 'static,
{
    if concurrency <= 1 {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(f(item).await?);
        }
        return Ok(results);
    }

    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let f = Arc::new(f);
    let mut join_set: JoinSet<(usize, EngineResult<T>)> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let f = f.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            (index, f(item).await)
        });
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, result) = joined?;
        // Fail-fast: dropping the JoinSet aborts the remaining tasks.
        slots[index] = Some(result?);
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("every index joined"))
        .collect())
}
