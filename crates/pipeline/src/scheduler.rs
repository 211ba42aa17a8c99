//! Bounded-concurrency task runner
//!
//! Every item is turned into a future up front; a semaphore gates how many
//! workers are in flight. The runner settles all items before returning, so
//! one failure never cancels its siblings.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Progress notification for one item reaching a terminal state
///
/// `completed` increases by exactly one per notification, from 1 to `total`.
#[derive(Debug)]
pub struct TaskProgress<'a, R, E> {
    pub completed: usize,
    pub total: usize,
    pub index: usize,
    pub outcome: Result<&'a R, &'a E>,
}

/// A failed item, kept with its original payload
#[derive(Debug, Clone)]
pub struct TaskFailure<T, E> {
    pub index: usize,
    pub error: E,
    pub item: T,
}

/// Settled outcome of a run
#[derive(Debug)]
pub struct RunReport<T, R, E> {
    /// Successes tagged with their submission index, in submission order
    pub results: Vec<(usize, R)>,
    /// Failures in submission order
    pub errors: Vec<TaskFailure<T, E>>,
    pub completed: usize,
    pub total: usize,
}

impl<T, R, E> RunReport<T, R, E> {
    pub fn is_complete(&self) -> bool {
        self.results.len() + self.errors.len() == self.total
    }

    /// Success values without their indices
    pub fn into_values(self) -> Vec<R> {
        self.results.into_iter().map(|(_, value)| value).collect()
    }
}

/// Runs a worker over a list of items with at most `max_concurrent` in flight
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    max_concurrent: usize,
}

impl TaskRunner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `worker(item, index)` for every item and wait for all of them
    pub async fn run<T, R, E, F, Fut, P>(
        &self,
        items: Vec<T>,
        worker: F,
        on_progress: P,
    ) -> RunReport<T, R, E>
    where
        T: Clone,
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        P: Fn(TaskProgress<'_, R, E>),
    {
        let total = items.len();
        let semaphore = Semaphore::new(self.max_concurrent);
        let completed = AtomicUsize::new(0);

        let tasks = items.into_iter().enumerate().map(|(index, item)| {
            let semaphore = &semaphore;
            let worker = &worker;
            let completed = &completed;
            let on_progress = &on_progress;

            async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire().await.ok();
                let outcome = worker(item.clone(), index).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(TaskProgress {
                    completed: done,
                    total,
                    index,
                    outcome: outcome.as_ref(),
                });

                (index, item, outcome)
            }
        });

        let settled = join_all(tasks).await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (index, item, outcome) in settled {
            match outcome {
                Ok(value) => results.push((index, value)),
                Err(error) => errors.push(TaskFailure { index, error, item }),
            }
        }

        tracing::debug!(
            total,
            succeeded = results.len(),
            failed = errors.len(),
            max_concurrent = self.max_concurrent,
            "Task run settled"
        );

        RunReport {
            results,
            errors,
            completed: completed.into_inner(),
            total,
        }
    }
}
