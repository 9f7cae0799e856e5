//! Bounded worker pool
//!
//! A fixed set of workers drains a shared job queue; each job resolves to
//! a completion value forwarded exactly once over the completion channel.
//! The pool knows nothing about the work it runs. Dropping the pool closes
//! the queue and the workers wind down after their current job.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type Job<R> = Pin<Box<dyn Future<Output = R> + Send>>;

/// Fixed-size pool executing submitted futures
pub struct WorkerPool<R> {
    jobs: mpsc::UnboundedSender<Job<R>>,
    completions: mpsc::UnboundedReceiver<R>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Spawn a pool with the given number of workers (at least one)
    pub fn new(size: usize) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel::<Job<R>>();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..size.max(1))
            .map(|_| {
                let job_rx = Arc::clone(&job_rx);
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    loop {
                        let job = { job_rx.lock().await.recv().await };
                        let Some(job) = job else {
                            break;
                        };
                        let result = job.await;
                        if done_tx.send(result).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            jobs: job_tx,
            completions: done_rx,
            workers,
        }
    }

    /// Queue a job for execution
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = R> + Send + 'static,
    {
        // The receiver outlives the sender while the pool is alive.
        let _ = self.jobs.send(Box::pin(job));
    }

    /// Await the next completion, in whatever order jobs finish
    pub async fn next_completion(&mut self) -> Option<R> {
        self.completions.recv().await
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
