//! Layered operation scheduling
//!
//! The coordinator loop computes the next ready layer, dispatches one task
//! per (service, host) to the worker pool, consumes completion messages,
//! shrinks the graph, and repeats until the live table is empty or a fatal
//! failure aborts the run. All graph mutation happens here; workers only
//! execute commands and report results.

pub mod graph;
pub mod pool;

pub use pool::WorkerPool;

use crate::cluster::ClusterModel;
use crate::error::{FlotillaError, Result};
use crate::exec::{ExecContext, Operation, OperationTask};
use std::sync::Arc;

/// Completion message delivered through the worker pool
#[derive(Debug)]
pub struct TaskCompletion {
    pub service: String,
    pub host: String,
    pub result: Result<()>,
}

/// Layered fleet scheduler
pub struct Scheduler {
    pool_size: usize,
}

impl Scheduler {
    /// Create a scheduler backed by a pool of the given size
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Drive one operation across the fleet to completion
    ///
    /// Validates the pending graph first, then consumes the model layer by
    /// layer. No task of a layer is submitted before every task of the
    /// previous layer has reported completion. A failure stops further
    /// layers but lets already-dispatched siblings finish.
    pub async fn run(
        &self,
        mut model: ClusterModel,
        operation: Operation,
        ctx: Arc<ExecContext>,
    ) -> Result<()> {
        let direction = operation.direction();
        graph::validate(&model, direction)?;

        let mut pool: WorkerPool<TaskCompletion> = WorkerPool::new(self.pool_size);

        while !model.is_empty() {
            let layer = model.ready_layer(direction);
            if layer.is_empty() {
                return Err(FlotillaError::Internal(format!(
                    "No runnable services among {} pending after validation",
                    model.services.len()
                )));
            }

            tracing::debug!("Dispatching layer: {}", layer.join(", "));

            let mut outstanding = 0usize;
            for name in &layer {
                let Some(service) = model.services.get(name) else {
                    continue;
                };
                for binding in service.hosts.values() {
                    let task = OperationTask::snapshot(&model, service, binding, operation);
                    let ctx = Arc::clone(&ctx);
                    pool.submit(async move {
                        let service = task.service.clone();
                        let host = task.host.clone();
                        let result = task.run(&ctx).await;
                        TaskCompletion {
                            service,
                            host,
                            result,
                        }
                    });
                    outstanding += 1;
                }
            }

            let mut abort: Option<FlotillaError> = None;
            while outstanding > 0 {
                let Some(completion) = pool.next_completion().await else {
                    return Err(FlotillaError::Internal(
                        "Worker pool closed with tasks outstanding".to_string(),
                    ));
                };
                outstanding -= 1;

                match completion.result {
                    Ok(()) => model.complete(&completion.service, &completion.host),
                    Err(error) => {
                        tracing::error!("{}", error);
                        if abort.is_none() {
                            abort = Some(error);
                        }
                    }
                }
            }

            if let Some(error) = abort {
                return Err(error);
            }
        }

        Ok(())
    }
}
