//! Remote operation execution
//!
//! Renders and runs one (service, host) command, including the status
//! pre-check and the probe reconciliation loop that confirms a state
//! transition actually took effect.

pub mod report;
pub mod shell;

pub use report::Reporter;
pub use shell::{CommandRunner, ShellRunner};

use crate::cluster::{
    instantiate, ClusterModel, Description, HostBinding, OrderDirection, Service, VarNamespace,
};
use crate::error::{FlotillaError, Result};
use clap::ValueEnum;
use std::sync::Arc;
use std::time::Duration;

/// Fleet operation requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Operation {
    /// Start services, prerequisites first
    Start,
    /// Stop services, dependents first
    Stop,
    /// Probe service state
    Status,
    /// Report the resolved target set
    List,
}

impl Operation {
    /// Traversal direction over the prerequisite graph
    pub fn direction(self) -> OrderDirection {
        match self {
            Operation::Stop => OrderDirection::Reverse,
            _ => OrderDirection::Forward,
        }
    }

    /// The operation keyword
    pub fn name(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Status => "status",
            Operation::List => "list",
        }
    }

    /// Progressive form for progress lines
    fn gerund(self) -> &'static str {
        match self {
            Operation::Start => "starting",
            Operation::Stop => "stopping",
            Operation::Status => "checking",
            Operation::List => "listing",
        }
    }

    /// Past form for progress lines
    fn past(self) -> &'static str {
        match self {
            Operation::Start => "started",
            Operation::Stop => "stopped",
            Operation::Status => "checked",
            Operation::List => "listed",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run-wide status probe policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum probes per state transition
    pub probe_count: u32,
    /// Initial wait; doubles after every wait
    pub probe_period: Duration,
}

/// Shared context for every task of one run
pub struct ExecContext {
    /// Immutable variable namespace
    pub vars: VarNamespace,
    /// Probe policy
    pub policy: RetryPolicy,
    /// Shell primitive
    pub runner: Arc<dyn CommandRunner>,
    /// Status stream and list report
    pub reporter: Arc<Reporter>,
}

/// One (service, host) work item, snapshotted from the model
///
/// Owns everything it needs so the coordinator is free to mutate the live
/// table while tasks are in flight.
#[derive(Debug, Clone)]
pub struct OperationTask {
    pub service: String,
    pub host: String,
    pub operation: Operation,
    pub execute: bool,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub status: Option<String>,
    /// Resolved transport template
    pub transport: Option<String>,
    pub probe_immediately: bool,
    pub description: Description,
}

impl OperationTask {
    /// Snapshot one (service, host) pair for execution
    pub fn snapshot(
        model: &ClusterModel,
        service: &Service,
        binding: &HostBinding,
        operation: Operation,
    ) -> Self {
        let transport = service
            .transport
            .as_ref()
            .and_then(|name| model.transports.get(name))
            .cloned();

        Self {
            service: service.name.clone(),
            host: binding.host.clone(),
            operation,
            execute: binding.execute,
            start: service.start.clone(),
            stop: service.stop.clone(),
            status: service.status.clone(),
            transport,
            probe_immediately: service.probe_immediately,
            description: binding
                .description
                .clone()
                .unwrap_or_else(|| service.describe(&binding.host)),
        }
    }

    fn template_for(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::Start => self.start.as_deref(),
            Operation::Stop => self.stop.as_deref(),
            Operation::Status => self.status.as_deref(),
            Operation::List => None,
        }
    }

    /// Render an operation template through the two template stages
    fn render(&self, template: &str, vars: &VarNamespace) -> Result<String> {
        let rendered = instantiate(template, vars)?;
        match &self.transport {
            Some(transport) => instantiate(transport, &vars.with([("COMMAND", rendered.as_str())])),
            None => Ok(rendered),
        }
    }

    fn failure(&self, reason: impl Into<String>) -> FlotillaError {
        FlotillaError::Execution {
            operation: self.operation.name().to_string(),
            service: self.service.clone(),
            host: self.host.clone(),
            reason: reason.into(),
        }
    }

    /// Execute the task
    pub async fn run(self, ctx: &ExecContext) -> Result<()> {
        if !self.execute {
            return Ok(());
        }

        if self.operation == Operation::List {
            ctx.reporter.list_row(self.description.clone())?;
            return Ok(());
        }

        let Some(template) = self.template_for(self.operation) else {
            tracing::debug!(
                "{} has no {} command, skipping on {}",
                self.service,
                self.operation,
                self.host
            );
            return Ok(());
        };

        let vars = ctx
            .vars
            .with([("HOST", self.host.as_str()), ("NAME", self.service.as_str())]);
        let command = self.render(template, &vars)?;

        let status_command = match &self.status {
            Some(template) if self.operation != Operation::Status => {
                Some(self.render(template, &vars)?)
            }
            _ => None,
        };

        // Skip the main command when a pre-check shows the target state
        // already holds.
        if let Some(check) = &status_command {
            let code = ctx.runner.run(check).await?;
            match self.operation {
                Operation::Start if code == 0 => {
                    ctx.reporter
                        .progress(format!("{} already running on {}", self.service, self.host));
                    return Ok(());
                }
                Operation::Stop if code != 0 => {
                    ctx.reporter
                        .progress(format!("{} already stopped on {}", self.service, self.host));
                    return Ok(());
                }
                _ => {}
            }
        }

        match self.operation {
            Operation::Status => {
                let code = ctx.runner.run(&command).await?;
                let state = if code == 0 { "running" } else { "not running" };
                ctx.reporter
                    .progress(format!("{} {} on {}", self.service, state, self.host));
                Ok(())
            }
            Operation::Start | Operation::Stop => {
                ctx.reporter.progress(format!(
                    "{} {} on {}",
                    self.operation.gerund(),
                    self.service,
                    self.host
                ));

                let code = ctx.runner.run(&command).await?;
                if code != 0 {
                    ctx.reporter.progress(format!(
                        "{} failed to {} on {} (exit status {})",
                        self.service, self.operation, self.host, code
                    ));
                    return Err(self.failure(format!("exit status {}", code)));
                }

                match &status_command {
                    Some(check) => self.reconcile(ctx, check).await,
                    None => {
                        ctx.reporter.progress(format!(
                            "{} {} on {}",
                            self.service,
                            self.operation.past(),
                            self.host
                        ));
                        Ok(())
                    }
                }
            }
            Operation::List => Ok(()),
        }
    }

    /// Probe until the target state is observed or the probes run out
    ///
    /// Each wait doubles the previous one; the wait before the first
    /// probe is skipped when the service asks to probe immediately.
    /// Exhaustion fails a start but only downgrades a stop to a warning.
    async fn reconcile(&self, ctx: &ExecContext, check: &str) -> Result<()> {
        let mut delay = ctx.policy.probe_period;

        for attempt in 0..ctx.policy.probe_count {
            if attempt > 0 || !self.probe_immediately {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            let code = ctx.runner.run(check).await?;
            let settled = match self.operation {
                Operation::Start => code == 0,
                _ => code != 0,
            };
            if settled {
                ctx.reporter.progress(format!(
                    "{} {} on {}",
                    self.service,
                    self.operation.past(),
                    self.host
                ));
                return Ok(());
            }

            tracing::debug!(
                "Probe {}/{} for {} on {}: state not yet reached",
                attempt + 1,
                ctx.policy.probe_count,
                self.service,
                self.host
            );
        }

        match self.operation {
            Operation::Start => {
                ctx.reporter.progress(format!(
                    "{} failed to start on {} ({} probes exhausted)",
                    self.service, self.host, ctx.policy.probe_count
                ));
                Err(self.failure(format!(
                    "still not running after {} status probes",
                    ctx.policy.probe_count
                )))
            }
            _ => {
                tracing::warn!(
                    "{} may still be running on {} ({} probes exhausted)",
                    self.service,
                    self.host,
                    ctx.policy.probe_count
                );
                ctx.reporter.progress(format!(
                    "warning: {} may still be running on {}",
                    self.service, self.host
                ));
                Ok(())
            }
        }
    }
}
