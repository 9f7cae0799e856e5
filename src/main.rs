//! Flotilla - a dependency-aware fleet operation orchestrator
//!
//! This is the CLI entry point for Flotilla.

use anyhow::{Context, Result};
use clap::Parser;
use flotilla::cluster::{ClusterModel, ClusterParser, VarNamespace};
use flotilla::exec::{ExecContext, Operation, Reporter, RetryPolicy, ShellRunner};
use flotilla::sched::Scheduler;
use flotilla::select;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Flotilla - fleet operations over a declarative cluster definition
#[derive(Parser)]
#[command(name = "flotilla")]
#[command(version)]
#[command(about = "Run an operation across a fleet of services", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Operation to run across the fleet
    #[arg(value_enum)]
    operation: Operation,

    /// Disable automatic prerequisite expansion
    #[arg(long)]
    no_deps: bool,

    /// Cluster definition file (default: cluster.yaml in the current directory)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Target rules: [+|-]host-glob[:service-glob|^tag-glob]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rules: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match &cli.file {
        Some(path) => path.clone(),
        None => ClusterParser::find_definition_file(Path::new("."))
            .context("no cluster definition file found in the current directory")?,
    };
    let config = ClusterParser::parse_file(&path)
        .with_context(|| format!("loading cluster definition {}", path.display()))?;

    // Initialize logging
    let filter = if cli.debug || config.settings.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut model = ClusterModel::build(&config)?;
    let vars = VarNamespace::load(&config.variables)?;

    select::apply(&mut model, cli.operation, &cli.rules, !cli.no_deps)?;

    let reporter = Arc::new(Reporter::new());
    let ctx = Arc::new(ExecContext {
        vars,
        policy: RetryPolicy {
            probe_count: config.settings.probe_count(),
            probe_period: config.settings.probe_period(),
        },
        runner: Arc::new(ShellRunner),
        reporter: Arc::clone(&reporter),
    });

    let scheduler = Scheduler::new(config.settings.pool_size());
    scheduler.run(model, cli.operation, ctx).await?;

    if cli.operation == Operation::List {
        print!("{}", reporter.render_table()?);
    }

    Ok(())
}
