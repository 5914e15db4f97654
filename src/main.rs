use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use medallion_run::executor::PapermillExecutor;
use medallion_run::inject::KernelSpec;
use medallion_run::observability::{RunMetrics, log_metrics};
use medallion_run::params::ParameterSet;
use medallion_run::plan::Plan;
use medallion_run::resolver::{FsLocator, resolve_steps};
use medallion_run::storage::{GcsStore, LocalStore, ObjectStore};
use medallion_run::tracker::{DEFAULT_NAMESPACE, RunContext, RunId, RunTracker};
use medallion_run::validation::validate_plan;
use medallion_run::{FailureKind, Orchestrator, RunOutcome};
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
            let _ = err.print();
            return code;
        }
    };

    if let Err(err) = configure_tracing() {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

fn run(cli: Cli) -> Result<u8> {
    let run_id = RunId::from_arg(&cli.timestamp)?;
    println!("RUN_TS: {run_id}");

    let params = ParameterSet::for_run(&cli.project, &cli.region, &cli.bucket, run_id.as_str())?;

    let plan = match &cli.plan {
        Some(path) => Plan::load(path)?,
        None => Plan::default(),
    };
    check_plan(&plan, cli.plan.as_deref())?;

    let locator = FsLocator::new(&cli.notebook_dir);
    let steps = resolve_steps(&plan.steps, &locator);
    println!("Order:");
    for (idx, step) in steps.iter().enumerate() {
        let note = if step.deferred { "  (not found)" } else { "" };
        println!("  {}. {}{}", idx + 1, step.identifier, note);
    }

    if cli.dry_run {
        println!("Parameters:");
        for (key, value) in params.iter() {
            println!("  {key} = {value}");
        }
        info!("Dry run requested; nothing executed");
        return Ok(0);
    }

    let ctx = RunContext::new(&cli.namespace, run_id)?;

    fs::create_dir_all(&cli.work_dir)
        .with_context(|| format!("Failed to create work directory: {}", cli.work_dir.display()))?;

    let (store, location): (Box<dyn ObjectStore>, String) = match cli.store {
        StoreKind::Gcs => (
            Box::new(GcsStore::from_env(&cli.bucket)?) as Box<dyn ObjectStore>,
            format!("gs://{}", cli.bucket.trim_end_matches('/')),
        ),
        StoreKind::Local => {
            let root = cli
                .store_root
                .clone()
                .ok_or_else(|| anyhow!("--store-root is required with --store local"))?;
            let display = root.display().to_string();
            (Box::new(LocalStore::new(root)) as Box<dyn ObjectStore>, display)
        }
    };

    let runs_location = format!("{location}/{}", ctx.runs_prefix);
    let logs_location = format!("{location}/{}", ctx.logs_prefix);
    let tracker = RunTracker::new(ctx, store.as_ref());
    let executor = PapermillExecutor::new(&cli.runner);

    let orchestrator = Orchestrator::new(steps, params, tracker, &locator, &executor)
        .with_kernel(KernelSpec::python(Some(cli.kernel.as_str())))
        .with_work_dir(&cli.work_dir);
    let report = orchestrator.run();

    if cli.print_metrics || cli.metrics_json.is_some() {
        let metrics = RunMetrics::from_report(&report);
        if cli.print_metrics {
            log_metrics(&metrics);
        }
        if let Some(path) = &cli.metrics_json {
            write_metrics(path, &metrics)?;
        }
    }

    match &report.outcome {
        RunOutcome::Completed => {
            println!("Pipeline completed ({} step(s)).", report.steps.len());
            println!("Markers: {runs_location}");
            println!("Logs:    {logs_location}");
        }
        RunOutcome::Failed(failure) => {
            println!("[{}] FAILED -> {}", failure.step, failure.message);
            if failure.kind == FailureKind::Execution {
                println!("Diagnostic: {runs_location}/{}_FAILED.json", failure.step);
            }
        }
    }

    Ok(report.exit_code())
}

fn check_plan(plan: &Plan, source: Option<&Path>) -> Result<()> {
    let label = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());
    let report = validate_plan(plan);

    for warning in &report.warnings {
        warn!(plan = %label, "{warning}");
    }

    if report.is_ok() {
        return Ok(());
    }
    for error_msg in &report.errors {
        error!(plan = %label, "{error_msg}");
    }
    Err(anyhow!(
        "Plan validation failed with {} error(s)",
        report.errors.len()
    ))
}

fn write_metrics(path: &Path, metrics: &RunMetrics) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create metrics directory: {}", parent.display())
        })?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
    to_writer_pretty(file, metrics)
        .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
    info!(metrics = %path.display(), "Metrics JSON written");
    Ok(())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreKind {
    Gcs,
    Local,
}

#[derive(Parser)]
#[command(
    name = "medallion-run",
    version,
    about = "Runs the Bronze -> Silver -> Gold notebook pipeline"
)]
struct Cli {
    #[arg(long)]
    project: String,
    #[arg(long)]
    bucket: String,
    #[arg(long, default_value = "us-west1")]
    region: String,
    #[arg(long, default_value = "auto", help = "\"auto\" or a fixed run id (YYYYmmdd-HHMMSS)")]
    timestamp: String,
    #[arg(long, help = "Print the resolved order and parameters, then exit")]
    dry_run: bool,
    #[arg(long)]
    plan: Option<PathBuf>,
    #[arg(long = "notebook-dir", default_value = ".")]
    notebook_dir: PathBuf,
    #[arg(long = "work-dir", default_value = ".")]
    work_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,
    #[arg(long, value_enum, default_value_t = StoreKind::Gcs)]
    store: StoreKind,
    #[arg(long = "store-root", required_if_eq("store", "local"))]
    store_root: Option<PathBuf>,
    #[arg(long, default_value = "papermill")]
    runner: String,
    #[arg(long, default_value = "python3")]
    kernel: String,
    #[arg(long)]
    print_metrics: bool,
    #[arg(long = "metrics-json")]
    metrics_json: Option<PathBuf>,
}
