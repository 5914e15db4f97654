use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::error::StepFailure;
use crate::executor::{ExecutionRequest, StepExecutor};
use crate::inject::{KernelSpec, inject_parameters};
use crate::params::ParameterSet;
use crate::resolver::{ArtifactLocator, ResolvedStep};
use crate::tracker::{RunId, RunTracker};

/// Terminal result of one step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Succeeded { artifact: PathBuf },
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub identifier: String,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed,
    Failed(StepFailure),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub steps: Vec<StepRecord>,
    pub outcome: RunOutcome,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.failure().map(|f| f.kind.exit_code()).unwrap_or(0)
    }
}

/// Runs resolved steps strictly in order and stops at the first failure.
pub struct Orchestrator<'a> {
    steps: Vec<ResolvedStep>,
    params: ParameterSet,
    tracker: RunTracker<'a>,
    locator: &'a dyn ArtifactLocator,
    executor: &'a dyn StepExecutor,
    kernel: KernelSpec,
    work_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        steps: Vec<ResolvedStep>,
        params: ParameterSet,
        tracker: RunTracker<'a>,
        locator: &'a dyn ArtifactLocator,
        executor: &'a dyn StepExecutor,
    ) -> Self {
        Self {
            steps,
            params,
            tracker,
            locator,
            executor,
            kernel: KernelSpec::default(),
            work_dir: PathBuf::from("."),
        }
    }

    pub fn with_kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    #[instrument(skip(self))]
    pub fn run(&self) -> RunReport {
        info!(
            run_id = %self.tracker.context().run_id,
            steps = self.steps.len(),
            "Starting run"
        );
        let started = Instant::now();
        let mut records = Vec::with_capacity(self.steps.len());
        let mut outcome = RunOutcome::Completed;

        for step in &self.steps {
            let name = step.name();
            let span = tracing::span!(tracing::Level::INFO, "step", step = %name);
            let _span_guard = span.enter();
            let step_started = Instant::now();

            let step_outcome = self.advance(step, &name);
            let duration = step_started.elapsed();

            let halted = match &step_outcome {
                StepOutcome::Succeeded { .. } => {
                    info!(step = %name, "Step OK");
                    None
                }
                StepOutcome::Failed(failure) => {
                    error!(step = %name, kind = %failure.kind, "Step failed: {}", failure.message);
                    Some(failure.clone())
                }
            };

            records.push(StepRecord {
                name,
                identifier: step.identifier.clone(),
                outcome: step_outcome,
                duration,
            });

            if let Some(failure) = halted {
                outcome = RunOutcome::Failed(failure);
                break;
            }
        }

        RunReport {
            run_id: self.tracker.context().run_id.clone(),
            steps: records,
            outcome,
            duration: started.elapsed(),
        }
    }

    fn advance(&self, step: &ResolvedStep, name: &str) -> StepOutcome {
        if !self.locator.exists(&step.identifier) {
            let path = self.locator.locate(&step.identifier);
            return StepOutcome::Failed(StepFailure::not_found(name, &path));
        }

        match self.execute(step, name) {
            Ok((artifact, bytes)) => match self.tracker.record_success(name, &bytes) {
                Ok(()) => StepOutcome::Succeeded { artifact },
                Err(err) => StepOutcome::Failed(StepFailure::persistence(name, &err)),
            },
            Err(failure) => match self.tracker.record_failure(name, &failure.diagnostic) {
                Ok(()) => StepOutcome::Failed(failure),
                Err(err) => {
                    warn!(step = name, "Could not persist failure marker: {err}");
                    StepOutcome::Failed(StepFailure::persistence(name, &err))
                }
            },
        }
    }

    fn execute(
        &self,
        step: &ResolvedStep,
        name: &str,
    ) -> std::result::Result<(PathBuf, Vec<u8>), StepFailure> {
        let source = self.locator.locate(&step.identifier);
        let injected = inject_parameters(&source, &self.params, &self.kernel, &self.work_dir)
            .map_err(|err| {
                StepFailure::execution(name, err.to_string(), diagnostic(anyhow::Error::new(err)))
            })?;

        let output = self
            .work_dir
            .join(self.tracker.context().artifact_name(name));
        let request = ExecutionRequest {
            step: name,
            input: injected.path(),
            output: &output,
            kernel: &self.kernel.name,
            params: &self.params,
        };
        self.executor
            .execute(&request)
            .map_err(|err| StepFailure::execution(name, err.summary, err.diagnostic))?;

        let bytes = read_artifact(&output).map_err(|err| {
            StepFailure::execution(name, format!("{err:#}"), diagnostic(err))
        })?;
        Ok((output, bytes))
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read executed notebook: {}", path.display()))
}

fn diagnostic(err: anyhow::Error) -> String {
    format!("{err:?}")
}
