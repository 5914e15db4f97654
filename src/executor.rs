use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::ExecutionError;
use crate::params::ParameterSet;

pub struct ExecutionRequest<'a> {
    pub step: &'a str,
    pub input: &'a Path,
    pub output: &'a Path,
    pub kernel: &'a str,
    pub params: &'a ParameterSet,
}

/// Runs one injected notebook to completion, writing the executed copy to
/// `request.output`. Blocks until the run finishes.
pub trait StepExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<(), ExecutionError>;
}

/// Drives the `papermill` command line.
#[derive(Debug, Clone)]
pub struct PapermillExecutor {
    program: PathBuf,
}

impl Default for PapermillExecutor {
    fn default() -> Self {
        Self::new("papermill")
    }
}

impl PapermillExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, request: &ExecutionRequest<'_>, params_yaml: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(request.input)
            .arg(request.output)
            .arg("-k")
            .arg(request.kernel)
            .arg("--no-progress-bar")
            .arg("-y")
            .arg(params_yaml);
        cmd
    }
}

impl StepExecutor for PapermillExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<(), ExecutionError> {
        let params_yaml = request
            .params
            .to_yaml()
            .map_err(|err| ExecutionError::new("Failed to encode parameters", format!("{err:?}")))?;
        let mut cmd = self.command(request, &params_yaml);
        let command_line = format!("{cmd:?}");
        debug!(step = request.step, command = command_line.as_str(), "Spawning runner");

        let output = cmd.output().map_err(|err| {
            ExecutionError::new(
                format!("Failed to launch {}: {err}", self.program.display()),
                format!("command: {command_line}\nerror: {err:?}\n"),
            )
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .unwrap_or_else(|| format!("runner exited with {}", output.status));
        Err(ExecutionError::new(
            summary,
            format!(
                "command: {command_line}\nstatus: {}\n--- stderr ---\n{stderr}\n--- stdout ---\n{stdout}",
                output.status
            ),
        ))
    }
}
