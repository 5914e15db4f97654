use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::orchestrator::{RunReport, StepOutcome};

/// Serializable summary of a finished run, derived from its [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub exit_code: u8,
    pub total_duration_ms: f64,
    pub steps_succeeded: u64,
    pub steps_failed: u64,
    pub steps: Vec<StepMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepMetrics {
    pub name: String,
    pub notebook: String,
    pub status: &'static str,
    pub duration_ms: f64,
}

impl RunMetrics {
    pub fn from_report(report: &RunReport) -> Self {
        let steps: Vec<StepMetrics> = report
            .steps
            .iter()
            .map(|record| StepMetrics {
                name: record.name.clone(),
                notebook: record.identifier.clone(),
                status: match &record.outcome {
                    StepOutcome::Succeeded { .. } => "succeeded",
                    StepOutcome::Failed(failure) => failure.kind.label(),
                },
                duration_ms: millis(record.duration),
            })
            .collect();
        let steps_succeeded = report
            .steps
            .iter()
            .filter(|record| record.outcome.is_success())
            .count() as u64;

        Self {
            run_id: report.run_id.to_string(),
            exit_code: report.exit_code(),
            total_duration_ms: millis(report.duration),
            steps_succeeded,
            steps_failed: steps.len() as u64 - steps_succeeded,
            steps,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

pub fn log_metrics(metrics: &RunMetrics) {
    info!(
        run_id = metrics.run_id.as_str(),
        total_duration_ms = metrics.total_duration_ms,
        steps_succeeded = metrics.steps_succeeded,
        steps_failed = metrics.steps_failed,
        "Run metrics summary"
    );
    for step in &metrics.steps {
        info!(
            step = step.name.as_str(),
            status = step.status,
            duration_ms = step.duration_ms,
            "Step metrics"
        );
    }
}
