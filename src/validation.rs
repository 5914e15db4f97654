use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::plan::{Plan, StepSpec};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_plan(plan: &Plan) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.version != 1 {
        report
            .errors
            .push(format!("Unsupported plan version: {}", plan.version));
    }

    if plan.steps.is_empty() {
        report
            .errors
            .push("Plan must contain at least one step".into());
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        report.merge(validate_step(idx, step));
        for stem in step.candidates().iter().filter_map(|c| candidate_stem(c)) {
            match seen.get(&stem) {
                Some(&first) if first != idx => report.warnings.push(format!(
                    "Step {} reuses step name '{}' from step {}; markers will collide",
                    idx + 1,
                    stem,
                    first + 1
                )),
                Some(_) => {}
                None => {
                    seen.insert(stem, idx);
                }
            }
        }
    }

    report
}

fn validate_step(idx: usize, step: &StepSpec) -> ValidationReport {
    let mut report = ValidationReport::default();
    if step.candidates().is_empty() {
        report
            .errors
            .push(format!("Step {} has no candidates", idx + 1));
    }
    for candidate in step.candidates() {
        if candidate.is_empty() {
            report
                .errors
                .push(format!("Step {} ('{}') has an empty candidate", idx + 1, step));
        } else if !candidate.ends_with(".ipynb") {
            report.warnings.push(format!(
                "Step {} candidate '{}' does not look like a notebook",
                idx + 1,
                candidate
            ));
        }
    }
    report
}

fn candidate_stem(candidate: &str) -> Option<String> {
    Path::new(candidate)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
}
