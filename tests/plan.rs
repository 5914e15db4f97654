use std::fs;

use medallion_run::plan::{Plan, StepSpec};
use medallion_run::validation::validate_plan;
use tempfile::tempdir;

#[test]
fn default_plan_runs_bronze_to_gold() {
    let plan = Plan::default();
    assert_eq!(plan.steps.len(), 8);
    assert_eq!(
        plan.steps[0].candidates(),
        ["Camada_Bronze_clean.ipynb", "Camada_Bronze.ipynb"]
    );
    assert_eq!(plan.steps[7].to_string(), "matches_gold.ipynb");
    assert!(validate_plan(&plan).is_ok());
}

#[test]
fn plan_yaml_accepts_both_notations() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("plan.yaml");
    fs::write(
        &path,
        "version: 1\nsteps:\n  - bronze_clean.ipynb|bronze.ipynb\n  - [silver_v2.ipynb, silver.ipynb]\n  - gold.ipynb\n",
    )
    .unwrap();

    let plan = Plan::load(&path).unwrap();
    assert_eq!(
        plan.steps,
        vec![
            StepSpec::parse("bronze_clean.ipynb|bronze.ipynb"),
            StepSpec::new(["silver_v2.ipynb", "silver.ipynb"]),
            StepSpec::parse("gold.ipynb"),
        ]
    );
    assert!(validate_plan(&plan).is_ok());
}

#[test]
fn validation_reports_structural_errors() {
    let plan = Plan {
        version: 2,
        steps: vec![StepSpec::parse("a.ipynb||b.ipynb")],
    };
    let report = validate_plan(&plan);
    assert!(!report.is_ok());
    assert_eq!(report.errors.len(), 2, "{:?}", report.errors);

    let empty = Plan {
        version: 1,
        steps: Vec::new(),
    };
    assert!(!validate_plan(&empty).is_ok());
}

#[test]
fn validation_warns_on_colliding_step_names() {
    let plan = Plan {
        version: 1,
        steps: vec![
            StepSpec::parse("nb/teams.ipynb"),
            StepSpec::parse("other/teams.ipynb"),
        ],
    };
    let report = validate_plan(&plan);
    assert!(report.is_ok());
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn broken_yaml_is_reported_with_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.yaml");
    fs::write(&path, "version: [").unwrap();
    let err = Plan::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.yaml"));
}
