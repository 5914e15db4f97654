use std::fs;

use medallion_run::plan::StepSpec;
use medallion_run::resolver::{ArtifactLocator, FsLocator, resolve_step, resolve_steps};
use tempfile::tempdir;

fn touch(dir: &std::path::Path, name: &str) {
    fs::write(dir.join(name), "{}").unwrap();
}

#[test]
fn first_existing_candidate_wins() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "bronze_clean.ipynb");
    let locator = FsLocator::new(temp.path());

    let spec = StepSpec::parse("bronze_clean.ipynb|bronze.ipynb");
    let resolved = resolve_step(&spec, &locator);
    assert_eq!(resolved.identifier, "bronze_clean.ipynb");
    assert!(!resolved.deferred);

    touch(temp.path(), "bronze.ipynb");
    let resolved = resolve_step(&spec, &locator);
    assert_eq!(resolved.identifier, "bronze_clean.ipynb");
}

#[test]
fn falls_back_to_later_candidate() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "bronze.ipynb");
    let locator = FsLocator::new(temp.path());

    let resolved = resolve_step(&StepSpec::parse("bronze_clean.ipynb|bronze.ipynb"), &locator);
    assert_eq!(resolved.identifier, "bronze.ipynb");
    assert_eq!(resolved.name(), "bronze");
}

#[test]
fn missing_chain_defers_to_last_candidate() {
    let temp = tempdir().unwrap();
    let locator = FsLocator::new(temp.path());

    let resolved = resolve_step(&StepSpec::parse("a.ipynb|b.ipynb|c.ipynb"), &locator);
    assert_eq!(resolved.identifier, "c.ipynb");
    assert!(resolved.deferred);
    assert!(!locator.exists(&resolved.identifier));
}

#[test]
fn resolution_preserves_order_and_length() {
    let temp = tempdir().unwrap();
    for name in ["s1.ipynb", "s3.ipynb"] {
        touch(temp.path(), name);
    }
    let locator = FsLocator::new(temp.path());
    let specs = vec![
        StepSpec::parse("s1.ipynb"),
        StepSpec::parse("s2.ipynb"),
        StepSpec::new(["s3_v2.ipynb", "s3.ipynb"]),
    ];

    let resolved = resolve_steps(&specs, &locator);
    let ids: Vec<_> = resolved.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, ["s1.ipynb", "s2.ipynb", "s3.ipynb"]);
    assert_eq!(
        resolved.iter().map(|r| r.deferred).collect::<Vec<_>>(),
        [false, true, false]
    );
}
