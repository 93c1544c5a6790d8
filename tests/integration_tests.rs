use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use tfmatrix::config::Config;
use tfmatrix::core::harness::{self, Harness};
use tfmatrix::formatters::OutputFormatter;
use tfmatrix::matrix::catalog;
use tfmatrix::matrix::suite::BUILTIN_MODULES;
use tfmatrix::runner::assertion::Stage;
use tfmatrix::runner::{CaseStatus, MatrixRunner, RunOptions};
use tfmatrix::terraform::{MockCommand, MockExecutor};

/// Helper function to create a modules root with one stub module per name
fn create_modules_root(names: &[&str]) -> TempDir {
    let root = TempDir::new().unwrap();
    for name in names {
        let dir = root.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("main.tf"), "# stub\n").unwrap();
    }
    root
}

fn runner(mock: &MockExecutor, root: &Path, options: RunOptions) -> MatrixRunner {
    MatrixRunner::new(Arc::new(mock.clone()), root.to_path_buf(), options)
}

#[tokio::test]
async fn test_builtin_catalog_runs_against_every_module() {
    let root = create_modules_root(&BUILTIN_MODULES);
    let mock = MockExecutor::new();
    let options = RunOptions {
        max_parallel: 8,
        ..RunOptions::default()
    };

    let suites = catalog::builtin_suites();
    let expected_cases: usize = suites.iter().map(|s| s.cases.len()).sum();
    let report = runner(&mock, root.path(), options).run(&suites).await;

    let totals = report.totals();
    assert_eq!(totals.total, expected_cases);
    assert_eq!(totals.passed, expected_cases);
    assert!(report.passed());
    assert_eq!(mock.call_count(MockCommand::Init), expected_cases);
    assert_eq!(mock.call_count(MockCommand::Validate), expected_cases);
    assert!(mock.peak_concurrency() <= 8);

    // Reports keep declaration order
    let reported: Vec<&str> = report.suites.iter().map(|s| s.suite.as_str()).collect();
    let declared: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(reported, declared);
}

#[tokio::test]
async fn test_kms_key_cases_are_distinguishable() {
    let root = create_modules_root(&["secrets-manager"]);
    let mock = MockExecutor::new().invalid_when(
        |vars| {
            vars.get("create_kms_key") == Some(&json!(false))
                && vars.get("kms_key_id").map_or(false, |v| !v.is_null())
        },
        "kms_key_id must be null when the default key is used",
    );
    let options = RunOptions {
        filter: Some(regex::Regex::new("KMSConfiguration").unwrap()),
        ..RunOptions::default()
    };

    let report = runner(&mock, root.path(), options)
        .run(&catalog::suites_for("secrets-manager"))
        .await;

    let outcome = |name: &str| {
        report
            .cases()
            .find(|c| c.name == name)
            .map(|c| c.status)
            .unwrap()
    };
    assert_eq!(outcome("UseDefaultEncryption"), CaseStatus::Passed);
    assert_eq!(outcome("UseExistingKMSKey"), CaseStatus::Failed);
}

#[tokio::test]
async fn test_failing_case_reports_diagnostics_and_redacts() {
    let root = create_modules_root(&["rds"]);
    let mock = MockExecutor::new().invalid_when(
        |vars| vars.get("db_instance_class") == Some(&json!("db.r5.xlarge")),
        "Instance class not available in region",
    );
    let options = RunOptions {
        filter: Some(regex::Regex::new("InstanceClasses").unwrap()),
        ..RunOptions::default()
    };

    let report = runner(&mock, root.path(), options)
        .run(&catalog::suites_for("rds"))
        .await;
    let totals = report.totals();
    assert_eq!(totals.failed, 1);
    assert_eq!(totals.passed, totals.total - 1);

    let failed = report.cases().find(|c| !c.passed()).unwrap();
    assert!(failed.full_name.ends_with("/db.r5.xlarge"));
    let failure = failed.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Validate);
    assert!(failure
        .diagnostics
        .as_deref()
        .unwrap()
        .contains("Instance class not available"));
    assert_eq!(failed.variables.get("db_password"), Some(&json!("********")));

    let rendered = OutputFormatter::render_run_report(&report);
    assert!(rendered.contains("--- FAIL: "));
    assert!(!rendered.contains("SecurePassword"));
    let json = OutputFormatter::format_run_report(&report).to_string();
    assert!(!json.contains("SecurePassword"));
}

#[tokio::test]
async fn test_matrix_file_through_harness() {
    let root = create_modules_root(&["vpc"]);
    let matrix = root.path().join("vpc-edges.json");
    fs::write(
        &matrix,
        r#"{
            "suite": "VpcEdges",
            "module": "vpc",
            "base": { "vpc_cidr": "10.0.0.0/16", "enable_nat_gateway": false },
            "cases": [
                { "name": "Standard", "vars": {} },
                { "name": "Oversized", "vars": { "vpc_cidr": "10.0.0.0/8" }, "expect": "fail" }
            ],
            "sweeps": [
                { "variable": "enable_nat_gateway", "name_prefix": "Nat_", "values": [true] }
            ]
        }"#,
    )
    .unwrap();

    let mock = MockExecutor::new().invalid_when(
        |vars| vars.get("vpc_cidr") == Some(&json!("10.0.0.0/8")),
        "CIDR block too large",
    );
    let harness = Harness::with_executor(
        Config::default(),
        root.path().to_path_buf(),
        Arc::new(mock.clone()),
    );

    let suites = harness::select_suites(&["vpc".to_string()], &[matrix], false).unwrap();
    let report = harness.run(&suites, harness.run_options().unwrap()).await;

    let names: Vec<&str> = report.cases().map(|c| c.full_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["VpcEdges/Standard", "VpcEdges/Oversized", "VpcEdges/Nat_true"]
    );
    assert!(report.passed());
}

#[tokio::test]
async fn test_run_deadline_applies_to_whole_run() {
    let root = create_modules_root(&["ecs"]);
    let mock = MockExecutor::new().with_delay(Duration::from_secs(60));
    let options = RunOptions {
        run_timeout: Duration::from_millis(200),
        max_parallel: 2,
        ..RunOptions::default()
    };

    let started = std::time::Instant::now();
    let report = runner(&mock, root.path(), options)
        .run(&catalog::suites_for("ecs"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    let totals = report.totals();
    assert_eq!(totals.timed_out, totals.total);
    assert!(!report.passed());
}
