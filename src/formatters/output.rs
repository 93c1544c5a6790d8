use crate::matrix::suite::Suite;
use crate::runner::report::{CaseReport, CaseStatus, RunReport};
use crate::terraform::model::ValidationResult;
use crate::terraform::schema::{ModuleSchema, SchemaWarning};
use serde_json::{json, Value};
use std::fmt::Write;

/// Renders reports for the CLI, either as JSON documents or as go-test style text.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Full run report with a summary block up front
    pub fn format_run_report(report: &RunReport) -> Value {
        let totals = report.totals();
        json!({
            "summary": {
                "status": if report.passed() { "passed" } else { "failed" },
                "terraform_version": report.terraform_version,
                "started_at": report.started_at.to_rfc3339(),
                "finished_at": report.finished_at.to_rfc3339(),
                "duration_ms": report.duration_ms(),
                "totals": totals,
            },
            "suites": report.suites.iter().map(|suite| {
                json!({
                    "suite": suite.suite,
                    "module": suite.module,
                    "status": if suite.passed() { "passed" } else { "failed" },
                    "cases": suite.cases.iter().map(Self::case_json).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        })
    }

    fn case_json(case: &CaseReport) -> Value {
        let mut result = json!({
            "name": case.full_name,
            "status": case.status,
            "expect": case.expect,
            "duration_ms": case.duration_ms,
            "variables": case.variables,
        });
        if let Some(failure) = &case.failure {
            result["failure"] = json!(failure);
        }
        if !case.schema_warnings.is_empty() {
            result["schema_warnings"] = json!(Self::warning_messages(&case.schema_warnings));
        }
        if let Some(workdir) = &case.workdir {
            result["workdir"] = json!(workdir.display().to_string());
        }
        result
    }

    /// go-test style listing: one line per case, failure details indented below.
    pub fn render_run_report(report: &RunReport) -> String {
        let mut out = String::new();
        for suite in &report.suites {
            for case in &suite.cases {
                let label = match case.status {
                    CaseStatus::Passed => "PASS",
                    CaseStatus::Failed => "FAIL",
                    CaseStatus::TimedOut => "FAIL (timeout)",
                };
                let _ = writeln!(
                    out,
                    "--- {}: {} ({:.2}s)",
                    label,
                    case.full_name,
                    case.duration_ms as f64 / 1000.0
                );
                for warning in &case.schema_warnings {
                    let _ = writeln!(out, "    warning: {}", warning);
                }
                if let Some(failure) = &case.failure {
                    let _ = writeln!(out, "    [{}] {}", failure.stage, failure.message);
                    if let Some(diagnostics) = &failure.diagnostics {
                        for line in diagnostics.lines() {
                            let _ = writeln!(out, "        {}", line);
                        }
                    }
                }
                if let Some(workdir) = &case.workdir {
                    let _ = writeln!(out, "    workdir: {}", workdir.display());
                }
            }
        }

        let totals = report.totals();
        let status = if report.passed() { "ok" } else { "FAIL" };
        let _ = writeln!(
            out,
            "{}\t{} passed, {} failed, {} timed out\t{:.2}s",
            status,
            totals.passed,
            totals.failed,
            totals.timed_out,
            report.duration_ms() as f64 / 1000.0
        );
        out
    }

    /// Suites and their case names
    pub fn format_suite_list(suites: &[Suite]) -> Value {
        json!({
            "summary": {
                "total_suites": suites.len(),
                "total_cases": suites.iter().map(|s| s.cases.len()).sum::<usize>(),
            },
            "suites": suites.iter().map(|suite| {
                json!({
                    "suite": suite.name,
                    "module": suite.module,
                    "cases": suite.cases.iter().map(|case| {
                        json!({
                            "name": suite.full_name(case),
                            "expect": case.expect,
                            "coverage": case.coverage,
                        })
                    }).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        })
    }

    pub fn render_suite_list(suites: &[Suite]) -> String {
        let mut out = String::new();
        for suite in suites {
            let _ = writeln!(out, "{} ({})", suite.name, suite.module);
            for case in &suite.cases {
                if case.name != suite.name {
                    let _ = writeln!(out, "    {}", case.name);
                }
            }
        }
        out
    }

    /// Result of a single ad hoc validation
    pub fn format_validation_result(
        module: &str,
        result: &ValidationResult,
        warnings: &[SchemaWarning],
    ) -> Value {
        json!({
            "module": module,
            "validation": {
                "status": if result.valid { "valid" } else { "invalid" },
                "summary": {
                    "error_count": result.error_count,
                    "warning_count": result.warning_count,
                },
                "diagnostics": result.diagnostics,
            },
            "schema_warnings": Self::warning_messages(warnings),
        })
    }

    pub fn format_schema(module: &str, schema: &ModuleSchema) -> Value {
        json!({
            "module": module,
            "directory": schema.module_dir.display().to_string(),
            "file_count": schema.file_count,
            "summary": {
                "total_variables": schema.variables.len(),
                "required": schema.variables.iter().filter(|v| v.required).count(),
            },
            "variables": schema.variables,
        })
    }

    fn warning_messages(warnings: &[SchemaWarning]) -> Vec<String> {
        warnings.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::case::Expectation;
    use crate::matrix::variables::VariableSet;
    use crate::runner::assertion::{CaseFailure, Stage};
    use crate::runner::report::SuiteReport;
    use chrono::Utc;

    fn case(name: &str, status: CaseStatus, failure: Option<CaseFailure>) -> CaseReport {
        CaseReport {
            name: name.to_string(),
            full_name: format!("TestVpc/{}", name),
            expect: Expectation::Succeed,
            status,
            duration_ms: 1500,
            failure,
            schema_warnings: Vec::new(),
            workdir: None,
            variables: VariableSet::new().set("vpc_cidr", "10.0.0.0/16"),
        }
    }

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            started_at: now,
            finished_at: now,
            terraform_version: Some("1.6.6".to_string()),
            suites: vec![SuiteReport {
                suite: "TestVpc".to_string(),
                module: "vpc".to_string(),
                cases: vec![
                    case("Standard", CaseStatus::Passed, None),
                    case(
                        "BadCidr",
                        CaseStatus::Failed,
                        Some(
                            CaseFailure::new(Stage::Validate, "terraform validate reported 1 error(s)")
                                .with_diagnostics(Some("Error: Invalid CIDR block".to_string())),
                        ),
                    ),
                ],
            }],
        }
    }

    #[test]
    fn test_format_run_report() {
        let formatted = OutputFormatter::format_run_report(&report());
        assert_eq!(formatted["summary"]["status"], "failed");
        assert_eq!(formatted["summary"]["totals"]["total"], 2);
        assert_eq!(formatted["summary"]["totals"]["failed"], 1);
        assert_eq!(formatted["suites"][0]["cases"][0]["status"], "passed");
        assert_eq!(formatted["suites"][0]["cases"][1]["failure"]["stage"], "validate");
        assert!(formatted["suites"][0]["cases"][0].get("failure").is_none());
    }

    #[test]
    fn test_render_run_report() {
        let text = OutputFormatter::render_run_report(&report());
        assert!(text.contains("--- PASS: TestVpc/Standard (1.50s)"));
        assert!(text.contains("--- FAIL: TestVpc/BadCidr"));
        assert!(text.contains("        Error: Invalid CIDR block"));
        assert!(text.lines().last().unwrap().starts_with("FAIL\t1 passed, 1 failed"));
    }

    #[test]
    fn test_format_suite_list() {
        let suites = vec![Suite::new("TestVpc", "vpc", VariableSet::new())
            .case("Standard", VariableSet::new())
            .case("Small", VariableSet::new())];
        let formatted = OutputFormatter::format_suite_list(&suites);
        assert_eq!(formatted["summary"]["total_cases"], 2);
        assert_eq!(formatted["suites"][0]["cases"][1]["name"], "TestVpc/Small");

        let text = OutputFormatter::render_suite_list(&suites);
        assert_eq!(text, "TestVpc (vpc)\n    Standard\n    Small\n");
    }
}
