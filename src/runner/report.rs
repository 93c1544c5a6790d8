use crate::matrix::case::Expectation;
use crate::matrix::variables::VariableSet;
use crate::runner::assertion::CaseFailure;
use crate::terraform::schema::SchemaWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub full_name: String,
    pub expect: Expectation,
    pub status: CaseStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub schema_warnings: Vec<SchemaWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Variables the case ran with, sensitive values masked.
    pub variables: VariableSet,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub module: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub terraform_version: Option<String>,
    pub suites: Vec<SuiteReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl RunReport {
    pub fn cases(&self) -> impl Iterator<Item = &CaseReport> {
        self.suites.iter().flat_map(|s| s.cases.iter())
    }

    pub fn totals(&self) -> RunTotals {
        self.cases().fold(RunTotals::default(), |mut totals, case| {
            totals.total += 1;
            match case.status {
                CaseStatus::Passed => totals.passed += 1,
                CaseStatus::Failed => totals.failed += 1,
                CaseStatus::TimedOut => totals.timed_out += 1,
            }
            totals
        })
    }

    pub fn passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::passed)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
