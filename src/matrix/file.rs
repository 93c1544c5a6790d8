//! Case tables loaded from JSON matrix files.
//!
//! ```json
//! {
//!   "suite": "NetworkEdgeCases",
//!   "module": "vpc",
//!   "base": { "project_name": "edge", "enable_nat_gateway": false },
//!   "cases": [
//!     { "name": "NatOn", "vars": { "enable_nat_gateway": true }, "coverage": ["toggle_off"] }
//!   ],
//!   "sweeps": [
//!     { "variable": "vpc_cidr", "name_prefix": "Cidr_", "values": ["10.0.0.0/16"] }
//!   ]
//! }
//! ```

use crate::matrix::case::{Coverage, Expectation, TestCase};
use crate::matrix::suite::Suite;
use crate::matrix::variables::VariableSet;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Failed to read matrix file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid matrix file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Matrix {suite} defines case {case} more than once")]
    DuplicateCase { suite: String, case: String },

    #[error("Matrix {0} has no cases")]
    Empty(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixFile {
    suite: String,
    module: String,
    #[serde(default)]
    base: VariableSet,
    #[serde(default)]
    cases: Vec<MatrixCase>,
    #[serde(default)]
    sweeps: Vec<MatrixSweep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixCase {
    name: String,
    #[serde(default)]
    vars: VariableSet,
    #[serde(default)]
    expect: Expectation,
    #[serde(default)]
    coverage: Vec<Coverage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixSweep {
    variable: String,
    #[serde(default)]
    name_prefix: String,
    values: Vec<Value>,
    #[serde(default)]
    expect: Expectation,
}

/// Parse a matrix document into a suite. `origin` is only used in errors.
pub fn parse_matrix(content: &str, origin: &Path) -> Result<Suite, MatrixError> {
    let file: MatrixFile = serde_json::from_str(content).map_err(|source| MatrixError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    let mut suite = Suite::new(file.suite.clone(), file.module, file.base.clone());

    for case in file.cases {
        let mut test_case =
            TestCase::new(case.name, file.base.merged(&case.vars)).expect(case.expect);
        for c in case.coverage {
            test_case = test_case.covers(c);
        }
        suite.push(test_case);
    }

    for sweep in file.sweeps {
        let expect = sweep.expect;
        let swept = Suite::new(String::new(), String::new(), file.base.clone()).sweep(
            &sweep.variable,
            &sweep.name_prefix,
            sweep.values,
        );
        for case in swept.cases {
            suite.push(case.expect(expect));
        }
    }

    if suite.cases.is_empty() {
        return Err(MatrixError::Empty(file.suite));
    }

    let mut seen = HashSet::new();
    for case in &suite.cases {
        if !seen.insert(case.name.as_str()) {
            return Err(MatrixError::DuplicateCase {
                suite: suite.name.clone(),
                case: case.name.clone(),
            });
        }
    }

    Ok(suite)
}

pub fn load_matrix_file(path: &Path) -> Result<Suite, MatrixError> {
    let content = std::fs::read_to_string(path).map_err(|source| MatrixError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_matrix(&content, path)
}
