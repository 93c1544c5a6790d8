use crate::matrix::variables::VariableSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a case expects `terraform validate` to conclude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    #[default]
    Succeed,
    Fail,
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expectation::Succeed => write!(f, "succeed"),
            Expectation::Fail => write!(f, "fail"),
        }
    }
}

/// Which corner of a module's input space a case exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Every variable at its representative value.
    Baseline,
    MinimumSize,
    MaximumSize,
    /// An optional feature switched off.
    ToggleOff,
}

impl Coverage {
    pub const ALL: [Coverage; 4] = [
        Coverage::Baseline,
        Coverage::MinimumSize,
        Coverage::MaximumSize,
        Coverage::ToggleOff,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub variables: VariableSet,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default)]
    pub coverage: BTreeSet<Coverage>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, variables: VariableSet) -> Self {
        Self {
            name: name.into(),
            variables,
            expect: Expectation::Succeed,
            coverage: BTreeSet::new(),
        }
    }

    pub fn expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    pub fn covers(mut self, coverage: Coverage) -> Self {
        self.coverage.insert(coverage);
        self
    }
}
