use crate::matrix::case::{Coverage, TestCase};
use crate::matrix::variables::VariableSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Module directory names the catalog knows about.
pub const BUILTIN_MODULES: [&str; 5] = ["vpc", "ecs", "rds", "ec2-splunk", "secrets-manager"];

/// A module directory under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub path: PathBuf,
}

impl Module {
    /// Module `name` inside `modules_root`.
    pub fn resolve(modules_root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: modules_root.join(name),
        }
    }
}

/// A named table of cases against one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,
    pub module: String,
    pub cases: Vec<TestCase>,
    #[serde(skip)]
    base: VariableSet,
}

impl Suite {
    /// Start a table whose cases are overrides of `base`.
    pub fn new(name: impl Into<String>, module: impl Into<String>, base: VariableSet) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            cases: Vec::new(),
            base,
        }
    }

    /// A suite with exactly one case using `base` unchanged.
    pub fn single(
        name: impl Into<String>,
        module: impl Into<String>,
        base: VariableSet,
        coverage: &[Coverage],
    ) -> Self {
        let name = name.into();
        let mut case = TestCase::new(name.clone(), base.clone());
        for c in coverage {
            case = case.covers(*c);
        }
        let mut suite = Self::new(name, module, base);
        suite.cases.push(case);
        suite
    }

    /// Add a case whose variables are the base with `overrides` applied.
    pub fn case(self, name: &str, overrides: VariableSet) -> Self {
        self.case_covering(name, overrides, &[])
    }

    pub fn case_covering(mut self, name: &str, overrides: VariableSet, coverage: &[Coverage]) -> Self {
        let mut case = TestCase::new(name, self.base.merged(&overrides));
        for c in coverage {
            case = case.covers(*c);
        }
        self.cases.push(case);
        self
    }

    /// Add one case per value of `variable`, named `<prefix><value>`.
    pub fn sweep<I, V>(mut self, variable: &str, prefix: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            let value = value.into();
            let name = format!("{}{}", prefix, display_value(&value));
            let overrides = VariableSet::new().set(variable, value);
            self.cases.push(TestCase::new(name, self.base.merged(&overrides)));
        }
        self
    }

    /// Tag an already added case.
    pub fn tag(mut self, case_name: &str, coverage: Coverage) -> Self {
        if let Some(case) = self.cases.iter_mut().find(|c| c.name == case_name) {
            case.coverage.insert(coverage);
        }
        self
    }

    pub fn push(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    pub fn base(&self) -> &VariableSet {
        &self.base
    }

    /// `Suite/Case`, or just the suite name for single-case suites.
    pub fn full_name(&self, case: &TestCase) -> String {
        if case.name == self.name {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, case.name)
        }
    }
}

/// String values without their JSON quotes, everything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
