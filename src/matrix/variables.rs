//! Input variables for one module invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// File the variables are written to inside a case's working directory.
/// Terraform loads `*.auto.tfvars.json` files automatically, after any
/// `terraform.tfvars` the module ships with.
pub const VARS_FILE_NAME: &str = "tfmatrix.auto.tfvars.json";

/// Ordered mapping from variable name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet(Map<String, Value>);

impl VariableSet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert, replacing any previous value.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Returns a copy of `self` with every entry of `overrides` applied on top.
    pub fn merged(&self, overrides: &VariableSet) -> VariableSet {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.0.insert(name.clone(), value.clone());
        }
        merged
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Parse a `name=value` assignment as given on the command line.
    /// The value is read as JSON when it parses (numbers, booleans, lists,
    /// maps, null) and as a plain string otherwise.
    pub fn parse_assignment(raw: &str) -> Option<(String, Value)> {
        let (name, value) = raw.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        Some((name.to_string(), value))
    }

    /// Read a JSON object of variables, as found in a `.tfvars.json` file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let vars: VariableSet = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{} is not a JSON object of variables: {}", path.display(), e))?;
        Ok(vars)
    }

    /// Write the variables into `dir` as [`VARS_FILE_NAME`].
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<std::path::PathBuf> {
        let path = dir.join(VARS_FILE_NAME);
        let content = serde_json::to_string_pretty(&self.0)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

impl FromIterator<(String, Value)> for VariableSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Shorthand for a JSON list of strings.
pub fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect())
}

/// Shorthand for a JSON map of strings.
pub fn string_map(entries: &[(&str, &str)]) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
    )
}
