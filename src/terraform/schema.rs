//! Advisory comparison of a VariableSet against a module's declared variables.

use crate::matrix::variables::VariableSet;
use crate::terraform::parser::{DeclaredVariable, TerraformParser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "variable", rename_all = "snake_case")]
pub enum SchemaWarning {
    /// Supplied but not declared by the module.
    Undeclared(String),
    /// Declared without a default and not supplied.
    MissingRequired(String),
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaWarning::Undeclared(name) => {
                write!(f, "variable '{}' is not declared by the module", name)
            }
            SchemaWarning::MissingRequired(name) => {
                write!(f, "required variable '{}' is not set", name)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSchema {
    pub module_dir: PathBuf,
    pub file_count: usize,
    pub variables: Vec<DeclaredVariable>,
}

impl ModuleSchema {
    /// Scan every `*.tf` file directly inside `module_dir`.
    pub fn load(module_dir: &Path) -> std::io::Result<Self> {
        let mut tf_files: Vec<PathBuf> = std::fs::read_dir(module_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "tf"))
            .collect();
        tf_files.sort();

        let mut variables = Vec::new();
        for path in &tf_files {
            let content = std::fs::read_to_string(path)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            variables.extend(TerraformParser::new(content).parse_variables(&file_name));
        }

        Ok(Self {
            module_dir: module_dir.to_path_buf(),
            file_count: tf_files.len(),
            variables,
        })
    }

    pub fn declares(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// Undeclared variables first, in VariableSet order, then missing
    /// required ones in declaration order.
    pub fn check(&self, vars: &VariableSet) -> Vec<SchemaWarning> {
        let mut warnings: Vec<SchemaWarning> = vars
            .names()
            .filter(|name| !self.declares(name))
            .map(|name| SchemaWarning::Undeclared(name.to_string()))
            .collect();

        warnings.extend(
            self.variables
                .iter()
                .filter(|v| v.required && !vars.contains(&v.name))
                .map(|v| SchemaWarning::MissingRequired(v.name.clone())),
        );

        warnings
    }
}
