use serde::{Deserialize, Serialize};

/// Raw shape of `terraform validate -json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TerraformValidateOutput {
    pub valid: bool,
    pub error_count: i32,
    pub warning_count: i32,
    #[serde(default)]
    pub diagnostics: Vec<TerraformDiagnostic>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TerraformDiagnostic {
    pub severity: String,
    pub summary: String,
    pub detail: Option<String>,
    pub range: Option<DiagnosticRange>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DiagnosticRange {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Position {
    pub line: i32,
    pub column: i32,
    pub byte: i32,
}

impl std::fmt::Display for TerraformDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(range) = &self.range {
            write!(f, " ({}:{})", range.filename, range.start.line)?;
        }
        if let Some(detail) = self.detail.as_deref().filter(|d| !d.is_empty()) {
            write!(f, "\n  {}", detail)?;
        }
        Ok(())
    }
}

/// Outcome of one `terraform validate` invocation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub error_count: i32,
    pub warning_count: i32,
    pub diagnostics: Vec<TerraformDiagnostic>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub raw_output: String,
}

impl ValidationResult {
    pub fn from_output(output: TerraformValidateOutput, raw_output: String) -> Self {
        Self {
            valid: output.valid,
            error_count: output.error_count,
            warning_count: output.warning_count,
            diagnostics: output.diagnostics,
            raw_output,
        }
    }

    /// A passing result with no diagnostics.
    pub fn success() -> Self {
        Self {
            valid: true,
            error_count: 0,
            warning_count: 0,
            diagnostics: Vec::new(),
            raw_output: String::new(),
        }
    }

    /// An invalid result carrying a single error diagnostic.
    pub fn invalid(summary: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_count: 1,
            warning_count: 0,
            diagnostics: vec![TerraformDiagnostic {
                severity: "error".to_string(),
                summary: summary.into(),
                detail: None,
                range: None,
            }],
            raw_output: String::new(),
        }
    }

    /// Human readable diagnostic text, one diagnostic per paragraph.
    pub fn diagnostic_text(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Captured output of a terraform command that is not parsed further.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}
