use crate::matrix::case::Expectation;
use crate::terraform::model::ValidationResult;
use crate::terraform::service::TerraformError;
use serde::{Deserialize, Serialize};

/// Where in a case's lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Isolate,
    Init,
    Validate,
    Assert,
    Idempotence,
    Timeout,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Isolate => "isolate",
            Stage::Init => "init",
            Stage::Validate => "validate",
            Stage::Assert => "assert",
            Stage::Idempotence => "idempotence",
            Stage::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub stage: Stage,
    pub message: String,
    /// Diagnostic text from terraform, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl CaseFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, text: Option<String>) -> Self {
        self.diagnostics = text.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Result of one `init` + `validate` pass over a working directory.
#[derive(Debug)]
pub enum Attempt {
    InitFailed(TerraformError),
    ValidateFailed(TerraformError),
    Validated(ValidationResult),
}

impl Attempt {
    /// Whether terraform accepted the configuration.
    pub fn accepted(&self) -> bool {
        matches!(self, Attempt::Validated(result) if result.valid)
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            Attempt::Validated(result) => Some(result),
            _ => None,
        }
    }
}

/// Errors that say nothing about the configuration: the tool could not be
/// run at all.
fn is_invocation_error(err: &TerraformError) -> bool {
    matches!(
        err,
        TerraformError::BinaryNotFound(_)
            | TerraformError::DirectoryNotFound(_)
            | TerraformError::IoError(_)
    )
}

fn error_failure(stage: Stage, err: &TerraformError) -> CaseFailure {
    CaseFailure::new(stage, err.to_string())
        .with_diagnostics(err.tool_output().map(str::to_string))
}

/// Check an attempt against what the case expects.
pub fn assert_outcome(expect: Expectation, attempt: &Attempt) -> Result<(), CaseFailure> {
    match (expect, attempt) {
        (_, Attempt::InitFailed(err)) if is_invocation_error(err) => {
            Err(error_failure(Stage::Init, err))
        }
        (_, Attempt::ValidateFailed(err)) if is_invocation_error(err) => {
            Err(error_failure(Stage::Validate, err))
        }

        (Expectation::Succeed, Attempt::Validated(result)) if result.valid => Ok(()),
        (Expectation::Succeed, Attempt::Validated(result)) => Err(CaseFailure::new(
            Stage::Validate,
            format!(
                "terraform validate reported {} error(s) and {} warning(s)",
                result.error_count, result.warning_count
            ),
        )
        .with_diagnostics(Some(result.diagnostic_text()))),
        (Expectation::Succeed, Attempt::InitFailed(err)) => Err(error_failure(Stage::Init, err)),
        (Expectation::Succeed, Attempt::ValidateFailed(err)) => {
            Err(error_failure(Stage::Validate, err))
        }

        (Expectation::Fail, Attempt::Validated(result)) if result.valid => Err(CaseFailure::new(
            Stage::Assert,
            "expected validation to fail, but terraform accepted the configuration",
        )),
        (Expectation::Fail, _) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn command_failed(stderr: &str) -> TerraformError {
        TerraformError::CommandFailed {
            command: "terraform init".to_string(),
            code: Some(1),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_succeed_passes_on_valid() {
        let attempt = Attempt::Validated(ValidationResult::success());
        assert!(assert_outcome(Expectation::Succeed, &attempt).is_ok());
        assert!(attempt.accepted());
    }

    #[test]
    fn test_succeed_fails_on_invalid_with_diagnostics() {
        let attempt = Attempt::Validated(ValidationResult::invalid("Invalid CIDR block"));
        let failure = assert_outcome(Expectation::Succeed, &attempt).unwrap_err();
        assert_eq!(failure.stage, Stage::Validate);
        assert!(failure.message.contains("1 error(s)"));
        assert!(failure.diagnostics.unwrap().contains("Invalid CIDR block"));
    }

    #[test]
    fn test_succeed_fails_on_init_error() {
        let attempt = Attempt::InitFailed(command_failed("Error: registry unreachable"));
        let failure = assert_outcome(Expectation::Succeed, &attempt).unwrap_err();
        assert_eq!(failure.stage, Stage::Init);
        assert_eq!(
            failure.diagnostics.as_deref(),
            Some("Error: registry unreachable")
        );
    }

    #[test]
    fn test_fail_expectation() {
        let invalid = Attempt::Validated(ValidationResult::invalid("bad"));
        assert!(assert_outcome(Expectation::Fail, &invalid).is_ok());

        let init_failed = Attempt::InitFailed(command_failed("Unsupported argument"));
        assert!(assert_outcome(Expectation::Fail, &init_failed).is_ok());

        let valid = Attempt::Validated(ValidationResult::success());
        let failure = assert_outcome(Expectation::Fail, &valid).unwrap_err();
        assert_eq!(failure.stage, Stage::Assert);
    }

    #[test]
    fn test_invocation_errors_fail_either_way() {
        for expect in [Expectation::Succeed, Expectation::Fail] {
            let attempt =
                Attempt::InitFailed(TerraformError::BinaryNotFound("terraform".to_string()));
            let failure = assert_outcome(expect, &attempt).unwrap_err();
            assert_eq!(failure.stage, Stage::Init);
            assert!(failure.diagnostics.is_none());

            let attempt = Attempt::ValidateFailed(TerraformError::DirectoryNotFound(
                PathBuf::from("/gone"),
            ));
            assert_eq!(
                assert_outcome(expect, &attempt).unwrap_err().stage,
                Stage::Validate
            );
        }
    }
}
