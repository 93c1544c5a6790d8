use crate::shared::logging;
use crate::terraform::model::{CommandOutput, TerraformValidateOutput, ValidationResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("Terraform binary not found at path: {0}")]
    BinaryNotFound(String),

    #[error("Working directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("`{command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid JSON output: {0}")]
    JsonParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TerraformError {
    /// Diagnostic text produced by the tool, when there is any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            TerraformError::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

/// The subset of the terraform CLI the matrix runner drives.
#[async_trait]
pub trait TerraformExecutor: Send + Sync {
    async fn version(&self) -> Result<String, TerraformError>;

    async fn init(&self, workdir: &Path) -> Result<CommandOutput, TerraformError>;

    /// Runs `terraform validate`. An invalid configuration is `Ok` with
    /// `valid == false`; only invocation problems are errors.
    async fn validate(&self, workdir: &Path) -> Result<ValidationResult, TerraformError>;
}

pub struct TerraformService {
    terraform_path: PathBuf,
    env: BTreeMap<String, String>,
}

impl TerraformService {
    pub fn new(terraform_path: PathBuf) -> Self {
        logging::debug(&format!(
            "TerraformService initialized with terraform path: {}",
            terraform_path.display()
        ));
        Self {
            terraform_path,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_plugin_cache_dir(self, dir: &Path) -> Self {
        self.with_env("TF_PLUGIN_CACHE_DIR", dir.to_string_lossy())
    }

    pub fn terraform_path(&self) -> &Path {
        &self.terraform_path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.terraform_path);
        cmd.args(args)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        workdir: Option<&Path>,
        args: &[&str],
    ) -> Result<std::process::Output, TerraformError> {
        let mut cmd = self.command(args);
        if let Some(dir) = workdir {
            if !dir.is_dir() {
                return Err(TerraformError::DirectoryNotFound(dir.to_path_buf()));
            }
            cmd.current_dir(dir);
        }

        logging::debug(&format!(
            "Running terraform {} in {}",
            args.join(" "),
            workdir
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        ));

        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TerraformError::BinaryNotFound(self.terraform_path.display().to_string())
            } else {
                TerraformError::IoError(e)
            }
        })
    }
}

#[async_trait]
impl TerraformExecutor for TerraformService {
    async fn version(&self) -> Result<String, TerraformError> {
        let output = self.run(None, &["version", "-json"]).await?;
        let output_str = String::from_utf8_lossy(&output.stdout);

        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&output_str) {
            if let Some(version) = json.get("terraform_version").and_then(|v| v.as_str()) {
                return Ok(version.to_string());
            }
        }

        // Older releases have no -json flag for version
        let output = self.run(None, &["version"]).await?;
        let version_output = String::from_utf8_lossy(&output.stdout);
        let version_line = version_output
            .lines()
            .find(|line| line.starts_with("Terraform") || line.starts_with("OpenTofu"))
            .unwrap_or("Unknown version");

        Ok(version_line.to_string())
    }

    async fn init(&self, workdir: &Path) -> Result<CommandOutput, TerraformError> {
        let args = ["init", "-input=false", "-no-color"];
        let output = self.run(Some(workdir), &args).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(TerraformError::CommandFailed {
                command: format!("terraform {}", args.join(" ")),
                code: output.status.code(),
                stderr: if stderr.trim().is_empty() { stdout } else { stderr },
            })
        }
    }

    async fn validate(&self, workdir: &Path) -> Result<ValidationResult, TerraformError> {
        let args = ["validate", "-json", "-no-color"];
        let output = self.run(Some(workdir), &args).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        // validate -json reports configuration errors on stdout with a
        // non-zero exit code, so parse before looking at the status
        match serde_json::from_str::<TerraformValidateOutput>(&stdout) {
            Ok(parsed) => Ok(ValidationResult::from_output(parsed, stdout)),
            Err(e) if output.status.success() => Err(TerraformError::JsonParseError(e.to_string())),
            Err(_) => Err(TerraformError::CommandFailed {
                command: format!("terraform {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = TempDir::new().unwrap();
        let service = TerraformService::new(PathBuf::from("/nonexistent/bin/terraform"));

        let err = service.init(dir.path()).await.unwrap_err();
        assert!(matches!(err, TerraformError::BinaryNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_directory_is_reported() {
        let service = TerraformService::new(PathBuf::from("terraform"));

        let err = service
            .validate(Path::new("/nonexistent/modules/vpc"))
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_tool_output_only_for_command_failures() {
        let err = TerraformError::CommandFailed {
            command: "terraform init".to_string(),
            code: Some(1),
            stderr: "Error: Failed to query available provider packages".to_string(),
        };
        assert!(err.tool_output().unwrap().contains("provider packages"));
        assert!(TerraformError::BinaryNotFound("x".into()).tool_output().is_none());
    }

    #[test]
    fn test_plugin_cache_dir_env() {
        let service = TerraformService::new(PathBuf::from("terraform"))
            .with_plugin_cache_dir(Path::new("/tmp/plugins"));
        assert_eq!(
            service.env.get("TF_PLUGIN_CACHE_DIR").map(String::as_str),
            Some("/tmp/plugins")
        );
    }
}
