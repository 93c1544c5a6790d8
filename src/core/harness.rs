use crate::config::{self, Config, ConfigError};
use crate::matrix::catalog;
use crate::matrix::file::{load_matrix_file, MatrixError};
use crate::matrix::suite::{Module, Suite};
use crate::matrix::variables::VariableSet;
use crate::runner::matrix_runner::{MatrixRunner, RunOptions};
use crate::runner::report::RunReport;
use crate::runner::workspace::CaseWorkspace;
use crate::shared::logging;
use crate::shared::redact::redact_variables;
use crate::terraform::model::ValidationResult;
use crate::terraform::schema::{ModuleSchema, SchemaWarning};
use crate::terraform::service::{TerraformError, TerraformExecutor, TerraformService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Terraform binary '{0}' not found")]
    TerraformNotFound(String),

    #[error("Module directory not found: {0}")]
    ModuleNotFound(PathBuf),

    #[error("No suites found for module '{0}'")]
    NoSuites(String),

    #[error("Invalid retry pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Terraform(#[from] TerraformError),
}

/// Resolves configuration, the modules root and the terraform binary, and
/// hands work to the runner.
pub struct Harness {
    config: Config,
    modules_dir: PathBuf,
    executor: Arc<dyn TerraformExecutor>,
}

impl Harness {
    pub fn new(config_path: Option<String>, modules_dir: Option<String>) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        let modules_dir = resolve_modules_dir(modules_dir, &config)?;
        let terraform_path = locate_terraform(&config)?;

        let mut service = TerraformService::new(terraform_path);
        if let Some(dir) = &config.terraform.plugin_cache_dir {
            service = service.with_plugin_cache_dir(Path::new(dir));
        }
        for (key, value) in &config.terraform.extra_env {
            service = service.with_env(key, value);
        }

        Ok(Self::with_executor(config, modules_dir, Arc::new(service)))
    }

    /// Build a harness around any executor.
    pub fn with_executor(
        config: Config,
        modules_dir: PathBuf,
        executor: Arc<dyn TerraformExecutor>,
    ) -> Self {
        Self {
            config,
            modules_dir,
            executor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Runner options from configuration, before any command line overrides.
    pub fn run_options(&self) -> Result<RunOptions, HarnessError> {
        Ok(RunOptions::from_config(&self.config.runner)?)
    }

    pub async fn run(&self, suites: &[Suite], options: RunOptions) -> RunReport {
        MatrixRunner::new(self.executor.clone(), self.modules_dir.clone(), options)
            .run(suites)
            .await
    }

    /// One ad hoc init + validate of `module` with `vars`.
    pub async fn validate_module(
        &self,
        module: &str,
        vars: &VariableSet,
    ) -> Result<(ValidationResult, Vec<SchemaWarning>), HarnessError> {
        let module = self.module(module)?;
        let warnings = ModuleSchema::load(&module.path)
            .map(|schema| schema.check(vars))
            .unwrap_or_default();

        logging::info(&format!(
            "Validating {} with {}",
            module.name,
            serde_json::Value::Object(redact_variables(vars).as_map().clone())
        ));

        let workspace = CaseWorkspace::prepare(
            &module.path,
            vars,
            self.config.runner.isolate,
            self.config.runner.keep_workdirs,
        )
        .await?;

        self.executor.init(workspace.path()).await?;
        let result = self.executor.validate(workspace.path()).await?;
        Ok((result, warnings))
    }

    pub fn schema(&self, module: &str) -> Result<ModuleSchema, HarnessError> {
        load_module_schema(&self.modules_dir, module)
    }

    fn module(&self, name: &str) -> Result<Module, HarnessError> {
        resolve_module(&self.modules_dir, name)
    }
}

/// Load configuration from `config_path`, or the per-user default.
pub fn load_config(config_path: Option<String>) -> Result<Config, HarnessError> {
    match config_path {
        Some(path) => {
            let path = absolute(PathBuf::from(path))?;
            logging::info(&format!("Using config file: {}", path.display()));
            Ok(config::init_from_path(&path)?)
        }
        None => {
            logging::debug("No config path provided, using default configuration");
            Ok(config::init_default()?)
        }
    }
}

// Priority for the modules root:
// 1. Command line argument
// 2. TFMATRIX_MODULES_DIR (already folded into the config)
// 3. Config file
// 4. ./modules
pub fn resolve_modules_dir(cli_dir: Option<String>, config: &Config) -> Result<PathBuf, HarnessError> {
    let modules_dir = match cli_dir.or_else(|| config.terraform.modules_directory.clone()) {
        Some(dir) => absolute(PathBuf::from(dir))?,
        None => std::env::current_dir()?.join("modules"),
    };
    logging::info(&format!("Using modules directory: {}", modules_dir.display()));
    Ok(modules_dir)
}

/// Built-in suites (unless disabled) plus any matrix files, restricted to
/// `modules` when it is non-empty.
pub fn select_suites(
    modules: &[String],
    matrix_files: &[PathBuf],
    include_builtin: bool,
) -> Result<Vec<Suite>, HarnessError> {
    let mut suites = if include_builtin {
        catalog::builtin_suites()
    } else {
        Vec::new()
    };
    for path in matrix_files {
        let suite = load_matrix_file(path)?;
        logging::debug(&format!(
            "Loaded matrix {} with {} case(s) from {}",
            suite.name,
            suite.cases.len(),
            path.display()
        ));
        suites.push(suite);
    }

    if modules.is_empty() {
        return Ok(suites);
    }
    if let Some(missing) = modules
        .iter()
        .find(|m| !suites.iter().any(|s| &s.module == *m))
    {
        return Err(HarnessError::NoSuites(missing.clone()));
    }
    suites.retain(|s| modules.contains(&s.module));
    Ok(suites)
}


pub fn load_module_schema(modules_dir: &Path, module: &str) -> Result<ModuleSchema, HarnessError> {
    let module = resolve_module(modules_dir, module)?;
    Ok(ModuleSchema::load(&module.path)?)
}

fn resolve_module(modules_dir: &Path, name: &str) -> Result<Module, HarnessError> {
    let module = Module::resolve(modules_dir, name);
    if !module.path.is_dir() {
        return Err(HarnessError::ModuleNotFound(module.path));
    }
    Ok(module)
}

fn absolute(path: PathBuf) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn locate_terraform(config: &Config) -> Result<PathBuf, HarnessError> {
    let terraform_path = match &config.terraform.executable_path {
        Some(path) => absolute(PathBuf::from(path))?,
        None => {
            // TERRAFORM_BINARY_NAME is folded into the config, fallback to "terraform"
            let terraform_binary = config
                .terraform
                .binary_name
                .clone()
                .unwrap_or_else(|| "terraform".to_string());
            match which::which(&terraform_binary) {
                Ok(path) => {
                    logging::info(&format!(
                        "Found Terraform binary '{}' in PATH: {}",
                        terraform_binary,
                        path.display()
                    ));
                    path
                }
                Err(_) => {
                    logging::error(&format!(
                        "Terraform binary '{}' not found in PATH",
                        terraform_binary
                    ));
                    return Err(HarnessError::TerraformNotFound(terraform_binary));
                }
            }
        }
    };

    if !terraform_path.exists() {
        logging::error(&format!(
            "Terraform binary not found at: {}",
            terraform_path.display()
        ));
        return Err(HarnessError::TerraformNotFound(
            terraform_path.display().to_string(),
        ));
    }
    Ok(terraform_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terraform::mock::{MockCommand, MockExecutor};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn harness(mock: MockExecutor) -> (Harness, TempDir) {
        let root = TempDir::new().unwrap();
        let rds = root.path().join("rds");
        fs::create_dir_all(&rds).unwrap();
        fs::write(
            rds.join("variables.tf"),
            "variable \"db_engine\" {\n  type = string\n}\n\nvariable \"db_port\" {\n  type    = number\n  default = 3306\n}\n",
        )
        .unwrap();
        let harness = Harness::with_executor(
            Config::default(),
            root.path().to_path_buf(),
            Arc::new(mock),
        );
        (harness, root)
    }

    #[test]
    fn test_select_suites_by_module() {
        let suites = select_suites(&["rds".to_string()], &[], true).unwrap();
        assert!(!suites.is_empty());
        assert!(suites.iter().all(|s| s.module == "rds"));

        let all = select_suites(&[], &[], true).unwrap();
        assert!(all.len() > suites.len());
    }

    #[test]
    fn test_select_suites_unknown_module() {
        let err = select_suites(&["lambda".to_string()], &[], true).unwrap_err();
        assert!(matches!(err, HarnessError::NoSuites(m) if m == "lambda"));
    }

    #[test]
    fn test_select_suites_from_matrix_file_only() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("edge.json");
        fs::write(
            &path,
            r#"{ "suite": "RdsEdge", "module": "rds", "base": { "db_engine": "mysql" },
                 "cases": [ { "name": "Postgres", "vars": { "db_engine": "postgres" } } ] }"#,
        )
        .unwrap();

        let suites = select_suites(&[], &[path], false).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "RdsEdge");
    }

    #[tokio::test]
    async fn test_validate_module() {
        let mock = MockExecutor::new().invalid_when(
            |vars| vars.get("db_engine") == Some(&json!("oracle")),
            "Unsupported engine",
        );
        let (harness, _root) = harness(mock.clone());

        let (result, warnings) = harness
            .validate_module("rds", &VariableSet::new().set("db_engine", "mysql"))
            .await
            .unwrap();
        assert!(result.valid);
        assert!(warnings.is_empty());

        let (result, warnings) = harness
            .validate_module("rds", &VariableSet::new().set("engine", "oracle"))
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(
            warnings,
            vec![
                SchemaWarning::Undeclared("engine".to_string()),
                SchemaWarning::MissingRequired("db_engine".to_string()),
            ]
        );

        let (result, _) = harness
            .validate_module("rds", &VariableSet::new().set("db_engine", "oracle"))
            .await
            .unwrap();
        assert!(!result.valid);
        assert_eq!(mock.call_count(MockCommand::Init), 3);
    }

    #[tokio::test]
    async fn test_validate_missing_module() {
        let (harness, _root) = harness(MockExecutor::new());
        let err = harness
            .validate_module("vpc", &VariableSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_init_error_propagates() {
        let mock = MockExecutor::new().fail_init_when(|_| true, "Error: Failed to query provider");
        let (harness, _root) = harness(mock);
        let err = harness
            .validate_module("rds", &VariableSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Terraform(TerraformError::CommandFailed { .. })));
    }

    #[test]
    fn test_resolve_modules_dir_prefers_cli() {
        let mut config = Config::default();
        config.terraform.modules_directory = Some("/srv/modules".to_string());
        assert_eq!(
            resolve_modules_dir(Some("/work/modules".to_string()), &config).unwrap(),
            PathBuf::from("/work/modules")
        );
        assert_eq!(
            resolve_modules_dir(None, &config).unwrap(),
            PathBuf::from("/srv/modules")
        );
        config.terraform.modules_directory = None;
        assert!(resolve_modules_dir(None, &config)
            .unwrap()
            .ends_with("modules"));
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_name_is_looked_up_on_path() {
        let mut config = Config::default();
        config.terraform.binary_name = Some("sh".to_string());
        let path = locate_terraform(&config).unwrap();
        assert_eq!(path.file_name().unwrap(), "sh");
    }

    #[test]
    fn test_missing_terraform_binary() {
        let mut config = Config::default();
        config.terraform.executable_path = Some("/definitely/not/terraform".to_string());
        assert!(matches!(
            locate_terraform(&config),
            Err(HarnessError::TerraformNotFound(_))
        ));
    }

    #[test]
    fn test_schema() {
        let (harness, _root) = harness(MockExecutor::new());
        let schema = harness.schema("rds").unwrap();
        assert_eq!(schema.file_count, 1);
        assert!(schema.declares("db_port"));
        assert!(harness.schema("ecs").is_err());
    }
}
