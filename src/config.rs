use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default run deadline, the same 30 minutes the module suite was always run with.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_PARALLEL: usize = 4;
pub const MAX_PARALLEL_LIMIT: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub terraform: TerraformConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// Explicit path to the terraform binary. Looked up on PATH when unset.
    pub executable_path: Option<String>,
    /// Name looked up on PATH when no explicit path is set.
    pub binary_name: Option<String>,
    /// Root directory holding one sub-directory per module.
    pub modules_directory: Option<String>,
    /// Passed through as TF_PLUGIN_CACHE_DIR.
    pub plugin_cache_dir: Option<String>,
    /// Extra environment variables for every terraform invocation.
    pub extra_env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub max_parallel: usize,
    pub run_timeout_secs: u64,
    pub isolate: bool,
    pub keep_workdirs: bool,
    pub check_schema: bool,
    pub check_idempotence: bool,
    pub init_retries: u32,
    pub init_retry_delay_secs: u64,
    /// Regexes matched against init output; only matching failures are retried.
    pub retryable_errors: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            isolate: true,
            keep_workdirs: false,
            check_schema: true,
            check_idempotence: false,
            init_retries: 0,
            init_retry_delay_secs: 5,
            retryable_errors: Vec::new(),
        }
    }
}

/// Location of the per-user config file (`~/.tfmatrix/config.json`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tfmatrix").join("config.json"))
}

/// Load configuration from an explicit path. The file must exist.
pub fn init_from_path(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Load the per-user config file when present, otherwise defaults.
pub fn init_default() -> Result<Config, ConfigError> {
    match default_config_path() {
        Some(path) if path.exists() => init_from_path(&path),
        _ => {
            let mut config = Config::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
            Ok(config)
        }
    }
}

/// Environment variables take precedence over the config file.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("TFMATRIX_MODULES_DIR") {
        config.terraform.modules_directory = Some(dir);
    }
    if let Some(name) = lookup("TERRAFORM_BINARY_NAME") {
        // A binary named in the environment beats a path from the config file
        config.terraform.binary_name = Some(name);
        config.terraform.executable_path = None;
    }
    if let Some(dir) = lookup("TF_PLUGIN_CACHE_DIR") {
        config.terraform.plugin_cache_dir = Some(dir);
    }
    if let Some(value) = lookup("TFMATRIX_MAX_PARALLEL") {
        config.runner.max_parallel =
            value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "TFMATRIX_MAX_PARALLEL".to_string(),
                value: value.clone(),
            })?;
    }
    if let Some(value) = lookup("TFMATRIX_TIMEOUT_SECS") {
        config.runner.run_timeout_secs =
            value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "TFMATRIX_TIMEOUT_SECS".to_string(),
                value: value.clone(),
            })?;
    }
    Ok(())
}

impl RunnerConfig {
    /// Parallelism actually used by the runner. Without isolation every case
    /// shares the module directory, so cases run one at a time.
    pub fn effective_parallelism(&self) -> usize {
        if !self.isolate {
            return 1;
        }
        self.max_parallel.clamp(1, MAX_PARALLEL_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.runner.max_parallel, DEFAULT_MAX_PARALLEL);
        assert_eq!(config.runner.run_timeout_secs, 1800);
        assert!(config.runner.isolate);
        assert_eq!(config.runner.init_retries, 0);
        assert!(config.terraform.executable_path.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "runner": { "max_parallel": 8 } }"#).unwrap();
        assert_eq!(config.runner.max_parallel, 8);
        assert!(config.runner.isolate);
        assert!(config.runner.check_schema);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TFMATRIX_MODULES_DIR", "/srv/modules"),
            ("TFMATRIX_MAX_PARALLEL", "2"),
            ("TFMATRIX_TIMEOUT_SECS", "60"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(
            config.terraform.modules_directory.as_deref(),
            Some("/srv/modules")
        );
        assert_eq!(config.runner.max_parallel, 2);
        assert_eq!(config.runner.run_timeout_secs, 60);
    }

    #[test]
    fn test_binary_name_env_beats_config_path() {
        let mut config: Config = serde_json::from_str(
            r#"{ "terraform": { "executable_path": "/opt/terraform/bin/terraform" } }"#,
        )
        .unwrap();
        apply_env_overrides(&mut config, |name| {
            (name == "TERRAFORM_BINARY_NAME").then(|| "tofu".to_string())
        })
        .unwrap();

        assert_eq!(config.terraform.binary_name.as_deref(), Some("tofu"));
        assert!(config.terraform.executable_path.is_none());

        let mut untouched: Config = serde_json::from_str(
            r#"{ "terraform": { "executable_path": "/opt/terraform/bin/terraform" } }"#,
        )
        .unwrap();
        apply_env_overrides(&mut untouched, |_| None).unwrap();
        assert_eq!(
            untouched.terraform.executable_path.as_deref(),
            Some("/opt/terraform/bin/terraform")
        );
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, |name| {
            (name == "TFMATRIX_MAX_PARALLEL").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("TFMATRIX_MAX_PARALLEL"));
    }

    #[test]
    fn test_effective_parallelism() {
        let mut runner = RunnerConfig {
            max_parallel: 100,
            ..RunnerConfig::default()
        };
        assert_eq!(runner.effective_parallelism(), MAX_PARALLEL_LIMIT);

        runner.max_parallel = 0;
        assert_eq!(runner.effective_parallelism(), 1);

        runner.max_parallel = 6;
        runner.isolate = false;
        assert_eq!(runner.effective_parallelism(), 1);
    }

    #[test]
    fn test_init_from_missing_path() {
        let err = init_from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
