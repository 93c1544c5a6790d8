//! Scripted terraform executor.
//!
//! Reads the variables each case wrote into its working directory and answers
//! `init`/`validate` according to the configured rules, recording every call.
//! Used by the test suites so the runner can be exercised without a
//! terraform binary or provider downloads.

use crate::matrix::variables::{VariableSet, VARS_FILE_NAME};
use crate::terraform::model::{CommandOutput, ValidationResult};
use crate::terraform::service::{TerraformError, TerraformExecutor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type VarsPredicate = Arc<dyn Fn(&VariableSet) -> bool + Send + Sync>;

#[derive(Clone)]
struct Rule {
    matches: VarsPredicate,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCommand {
    Init,
    Validate,
}

#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub command: MockCommand,
    pub workdir: PathBuf,
    pub variables: VariableSet,
}

#[derive(Clone)]
pub struct MockExecutor {
    version: String,
    init_failures: Vec<Rule>,
    invalid_rules: Vec<Rule>,
    transient_init: Arc<AtomicUsize>,
    transient_message: String,
    delay: Duration,
    unstable: bool,
    validations_per_dir: Arc<Mutex<HashMap<PathBuf, usize>>>,
    captured: Arc<Mutex<Vec<CapturedCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockExecutor {
    /// An executor for which every init and validate succeeds.
    pub fn new() -> Self {
        Self {
            version: "1.6.6".to_string(),
            init_failures: Vec::new(),
            invalid_rules: Vec::new(),
            transient_init: Arc::new(AtomicUsize::new(0)),
            transient_message: String::new(),
            delay: Duration::ZERO,
            unstable: false,
            validations_per_dir: Arc::new(Mutex::new(HashMap::new())),
            captured: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Fail `init` with `stderr` whenever the case's variables match.
    pub fn fail_init_when<F>(mut self, matches: F, stderr: impl Into<String>) -> Self
    where
        F: Fn(&VariableSet) -> bool + Send + Sync + 'static,
    {
        self.init_failures.push(Rule {
            matches: Arc::new(matches),
            message: stderr.into(),
        });
        self
    }

    /// Report the configuration invalid whenever the case's variables match.
    pub fn invalid_when<F>(mut self, matches: F, summary: impl Into<String>) -> Self
    where
        F: Fn(&VariableSet) -> bool + Send + Sync + 'static,
    {
        self.invalid_rules.push(Rule {
            matches: Arc::new(matches),
            message: summary.into(),
        });
        self
    }

    /// Fail the first `count` init calls, regardless of variables.
    pub fn fail_first_inits(mut self, count: usize, stderr: impl Into<String>) -> Self {
        self.transient_init.store(count, Ordering::SeqCst);
        self.transient_message = stderr.into();
        self
    }

    /// Hold every validate call for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every validate after the first in the same directory reports invalid.
    pub fn unstable(mut self) -> Self {
        self.unstable = true;
        self
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        lock(&self.captured).clone()
    }

    pub fn call_count(&self, command: MockCommand) -> usize {
        lock(&self.captured)
            .iter()
            .filter(|c| c.command == command)
            .count()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, command: MockCommand, workdir: &Path) -> VariableSet {
        let variables =
            VariableSet::from_json_file(&workdir.join(VARS_FILE_NAME)).unwrap_or_default();
        lock(&self.captured).push(CapturedCall {
            command,
            workdir: workdir.to_path_buf(),
            variables: variables.clone(),
        });
        variables
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TerraformExecutor for MockExecutor {
    async fn version(&self) -> Result<String, TerraformError> {
        Ok(self.version.clone())
    }

    async fn init(&self, workdir: &Path) -> Result<CommandOutput, TerraformError> {
        let _guard = self.enter();
        if !workdir.is_dir() {
            return Err(TerraformError::DirectoryNotFound(workdir.to_path_buf()));
        }
        let variables = self.record(MockCommand::Init, workdir);

        let transient = self
            .transient_init
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(TerraformError::CommandFailed {
                command: "terraform init -input=false -no-color".to_string(),
                code: Some(1),
                stderr: self.transient_message.clone(),
            });
        }

        if let Some(rule) = self.init_failures.iter().find(|r| (r.matches)(&variables)) {
            return Err(TerraformError::CommandFailed {
                command: "terraform init -input=false -no-color".to_string(),
                code: Some(1),
                stderr: rule.message.clone(),
            });
        }

        Ok(CommandOutput {
            stdout: "Terraform has been successfully initialized!".to_string(),
            stderr: String::new(),
        })
    }

    async fn validate(&self, workdir: &Path) -> Result<ValidationResult, TerraformError> {
        let _guard = self.enter();
        if !workdir.is_dir() {
            return Err(TerraformError::DirectoryNotFound(workdir.to_path_buf()));
        }
        let variables = self.record(MockCommand::Validate, workdir);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let previous = {
            let mut seen = lock(&self.validations_per_dir);
            let count = seen.entry(workdir.to_path_buf()).or_insert(0);
            *count += 1;
            *count - 1
        };
        if self.unstable && previous > 0 {
            return Ok(ValidationResult::invalid("Configuration changed between runs"));
        }

        if let Some(rule) = self.invalid_rules.iter().find(|r| (r.matches)(&variables)) {
            return Ok(ValidationResult::invalid(rule.message.clone()));
        }

        Ok(ValidationResult::success())
    }
}
