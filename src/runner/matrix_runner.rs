use crate::config::RunnerConfig;
use crate::matrix::case::TestCase;
use crate::matrix::suite::{Module, Suite};
use crate::runner::assertion::{assert_outcome, Attempt, CaseFailure, Stage};
use crate::runner::report::{CaseReport, CaseStatus, RunReport, SuiteReport};
use crate::runner::workspace::CaseWorkspace;
use crate::shared::logging;
use crate::shared::redact::redact_variables;
use crate::terraform::schema::ModuleSchema;
use crate::terraform::service::{TerraformError, TerraformExecutor};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Which init failures are worth another attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    patterns: Vec<Regex>,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
            patterns: Vec::new(),
        }
    }

    pub fn new(max_retries: u32, delay: Duration, patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            max_retries,
            delay,
            patterns,
        })
    }

    /// `retries_so_far` retries have already been spent on this init.
    pub fn should_retry(&self, retries_so_far: u32, err: &TerraformError) -> bool {
        if retries_so_far >= self.max_retries {
            return false;
        }
        let Some(output) = err.tool_output() else {
            return false;
        };
        self.patterns.iter().any(|p| p.is_match(output))
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_parallel: usize,
    pub run_timeout: Duration,
    pub isolate: bool,
    pub keep_workdirs: bool,
    pub check_schema: bool,
    pub check_idempotence: bool,
    pub retry: RetryPolicy,
    /// Selects cases by full name (`Suite/Case`).
    pub filter: Option<Regex>,
}

impl Default for RunOptions {
    fn default() -> Self {
        let config = RunnerConfig::default();
        Self {
            max_parallel: config.effective_parallelism(),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
            isolate: config.isolate,
            keep_workdirs: config.keep_workdirs,
            check_schema: config.check_schema,
            check_idempotence: config.check_idempotence,
            retry: RetryPolicy::none(),
            filter: None,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &RunnerConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            max_parallel: config.effective_parallelism(),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
            isolate: config.isolate,
            keep_workdirs: config.keep_workdirs,
            check_schema: config.check_schema,
            check_idempotence: config.check_idempotence,
            retry: RetryPolicy::new(
                config.init_retries,
                Duration::from_secs(config.init_retry_delay_secs),
                &config.retryable_errors,
            )?,
            filter: None,
        })
    }

    fn parallelism(&self) -> usize {
        if self.isolate {
            self.max_parallel.clamp(1, crate::config::MAX_PARALLEL_LIMIT)
        } else {
            1
        }
    }

    fn selects(&self, full_name: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f.is_match(full_name))
    }
}

/// Drives every selected case through init, validate and the assertion.
pub struct MatrixRunner {
    executor: Arc<dyn TerraformExecutor>,
    modules_root: PathBuf,
    options: RunOptions,
}

impl MatrixRunner {
    pub fn new(executor: Arc<dyn TerraformExecutor>, modules_root: PathBuf, options: RunOptions) -> Self {
        Self {
            executor,
            modules_root,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run all selected cases of `suites`. Individual failures never stop the
    /// run; they are recorded in the report.
    pub async fn run(&self, suites: &[Suite]) -> RunReport {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.options.run_timeout;

        let terraform_version =
            match tokio::time::timeout_at(deadline, self.executor.version()).await {
                Ok(Ok(version)) => Some(version),
                Ok(Err(e)) => {
                    logging::warn(&format!("Could not determine terraform version: {}", e));
                    None
                }
                Err(_) => None,
            };

        let jobs: Vec<(usize, &Suite, &TestCase)> = suites
            .iter()
            .enumerate()
            .flat_map(|(index, suite)| suite.cases.iter().map(move |case| (index, suite, case)))
            .filter(|(_, suite, case)| self.options.selects(&suite.full_name(case)))
            .collect();

        let schemas = self
            .load_schemas(jobs.iter().map(|(_, suite, _)| suite.module.clone()).collect())
            .await;
        let parallelism = self.parallelism_for(jobs.len());

        logging::info(&format!(
            "Running {} case(s) from {} suite(s) with up to {} in parallel",
            jobs.len(),
            suites.len(),
            parallelism
        ));

        let results: Vec<(usize, CaseReport)> = stream::iter(jobs)
            .map(|(index, suite, case)| {
                let schema = schemas.get(&suite.module).and_then(Option::as_ref);
                async move { (index, self.run_case(suite, case, schema, deadline).await) }
            })
            .buffered(parallelism)
            .collect()
            .await;

        let mut suite_reports: Vec<Option<SuiteReport>> = suites.iter().map(|_| None).collect();
        for (index, case_report) in results {
            let suite = &suites[index];
            suite_reports[index]
                .get_or_insert_with(|| SuiteReport {
                    suite: suite.name.clone(),
                    module: suite.module.clone(),
                    cases: Vec::new(),
                })
                .cases
                .push(case_report);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            terraform_version,
            suites: suite_reports.into_iter().flatten().collect(),
        };

        let totals = report.totals();
        logging::info(&format!(
            "Finished: {} passed, {} failed, {} timed out ({} total)",
            totals.passed, totals.failed, totals.timed_out, totals.total
        ));

        report
    }

    fn parallelism_for(&self, job_count: usize) -> usize {
        self.options.parallelism().min(job_count.max(1))
    }

    async fn load_schemas(&self, modules: Vec<String>) -> HashMap<String, Option<ModuleSchema>> {
        let mut schemas = HashMap::new();
        if !self.options.check_schema {
            return schemas;
        }
        for name in modules {
            if schemas.contains_key(&name) {
                continue;
            }
            let module = Module::resolve(&self.modules_root, &name);
            let path = module.path.clone();
            let loaded = tokio::task::spawn_blocking(move || ModuleSchema::load(&path))
                .await
                .map_err(std::io::Error::other)
                .and_then(|result| result);
            let schema = match loaded {
                Ok(schema) => Some(schema),
                Err(e) => {
                    logging::debug(&format!(
                        "Skipping schema scan for {}: {}",
                        module.path.display(),
                        e
                    ));
                    None
                }
            };
            schemas.insert(name, schema);
        }
        schemas
    }

    async fn run_case(
        &self,
        suite: &Suite,
        case: &TestCase,
        schema: Option<&ModuleSchema>,
        deadline: Instant,
    ) -> CaseReport {
        let full_name = suite.full_name(case);
        let module = Module::resolve(&self.modules_root, &suite.module);
        let started = std::time::Instant::now();

        let schema_warnings = schema.map(|s| s.check(&case.variables)).unwrap_or_default();
        for warning in &schema_warnings {
            logging::warn(&format!("{}: {}", full_name, warning));
        }

        logging::info(&format!("=== RUN   {}", full_name));

        let timed_out = || {
            (
                Err(CaseFailure::new(
                    Stage::Timeout,
                    format!(
                        "run deadline of {}s exceeded",
                        self.options.run_timeout.as_secs()
                    ),
                )),
                None,
            )
        };
        // timeout_at polls the case once before looking at the clock
        let (outcome, workdir) = if Instant::now() >= deadline {
            timed_out()
        } else {
            tokio::time::timeout_at(deadline, self.execute_case(case, &module.path))
                .await
                .unwrap_or_else(|_| timed_out())
        };

        let elapsed = started.elapsed();
        let (status, failure) = match outcome {
            Ok(()) => (CaseStatus::Passed, None),
            Err(failure) if failure.stage == Stage::Timeout => (CaseStatus::TimedOut, Some(failure)),
            Err(failure) => (CaseStatus::Failed, Some(failure)),
        };

        match &failure {
            None => logging::info(&format!(
                "--- PASS: {} ({:.2}s)",
                full_name,
                elapsed.as_secs_f64()
            )),
            Some(f) => logging::error(&format!(
                "--- FAIL: {} ({:.2}s) [{}] {}",
                full_name,
                elapsed.as_secs_f64(),
                f.stage,
                f.message
            )),
        }

        CaseReport {
            name: case.name.clone(),
            full_name,
            expect: case.expect,
            status,
            duration_ms: elapsed.as_millis() as u64,
            failure,
            schema_warnings,
            workdir,
            variables: redact_variables(&case.variables),
        }
    }

    async fn execute_case(
        &self,
        case: &TestCase,
        module_dir: &Path,
    ) -> (Result<(), CaseFailure>, Option<PathBuf>) {
        let workspace = CaseWorkspace::prepare(
            module_dir,
            &case.variables,
            self.options.isolate,
            self.options.keep_workdirs,
        )
        .await;
        let workspace = match workspace {
            Ok(workspace) => workspace,
            Err(e) => {
                return (
                    Err(CaseFailure::new(
                        Stage::Isolate,
                        format!("Failed to prepare {}: {}", module_dir.display(), e),
                    )),
                    None,
                )
            }
        };
        let kept = workspace.kept_path().map(Path::to_path_buf);

        let first = self.attempt(workspace.path()).await;
        if let Err(failure) = assert_outcome(case.expect, &first) {
            return (Err(failure), kept);
        }

        if self.options.check_idempotence {
            let second = self.attempt(workspace.path()).await;
            if second.accepted() != first.accepted() {
                let describe = |accepted: bool| if accepted { "accepted" } else { "rejected" };
                let failure = CaseFailure::new(
                    Stage::Idempotence,
                    format!(
                        "repeated init/validate {} the configuration after the first run {} it",
                        describe(second.accepted()),
                        describe(first.accepted())
                    ),
                )
                .with_diagnostics(second.validation().map(|r| r.diagnostic_text()));
                return (Err(failure), kept);
            }
        }

        (Ok(()), kept)
    }

    async fn attempt(&self, workdir: &Path) -> Attempt {
        let mut retries = 0;
        loop {
            match self.executor.init(workdir).await {
                Ok(_) => break,
                Err(err) if self.options.retry.should_retry(retries, &err) => {
                    retries += 1;
                    logging::warn(&format!(
                        "terraform init in {} hit a retryable error, retry {}/{}: {}",
                        workdir.display(),
                        retries,
                        self.options.retry.max_retries,
                        err
                    ));
                    tokio::time::sleep(self.options.retry.delay).await;
                }
                Err(err) => return Attempt::InitFailed(err),
            }
        }

        match self.executor.validate(workdir).await {
            Ok(result) => Attempt::Validated(result),
            Err(err) => Attempt::ValidateFailed(err),
        }
    }
}
