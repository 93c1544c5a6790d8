use clap::{Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tfmatrix::core::harness::{self, Harness};
use tfmatrix::formatters::OutputFormatter;
use tfmatrix::matrix::VariableSet;
use tfmatrix::shared::logging;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tfmatrix",
    about = "Validate Terraform modules against tables of named variable combinations.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        global = true,
        help = "Path to the configuration file"
    )]
    pub config: Option<String>,

    #[arg(
        long = "modules-dir",
        short = 'd',
        value_name = "PATH",
        global = true,
        help = "Directory containing one sub-directory per module"
    )]
    pub modules_dir: Option<String>,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct Selection {
    #[arg(long, short = 'm', value_name = "MODULE", help = "Only suites for this module (repeatable)")]
    module: Vec<String>,

    #[arg(long, value_name = "FILE", help = "Load an additional JSON matrix file (repeatable)")]
    matrix: Vec<PathBuf>,

    #[arg(long, help = "Skip the built-in suites")]
    no_builtin: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "list", about = "List suites and their cases")]
    List {
        #[command(flatten)]
        selection: Selection,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    #[command(name = "run", about = "Run init and validate for every selected case")]
    Run {
        #[command(flatten)]
        selection: Selection,

        #[arg(long, value_name = "REGEX", help = "Only cases whose Suite/Case name matches")]
        run: Option<String>,

        #[arg(long, short = 'p', value_name = "N", help = "Maximum cases in flight")]
        parallel: Option<usize>,

        #[arg(long, value_name = "SECS", help = "Deadline for the whole run")]
        timeout: Option<u64>,

        #[arg(long, help = "Run inside the module directories instead of scratch copies")]
        no_isolate: bool,

        #[arg(long, help = "Keep scratch copies after the run")]
        keep_workdirs: bool,

        #[arg(long, help = "Run init and validate twice and compare outcomes")]
        check_idempotence: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    #[command(name = "validate", about = "Validate one module with ad hoc variables")]
    Validate {
        #[arg(long, short = 'm', value_name = "MODULE")]
        module: String,

        #[arg(long = "var", value_name = "NAME=VALUE", help = "Set a variable (repeatable)")]
        vars: Vec<String>,

        #[arg(long, value_name = "FILE", help = "JSON file of variables, applied before --var")]
        var_file: Option<PathBuf>,
    },

    #[command(name = "schema", about = "Print the variables a module declares")]
    Schema {
        #[arg(long, short = 'm', value_name = "MODULE")]
        module: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    init_logging();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(0);
    }

    let Some(command) = &cli.command else {
        println!("No command specified. Use --help for usage information.");
        return;
    };

    match execute(&cli, command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            logging::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn execute(cli: &Cli, command: &Commands) -> anyhow::Result<bool> {
    match command {
        Commands::List { selection, format } => {
            let suites = harness::select_suites(
                &selection.module,
                &selection.matrix,
                !selection.no_builtin,
            )?;
            match format {
                OutputFormat::Text => print!("{}", OutputFormatter::render_suite_list(&suites)),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&OutputFormatter::format_suite_list(&suites))?
                ),
            }
            Ok(true)
        }
        Commands::Run {
            selection,
            run,
            parallel,
            timeout,
            no_isolate,
            keep_workdirs,
            check_idempotence,
            format,
        } => {
            let suites = harness::select_suites(
                &selection.module,
                &selection.matrix,
                !selection.no_builtin,
            )?;
            let harness = init_harness(cli)?;

            let mut options = harness.run_options()?;
            if let Some(parallel) = parallel {
                options.max_parallel = *parallel;
            }
            if let Some(secs) = timeout {
                options.run_timeout = Duration::from_secs(*secs);
            }
            options.isolate &= !*no_isolate;
            options.keep_workdirs |= *keep_workdirs;
            options.check_idempotence |= *check_idempotence;
            if let Some(pattern) = run {
                options.filter = Some(Regex::new(pattern)?);
            }

            let report = harness.run(&suites, options).await;
            match format {
                OutputFormat::Text => print!("{}", OutputFormatter::render_run_report(&report)),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&OutputFormatter::format_run_report(&report))?
                ),
            }
            Ok(report.passed())
        }
        Commands::Validate {
            module,
            vars,
            var_file,
        } => {
            let mut variables = match var_file {
                Some(path) => VariableSet::from_json_file(path)?,
                None => VariableSet::new(),
            };
            for raw in vars {
                let (name, value) = VariableSet::parse_assignment(raw).ok_or_else(|| {
                    anyhow::anyhow!("Invalid variable assignment '{}', expected NAME=VALUE", raw)
                })?;
                variables.insert(name, value);
            }

            let harness = init_harness(cli)?;
            let (result, warnings) = harness.validate_module(module, &variables).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&OutputFormatter::format_validation_result(
                    module, &result, &warnings
                ))?
            );
            Ok(result.valid)
        }
        Commands::Schema { module } => {
            let config = harness::load_config(cli.config.clone())?;
            let modules_dir = harness::resolve_modules_dir(cli.modules_dir.clone(), &config)?;
            let schema = harness::load_module_schema(&modules_dir, module)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&OutputFormatter::format_schema(module, &schema))?
            );
            Ok(true)
        }
    }
}

fn init_harness(cli: &Cli) -> anyhow::Result<Harness> {
    logging::info(&format!(
        "Initializing tfmatrix with config: {:?}, modules dir: {:?}",
        cli.config, cli.modules_dir
    ));
    Harness::new(cli.config.clone(), cli.modules_dir.clone())
}

fn init_logging() {
    let log_level = std::env::var("TFMATRIX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| logging::default_filter(&log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
