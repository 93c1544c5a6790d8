// Re-export modules for testing and external use
pub mod config;

pub mod shared {
    pub mod logging;
    pub mod redact;
}

pub mod terraform {
    pub mod mock;
    pub mod model;
    pub mod parser;
    pub mod schema;
    pub mod service;

    pub use mock::{MockCommand, MockExecutor};
    pub use service::{TerraformError, TerraformExecutor, TerraformService};
}

pub mod matrix {
    pub mod case;
    pub mod catalog;
    pub mod file;
    pub mod suite;
    pub mod variables;

    pub use case::{Coverage, Expectation, TestCase};
    pub use suite::{Module, Suite};
    pub use variables::VariableSet;
}

pub mod runner {
    pub mod assertion;
    pub mod matrix_runner;
    pub mod report;
    pub mod workspace;

    pub use matrix_runner::{MatrixRunner, RetryPolicy, RunOptions};
    pub use report::{CaseReport, CaseStatus, RunReport, SuiteReport};
}

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod core {
    pub mod harness;
}

// Re-export commonly used types for easier testing and external use
pub use core::harness::{Harness, HarnessError};
pub use matrix::{Suite, VariableSet};
pub use runner::{MatrixRunner, RunOptions, RunReport};
pub use terraform::service::TerraformService;
