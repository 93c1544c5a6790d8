//! Built-in case tables for the five infrastructure modules.
//!
//! Each [`Suite`] corresponds to one table of named variable combinations;
//! every case is expected to pass `terraform validate`.

pub mod ec2_splunk;
pub mod ecs;
pub mod rds;
pub mod secrets_manager;
pub mod vpc;

use crate::matrix::suite::Suite;

/// Every built-in suite, grouped by module in a stable order.
pub fn builtin_suites() -> Vec<Suite> {
    let mut suites = Vec::new();
    suites.extend(vpc::suites());
    suites.extend(ecs::suites());
    suites.extend(rds::suites());
    suites.extend(ec2_splunk::suites());
    suites.extend(secrets_manager::suites());
    suites
}

/// Built-in suites targeting `module`.
pub fn suites_for(module: &str) -> Vec<Suite> {
    builtin_suites()
        .into_iter()
        .filter(|s| s.module == module)
        .collect()
}
