use crate::matrix::case::Coverage;
use crate::matrix::suite::Suite;
use crate::matrix::variables::{string_map, strings, VariableSet};
use serde_json::Value;

const MODULE: &str = "rds";

fn base() -> VariableSet {
    VariableSet::new()
        .set("project_name", "test-project")
        .set("environment", "test")
        .set("vpc_id", "vpc-12345678")
        .set("private_subnet_ids", strings(&["subnet-priv1", "subnet-priv2"]))
        .set("allowed_security_groups", strings(&["sg-12345678"]))
        .set("db_engine", "postgres")
        .set("db_engine_version", "15.4")
        .set("db_instance_class", "db.t3.micro")
        .set("db_parameter_group_family", "postgres15")
        .set("db_parameters", Value::Array(Vec::new()))
        .set("db_allocated_storage", 20)
        .set("db_max_allocated_storage", 100)
        .set("db_name", "testdb")
        .set("db_username", "admin")
        .set("db_password", "SecurePassword123!")
        .set("db_port", 5432)
        .set("multi_az", false)
        .set("deletion_protection", false)
        .set("skip_final_snapshot", true)
        .set("backup_retention_period", 7)
        .set("enable_enhanced_monitoring", false)
        .set("tags", string_map(&[]))
}

fn engine(name: &str, version: &str, family: &str) -> VariableSet {
    VariableSet::new()
        .set("db_engine", name)
        .set("db_engine_version", version)
        .set("db_parameter_group_family", family)
}

fn storage(allocated: u32, max_allocated: u32) -> VariableSet {
    VariableSet::new()
        .set("db_allocated_storage", allocated)
        .set("db_max_allocated_storage", max_allocated)
}

pub fn suites() -> Vec<Suite> {
    vec![
        Suite::single(
            "TestRdsModuleVariablesValidation",
            MODULE,
            base().set("tags", string_map(&[("Environment", "test")])),
            &[Coverage::Baseline, Coverage::ToggleOff],
        ),
        Suite::new("TestRdsModuleDatabaseEngines", MODULE, base())
            .case("PostgreSQL15", engine("postgres", "15.4", "postgres15"))
            .case("PostgreSQL14", engine("postgres", "14.9", "postgres14"))
            .case("MySQL8", engine("mysql", "8.0.35", "mysql8.0")),
        Suite::new("TestRdsModuleInstanceClasses", MODULE, base())
            .sweep(
                "db_instance_class",
                "",
                [
                    "db.t3.micro",
                    "db.t3.small",
                    "db.t3.medium",
                    "db.r5.large",
                    "db.r5.xlarge",
                ],
            )
            .tag("db.t3.micro", Coverage::MinimumSize)
            .tag("db.r5.xlarge", Coverage::MaximumSize),
        Suite::single(
            "TestRdsModuleProductionConfiguration",
            MODULE,
            base()
                .set("project_name", "production-app")
                .set("environment", "production")
                .set(
                    "private_subnet_ids",
                    strings(&["subnet-priv1", "subnet-priv2", "subnet-priv3"]),
                )
                .set(
                    "allowed_security_groups",
                    strings(&["sg-12345678", "sg-87654321"]),
                )
                .set("db_instance_class", "db.r5.large")
                .set("db_allocated_storage", 100)
                .set("db_max_allocated_storage", 500)
                .set("db_name", "productiondb")
                .set("db_password", "VerySecureProductionPassword123!")
                .set("multi_az", true)
                .set("deletion_protection", true)
                .set("skip_final_snapshot", false)
                .set("backup_retention_period", 30)
                .set("enable_enhanced_monitoring", true)
                .set(
                    "tags",
                    string_map(&[("Environment", "production"), ("Critical", "true")]),
                ),
            &[],
        ),
        Suite::new("TestRdsModuleStorageConfiguration", MODULE, base())
            .case_covering("SmallStorage", storage(20, 50), &[Coverage::MinimumSize])
            .case("MediumStorage", storage(100, 500))
            .case_covering("LargeStorage", storage(500, 1000), &[Coverage::MaximumSize]),
    ]
}
