use crate::matrix::case::Coverage;
use crate::matrix::suite::Suite;
use crate::matrix::variables::{string_map, VariableSet};
use serde_json::Value;

const MODULE: &str = "secrets-manager";

pub const EXISTING_KMS_KEY_ARN: &str =
    "arn:aws:kms:us-east-1:123456789012:key/12345678-1234-1234-1234-123456789012";

/// Only the database and application secrets, default encryption.
fn base() -> VariableSet {
    VariableSet::new()
        .set("project_name", "test-project")
        .set("environment", "test")
        .set("kms_key_id", Value::Null)
        .set("create_kms_key", false)
        .set("recovery_window_in_days", 7)
        .set("db_username", "admin")
        .set("db_password", "SecurePassword123!")
        .set("db_host", "db.example.com")
        .set("db_port", 5432)
        .set("db_name", "testdb")
        .set("application_secrets", string_map(&[]))
        .set("create_splunk_secret", false)
        .set("splunk_admin_password", "")
        .set("splunk_hec_token", "")
        .set("create_dockerhub_secret", false)
        .set("dockerhub_username", "")
        .set("dockerhub_password", "")
        .set("tags", string_map(&[]))
}

/// Base with a managed KMS key and credentials for every optional secret.
fn with_credentials() -> VariableSet {
    base()
        .set("create_kms_key", true)
        .set("splunk_admin_password", "SplunkAdmin123!")
        .set("splunk_hec_token", "12345678-1234-1234-1234-123456789012")
        .set("dockerhub_username", "testuser")
        .set("dockerhub_password", "testpassword")
}

fn secret_types(splunk: bool, dockerhub: bool) -> VariableSet {
    VariableSet::new()
        .set("create_splunk_secret", splunk)
        .set("create_dockerhub_secret", dockerhub)
}

fn kms(create: bool, key_id: Option<&str>) -> VariableSet {
    VariableSet::new()
        .set("create_kms_key", create)
        .set("kms_key_id", key_id.map_or(Value::Null, Value::from))
}

pub fn suites() -> Vec<Suite> {
    vec![
        Suite::single(
            "TestSecretsManagerModuleVariablesValidation",
            MODULE,
            with_credentials()
                .set(
                    "application_secrets",
                    string_map(&[("API_KEY", "test-api-key"), ("SECRET_KEY", "test-secret-key")]),
                )
                .set("create_splunk_secret", true)
                .set("create_dockerhub_secret", true)
                .set("tags", string_map(&[("Environment", "test")])),
            &[Coverage::Baseline],
        ),
        Suite::new("TestSecretsManagerModuleSecretTypes", MODULE, with_credentials())
            .case("AllSecrets", secret_types(true, true))
            .case_covering(
                "OnlyDatabaseAndApp",
                secret_types(false, false),
                &[Coverage::ToggleOff],
            )
            .case("WithSplunk", secret_types(true, false))
            .case("WithDockerhub", secret_types(false, true)),
        Suite::new("TestSecretsManagerModuleKMSConfiguration", MODULE, base())
            .case("CreateNewKMSKey", kms(true, None))
            .case("UseExistingKMSKey", kms(false, Some(EXISTING_KMS_KEY_ARN)))
            .case_covering("UseDefaultEncryption", kms(false, None), &[Coverage::ToggleOff]),
        Suite::new("TestSecretsManagerModuleRecoveryWindow", MODULE, base())
            .sweep("recovery_window_in_days", "RecoveryWindow_", [0, 7, 14, 30])
            .tag("RecoveryWindow_0", Coverage::MinimumSize)
            .tag("RecoveryWindow_30", Coverage::MaximumSize),
        Suite::new("TestSecretsManagerModuleApplicationSecrets", MODULE, base())
            .case(
                "NoAppSecrets",
                VariableSet::new().set("application_secrets", string_map(&[])),
            )
            .case(
                "SingleSecret",
                VariableSet::new().set(
                    "application_secrets",
                    string_map(&[("API_KEY", "placeholder-api-key")]),
                ),
            )
            .case(
                "MultipleSecrets",
                VariableSet::new().set(
                    "application_secrets",
                    string_map(&[
                        ("API_KEY", "placeholder-api-key"),
                        ("SECRET_KEY", "placeholder-secret-key"),
                        ("ENCRYPTION_KEY", "placeholder-encryption-key"),
                        ("JWT_SECRET", "placeholder-jwt-secret"),
                    ]),
                ),
            ),
        Suite::new("TestSecretsManagerModuleDatabasePorts", MODULE, base())
            .case("PostgreSQLDefaultPort", VariableSet::new().set("db_port", 5432))
            .case("MySQLDefaultPort", VariableSet::new().set("db_port", 3306))
            .case("SQLServerDefaultPort", VariableSet::new().set("db_port", 1433))
            .case("CustomPort", VariableSet::new().set("db_port", 5433)),
    ]
}
