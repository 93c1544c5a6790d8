use crate::matrix::variables::VariableSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const MASK: &str = "********";

static SENSITIVE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|secret|token|private_key|api_key)").expect("Invalid sensitive name regex")
});

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_NAME.is_match(name)
}

/// Copy of `vars` with sensitive values masked, including keys of nested maps.
/// Null and empty-string values are left alone so reports still show that
/// nothing was supplied.
pub fn redact_variables(vars: &VariableSet) -> VariableSet {
    vars.iter()
        .map(|(name, value)| (name.clone(), redact_entry(name, value)))
        .collect()
}

fn redact_entry(name: &str, value: &Value) -> Value {
    if is_sensitive(name) {
        return mask(value);
    }
    redact_value(value)
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_entry(k, v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

fn mask(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if s.is_empty() => Value::String(String::new()),
        Value::Object(map) => Value::Object(
            map.keys()
                .map(|k| (k.clone(), Value::String(MASK.to_string())))
                .collect(),
        ),
        _ => Value::String(MASK.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::variables::string_map;
    use serde_json::json;

    #[test]
    fn test_sensitive_names() {
        assert!(is_sensitive("db_password"));
        assert!(is_sensitive("splunk_hec_token"));
        assert!(is_sensitive("application_secrets"));
        assert!(is_sensitive("JWT_SECRET"));
        assert!(!is_sensitive("db_username"));
        assert!(!is_sensitive("kms_key_id"));
    }

    #[test]
    fn test_redact_variables() {
        let vars = VariableSet::new()
            .set("db_username", "admin")
            .set("db_password", "SecurePassword123!")
            .set("splunk_admin_password", "")
            .set("kms_key_id", Value::Null)
            .set(
                "application_secrets",
                string_map(&[("API_KEY", "test-api-key")]),
            )
            .set(
                "tags",
                string_map(&[("Environment", "test"), ("deploy_token", "abc")]),
            );

        let redacted = redact_variables(&vars);
        assert_eq!(redacted.get("db_username"), Some(&json!("admin")));
        assert_eq!(redacted.get("db_password"), Some(&json!(MASK)));
        assert_eq!(redacted.get("splunk_admin_password"), Some(&json!("")));
        assert_eq!(redacted.get("kms_key_id"), Some(&Value::Null));
        assert_eq!(
            redacted.get("application_secrets"),
            Some(&json!({ "API_KEY": MASK }))
        );
        assert_eq!(
            redacted.get("tags"),
            Some(&json!({ "Environment": "test", "deploy_token": MASK }))
        );
    }
}
