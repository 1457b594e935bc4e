use super::*;
use crate::primitives::{BackendKind, LogFormat, LogOutput};

#[test]
fn test_from_vars_uses_defaults_when_empty() {
    let config = SandboxConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
    assert_eq!(config.backend, BackendKind::Embedded);
    assert_eq!(config.log_output, LogOutput::Test);
    assert_eq!(config.http_timeout, 30);
}

#[test]
fn test_from_vars_reads_prefixed_values() {
    let config = SandboxConfig::from_vars([
        ("SANDBOX_BACKEND", "mysql"),
        ("SANDBOX_BLOCK_UNMATCHED", "true"),
        ("SANDBOX_REQUIRE_TRANSACTIONAL_DDL", "true"),
        ("SANDBOX_LOG_FORMAT", "json"),
        ("SANDBOX_HTTP_TIMEOUT", "5"),
        ("UNRELATED", "ignored"),
    ])
    .unwrap();

    assert_eq!(config.backend, BackendKind::ClientServer);
    assert!(config.block_unmatched);
    assert!(config.require_transactional_ddl);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.http_timeout, 5);
}

#[test]
fn test_from_vars_rejects_unknown_backend() {
    let result = SandboxConfig::from_vars([("SANDBOX_BACKEND", "oracle")]);
    assert!(matches!(
        result,
        Err(ConfigError::EnvironmentParsingFailed { .. })
    ));
}

#[test]
fn test_from_vars_validates() {
    let result = SandboxConfig::from_vars([("SANDBOX_HTTP_TIMEOUT", "0")]);
    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
}
