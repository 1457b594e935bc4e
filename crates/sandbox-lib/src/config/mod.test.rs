use super::*;

#[test]
fn test_default_config() {
    let config = SandboxConfig::default();
    assert_eq!(config.backend, BackendKind::Embedded);
    assert_eq!(config.database_path, None);
    assert!(!config.block_unmatched);
    assert!(!config.require_transactional_ddl);
    assert_eq!(config.http_timeout(), Duration::from_secs(30));
    assert!(config.validate().is_ok());
}

#[test]
fn test_logger_config_conversion() {
    let config = SandboxConfig {
        log_level: 3,
        log_format: LogFormat::Json,
        log_output: LogOutput::Stderr,
        ..SandboxConfig::default()
    };

    let logger_config = config.to_logger_config();
    assert_eq!(logger_config.level, LogLevel::Debug);
    assert_eq!(logger_config.format, LogFormat::Json);
    assert_eq!(logger_config.output, LogOutput::Stderr);
}

#[test]
fn test_validate_rejects_zero_timeout() {
    let config = SandboxConfig {
        http_timeout: 0,
        ..SandboxConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationFailed { .. })
    ));
}

#[test]
fn test_validate_rejects_missing_database_directory() {
    let config = SandboxConfig {
        database_path: Some(PathBuf::from("/definitely/not/here/test.db")),
        ..SandboxConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationFailed { .. })
    ));
}

#[test]
fn test_validate_rejects_path_for_client_server_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
        backend: BackendKind::ClientServer,
        database_path: Some(dir.path().join("test.db")),
        ..SandboxConfig::default()
    };
    assert!(config.validate().is_err());
}
