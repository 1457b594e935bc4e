use super::*;

#[test]
fn test_capability_profiles() {
    let embedded = BackendCapabilities::for_backend(BackendKind::Embedded);
    let server = BackendCapabilities::for_backend(BackendKind::ClientServer);

    assert!(embedded.transactional_ddl);
    assert!(!server.transactional_ddl);
    assert!(embedded.supports_isolation(true));
    assert!(server.supports_isolation(false));
    assert!(!server.supports_isolation(true));
}

#[test]
fn test_isolation_requires_autocommit_control() {
    let caps = BackendCapabilities {
        nested_savepoints: true,
        transactional_ddl: true,
        autocommit_control: false,
    };
    assert!(!caps.supports_isolation(false));
}

#[test]
fn test_connect_embedded_in_memory() {
    let connection = connect(&SandboxConfig::default()).unwrap();
    assert!(connection.path().is_none());
    assert!(connection.ping().is_ok());
}

#[test]
fn test_connect_client_server_needs_explicit_connection() {
    let config = SandboxConfig {
        backend: BackendKind::ClientServer,
        ..SandboxConfig::default()
    };
    assert!(matches!(
        connect(&config),
        Err(ConfigError::UnsupportedBackend { .. })
    ));
}
