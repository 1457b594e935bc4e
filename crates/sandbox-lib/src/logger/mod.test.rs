use super::*;

#[test]
fn test_default_directives_scope_dependencies() {
    let directives = Logger::default_directives(LogLevel::Debug);
    assert!(directives.starts_with("sandbox_lib=debug"));
    assert!(directives.contains("rusqlite=warn"));
    assert!(directives.contains("reqwest=warn"));
}

#[test]
fn test_init_for_tests_is_idempotent() {
    let first = Logger::init_for_tests();
    let second = Logger::init_for_tests();
    if let (Some(first), Some(second)) = (first, second) {
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.level(), LogLevel::Debug);
    }
}

#[test]
fn test_second_init_reports_already_initialized() {
    let _ = Logger::init_for_tests();
    if Logger::is_initialized() {
        let err = Logger::init(LoggerConfig::for_tests()).unwrap_err();
        assert!(matches!(err, LoggerError::AlreadyInitialized));
    }
}
