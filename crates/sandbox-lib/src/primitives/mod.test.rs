use super::*;

#[test]
fn test_log_level_from_verbosity() {
    assert_eq!(LogLevel::from_verbosity(0), LogLevel::Error);
    assert_eq!(LogLevel::from_verbosity(2), LogLevel::Info);
    assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
}

#[test]
fn test_log_level_ordering() {
    assert!(LogLevel::Error < LogLevel::Info);
    assert!(LogLevel::Trace > LogLevel::Debug);
    assert_eq!(LogLevel::Warning.as_directive(), "warn");
}

#[test]
fn test_backend_kind_aliases() {
    assert_eq!("embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
    assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
    assert_eq!("MySQL".parse::<BackendKind>().unwrap(), BackendKind::ClientServer);
    assert_eq!(
        "client-server".parse::<BackendKind>().unwrap(),
        BackendKind::ClientServer
    );
}

#[test]
fn test_invalid_value_reports_input() {
    let err = "postgres-ish".parse::<BackendKind>().unwrap_err();
    match err {
        ConfigError::ParseError { value, reason } => {
            assert_eq!(value, "postgres-ish");
            assert_eq!(reason, "invalid storage backend");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_log_format_and_output_parsing() {
    assert_eq!("plain".parse::<LogFormat>().unwrap(), LogFormat::Text);
    assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("capture".parse::<LogOutput>().unwrap(), LogOutput::Test);
    assert!("syslog".parse::<LogOutput>().is_err());
}
