use crate::config::{LogFormat, LogLevel, LoggingConfig};
use crate::logging::{level_to_log_level, log_level_to_level, parse_log_level};
use std::sync::Once;

// Use this to ensure init is only called once across all tests
static INIT: Once = Once::new();

#[test]
fn test_init_console_logging() {
    INIT.call_once(|| {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            file: None,
            stdout: true,
        };

        assert!(crate::logging::init(&config).is_ok());
    });

    // A second initialization is ignored rather than failing
    assert!(crate::logging::init(&LoggingConfig::default()).is_ok());
}

#[test]
fn test_disabled_output_is_noop() {
    let config = LoggingConfig {
        stdout: false,
        file: None,
        ..Default::default()
    };
    assert!(crate::logging::init(&config).is_ok());
}

#[test]
fn test_level_conversion() {
    assert!(parse_log_level("trace").is_ok());
    assert!(parse_log_level("DEBUG").is_ok());
    assert!(parse_log_level("info").is_ok());
    assert!(parse_log_level("warn").is_ok());
    assert!(parse_log_level("error").is_ok());
    assert!(parse_log_level("invalid").is_err());

    assert_eq!(level_to_log_level(tracing::Level::TRACE), LogLevel::Trace);
    assert_eq!(level_to_log_level(tracing::Level::WARN), LogLevel::Warn);
    assert_eq!(log_level_to_level(LogLevel::Error), tracing::Level::ERROR);
    assert_eq!(
        level_to_log_level(log_level_to_level(LogLevel::Debug)),
        LogLevel::Debug
    );
}

#[test]
fn test_unusable_log_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = LoggingConfig {
        file: Some(blocker.join("strata.log")),
        stdout: false,
        ..Default::default()
    };
    assert!(matches!(
        crate::logging::init(&config),
        Err(crate::logging::LogError::IoError(_))
    ));
}
