//! Engine configuration files: parse, resolve, and reject bad input at load.

use std::fs;

use barsignal_core::factory::FactoryError;
use barsignal_runner::{ConfigError, EngineConfig};

const ENGINE_TOML: &str = r#"
[engine]
max_workers = 2

[session]
regular_hours_only = true

[[instances]]
account_id = "DU100"
symbol = "ES"
security_type = "FUT"
benchmark = "dma_5_20"
open = { algorithm = "dma", params = { fast_period = 5, slow_period = 20, williams_period = 14 } }
close = { algorithm = "trailing_stop", params = { threshold = 0.01, max_duration_secs = 3600 } }

[[instances]]
account_id = "DU100"
symbol = "EURUSD"
security_type = "CASH"
benchmark = "ema_30"
open = { algorithm = "ema", params = { span = 30, gtd_secs = 120 } }
close = { algorithm = "portfolio" }
"#;

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    fs::write(&path, ENGINE_TOML).unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert!(config.session.regular_hours_only);
    let instances = config.build_instances().unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].key.to_string(), "DU100:ES:FUT:dma_5_20");
    assert_eq!(instances[0].close.as_ref().unwrap().name(), "trailing_stop");
    assert_eq!(instances[1].open.name(), "ema");
    assert_eq!(instances[1].close.as_ref().unwrap().name(), "portfolio");
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }), "{err}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = EngineConfig::from_toml("[[instances]\naccount_id = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn unknown_security_type_fails_to_parse() {
    let toml = ENGINE_TOML.replace("\"CASH\"", "\"BOND\"");
    assert!(matches!(
        EngineConfig::from_toml(&toml),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn unknown_close_algorithm_fails_to_resolve() {
    let toml = ENGINE_TOML.replace("\"portfolio\"", "\"stop_loss\"");
    let err = EngineConfig::from_toml(&toml)
        .unwrap()
        .build_instances()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Instance {
            source: FactoryError::UnknownClose(ref name),
            ..
        } if name == "stop_loss"
    ));
}

#[test]
fn invalid_parameter_fails_to_resolve() {
    let toml = ENGINE_TOML.replace("fast_period = 5", "fast_period = 40");
    let err = EngineConfig::from_toml(&toml)
        .unwrap()
        .build_instances()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Instance {
            source: FactoryError::InvalidParam { .. },
            ..
        }
    ));
}
