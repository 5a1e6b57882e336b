use memento::config::{Settings, load};
use memento::infra::error::InfraError;
use memento::infra::telemetry;

#[test]
fn subscriber_installs_once() {
    let logging = Settings::default().logging;

    telemetry::init(&logging).expect("first install succeeds");

    let err = telemetry::init(&logging).expect_err("second install fails");
    assert!(matches!(err, InfraError::Telemetry(_)));
    assert!(err.to_string().starts_with("telemetry initialization failed"));
}

#[test]
fn load_errors_convert_into_infra_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let load_err = load(Some(&dir.path().join("absent.toml"))).expect_err("file is required");

    let err = InfraError::from(load_err);

    assert!(matches!(err, InfraError::Configuration(_)));
    assert!(err.to_string().starts_with("configuration error"));
}
