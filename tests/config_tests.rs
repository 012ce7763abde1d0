use std::env;
use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use appliance_license::config::ApplianceConfig;
use appliance_license::device::TransportKind;
use appliance_license::errors::LicenseError;
use appliance_license::workflow::activate;
use appliance_license::FailureReason;

const ENV_VARS: &[&str] = &[
    "APPLIANCE_LICENSE_HOST",
    "APPLIANCE_LICENSE_PORT",
    "APPLIANCE_LICENSE_SSH_PORT",
    "APPLIANCE_LICENSE_USERNAME",
    "APPLIANCE_LICENSE_PASSWORD",
    "APPLIANCE_LICENSE_KEY_FILE",
    "APPLIANCE_LICENSE_TRANSPORT",
    "APPLIANCE_LICENSE_REGISTRATION_KEY",
    "APPLIANCE_LICENSE_SERVICE_URL",
    "APPLIANCE_LICENSE_LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn file_values_are_loaded() {
    clear_env();
    let file = toml_file(
        r#"
[device]
host = "bigip.example"
port = 8443

[credentials]
username = "root"
password = "default"

[transport]
kind = "shell"
validate_certs = false

[activation]
registration_key = "AAAAA-BBBBB-CCCCC-DDDDD-EEEEEEE"

[registrant]
email = "ops@example.com"
company_name = "Example Corp"
"#,
    );

    let config = ApplianceConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.device.host, "bigip.example");
    assert_eq!(config.device.port, 8443);
    assert_eq!(config.device.ssh_port, 22);
    assert_eq!(config.credentials.username, "root");
    assert_eq!(config.transport_kind().unwrap(), TransportKind::RemoteShell);
    assert!(!config.device_target().validate_certs);
    assert_eq!(config.registrant.email, "ops@example.com");
    assert_eq!(config.registrant.company_name, "Example Corp");
    assert_eq!(config.registrant.eula(), "");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let file = toml_file(
        r#"
[device]
host = "from-file"

[activation]
registration_key = "FILE-KEY"
"#,
    );

    env::set_var("APPLIANCE_LICENSE_HOST", "from-env");
    env::set_var("APPLIANCE_LICENSE_SSH_PORT", "2222");
    env::set_var("APPLIANCE_LICENSE_TRANSPORT", "rpc");
    env::set_var("APPLIANCE_LICENSE_LOG_LEVEL", "debug");

    let config = ApplianceConfig::load(Some(file.path()));
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.device.host, "from-env");
    assert_eq!(config.device.ssh_port, 2222);
    assert_eq!(config.transport_kind().unwrap(), TransportKind::RemoteProcedure);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.activation.registration_key.as_deref(), Some("FILE-KEY"));
}

#[test]
#[serial]
fn unknown_registrant_key_is_rejected() {
    clear_env();
    let file = toml_file(
        r#"
[device]
host = "bigip.example"

[registrant]
email = "ops@example.com"
favourite_colour = "blue"
"#,
    );

    let err = ApplianceConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, LicenseError::Config(_)));
}

#[test]
#[serial]
fn eula_cannot_be_preset() {
    clear_env();
    let file = toml_file(
        r#"
[registrant]
eula = "I agree"
"#,
    );

    assert!(ApplianceConfig::load(Some(file.path())).is_err());
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    clear_env();
    let err = ApplianceConfig::load(Some(std::path::Path::new("/nonexistent/appliance.toml")))
        .unwrap_err();
    assert!(matches!(err, LicenseError::Config(_)));
}

#[tokio::test]
#[serial]
async fn invalid_config_fails_before_any_network_call() {
    clear_env();
    let config = ApplianceConfig::default();
    let outcome = activate(&config).await;
    assert_eq!(outcome.reason(), Some(FailureReason::InvalidInput));
    assert!(!outcome.changed());
}

#[test]
#[serial]
fn activation_request_defers_reading_files() {
    clear_env();
    let mut config = ApplianceConfig::default();
    config.device.host = "192.0.2.1".to_string();
    config.activation.license_file = Some("/nonexistent/bigip.license".into());
    config.activation.dossier_file = Some("/nonexistent/dossier.txt".into());

    assert!(config.validate().is_ok());
    let request = config.activation_request();
    assert_eq!(
        request.license_file.as_deref(),
        Some(std::path::Path::new("/nonexistent/bigip.license"))
    );
    assert_eq!(
        request.dossier_file.as_deref(),
        Some(std::path::Path::new("/nonexistent/dossier.txt"))
    );
    assert!(request.license.is_none());
    assert!(request.dossier.is_none());
}
