//! Configuration for an activation run.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Command-line flags (highest priority, applied by the binary)
//! 2. Environment variables
//! 3. `appliance-license.toml` (or the file passed with `--config`)
//! 4. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `APPLIANCE_LICENSE_HOST` - Device address
//! - `APPLIANCE_LICENSE_PORT` - Management (HTTPS) port
//! - `APPLIANCE_LICENSE_SSH_PORT` - SSH port
//! - `APPLIANCE_LICENSE_USERNAME` - Device username
//! - `APPLIANCE_LICENSE_PASSWORD` - Device password
//! - `APPLIANCE_LICENSE_KEY_FILE` - SSH private key
//! - `APPLIANCE_LICENSE_TRANSPORT` - auto, rpc or shell
//! - `APPLIANCE_LICENSE_REGISTRATION_KEY` - Base registration key
//! - `APPLIANCE_LICENSE_SERVICE_URL` - Activation service endpoint
//! - `APPLIANCE_LICENSE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::DEFAULT_SERVICE_URL;
use crate::device::{Credentials, DeviceTarget, TransportKind};
use crate::errors::{LicenseError, LicenseResult};
use crate::registrant::RegistrantProfile;
use crate::workflow::ActivationRequest;

/// Default configuration file name (extension resolved by the `config` crate).
pub const DEFAULT_CONFIG_NAME: &str = "appliance-license";

const ENV_PREFIX: &str = "APPLIANCE_LICENSE_";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApplianceConfig {
    pub device: DeviceConfig,
    pub credentials: CredentialsConfig,
    pub transport: TransportConfig,
    pub activation: ActivationConfig,
    /// Registrant metadata; unknown keys are rejected
    pub registrant: RegistrantProfile,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device hostname or address
    pub host: String,
    /// HTTPS management port
    pub port: u16,
    /// SSH port
    pub ssh_port: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            ssh_port: 22,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
    /// SSH private key for the shell transport
    pub key_file: Option<PathBuf>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
            key_file: None,
        }
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("key_file", &self.key_file)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// auto, rpc or shell
    pub kind: String,
    /// Verify the device's TLS certificate
    pub validate_certs: bool,
    /// Budget for the RPC reachability probe and the service probe
    pub probe_timeout_secs: u64,
    /// Budget for each RPC or activation service request
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: "auto".to_string(),
            validate_certs: true,
            probe_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Base registration key used to generate a dossier
    pub registration_key: Option<String>,
    /// Pre-generated dossier
    pub dossier_file: Option<PathBuf>,
    /// Pre-issued license; bypasses the activation service
    pub license_file: Option<PathBuf>,
    /// Activation service endpoint
    pub service_url: String,
    /// Local service description, for networks that block fetching the remote one
    pub wsdl_file: Option<PathBuf>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            registration_key: None,
            dossier_file: None,
            license_file: None,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            wsdl_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

fn config_error(e: ConfigError) -> LicenseError {
    LicenseError::Config(e.to_string())
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

fn env_number(name: &str) -> Option<i64> {
    env_var(name).and_then(|v| v.parse::<i64>().ok())
}

impl ApplianceConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// With `path` the file must exist; without it `appliance-license.toml`
    /// in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> LicenseResult<Self> {
        let defaults = ApplianceConfig::default();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let builder = Config::builder()
            // Start with defaults
            .set_default("device.port", i64::from(defaults.device.port))
            .map_err(config_error)?
            .set_default("device.ssh_port", i64::from(defaults.device.ssh_port))
            .map_err(config_error)?
            .set_default("credentials.username", defaults.credentials.username)
            .map_err(config_error)?
            .set_default("transport.kind", defaults.transport.kind)
            .map_err(config_error)?
            .set_default("transport.validate_certs", defaults.transport.validate_certs)
            .map_err(config_error)?
            .set_default("activation.service_url", defaults.activation.service_url)
            .map_err(config_error)?
            .set_default("logging.enabled", defaults.logging.enabled)
            .map_err(config_error)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_error)?
            .add_source(file)
            // Override with environment variables
            .set_override_option("device.host", env_var("HOST"))
            .map_err(config_error)?
            .set_override_option("device.port", env_number("PORT"))
            .map_err(config_error)?
            .set_override_option("device.ssh_port", env_number("SSH_PORT"))
            .map_err(config_error)?
            .set_override_option("credentials.username", env_var("USERNAME"))
            .map_err(config_error)?
            .set_override_option("credentials.password", env_var("PASSWORD"))
            .map_err(config_error)?
            .set_override_option("credentials.key_file", env_var("KEY_FILE"))
            .map_err(config_error)?
            .set_override_option("transport.kind", env_var("TRANSPORT"))
            .map_err(config_error)?
            .set_override_option("activation.registration_key", env_var("REGISTRATION_KEY"))
            .map_err(config_error)?
            .set_override_option("activation.service_url", env_var("SERVICE_URL"))
            .map_err(config_error)?
            .set_override_option("logging.level", env_var("LOG_LEVEL"))
            .map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.device.host.trim().is_empty() {
            return Err(LicenseError::Config("device.host is required".to_string()));
        }
        if self.device.port == 0 {
            return Err(LicenseError::Config(
                "device.port must be greater than 0".to_string(),
            ));
        }
        if self.device.ssh_port == 0 {
            return Err(LicenseError::Config(
                "device.ssh_port must be greater than 0".to_string(),
            ));
        }

        self.transport_kind()?;

        if self.transport.probe_timeout_secs == 0 || self.transport.request_timeout_secs == 0 {
            return Err(LicenseError::Config(
                "transport timeouts must be greater than 0".to_string(),
            ));
        }

        if self.activation.service_url.trim().is_empty() && self.activation.wsdl_file.is_none() {
            return Err(LicenseError::Config(
                "activation.service_url cannot be empty".to_string(),
            ));
        }

        let has_key = self
            .activation
            .registration_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !has_key
            && self.activation.dossier_file.is_none()
            && self.activation.license_file.is_none()
        {
            return Err(LicenseError::Config(
                "one of activation.registration_key, activation.dossier_file or activation.license_file is required"
                    .to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    pub fn transport_kind(&self) -> LicenseResult<TransportKind> {
        self.transport.kind.parse()
    }

    pub fn device_target(&self) -> DeviceTarget {
        DeviceTarget::new(self.device.host.trim())
            .with_port(self.device.port)
            .with_ssh_port(self.device.ssh_port)
            .with_validate_certs(self.transport.validate_certs)
    }

    pub fn credentials(&self) -> Credentials {
        let creds = Credentials::new(&self.credentials.username, &self.credentials.password);
        match &self.credentials.key_file {
            Some(key) => creds.with_key_file(key),
            None => creds,
        }
    }

    /// Caller inputs for the workflow. Dossier and license files are read by
    /// the workflow itself, after the status check.
    pub fn activation_request(&self) -> ActivationRequest {
        ActivationRequest::from_files(
            self.activation.registration_key.clone(),
            self.activation.dossier_file.as_deref(),
            self.activation.license_file.as_deref(),
            self.registrant.clone(),
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.request_timeout_secs)
    }
}
