//! Value types identifying the appliance and how to reach it.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::LicenseError;

/// The appliance being licensed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// Hostname or address of the management interface
    pub host: String,
    /// HTTPS port of the management interface
    pub port: u16,
    /// SSH port used by the remote-shell transport
    pub ssh_port: u16,
    /// Verify the device's TLS certificate
    pub validate_certs: bool,
}

impl DeviceTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 443,
            ssh_port: 22,
            validate_certs: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssh_port(mut self, ssh_port: u16) -> Self {
        self.ssh_port = ssh_port;
        self
    }

    pub fn with_validate_certs(mut self, validate_certs: bool) -> Self {
        self.validate_certs = validate_certs;
        self
    }

    /// Base URL of the HTTPS management interface.
    pub fn management_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

/// Principal used to reach the device.
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub key_file: Option<PathBuf>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            key_file: None,
        }
    }

    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("key_file", &self.key_file)
            .finish()
    }
}

/// Requested transport. Parsed from configuration with [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    RemoteProcedure,
    RemoteShell,
    #[default]
    Auto,
}

impl FromStr for TransportKind {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TransportKind::Auto),
            "rpc" | "icontrol" | "remote_procedure" => Ok(TransportKind::RemoteProcedure),
            "shell" | "ssh" | "remote_shell" => Ok(TransportKind::RemoteShell),
            other => Err(LicenseError::Config(format!(
                "transport must be one of: auto, rpc, shell. Got '{other}'"
            ))),
        }
    }
}

/// A transport after `Auto` has been resolved. Fixed for the rest of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedTransport {
    RemoteProcedure,
    RemoteShell,
}

impl fmt::Display for ResolvedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTransport::RemoteProcedure => f.write_str("remote_procedure"),
            ResolvedTransport::RemoteShell => f.write_str("remote_shell"),
        }
    }
}
