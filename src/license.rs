//! Data carried through an activation run: dossiers, licenses, EULA offers
//! and the final outcome.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::errors::{FailureReason, LicenseError, LicenseResult};

/// Short SHA-256 fingerprint used to identify payloads in logs.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}

/// Opaque device-identity blob submitted to the activation service.
#[derive(Clone, PartialEq, Eq)]
pub struct Dossier {
    contents: String,
    registration_key: Option<String>,
}

impl Dossier {
    /// Wrap dossier text. Empty (or whitespace-only) input is rejected.
    pub fn new(contents: impl Into<String>, registration_key: Option<String>) -> LicenseResult<Self> {
        let contents = contents.into().trim().to_string();
        if contents.is_empty() {
            return Err(LicenseError::Dossier("device returned an empty dossier".to_string()));
        }
        Ok(Self {
            contents,
            registration_key,
        })
    }

    /// Load a caller-supplied dossier from disk.
    pub fn from_file(path: &Path) -> LicenseResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LicenseError::Dossier(format!("cannot read dossier file {}: {e}", path.display()))
        })?;
        Self::new(contents, None).map_err(|_| {
            LicenseError::Dossier(format!("dossier file {} is empty", path.display()))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.contents
    }

    pub fn registration_key(&self) -> Option<&str> {
        self.registration_key.as_deref()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.contents.as_bytes())
    }
}

impl std::fmt::Debug for Dossier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dossier")
            .field("fingerprint", &self.fingerprint())
            .field("registration_key", &self.registration_key)
            .finish()
    }
}

/// Signed license payload returned by the activation service.
#[derive(Clone, PartialEq, Eq)]
pub struct License {
    bytes: Vec<u8>,
}

impl License {
    pub fn new(bytes: impl Into<Vec<u8>>) -> LicenseResult<Self> {
        let bytes = bytes.into();
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(LicenseError::ActivationFault(
                "activation service returned an empty license".to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Load a caller-supplied license from disk.
    pub fn from_file(path: &Path) -> LicenseResult<Self> {
        let bytes = fs::read(path)?;
        Self::new(bytes).map_err(|_| {
            LicenseError::Config(format!("license file {} is empty", path.display()))
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Binary-safe encoding for text-based RPC layers.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.bytes)
    }
}

impl std::fmt::Debug for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("License")
            .field("fingerprint", &self.fingerprint())
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Legal-agreement text offered by the activation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EulaOffer {
    pub text: String,
}

impl EulaOffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// License state reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    Disabled,
    Enabled,
}

impl ActivationStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ActivationStatus::Enabled)
    }
}

/// Terminal result of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Device already reported an active license; nothing was changed.
    AlreadyLicensed,
    /// A license was installed and verified. Non-fatal problems are listed.
    Installed { warnings: Vec<String> },
    /// The run stopped at the first error.
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl ActivationOutcome {
    pub fn failed(err: &LicenseError) -> Self {
        ActivationOutcome::Failed {
            reason: err.reason(),
            message: err.to_string(),
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, ActivationOutcome::Installed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActivationOutcome::Failed { .. })
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            ActivationOutcome::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ActivationOutcome::Installed { warnings } => warnings,
            _ => &[],
        }
    }

    /// Caller-facing changed/unchanged/error summary.
    pub fn report(&self) -> OutcomeReport {
        let (outcome, msg) = match self {
            ActivationOutcome::AlreadyLicensed => {
                ("already_licensed", "device is already licensed".to_string())
            }
            ActivationOutcome::Installed { .. } => {
                ("installed", "license installed and verified".to_string())
            }
            ActivationOutcome::Failed { message, .. } => ("failed", message.clone()),
        };

        OutcomeReport {
            changed: self.changed(),
            failed: self.is_failed(),
            outcome,
            reason: self.reason(),
            msg,
            warnings: self.warnings().to_vec(),
        }
    }
}

/// JSON shape printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub changed: bool,
    pub failed: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    pub msg: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
