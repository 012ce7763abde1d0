//! Error types for the activation workflow.
//!
//! Every failure the workflow can hit is a [`LicenseError`]. Each error maps
//! onto exactly one [`FailureReason`], which is what callers see in
//! [`crate::license::ActivationOutcome::Failed`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[derive(Debug, Error)]
pub enum LicenseError {
    /// Channel to the device could not be established, authenticated, or parsed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device could not produce a dossier.
    #[error("dossier error: {0}")]
    Dossier(String),

    /// The activation service could not be reached.
    #[error("activation service unreachable: {0}")]
    ServiceUnreachable(String),

    /// The activation service rejected the request.
    #[error("activation service fault: {0}")]
    ActivationFault(String),

    /// The activation service asked for EULA acceptance a second time.
    #[error("activation service requested EULA acceptance again after it was accepted")]
    EulaLoop,

    /// The device rejected the license write or reload.
    #[error("license install failed: {0}")]
    Install(String),

    /// Install appeared to succeed but the device does not report an active license.
    #[error("license verification failed: {0}")]
    VerificationFailed(String),

    /// Invalid configuration or caller input.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local file handling failed (staging files, dossier/license files).
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl LicenseError {
    /// The taxonomy bucket this error belongs to.
    pub fn reason(&self) -> FailureReason {
        match self {
            LicenseError::Transport(_) => FailureReason::TransportError,
            LicenseError::Dossier(_) => FailureReason::DossierError,
            LicenseError::ServiceUnreachable(_) => FailureReason::ServiceUnreachable,
            LicenseError::ActivationFault(_) => FailureReason::ActivationFault,
            LicenseError::EulaLoop => FailureReason::EulaLoop,
            LicenseError::Install(_) => FailureReason::InstallError,
            LicenseError::VerificationFailed(_) => FailureReason::VerificationFailed,
            LicenseError::Config(_) | LicenseError::Storage(_) => FailureReason::InvalidInput,
        }
    }
}

/// Why a workflow run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TransportError,
    DossierError,
    ServiceUnreachable,
    ActivationFault,
    EulaLoop,
    InstallError,
    VerificationFailed,
    InvalidInput,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TransportError => "transport_error",
            FailureReason::DossierError => "dossier_error",
            FailureReason::ServiceUnreachable => "service_unreachable",
            FailureReason::ActivationFault => "activation_fault",
            FailureReason::EulaLoop => "eula_loop",
            FailureReason::InstallError => "install_error",
            FailureReason::VerificationFailed => "verification_failed",
            FailureReason::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
