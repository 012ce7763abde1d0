//! The license activation state machine.
//!
//! ```text
//! CheckStatus ─ Enabled ──────────────────────────────────────────▶ AlreadyLicensed
//!      │ Disabled
//!      ▼
//! ProbeService ▶ ObtainDossier ▶ Submit ─ EulaRequired ▶ Submit (once)
//!      │ (skipped with a caller license)      │
//!      ▼                                      ▼
//!   Install ◀─────────────────────────── LicenseReturned
//!      ▼
//!   Verify ─ Enabled ─────────────────────────────────────────────▶ Installed
//! ```
//!
//! Any error ends the run as `Failed`. Nothing is retried except the single
//! EULA resubmission, and nothing is persisted, so a failed run can simply be
//! started again.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{ActivationResponse, ActivationService, ActivationServiceClient};
use crate::config::ApplianceConfig;
use crate::device::{Credentials, DeviceTarget, ResolvedTransport, TransportKind};
use crate::errors::{LicenseError, LicenseResult};
use crate::license::{ActivationOutcome, Dossier, EulaOffer, License};
use crate::registrant::RegistrantProfile;
use crate::transport::{self, ConnectivityProbe, TransportBackend};

/// Caller inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct ActivationRequest {
    /// Used to generate a dossier when none is supplied.
    pub registration_key: Option<String>,
    /// Pre-generated dossier; skips asking the device for one.
    pub dossier: Option<Dossier>,
    /// Pre-issued license; skips the activation service entirely.
    pub license: Option<License>,
    /// Dossier on disk, read only once the device is known to be unlicensed.
    pub dossier_file: Option<PathBuf>,
    /// License on disk, read only once the device is known to be unlicensed.
    pub license_file: Option<PathBuf>,
    pub registrant: RegistrantProfile,
}

impl ActivationRequest {
    pub fn with_registration_key(registration_key: impl Into<String>) -> Self {
        Self {
            registration_key: Some(registration_key.into()),
            ..Default::default()
        }
    }

    /// Build a request that names dossier/license files. The files are not
    /// touched until the run has seen the device unlicensed.
    pub fn from_files(
        registration_key: Option<String>,
        dossier_file: Option<&Path>,
        license_file: Option<&Path>,
        registrant: RegistrantProfile,
    ) -> Self {
        Self {
            registration_key: registration_key.filter(|k| !k.trim().is_empty()),
            dossier_file: dossier_file.map(Path::to_path_buf),
            license_file: license_file.map(Path::to_path_buf),
            registrant,
            ..Default::default()
        }
    }

    fn validate(&self) -> LicenseResult<()> {
        if self.license.is_none()
            && self.license_file.is_none()
            && self.dossier.is_none()
            && self.dossier_file.is_none()
            && self.registration_key.is_none()
        {
            return Err(LicenseError::Config(
                "a registration key, dossier or license is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CheckStatus,
    ProbeService,
    ObtainDossier,
    Submit,
    EulaRound,
    Install,
    Verify,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::CheckStatus => "check_status",
            State::ProbeService => "probe_service",
            State::ObtainDossier => "obtain_dossier",
            State::Submit => "submit",
            State::EulaRound => "eula_round",
            State::Install => "install",
            State::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Outcome of one submission to the activation service.
enum Submission {
    Licensed(License, Option<EulaOffer>),
    NeedsEula(EulaOffer),
}

impl Submission {
    fn from_response(response: ActivationResponse) -> LicenseResult<Self> {
        match response {
            ActivationResponse::LicenseReturned { license, eula } => {
                Ok(Submission::Licensed(license, eula))
            }
            ActivationResponse::EulaRequired(offer) => Ok(Submission::NeedsEula(offer)),
            ActivationResponse::Fault(message) => Err(LicenseError::ActivationFault(message)),
        }
    }
}

/// Drives one device from its current state to a single [`ActivationOutcome`].
pub struct LicenseActivationWorkflow {
    transport: ResolvedTransport,
    backend: Box<dyn TransportBackend>,
    service: Box<dyn ActivationService>,
}

impl LicenseActivationWorkflow {
    /// Use an already-selected backend.
    pub fn new(
        transport: ResolvedTransport,
        backend: Box<dyn TransportBackend>,
        service: Box<dyn ActivationService>,
    ) -> Self {
        Self {
            transport,
            backend,
            service,
        }
    }

    /// Resolve `kind` (probing when it is `Auto`) and keep the matching backend.
    pub async fn start(
        kind: TransportKind,
        probe: &dyn ConnectivityProbe,
        target: &DeviceTarget,
        credentials: &Credentials,
        remote_procedure: Box<dyn TransportBackend>,
        remote_shell: Box<dyn TransportBackend>,
        service: Box<dyn ActivationService>,
    ) -> Self {
        let (resolved, backend) = transport::select_backend(
            kind,
            probe,
            target,
            credentials,
            remote_procedure,
            remote_shell,
        )
        .await;
        Self::new(resolved, backend, service)
    }

    pub fn transport(&self) -> ResolvedTransport {
        self.transport
    }

    /// Run the workflow. Never returns an error; failures are an outcome.
    pub async fn run(&self, request: ActivationRequest) -> ActivationOutcome {
        let span = info_span!(
            "activation",
            run_id = %Uuid::new_v4(),
            transport = %self.transport
        );

        async move {
            match self.execute(request).await {
                Ok(outcome) => {
                    info!(changed = outcome.changed(), "activation finished");
                    outcome
                }
                Err(err) => {
                    error!(reason = %err.reason(), error = %err, "activation failed");
                    ActivationOutcome::failed(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, request: ActivationRequest) -> LicenseResult<ActivationOutcome> {
        request.validate()?;

        info!(state = %State::CheckStatus, "reading activation status");
        let status = self.backend.get_activation_status().await?;
        if status.is_enabled() {
            info!("device is already licensed");
            return Ok(ActivationOutcome::AlreadyLicensed);
        }

        let mut warnings = Vec::new();
        let ActivationRequest {
            registration_key,
            dossier,
            license,
            dossier_file,
            license_file,
            registrant,
        } = request;

        let license = match (license, license_file) {
            (Some(license), _) => Some(license),
            (None, Some(path)) => Some(License::from_file(&path)?),
            (None, None) => None,
        };

        let license = match license {
            Some(license) => {
                info!(license = %license.fingerprint(), "using caller-supplied license");
                license
            }
            None => {
                self.obtain_license(
                    registration_key.as_deref(),
                    dossier,
                    dossier_file.as_deref(),
                    &registrant,
                    &mut warnings,
                )
                .await?
            }
        };

        info!(state = %State::Install, license = %license.fingerprint(), "installing license");
        let accepted = self.backend.install_license(&license).await.map_err(|e| match e {
            LicenseError::Install(_) => e,
            other => LicenseError::Install(other.to_string()),
        })?;
        if !accepted {
            return Err(LicenseError::Install(
                "device did not accept the license".to_string(),
            ));
        }

        info!(state = %State::Verify, "re-reading activation status");
        let status = self.backend.get_activation_status().await.map_err(|e| {
            LicenseError::VerificationFailed(format!("could not read status after install: {e}"))
        })?;
        if !status.is_enabled() {
            return Err(LicenseError::VerificationFailed(
                "device does not report an active license after install".to_string(),
            ));
        }

        Ok(ActivationOutcome::Installed { warnings })
    }

    /// ProbeService → ObtainDossier → Submit (→ EulaRound) and delivery of
    /// any EULA text accepted or attached to the license.
    async fn obtain_license(
        &self,
        registration_key: Option<&str>,
        dossier: Option<Dossier>,
        dossier_file: Option<&Path>,
        registrant: &RegistrantProfile,
        warnings: &mut Vec<String>,
    ) -> LicenseResult<License> {
        info!(state = %State::ProbeService, "checking activation service");
        if !self.service.probe_reachable().await {
            return Err(LicenseError::ServiceUnreachable(
                "activation service did not respond".to_string(),
            ));
        }

        let dossier = match (dossier, dossier_file) {
            (Some(dossier), _) => dossier,
            (None, Some(path)) => {
                info!(state = %State::ObtainDossier, path = %path.display(), "reading caller-supplied dossier");
                Dossier::from_file(path)?
            }
            (None, None) => {
                let key = registration_key.ok_or_else(|| {
                    LicenseError::Config(
                        "a registration key is required to generate a dossier".to_string(),
                    )
                })?;
                info!(state = %State::ObtainDossier, "requesting dossier from device");
                self.backend.get_dossier(key).await.map_err(|e| match e {
                    LicenseError::Dossier(_) => e,
                    other => LicenseError::Dossier(other.to_string()),
                })?
            }
        };

        info!(state = %State::Submit, dossier = %dossier.fingerprint(), "submitting dossier");
        let first = self.service.request_license(&dossier, registrant).await;

        let (license, offer) = match Submission::from_response(first)? {
            Submission::Licensed(license, offer) => (license, offer),
            Submission::NeedsEula(offer) => {
                info!(state = %State::EulaRound, "EULA required, resubmitting with accepted agreement");
                let accepted = registrant.with_eula(offer.text.clone());
                let second = self.service.request_license(&dossier, &accepted).await;
                match Submission::from_response(second)? {
                    // The agreement accepted in this round is the one to store
                    // unless the license arrives with its own.
                    Submission::Licensed(license, returned) => (license, returned.or(Some(offer))),
                    Submission::NeedsEula(_) => return Err(LicenseError::EulaLoop),
                }
            }
        };

        if let Some(offer) = offer {
            if let Err(e) = self.backend.upload_eula(&offer.text).await {
                warn!(error = %e, "could not store EULA on device");
                warnings.push(format!("EULA upload failed: {e}"));
            }
        }

        Ok(license)
    }
}

/// Build every collaborator from `config` and run one activation.
pub async fn activate(config: &ApplianceConfig) -> ActivationOutcome {
    match prepare(config).await {
        Ok((workflow, request)) => workflow.run(request).await,
        Err(err) => {
            error!(reason = %err.reason(), error = %err, "could not start activation");
            ActivationOutcome::failed(&err)
        }
    }
}

async fn prepare(
    config: &ApplianceConfig,
) -> LicenseResult<(LicenseActivationWorkflow, ActivationRequest)> {
    config.validate()?;

    let target = config.device_target();
    let credentials = config.credentials();
    let request = config.activation_request();

    let service = ActivationServiceClient::new(
        &config.activation.service_url,
        config.activation.wsdl_file.as_deref(),
        config.request_timeout(),
        config.probe_timeout(),
    )?;

    let (resolved, backend) = transport::connect(
        config.transport_kind()?,
        &target,
        &credentials,
        config.probe_timeout(),
        config.request_timeout(),
    )
    .await?;

    Ok((
        LicenseActivationWorkflow::new(resolved, backend, Box::new(service)),
        request,
    ))
}
