//! Remote-procedure backend: SOAP calls against the device's HTTPS
//! management interface, authenticated with HTTP basic auth.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::device::{Credentials, DeviceTarget};
use crate::errors::{LicenseError, LicenseResult};
use crate::license::{ActivationStatus, Dossier, License};
use crate::soap::{self, BasicAuth, SoapCall, SoapError};
use crate::transport::TransportBackend;

/// Path of the RPC portal on the management interface.
pub const ICONTROL_PATH: &str = "/iControl/iControlPortal.cgi";

const LICENSE_ADMIN_NS: &str = "urn:iControl:Management/LicenseAdministration";
const CONFIG_SYNC_NS: &str = "urn:iControl:System/ConfigSync";

/// Where accepted EULA text is stored on the device.
pub const EULA_DEVICE_PATH: &str = "/LICENSE.F5";

pub(crate) fn status_call() -> SoapCall {
    SoapCall::new(LICENSE_ADMIN_NS, "get_license_activation_status")
}

/// Parse a `get_license_activation_status` reply.
pub(crate) fn parse_status(body: &str) -> LicenseResult<ActivationStatus> {
    match soap::extract(body, "return").as_deref() {
        Some("STATE_ENABLED") => Ok(ActivationStatus::Enabled),
        Some("STATE_DISABLED") => Ok(ActivationStatus::Disabled),
        Some(other) => Err(LicenseError::Transport(format!(
            "unrecognised activation state '{other}'"
        ))),
        None => Err(LicenseError::Transport(
            "activation status reply had no return value".to_string(),
        )),
    }
}

pub struct RemoteProcedureBackend {
    client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl RemoteProcedureBackend {
    pub fn new(
        target: DeviceTarget,
        credentials: Credentials,
        timeout: Duration,
    ) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!target.validate_certs)
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", target.management_url(), ICONTROL_PATH),
            credentials,
        })
    }

    /// Point the backend at a different portal URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn call(&self, call: SoapCall) -> Result<String, SoapError> {
        debug!(operation = call.operation(), "iControl call");
        let auth = BasicAuth {
            username: &self.credentials.username,
            password: &self.credentials.password,
        };
        soap::invoke(&self.client, &self.endpoint, &call, Some(auth)).await
    }
}

#[async_trait]
impl TransportBackend for RemoteProcedureBackend {
    async fn get_activation_status(&self) -> LicenseResult<ActivationStatus> {
        let body = self
            .call(status_call())
            .await
            .map_err(|e| LicenseError::Transport(e.to_string()))?;
        parse_status(&body)
    }

    async fn get_dossier(&self, registration_key: &str) -> LicenseResult<Dossier> {
        let call = SoapCall::new(LICENSE_ADMIN_NS, "get_system_dossier")
            .array("registration_keys", vec![registration_key.to_string()]);

        let body = self
            .call(call)
            .await
            .map_err(|e| LicenseError::Dossier(e.to_string()))?;
        let dossier = soap::require(&body, "return")
            .map_err(|e| LicenseError::Dossier(e.to_string()))?;

        Dossier::new(dossier, Some(registration_key.to_string()))
    }

    async fn install_license(&self, license: &License) -> LicenseResult<bool> {
        let call = SoapCall::new(LICENSE_ADMIN_NS, "install_license")
            .text("license_file_data", license.to_base64());

        self.call(call)
            .await
            .map_err(|e| LicenseError::Install(e.to_string()))?;
        info!(license = %license.fingerprint(), "license written over RPC");

        let status = self
            .get_activation_status()
            .await
            .map_err(|e| LicenseError::Install(format!("status check after install failed: {e}")))?;
        Ok(status.is_enabled())
    }

    async fn upload_eula(&self, eula_text: &str) -> LicenseResult<()> {
        let call = SoapCall::new(CONFIG_SYNC_NS, "upload_file")
            .text("file_name", EULA_DEVICE_PATH)
            .structure(
                "file_context",
                vec![
                    ("file_data".to_string(), STANDARD.encode(eula_text.as_bytes())),
                    ("chain_type".to_string(), "FILE_FIRST_AND_LAST".to_string()),
                ],
            );

        self.call(call)
            .await
            .map_err(|e| LicenseError::Transport(format!("EULA upload failed: {e}")))?;
        Ok(())
    }
}
