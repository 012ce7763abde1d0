//! SOAP client for the external activation service.

use async_trait::async_trait;
use reqwest::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::responses::{parse_get_license, ActivationResponse};
use crate::client::ActivationService;
use crate::errors::{LicenseError, LicenseResult};
use crate::license::Dossier;
use crate::registrant::RegistrantProfile;
use crate::soap::{self, SoapCall, SoapError};

/// Public activation endpoint used when no override is configured.
pub const DEFAULT_SERVICE_URL: &str =
    "https://activate.f5.com/license/services/urn:com.f5.license.v5b.ActivationService";

const ACTIVATION_NS: &str = "urn:com.f5.license.v5b.ActivationService";

/// Endpoint named by a local service description (WSDL) file.
pub fn endpoint_from_wsdl(path: &Path) -> LicenseResult<String> {
    let wsdl = fs::read_to_string(path)?;
    soap::attribute(&wsdl, "address", "location")
        .filter(|location| !location.trim().is_empty())
        .ok_or_else(|| {
            LicenseError::Config(format!(
                "service description {} has no soap:address location",
                path.display()
            ))
        })
}

pub struct ActivationServiceClient {
    client: Client,
    endpoint: String,
    probe_timeout: Duration,
}

impl ActivationServiceClient {
    /// `wsdl_file`, when set, takes precedence over `service_url` for
    /// locating the endpoint.
    pub fn new(
        service_url: &str,
        wsdl_file: Option<&Path>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> LicenseResult<Self> {
        let endpoint = match wsdl_file {
            Some(path) => endpoint_from_wsdl(path)?,
            None => service_url.to_string(),
        };

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            probe_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_license_call(dossier: &Dossier, registrant: &RegistrantProfile) -> SoapCall {
        let mut call = SoapCall::new(ACTIVATION_NS, "getLicense")
            .text("dossier", dossier.as_str())
            .text("eula", registrant.eula());
        for (name, value) in registrant.service_fields() {
            call = call.text(name, value);
        }
        call
    }
}

#[async_trait]
impl ActivationService for ActivationServiceClient {
    async fn probe_reachable(&self) -> bool {
        let url = format!("{}?wsdl", self.endpoint);
        match self.client.get(&url).timeout(self.probe_timeout).send().await {
            Ok(resp) if !resp.status().is_server_error() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "activation service answered with a server error");
                false
            }
            Err(e) => {
                debug!(error = %e, "activation service unreachable");
                false
            }
        }
    }

    async fn request_license(
        &self,
        dossier: &Dossier,
        registrant: &RegistrantProfile,
    ) -> ActivationResponse {
        let call = Self::get_license_call(dossier, registrant);
        debug!(dossier = %dossier.fingerprint(), eula_accepted = !registrant.eula().is_empty(), "submitting dossier");

        match soap::invoke(&self.client, &self.endpoint, &call, None).await {
            Ok(body) => parse_get_license(&body),
            Err(SoapError::Fault(msg)) => ActivationResponse::Fault(msg),
            Err(e) => ActivationResponse::Fault(e.to_string()),
        }
    }
}
