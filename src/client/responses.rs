//! Replies from the activation service.

use crate::license::{EulaOffer, License};
use crate::soap;

/// What the activation service said about a submitted dossier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationResponse {
    /// A signed license, optionally with EULA text to store on the device.
    LicenseReturned {
        license: License,
        eula: Option<EulaOffer>,
    },
    /// The registrant must accept this agreement before a license is issued.
    EulaRequired(EulaOffer),
    /// Rejected, unreachable mid-request, or unparseable.
    Fault(String),
}

impl ActivationResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivationResponse::LicenseReturned { .. } => "license_returned",
            ActivationResponse::EulaRequired(_) => "eula_required",
            ActivationResponse::Fault(_) => "fault",
        }
    }
}

const STATE_LICENSE_RETURNED: &str = "LICENSE_RETURNED";
const STATE_EULA_REQUIRED: &str = "EULA_REQUIRED";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Interpret a `getLicense` reply body. Never fails: anything unexpected is
/// a [`ActivationResponse::Fault`].
pub fn parse_get_license(body: &str) -> ActivationResponse {
    let Some(state) = soap::extract(body, "state") else {
        return ActivationResponse::Fault("activation response has no state".to_string());
    };

    match state.as_str() {
        STATE_LICENSE_RETURNED => {
            let eula = non_empty(soap::extract(body, "eula")).map(EulaOffer::new);
            match non_empty(soap::extract(body, "license")).map(License::new) {
                Some(Ok(license)) => ActivationResponse::LicenseReturned { license, eula },
                _ => ActivationResponse::Fault(
                    "activation service returned LICENSE_RETURNED without a license".to_string(),
                ),
            }
        }
        STATE_EULA_REQUIRED => match non_empty(soap::extract(body, "eula")) {
            Some(text) => ActivationResponse::EulaRequired(EulaOffer::new(text)),
            None => ActivationResponse::Fault(
                "activation service requires a EULA but sent no text".to_string(),
            ),
        },
        other => {
            let text = non_empty(soap::extract(body, "faultText"))
                .unwrap_or_else(|| "no fault text".to_string());
            match non_empty(soap::extract(body, "faultNumber")) {
                Some(number) => ActivationResponse::Fault(format!("{other} ({number}): {text}")),
                None => ActivationResponse::Fault(format!("{other}: {text}")),
            }
        }
    }
}
