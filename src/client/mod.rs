//! Client side of the external activation service.

pub mod responses;
pub mod service;

use async_trait::async_trait;

use crate::license::Dossier;
use crate::registrant::RegistrantProfile;

pub use responses::ActivationResponse;
pub use service::{ActivationServiceClient, DEFAULT_SERVICE_URL};

/// The licensing authority the workflow submits dossiers to.
///
/// Neither method fails: network errors and malformed replies surface as
/// `false` or [`ActivationResponse::Fault`].
#[async_trait]
pub trait ActivationService: Send + Sync {
    /// Whether the service answers at all.
    async fn probe_reachable(&self) -> bool;

    /// Submit `dossier` with `registrant` metadata (including any accepted EULA).
    async fn request_license(
        &self,
        dossier: &Dossier,
        registrant: &RegistrantProfile,
    ) -> ActivationResponse;
}
