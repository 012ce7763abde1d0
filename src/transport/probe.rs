//! Reachability check for the device's RPC interface, used only to resolve
//! `TransportKind::Auto`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::device::{Credentials, DeviceTarget};
use crate::soap::{self, BasicAuth};
use crate::transport::icontrol::{parse_status, status_call, ICONTROL_PATH};

/// Default connect + request budget for a probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `true` only if an authenticated call succeeded and returned a
    /// recognisable status. Never fails.
    async fn probe(&self, target: &DeviceTarget, credentials: &Credentials) -> bool;
}

/// Probes by asking the RPC interface for the license activation status.
pub struct RpcConnectivityProbe {
    timeout: Duration,
    endpoint: Option<String>,
}

impl RpcConnectivityProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            endpoint: None,
        }
    }

    /// Probe this portal URL instead of the one derived from the target.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl Default for RpcConnectivityProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ConnectivityProbe for RpcConnectivityProbe {
    async fn probe(&self, target: &DeviceTarget, credentials: &Credentials) -> bool {
        let client = match reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!target.validate_certs)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "could not build probe client");
                return false;
            }
        };

        let endpoint = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("{}{}", target.management_url(), ICONTROL_PATH));
        let auth = BasicAuth {
            username: &credentials.username,
            password: &credentials.password,
        };

        match soap::invoke(&client, &endpoint, &status_call(), Some(auth)).await {
            Ok(body) => match parse_status(&body) {
                Ok(_) => true,
                Err(e) => {
                    debug!(error = %e, "probe reply had no recognisable status");
                    false
                }
            },
            Err(e) => {
                debug!(error = %e, "probe call failed");
                false
            }
        }
    }
}
