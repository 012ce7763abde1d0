//! Channels used to read and write license state on the device.
//!
//! Two backends implement [`TransportBackend`]: [`icontrol::RemoteProcedureBackend`]
//! (SOAP RPC over the HTTPS management interface) and
//! [`shell::RemoteShellBackend`] (ssh + scp). The workflow picks one with
//! [`select_backend`] before it touches the device and keeps it for the rest
//! of the run.

pub mod icontrol;
pub mod probe;
pub mod shell;

use async_trait::async_trait;
use tracing::info;

use crate::device::{Credentials, DeviceTarget, ResolvedTransport, TransportKind};
use crate::errors::LicenseResult;
use crate::license::{ActivationStatus, Dossier, License};

pub use probe::{ConnectivityProbe, RpcConnectivityProbe};

/// Transport-dependent operations on the device.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    /// Current license state. Fails with `LicenseError::Transport` when the
    /// channel cannot be established or the reply cannot be parsed.
    async fn get_activation_status(&self) -> LicenseResult<ActivationStatus>;

    /// Ask the device to produce a dossier for `registration_key`.
    async fn get_dossier(&self, registration_key: &str) -> LicenseResult<Dossier>;

    /// Write `license` and trigger the device's reload step. `Ok(false)`
    /// means the device did not accept it; the workflow still re-reads status
    /// afterwards on `Ok(true)`.
    async fn install_license(&self, license: &License) -> LicenseResult<bool>;

    /// Best-effort delivery of accepted EULA text to the device.
    async fn upload_eula(&self, eula_text: &str) -> LicenseResult<()>;
}

/// Resolve `Auto` into a concrete transport. Explicit kinds pass through
/// without probing.
pub async fn resolve_transport(
    kind: TransportKind,
    probe: &dyn ConnectivityProbe,
    target: &DeviceTarget,
    credentials: &Credentials,
) -> ResolvedTransport {
    match kind {
        TransportKind::RemoteProcedure => ResolvedTransport::RemoteProcedure,
        TransportKind::RemoteShell => ResolvedTransport::RemoteShell,
        TransportKind::Auto => {
            if probe.probe(target, credentials).await {
                info!(host = %target.host, "RPC interface reachable, using remote_procedure transport");
                ResolvedTransport::RemoteProcedure
            } else {
                info!(host = %target.host, "RPC interface unreachable, falling back to remote_shell transport");
                ResolvedTransport::RemoteShell
            }
        }
    }
}

/// Resolve the transport and keep only the matching backend. The other
/// backend is dropped unused.
pub async fn select_backend(
    kind: TransportKind,
    probe: &dyn ConnectivityProbe,
    target: &DeviceTarget,
    credentials: &Credentials,
    remote_procedure: Box<dyn TransportBackend>,
    remote_shell: Box<dyn TransportBackend>,
) -> (ResolvedTransport, Box<dyn TransportBackend>) {
    let resolved = resolve_transport(kind, probe, target, credentials).await;
    let backend = match resolved {
        ResolvedTransport::RemoteProcedure => remote_procedure,
        ResolvedTransport::RemoteShell => remote_shell,
    };
    (resolved, backend)
}

/// Build the production backends for `target` and select one.
pub async fn connect(
    kind: TransportKind,
    target: &DeviceTarget,
    credentials: &Credentials,
    probe_timeout: std::time::Duration,
    request_timeout: std::time::Duration,
) -> LicenseResult<(ResolvedTransport, Box<dyn TransportBackend>)> {
    let probe = RpcConnectivityProbe::new(probe_timeout);
    let rpc = icontrol::RemoteProcedureBackend::new(target.clone(), credentials.clone(), request_timeout)?;
    let ssh = shell::RemoteShellBackend::new(shell::SshSession::new(
        target.clone(),
        credentials.clone(),
    ));

    Ok(select_backend(kind, &probe, target, credentials, Box::new(rpc), Box::new(ssh)).await)
}
