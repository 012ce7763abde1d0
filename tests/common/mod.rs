//! In-memory fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use appliance_license::client::{ActivationResponse, ActivationService};
use appliance_license::device::{Credentials, DeviceTarget};
use appliance_license::errors::{LicenseError, LicenseResult};
use appliance_license::license::{ActivationStatus, Dossier, EulaOffer, License};
use appliance_license::registrant::RegistrantProfile;
use appliance_license::transport::{ConnectivityProbe, TransportBackend};

pub const REGISTRATION_KEY: &str = "AAAAA-BBBBB-CCCCC-DDDDD-EEEEEEE";

pub fn target() -> DeviceTarget {
    DeviceTarget::new("10.1.1.245")
}

pub fn credentials() -> Credentials {
    Credentials::new("admin", "admin")
}

pub fn license(text: &str) -> License {
    License::new(text.as_bytes().to_vec()).unwrap()
}

pub fn license_returned(text: &str) -> ActivationResponse {
    ActivationResponse::LicenseReturned {
        license: license(text),
        eula: None,
    }
}

pub fn eula_required(text: &str) -> ActivationResponse {
    ActivationResponse::EulaRequired(EulaOffer::new(text))
}

// ── Transport backend ───────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct BackendCalls {
    pub status: usize,
    pub dossier: usize,
    pub install: usize,
    pub eula: usize,
    pub dossier_keys: Vec<String>,
    pub installed: Vec<Vec<u8>>,
    pub eula_texts: Vec<String>,
}

impl BackendCalls {
    pub fn total(&self) -> usize {
        self.status + self.dossier + self.install + self.eula
    }
}

/// Scripted device. Each status read pops the next scripted status; an
/// exhausted script is a transport failure.
pub struct FakeBackend {
    calls: Arc<Mutex<BackendCalls>>,
    statuses: Mutex<VecDeque<ActivationStatus>>,
    dossier: Option<String>,
    install_accepts: bool,
    eula_fails: bool,
}

impl FakeBackend {
    pub fn new(statuses: &[ActivationStatus]) -> Self {
        Self {
            calls: Arc::new(Mutex::new(BackendCalls::default())),
            statuses: Mutex::new(statuses.iter().copied().collect()),
            dossier: Some("fake-dossier".to_string()),
            install_accepts: true,
            eula_fails: false,
        }
    }

    /// Disabled before install, Enabled after.
    pub fn unlicensed() -> Self {
        Self::new(&[ActivationStatus::Disabled, ActivationStatus::Enabled])
    }

    pub fn licensed() -> Self {
        Self::new(&[ActivationStatus::Enabled])
    }

    pub fn without_dossier(mut self) -> Self {
        self.dossier = None;
        self
    }

    pub fn rejecting_install(mut self) -> Self {
        self.install_accepts = false;
        self
    }

    pub fn failing_eula_upload(mut self) -> Self {
        self.eula_fails = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<BackendCalls>> {
        self.calls.clone()
    }
}

#[async_trait]
impl TransportBackend for FakeBackend {
    async fn get_activation_status(&self) -> LicenseResult<ActivationStatus> {
        self.calls.lock().unwrap().status += 1;
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LicenseError::Transport("device unreachable".to_string()))
    }

    async fn get_dossier(&self, registration_key: &str) -> LicenseResult<Dossier> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.dossier += 1;
            calls.dossier_keys.push(registration_key.to_string());
        }
        match &self.dossier {
            Some(text) => Dossier::new(text.clone(), Some(registration_key.to_string())),
            None => Err(LicenseError::Dossier("get_dossier returned nothing".to_string())),
        }
    }

    async fn install_license(&self, license: &License) -> LicenseResult<bool> {
        let mut calls = self.calls.lock().unwrap();
        calls.install += 1;
        calls.installed.push(license.as_bytes().to_vec());
        Ok(self.install_accepts)
    }

    async fn upload_eula(&self, eula_text: &str) -> LicenseResult<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.eula += 1;
        calls.eula_texts.push(eula_text.to_string());
        if self.eula_fails {
            Err(LicenseError::Transport("config store is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

// ── Activation service ──────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct ServiceCalls {
    pub probe: usize,
    pub requests: usize,
    pub dossiers: Vec<String>,
    pub registrants: Vec<RegistrantProfile>,
}

pub struct FakeService {
    calls: Arc<Mutex<ServiceCalls>>,
    reachable: bool,
    responses: Mutex<VecDeque<ActivationResponse>>,
}

impl FakeService {
    pub fn new(responses: Vec<ActivationResponse>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(ServiceCalls::default())),
            reachable: true,
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> Arc<Mutex<ServiceCalls>> {
        self.calls.clone()
    }
}

#[async_trait]
impl ActivationService for FakeService {
    async fn probe_reachable(&self) -> bool {
        self.calls.lock().unwrap().probe += 1;
        self.reachable
    }

    async fn request_license(
        &self,
        dossier: &Dossier,
        registrant: &RegistrantProfile,
    ) -> ActivationResponse {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.requests += 1;
            calls.dossiers.push(dossier.as_str().to_string());
            calls.registrants.push(registrant.clone());
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ActivationResponse::Fault("no scripted response".to_string()))
    }
}

// ── Connectivity probe ──────────────────────────────────────────

pub struct FakeProbe {
    reachable: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for FakeProbe {
    async fn probe(&self, _target: &DeviceTarget, _credentials: &Credentials) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reachable
    }
}
