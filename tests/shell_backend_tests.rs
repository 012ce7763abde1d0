use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use appliance_license::errors::{LicenseError, LicenseResult};
use appliance_license::license::{ActivationStatus, License};
use appliance_license::transport::icontrol::EULA_DEVICE_PATH;
use appliance_license::transport::shell::{
    CommandOutput, RemoteShell, RemoteShellBackend, LICENSE_DEVICE_PATH,
};
use appliance_license::transport::TransportBackend;

#[derive(Debug, Clone)]
struct CopyRecord {
    local: PathBuf,
    remote: String,
    existed: bool,
    contents: Vec<u8>,
}

/// Records every command and copy; replies from scripted queues.
#[derive(Default)]
struct FakeShell {
    exec_replies: Mutex<VecDeque<CommandOutput>>,
    copy_status: i32,
    commands: Mutex<Vec<String>>,
    copies: Mutex<Vec<CopyRecord>>,
}

impl FakeShell {
    fn replying(replies: Vec<CommandOutput>) -> Self {
        Self {
            exec_replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn failing_copy(mut self) -> Self {
        self.copy_status = 1;
        self
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn copies(&self) -> Vec<CopyRecord> {
        self.copies.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn exec(&self, command: &str) -> LicenseResult<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        self.exec_replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LicenseError::Transport("connection reset".to_string()))
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> LicenseResult<CommandOutput> {
        self.copies.lock().unwrap().push(CopyRecord {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            existed: local.exists(),
            contents: std::fs::read(local).unwrap_or_default(),
        });
        Ok(CommandOutput {
            status: self.copy_status,
            stdout: String::new(),
            stderr: if self.copy_status == 0 {
                String::new()
            } else {
                "scp: /config: Permission denied".to_string()
            },
        })
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn license() -> License {
    License::new(b"Auth vers : 5b\nRegistration Key : AAAAA".to_vec()).unwrap()
}

#[tokio::test]
async fn status_reads_license_command() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![ok(
        "Licensed Version    13.1.0\nRegistration Key    AAAAA-BBBBB\n",
    )]));

    let status = backend.get_activation_status().await.unwrap();

    assert_eq!(status, ActivationStatus::Enabled);
    assert_eq!(backend.shell().commands(), vec!["tmsh show sys license".to_string()]);
}

#[tokio::test]
async fn dossier_comes_from_get_dossier() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![ok("d1f2e3a4b5c6\n")]));

    let dossier = backend.get_dossier("AAAAA-BBBBB-CCCCC").await.unwrap();

    assert_eq!(dossier.as_str(), "d1f2e3a4b5c6");
    assert_eq!(dossier.registration_key(), Some("AAAAA-BBBBB-CCCCC"));
    assert_eq!(
        backend.shell().commands(),
        vec!["get_dossier -b AAAAA-BBBBB-CCCCC".to_string()]
    );
}

#[tokio::test]
async fn empty_dossier_output_is_an_error() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![ok("  \n")]));
    let err = backend.get_dossier("AAAAA-BBBBB").await.unwrap_err();
    assert!(matches!(err, LicenseError::Dossier(_)));
}

#[tokio::test]
async fn malformed_registration_key_never_reaches_the_device() {
    let backend = RemoteShellBackend::new(FakeShell::default());
    let err = backend.get_dossier("AAAAA; reboot").await.unwrap_err();
    assert!(matches!(err, LicenseError::Dossier(_)));
    assert!(backend.shell().commands().is_empty());
}

#[tokio::test]
async fn install_copies_then_reloads_and_cleans_up() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![ok("Loading license...\n")]));

    let accepted = backend.install_license(&license()).await.unwrap();

    assert!(accepted);
    let copies = backend.shell().copies();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].remote, LICENSE_DEVICE_PATH);
    assert!(copies[0].existed);
    assert_eq!(copies[0].contents, license().as_bytes());
    assert!(!copies[0].local.exists());
    assert_eq!(backend.shell().commands(), vec!["reloadlic".to_string()]);
}

#[tokio::test]
async fn failed_copy_is_an_install_error_and_cleans_up() {
    let backend = RemoteShellBackend::new(FakeShell::default().failing_copy());

    let err = backend.install_license(&license()).await.unwrap_err();

    assert!(matches!(err, LicenseError::Install(_)));
    let copies = backend.shell().copies();
    assert!(!copies[0].local.exists());
    assert!(backend.shell().commands().is_empty());
}

#[tokio::test]
async fn silent_reload_is_an_install_error() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![ok("")]));

    let err = backend.install_license(&license()).await.unwrap_err();

    assert!(matches!(err, LicenseError::Install(_)));
    assert!(!backend.shell().copies()[0].local.exists());
}

#[tokio::test]
async fn failed_reload_is_an_install_error() {
    let backend = RemoteShellBackend::new(FakeShell::replying(vec![CommandOutput {
        status: 1,
        stdout: String::new(),
        stderr: "reloadlic: license file is invalid".to_string(),
    }]));

    let err = backend.install_license(&license()).await.unwrap_err();

    match err {
        LicenseError::Install(message) => assert!(message.contains("license file is invalid")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn eula_goes_to_its_device_path() {
    let backend = RemoteShellBackend::new(FakeShell::default());

    backend.upload_eula("END USER LICENSE AGREEMENT").await.unwrap();

    let copies = backend.shell().copies();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].remote, EULA_DEVICE_PATH);
    assert_eq!(copies[0].contents, b"END USER LICENSE AGREEMENT");
    assert!(!copies[0].local.exists());
}

#[tokio::test]
async fn failed_eula_copy_is_a_transport_error() {
    let backend = RemoteShellBackend::new(FakeShell::default().failing_copy());
    let err = backend.upload_eula("terms").await.unwrap_err();
    assert!(matches!(err, LicenseError::Transport(_)));
}
