//! Remote-shell backend: commands over ssh, payloads over scp.
//!
//! Payloads are staged in a local [`NamedTempFile`] that is removed when it
//! goes out of scope, so every exit path (copy failure, reload failure,
//! success) cleans up after itself.

use async_trait::async_trait;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use crate::device::{Credentials, DeviceTarget};
use crate::errors::{LicenseError, LicenseResult};
use crate::license::{ActivationStatus, Dossier, License};
use crate::transport::icontrol::EULA_DEVICE_PATH;
use crate::transport::TransportBackend;

/// License file location on the device.
pub const LICENSE_DEVICE_PATH: &str = "/config/bigip.license";

const STATUS_COMMAND: &str = "tmsh show sys license";
const RELOAD_COMMAND: &str = "reloadlic";

/// Exit status ssh uses for its own (connection/auth) failures.
const SSH_CHANNEL_FAILURE: i32 = 255;

/// Seconds ssh waits for the TCP connection.
const SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Output of a remote command or copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    fn describe(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        format!("exit status {}: {}", self.status, detail)
    }
}

/// A shell session on the device.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` on the device.
    async fn exec(&self, command: &str) -> LicenseResult<CommandOutput>;

    /// Copy the local file at `local` to `remote` on the device.
    async fn copy_to(&self, local: &Path, remote: &str) -> LicenseResult<CommandOutput>;
}

/// [`RemoteShell`] backed by the system `ssh` and `scp` binaries.
///
/// With a key file the session runs in batch mode. With only a password it
/// runs through `sshpass -e`, passing the password in the environment rather
/// than on the command line. With neither it still runs in batch mode, so a
/// missing secret fails the call instead of waiting for a password prompt.
pub struct SshSession {
    target: DeviceTarget,
    credentials: Credentials,
}

impl SshSession {
    pub fn new(target: DeviceTarget, credentials: Credentials) -> Self {
        Self {
            target,
            credentials,
        }
    }

    fn uses_password(&self) -> bool {
        self.credentials.key_file.is_none() && !self.credentials.password.is_empty()
    }

    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={SSH_CONNECT_TIMEOUT_SECS}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        match &self.credentials.key_file {
            Some(key) => {
                args.push("-i".to_string());
                args.push(key.display().to_string());
                args.push("-o".to_string());
                args.push("BatchMode=yes".to_string());
            }
            None if self.uses_password() => {
                args.push("-o".to_string());
                args.push("PubkeyAuthentication=no".to_string());
            }
            // No secret to supply: fail instead of prompting on a terminal.
            None => {
                args.push("-o".to_string());
                args.push("BatchMode=yes".to_string());
            }
        }
        args
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.credentials.username, self.target.host)
    }

    /// Program and arguments for running `command` remotely.
    pub fn ssh_command_line(&self, command: &str) -> (String, Vec<String>) {
        let mut args = vec!["-p".to_string(), self.target.ssh_port.to_string()];
        args.extend(self.common_options());
        args.push(self.destination());
        args.push("--".to_string());
        args.push(command.to_string());
        self.wrap("ssh", args)
    }

    /// Program and arguments for copying `local` to `remote`.
    pub fn scp_command_line(&self, local: &Path, remote: &str) -> (String, Vec<String>) {
        let mut args = vec!["-P".to_string(), self.target.ssh_port.to_string()];
        args.extend(self.common_options());
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.destination(), remote));
        self.wrap("scp", args)
    }

    fn wrap(&self, program: &str, args: Vec<String>) -> (String, Vec<String>) {
        if self.uses_password() {
            let mut wrapped = vec!["-e".to_string(), program.to_string()];
            wrapped.extend(args);
            ("sshpass".to_string(), wrapped)
        } else {
            (program.to_string(), args)
        }
    }

    async fn run(&self, program: String, args: Vec<String>) -> LicenseResult<CommandOutput> {
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.uses_password() {
            cmd.env("SSHPASS", &self.credentials.password);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| LicenseError::Transport(format!("failed to start {program}: {e}")))?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.status == SSH_CHANNEL_FAILURE {
            return Err(LicenseError::Transport(format!(
                "ssh channel to {} failed: {}",
                self.target.host,
                result.stderr.trim()
            )));
        }

        Ok(result)
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(&self, command: &str) -> LicenseResult<CommandOutput> {
        let (program, args) = self.ssh_command_line(command);
        debug!(host = %self.target.host, command, "ssh exec");
        self.run(program, args).await
    }

    async fn copy_to(&self, local: &Path, remote: &str) -> LicenseResult<CommandOutput> {
        let (program, args) = self.scp_command_line(local, remote);
        debug!(host = %self.target.host, remote, "scp copy");
        self.run(program, args).await
    }
}

/// Interpret the output of the license status command.
pub fn parse_shell_status(output: &CommandOutput) -> LicenseResult<ActivationStatus> {
    let text = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();

    if text.contains("can't load license") || text.contains("not licensed") {
        return Ok(ActivationStatus::Disabled);
    }
    if output.success() && (text.contains("licensed version") || text.contains("registration key")) {
        return Ok(ActivationStatus::Enabled);
    }

    Err(LicenseError::Transport(format!(
        "could not parse license status ({})",
        output.describe()
    )))
}

fn registration_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("registration key pattern is valid")
    })
}

/// Write `bytes` to a fresh uniquely-named temporary file.
fn stage(bytes: &[u8]) -> LicenseResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("appliance-license-")
        .suffix(".tmp")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

pub struct RemoteShellBackend<S: RemoteShell> {
    shell: S,
}

impl<S: RemoteShell> RemoteShellBackend<S> {
    pub fn new(shell: S) -> Self {
        Self { shell }
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }
}

#[async_trait]
impl<S: RemoteShell> TransportBackend for RemoteShellBackend<S> {
    async fn get_activation_status(&self) -> LicenseResult<ActivationStatus> {
        let output = self.shell.exec(STATUS_COMMAND).await?;
        parse_shell_status(&output)
    }

    async fn get_dossier(&self, registration_key: &str) -> LicenseResult<Dossier> {
        if !registration_key_pattern().is_match(registration_key) {
            return Err(LicenseError::Dossier(format!(
                "registration key '{registration_key}' is not in the expected format"
            )));
        }

        let output = self
            .shell
            .exec(&format!("get_dossier -b {registration_key}"))
            .await
            .map_err(|e| LicenseError::Dossier(e.to_string()))?;

        if !output.success() {
            return Err(LicenseError::Dossier(format!(
                "get_dossier failed ({})",
                output.describe()
            )));
        }

        Dossier::new(output.stdout, Some(registration_key.to_string()))
    }

    async fn install_license(&self, license: &License) -> LicenseResult<bool> {
        let staged = stage(license.as_bytes())?;

        let copy = self
            .shell
            .copy_to(staged.path(), LICENSE_DEVICE_PATH)
            .await
            .map_err(|e| LicenseError::Install(e.to_string()))?;
        if !copy.success() {
            return Err(LicenseError::Install(format!(
                "copying license to {LICENSE_DEVICE_PATH} failed ({})",
                copy.describe()
            )));
        }
        info!(license = %license.fingerprint(), "license copied to device");

        let reload = self
            .shell
            .exec(RELOAD_COMMAND)
            .await
            .map_err(|e| LicenseError::Install(e.to_string()))?;
        if !reload.success() || reload.stdout.trim().is_empty() {
            return Err(LicenseError::Install(format!(
                "{RELOAD_COMMAND} failed ({})",
                reload.describe()
            )));
        }

        Ok(true)
    }

    async fn upload_eula(&self, eula_text: &str) -> LicenseResult<()> {
        let staged = stage(eula_text.as_bytes())?;

        let copy = self.shell.copy_to(staged.path(), EULA_DEVICE_PATH).await?;
        if !copy.success() {
            return Err(LicenseError::Transport(format!(
                "copying EULA to {EULA_DEVICE_PATH} failed ({})",
                copy.describe()
            )));
        }
        Ok(())
    }
}
