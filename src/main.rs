// src/main.rs

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use appliance_license::config::ApplianceConfig;
use appliance_license::errors::{LicenseError, LicenseResult};
use appliance_license::logging::init_logging;
use appliance_license::workflow::activate;
use appliance_license::ActivationOutcome;

/// Activate the license on a network appliance.
///
/// Prints one JSON object describing the outcome. Exits non-zero on failure.
#[derive(Debug, Parser)]
#[command(name = "appliance_license", version, about)]
struct Cli {
    /// Configuration file (defaults to ./appliance-license.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device hostname or address
    #[arg(long)]
    host: Option<String>,

    /// HTTPS management port
    #[arg(long)]
    port: Option<u16>,

    /// SSH port
    #[arg(long)]
    ssh_port: Option<u16>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long, env = "APPLIANCE_LICENSE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// SSH private key
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// auto, rpc or shell
    #[arg(long)]
    transport: Option<String>,

    /// Base registration key used to generate a dossier
    #[arg(long)]
    registration_key: Option<String>,

    /// Pre-generated dossier
    #[arg(long)]
    dossier_file: Option<PathBuf>,

    /// Pre-issued license (skips the activation service)
    #[arg(long)]
    license_file: Option<PathBuf>,

    /// Activation service endpoint
    #[arg(long)]
    service_url: Option<String>,

    /// Local service description (WSDL) naming the activation endpoint
    #[arg(long)]
    wsdl_file: Option<PathBuf>,

    /// Registrant field submitted with the dossier (repeatable)
    #[arg(long = "registrant", value_name = "KEY=VALUE")]
    registrant: Vec<String>,

    /// Skip TLS certificate verification for the device
    #[arg(long)]
    no_validate_certs: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut ApplianceConfig) -> LicenseResult<()> {
        if let Some(host) = self.host {
            config.device.host = host;
        }
        if let Some(port) = self.port {
            config.device.port = port;
        }
        if let Some(ssh_port) = self.ssh_port {
            config.device.ssh_port = ssh_port;
        }
        if let Some(username) = self.username {
            config.credentials.username = username;
        }
        if let Some(password) = self.password {
            config.credentials.password = password;
        }
        if self.key_file.is_some() {
            config.credentials.key_file = self.key_file;
        }
        if let Some(transport) = self.transport {
            config.transport.kind = transport;
        }
        if self.registration_key.is_some() {
            config.activation.registration_key = self.registration_key;
        }
        if self.dossier_file.is_some() {
            config.activation.dossier_file = self.dossier_file;
        }
        if self.license_file.is_some() {
            config.activation.license_file = self.license_file;
        }
        if let Some(service_url) = self.service_url {
            config.activation.service_url = service_url;
        }
        if self.wsdl_file.is_some() {
            config.activation.wsdl_file = self.wsdl_file;
        }
        if self.no_validate_certs {
            config.transport.validate_certs = false;
        }
        if self.verbose {
            config.logging.enabled = true;
        }
        if !self.registrant.is_empty() {
            config.registrant.apply_options(&parse_pairs(&self.registrant)?)?;
        }
        Ok(())
    }
}

fn parse_pairs(pairs: &[String]) -> LicenseResult<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| {
                    LicenseError::Config(format!("expected KEY=VALUE for --registrant, got '{pair}'"))
                })
        })
        .collect()
}

fn load(cli: Cli) -> LicenseResult<ApplianceConfig> {
    let mut config = ApplianceConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;
    config.validate()?;
    init_logging(&config.logging)?;
    Ok(config)
}

fn print_outcome(outcome: &ActivationOutcome) {
    match serde_json::to_string_pretty(&outcome.report()) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to render outcome: {e}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match load(cli) {
        Ok(config) => activate(&config).await,
        Err(err) => ActivationOutcome::failed(&err),
    };

    print_outcome(&outcome);

    if outcome.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
