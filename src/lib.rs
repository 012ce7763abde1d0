//! appliance-license - license activation for network appliances
//!
//! Obtains a dossier from the device, exchanges it with the activation
//! service for a signed license (accepting a EULA when asked), installs the
//! license and checks that the device reports it as active. Running it against
//! an already-licensed device changes nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use appliance_license::config::ApplianceConfig;
//! use appliance_license::workflow::activate;
//!
//! # async fn run() -> appliance_license::errors::LicenseResult<()> {
//! let config = ApplianceConfig::load(None)?;
//! let outcome = activate(&config).await;
//! println!("changed: {}", outcome.changed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod errors;
pub mod license;
pub mod logging;
pub mod registrant;
pub mod soap;
pub mod workflow;

// Activation service side
pub mod client;

// Device side
pub mod transport;

pub use errors::{FailureReason, LicenseError, LicenseResult};
pub use license::ActivationOutcome;
pub use workflow::{ActivationRequest, LicenseActivationWorkflow};
