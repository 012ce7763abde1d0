//! Registrant metadata submitted alongside a dossier.
//!
//! Every field defaults to the empty string. Caller-supplied values override
//! the defaults and unknown keys are rejected, whether the values arrive from
//! a `[registrant]` config table or from [`RegistrantProfile::from_options`].
//! `eula` is owned by the workflow and cannot be set by the caller.

use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::{LicenseError, LicenseResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrantProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone: String,
    pub job_title: String,
    pub address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip)]
    eula: String,
}

/// Keys accepted from callers, in submission order.
pub const REGISTRANT_FIELDS: [&str; 11] = [
    "email",
    "first_name",
    "last_name",
    "company_name",
    "phone",
    "job_title",
    "address",
    "city",
    "state_province",
    "postal_code",
    "country",
];

impl RegistrantProfile {
    /// Build a profile from loose key/value options.
    pub fn from_options(options: &HashMap<String, String>) -> LicenseResult<Self> {
        let mut profile = Self::default();
        profile.apply_options(options)?;
        Ok(profile)
    }

    /// Override fields with `options`. Nothing changes if any key is unknown.
    pub fn apply_options(&mut self, options: &HashMap<String, String>) -> LicenseResult<()> {
        let mut unknown: Vec<&str> = options
            .keys()
            .map(String::as_str)
            .filter(|key| !REGISTRANT_FIELDS.contains(key))
            .collect();

        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(LicenseError::Config(format!(
                "unknown registrant field(s): {}",
                unknown.join(", ")
            )));
        }

        for (key, value) in options {
            if let Some(slot) = self.field_mut(key) {
                *slot = value.clone();
            }
        }
        Ok(())
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "email" => &mut self.email,
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "company_name" => &mut self.company_name,
            "phone" => &mut self.phone,
            "job_title" => &mut self.job_title,
            "address" => &mut self.address,
            "city" => &mut self.city,
            "state_province" => &mut self.state_province,
            "postal_code" => &mut self.postal_code,
            "country" => &mut self.country,
            _ => return None,
        };
        Some(slot)
    }

    /// Accepted EULA text; empty until the service has offered one.
    pub fn eula(&self) -> &str {
        &self.eula
    }

    /// Copy of this profile carrying accepted EULA text. Other fields are untouched.
    pub fn with_eula(&self, text: impl Into<String>) -> Self {
        Self {
            eula: text.into(),
            ..self.clone()
        }
    }

    /// Field values paired with the activation service's parameter names.
    pub fn service_fields(&self) -> [(&'static str, &str); 11] {
        [
            ("email", self.email.as_str()),
            ("firstName", self.first_name.as_str()),
            ("lastName", self.last_name.as_str()),
            ("companyName", self.company_name.as_str()),
            ("phone", self.phone.as_str()),
            ("jobTitle", self.job_title.as_str()),
            ("address", self.address.as_str()),
            ("city", self.city.as_str()),
            ("stateProvince", self.state_province.as_str()),
            ("postalCode", self.postal_code.as_str()),
            ("country", self.country.as_str()),
        ]
    }
}
