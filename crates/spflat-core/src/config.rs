//! Configuration types for the reconciliation system
//!
//! The configuration file is JSON:
//!
//! ```json
//! {
//!   "sending domains": {
//!     "example.com": ["include:_spf.example.net", "ip4:10.0.0.0/24"]
//!   },
//!   "resolvers": ["1.1.1.1"],
//!   "output": "spf_sums.json",
//!   "email": {
//!     "to": "ops@example.com",
//!     "from": "spf@example.com",
//!     "server": "smtp.example.com"
//!   }
//! }
//! ```
//!
//! Sending domains are processed in the order they appear in the file.

use crate::traits::notifier::ZONE_PLACEHOLDER;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "spfs.json";

/// Default state file name
pub const DEFAULT_OUTPUT_PATH: &str = "spf_sums.json";

/// Default subject for "changed, not applied" notices
pub const DEFAULT_ALERT_SUBJECT: &str =
    "[WARNING] SPF Records for {zone} have changed and should be updated.";

/// Default subject for "changed and applied" notices
pub const DEFAULT_UPDATE_SUBJECT: &str = "[NOTICE] SPF records for {zone} have been updated.";

/// Top-level settings loaded from the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Sending domains and their SPF mechanisms, in configuration order
    #[serde(
        rename = "sending domains",
        deserialize_with = "deserialize_domains",
        serialize_with = "serialize_domains"
    )]
    pub sending_domains: Vec<SendingDomain>,

    /// Nameservers the crawler should query (system resolver when empty)
    #[serde(default)]
    pub resolvers: Vec<String>,

    /// Path of the persisted state file
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Notification settings
    #[serde(default)]
    pub email: Option<EmailSettings>,
}

/// One sending domain and the SPF mechanisms to flatten for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendingDomain {
    /// The sending domain (e.g., "example.com")
    pub domain: String,
    /// SPF mechanism strings
    pub mechanisms: Vec<String>,
}

impl SendingDomain {
    /// Create a sending domain entry
    pub fn new<I, S>(domain: impl Into<String>, mechanisms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domain: domain.into(),
            mechanisms: mechanisms.into_iter().map(Into::into).collect(),
        }
    }
}

fn deserialize_domains<'de, D>(deserializer: D) -> Result<Vec<SendingDomain>, D::Error>
where
    D: Deserializer<'de>,
{
    // serde_json's `preserve_order` keeps the map in file order
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(domain, value)| {
            let mechanisms: Vec<String> = serde_json::from_value(value).map_err(|e| {
                D::Error::custom(format!(
                    "sending domain {} must map to a list of strings: {}",
                    domain, e
                ))
            })?;
            Ok(SendingDomain { domain, mechanisms })
        })
        .collect()
}

fn serialize_domains<S>(domains: &[SendingDomain], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(domains.len()))?;
    for entry in domains {
        map.serialize_entry(&entry.domain, &entry.mechanisms)?;
    }
    map.end()
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Recipient address
    pub to: String,

    /// Sender address
    pub from: String,

    /// SMTP server (`host` or `host:port`)
    pub server: String,

    /// Subject used when a change is detected but not applied
    #[serde(default = "default_alert_subject")]
    pub subject: String,

    /// Subject used when a change is applied to DNS
    #[serde(default = "default_update_subject")]
    pub update_subject: String,
}

fn default_alert_subject() -> String {
    DEFAULT_ALERT_SUBJECT.to_string()
}

fn default_update_subject() -> String {
    DEFAULT_UPDATE_SUBJECT.to_string()
}

impl Settings {
    /// Create settings for the given sending domains with defaults elsewhere
    pub fn new(sending_domains: Vec<SendingDomain>) -> Self {
        Self {
            sending_domains,
            resolvers: Vec::new(),
            output: None,
            email: None,
        }
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::config(format!("Invalid configuration: {}", e)))
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Validate the settings
    ///
    /// # Parameters
    ///
    /// - `notify`: Whether change notifications will be sent; the email
    ///   block is only mandatory in that case
    pub fn validate(&self, notify: bool) -> Result<(), crate::Error> {
        if self.sending_domains.is_empty() {
            return Err(crate::Error::config("No sending domains configured"));
        }

        for entry in &self.sending_domains {
            if entry.domain.trim().is_empty() {
                return Err(crate::Error::config("Sending domain cannot be empty"));
            }
            if entry.mechanisms.is_empty() {
                return Err(crate::Error::config(format!(
                    "Sending domain {} has no SPF mechanisms",
                    entry.domain
                )));
            }
        }

        self.resolver_addrs()?;

        match &self.email {
            Some(email) => email.validate(notify)?,
            None if notify => {
                return Err(crate::Error::config(
                    "An email block (to, from, server) is required \
                    unless notifications are disabled",
                ));
            }
            None => {}
        }

        Ok(())
    }

    /// Parsed nameserver addresses
    pub fn resolver_addrs(&self) -> Result<Vec<IpAddr>, crate::Error> {
        self.resolvers
            .iter()
            .map(|r| {
                r.trim().parse::<IpAddr>().map_err(|_| {
                    crate::Error::config(format!("Resolver is not an IP address: {}", r))
                })
            })
            .collect()
    }

    /// Output path: explicit override, else configured, else the default
    pub fn output_path(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH))
    }
}

impl EmailSettings {
    /// Validate the notification settings
    pub fn validate(&self, notify: bool) -> Result<(), crate::Error> {
        if notify {
            for (field, value) in [("to", &self.to), ("from", &self.from), ("server", &self.server)]
            {
                if value.trim().is_empty() {
                    return Err(crate::Error::config(format!(
                        "email.{} is required unless notifications are disabled",
                        field
                    )));
                }
            }
        }

        for (field, value) in [
            ("subject", &self.subject),
            ("update_subject", &self.update_subject),
        ] {
            if !value.contains(ZONE_PLACEHOLDER) {
                return Err(crate::Error::config(format!(
                    "email.{} must contain {}",
                    field, ZONE_PLACEHOLDER
                )));
            }
        }

        Ok(())
    }
}
