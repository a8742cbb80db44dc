// # DNS Provider Trait
//
// Defines the interface for zone discovery and record CRUD via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `spflat-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use spflat_core::traits::{DnsProvider, RecordFilter, RecordType};
//
// let zones = provider.list_zones("example.com").await?;
// let records = provider
//     .list_records(&zones[0].id, &RecordFilter::exact("spf0.example.com", RecordType::Txt))
//     .await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest explicit TTL accepted by providers (seconds)
const MIN_TTL: u32 = 60;

/// Highest TTL accepted by providers (seconds)
const MAX_TTL: u32 = 86400;

/// TTL value meaning "let the provider choose"
pub const AUTOMATIC_TTL: u32 = 1;

/// A provider-side DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider zone identifier (opaque)
    pub id: String,
    /// Zone apex name (e.g., "example.com")
    pub name: String,
}

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name record
    Cname,
    /// Mail exchanger record
    Mx,
    /// Text record
    Txt,
    /// Any other type, kept verbatim (upper-case)
    Other(String),
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Other(other) => other,
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "MX" => RecordType::Mx,
            "TXT" => RecordType::Txt,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        RecordType::from(value.as_str())
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Provider record identifier (opaque)
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content (address, text, target...)
    pub content: String,
    /// Time-to-live; `1` means automatic
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Whether traffic is proxied by the provider
    #[serde(default)]
    pub proxied: bool,
}

fn default_ttl() -> u32 {
    AUTOMATIC_TTL
}

/// How the terms of a [`RecordFilter`] are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every term must match
    #[default]
    All,
    /// Any term may match
    Any,
}

impl MatchMode {
    /// Query-string value of the match mode
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::All => "all",
            MatchMode::Any => "any",
        }
    }
}

/// Record listing filter, passed straight through to the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Record name to match
    pub name: Option<String>,
    /// Record type to match
    pub record_type: Option<RecordType>,
    /// How name and type are combined
    pub match_mode: MatchMode,
}

impl RecordFilter {
    /// Filter matching exactly one `(name, type)` pair
    pub fn exact(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: Some(name.into()),
            record_type: Some(record_type),
            match_mode: MatchMode::All,
        }
    }
}

/// Fields for creating a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFields {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// Time-to-live (provider default when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Proxy flag (provider default when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl CreateFields {
    /// Create fields with the required options set
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            content: content.into(),
            ttl: None,
            proxied: None,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = Some(proxied);
        self
    }

    /// Validate the fields before they are sent to the provider
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_fields(&self.name, &self.content)?;
        if let Some(ttl) = self.ttl
            && ttl != AUTOMATIC_TTL
            && !(MIN_TTL..=MAX_TTL).contains(&ttl)
        {
            return Err(crate::Error::invalid_input(format!(
                "TTL must be {} (automatic) or between {} and {}. Got: {}",
                AUTOMATIC_TTL, MIN_TTL, MAX_TTL, ttl
            )));
        }
        Ok(())
    }
}

/// Fields for replacing an existing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateFields {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// Time-to-live (left to the provider when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Proxy flag (left to the provider when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl UpdateFields {
    /// Update fields with the required options set
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            content: content.into(),
            ttl: None,
            proxied: None,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = Some(proxied);
        self
    }

    /// Validate the fields before they are sent to the provider
    ///
    /// The TTL is not range-checked: it is normally carried over from the
    /// existing record, which the provider already accepted.
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_fields(&self.name, &self.content)
    }
}

fn validate_fields(name: &str, content: &str) -> Result<(), crate::Error> {
    if name.trim().is_empty() {
        return Err(crate::Error::invalid_input("Record name cannot be empty"));
    }
    if content.is_empty() {
        return Err(crate::Error::invalid_input(format!(
            "Record content cannot be empty for {}",
            name
        )));
    }
    Ok(())
}

/// Trait for DNS provider implementations
///
/// This trait covers the provider-side operations the reconciliation core
/// needs: finding zones by name and managing records inside one zone.
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, stateless and single-shot:
/// - One API call per method invocation
/// - No retry, backoff or caching; failures are returned to the caller
/// - No knowledge of which records *should* exist (owned by `RecordView`)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List zones whose name exactly equals `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Zone>)`: Zero or more matching zones
    /// - `Err(Error)`: Transport or API failure
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>, crate::Error>;

    /// List records in a zone matching `filter`
    ///
    /// May return 0, 1 or many records; enforcing uniqueness is the
    /// caller's business.
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<ResourceRecord>, crate::Error>;

    /// Create a record and return its id
    async fn create_record(
        &self,
        zone_id: &str,
        fields: &CreateFields,
    ) -> Result<String, crate::Error>;

    /// Replace a record by id and return its id
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        fields: &UpdateFields,
    ) -> Result<String, crate::Error>;

    /// Delete a record by id and return the deleted id
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<String, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
