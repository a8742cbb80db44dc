// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider`.
//
// ## Behavior
//
// - One HTTP request per trait method call
// - Full error propagation; no retry, backoff or caching
// - HTTP timeout configured (30 seconds)
// - Status mapping: 401/403 → `Authentication`, 429 → `RateLimited`,
//   5xx → transient `Provider`, anything else → `Provider`
// - A response envelope with `success: false` is a `Provider` error even
//   when the HTTP status is 2xx
//
// ## Authentication
//
// - API token: `Authorization: Bearer <token>`
// - Global key: `X-Auth-Email` + `X-Auth-Key`
//
// Secrets never appear in logs or Debug output.
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...&match=all`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use spflat_core::traits::{
    CreateFields, DnsProvider, RecordFilter, ResourceRecord, UpdateFields, Zone,
};
use spflat_core::{Credentials, Error, Result};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page the records endpoint serves
const RECORDS_PER_PAGE: &str = "100";

const PROVIDER: &str = "cloudflare";

/// Cloudflare API v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Mutation results only carry the id we need
#[derive(Debug, Deserialize)]
struct RecordId {
    id: String,
}

impl<T> Envelope<T> {
    fn into_result(self, context: &str) -> Result<T> {
        if !self.success {
            let details = self
                .errors
                .iter()
                .map(|e| match e.code {
                    Some(code) => format!("{} ({})", e.message, code),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", context, details),
            ));
        }
        self.result.ok_or_else(|| {
            Error::provider(
                PROVIDER,
                format!("Invalid response format: {} returned no result", context),
            )
        })
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, context: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid credentials or insufficient permissions. Status: {}",
            context, status
        )),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Please retry later. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!(
                "Cloudflare server error (transient) during {}: {} - {}",
                context, status, body
            ),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", context, status, body)),
    }
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless and single-shot. Zone resolution,
/// uniqueness checks and upsert logic live in `spflat-core`.
pub struct CloudflareProvider {
    /// API credentials
    /// ⚠️ NEVER log these values
    credentials: Credentials,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `credentials`: API token with Zone:Read and DNS:Edit permissions,
    ///   or account email + global API key
    ///
    /// # Returns
    ///
    /// - `Ok(CloudflareProvider)`
    /// - `Err(Error::Config)`: Empty credentials
    /// - `Err(Error::Provider)`: The HTTP client could not be built
    pub fn new(credentials: Credentials) -> Result<Self> {
        let empty = match &credentials {
            Credentials::Token(token) => token.trim().is_empty(),
            Credentials::KeyPair { email, api_key } => {
                email.trim().is_empty() || api_key.trim().is_empty()
            }
        };
        if empty {
            return Err(Error::config("Cloudflare credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::provider(PROVIDER, format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            credentials,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::KeyPair { email, api_key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        }
    }

    /// Send a request and unwrap the response envelope
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self
            .authorize(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, context, &error_text));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
        envelope.into_result(context)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones?name=example.com&match=all
    /// ```
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>> {
        tracing::debug!("Looking up Cloudflare zone: {}", name);
        let request = self
            .client
            .get(format!("{}/zones", self.base_url))
            .query(&[("name", name), ("match", "all")]);
        self.execute(request, "Zone lookup").await
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?name=spf0.example.com&type=TXT&match=all&per_page=100
    /// ```
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<ResourceRecord>> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(4);
        if let Some(name) = filter.name.as_deref() {
            query.push(("name", name));
        }
        if let Some(record_type) = filter.record_type.as_ref() {
            query.push(("type", record_type.as_str()));
        }
        query.push(("match", filter.match_mode.as_str()));
        query.push(("per_page", RECORDS_PER_PAGE));

        tracing::debug!("Listing records in zone {}: {:?}", zone_id, filter);
        let request = self.client.get(self.records_url(zone_id)).query(&query);
        self.execute(request, "Record lookup").await
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"name": "spf0.example.com", "type": "TXT", "content": "10.0.0.0/24", "ttl": 1}
    /// ```
    async fn create_record(&self, zone_id: &str, fields: &CreateFields) -> Result<String> {
        tracing::debug!("Creating {} record {}", fields.record_type, fields.name);
        let request = self.client.post(self.records_url(zone_id)).json(fields);
        let created: RecordId = self.execute(request, "Record create").await?;
        Ok(created.id)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"name": "...", "type": "TXT", "content": "...", "ttl": 300, "proxied": false}
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        fields: &UpdateFields,
    ) -> Result<String> {
        tracing::debug!("Updating {} record {} ({})", fields.record_type, fields.name, record_id);
        let request = self
            .client
            .put(self.record_url(zone_id, record_id))
            .json(fields);
        let updated: RecordId = self.execute(request, "Record update").await?;
        Ok(updated.id)
    }

    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<String> {
        tracing::debug!("Deleting record {}", record_id);
        let request = self.client.delete(self.record_url(zone_id, record_id));
        let deleted: RecordId = self.execute(request, "Record delete").await?;
        Ok(deleted.id)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
