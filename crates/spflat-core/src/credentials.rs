//! DNS provider credential resolution
//!
//! Credentials come from two candidate sources, captured once at startup:
//!
//! 1. A TOML credentials file with a `[CloudFlare]` table
//!    (`email`, `api_key`, `api_token`)
//! 2. A snapshot of the `CLOUDFLARE_EMAIL`, `CLOUDFLARE_API_KEY` and
//!    `CLOUDFLARE_API_TOKEN` environment variables
//!
//! When the file exists and carries the table, its values replace the
//! environment values as a whole. An API token is preferred over an
//! email + API key pair.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials file name looked up in the working and home directories
pub const CREDENTIALS_FILE_NAME: &str = ".cloudflare.cf";

/// Environment variable holding the account email
pub const ENV_EMAIL: &str = "CLOUDFLARE_EMAIL";

/// Environment variable holding the global API key
pub const ENV_API_KEY: &str = "CLOUDFLARE_API_KEY";

/// Environment variable holding a scoped API token
pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";

/// Resolved provider credentials
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Scoped API token (`Authorization: Bearer`)
    Token(String),
    /// Account email and global API key
    KeyPair {
        /// Account email
        email: String,
        /// Global API key
        api_key: String,
    },
}

// Secrets never appear in Debug output
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
            Credentials::KeyPair { email, .. } => f
                .debug_struct("KeyPair")
                .field("email", email)
                .field("api_key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Values of the credential environment variables at startup
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    /// `CLOUDFLARE_EMAIL`
    pub email: Option<String>,
    /// `CLOUDFLARE_API_KEY`
    pub api_key: Option<String>,
    /// `CLOUDFLARE_API_TOKEN`
    pub api_token: Option<String>,
}

impl std::fmt::Debug for EnvSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSnapshot")
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl EnvSnapshot {
    /// Build a snapshot from a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            email: lookup(ENV_EMAIL),
            api_key: lookup(ENV_API_KEY),
            api_token: lookup(ENV_API_TOKEN),
        }
    }

    /// Capture the process environment
    pub fn capture() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Candidate credential sources
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Credentials file, if one should be consulted
    pub file: Option<PathBuf>,
    /// Environment snapshot
    pub env: EnvSnapshot,
}

impl CredentialSources {
    /// Sources with an explicit file
    pub fn new(file: Option<PathBuf>, env: EnvSnapshot) -> Self {
        Self { file, env }
    }

    /// Locate the default credentials file
    ///
    /// `.cloudflare.cf` in `cwd` wins over the one in the home directory.
    pub fn default_file(cwd: &Path) -> Option<PathBuf> {
        let local = cwd.join(CREDENTIALS_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(CREDENTIALS_FILE_NAME))
            .filter(|path| path.exists())
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "CloudFlare")]
    cloudflare: Option<CredentialsTable>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsTable {
    email: Option<String>,
    api_key: Option<String>,
    api_token: Option<String>,
}

impl Credentials {
    /// Resolve credentials from the candidate sources
    ///
    /// # Returns
    ///
    /// - `Ok(Credentials)`: Token, or email + key pair
    /// - `Err(Error::Config)`: File unreadable/invalid, or no usable credentials
    pub fn resolve(sources: &CredentialSources) -> Result<Self, crate::Error> {
        let mut email = sources.env.email.clone();
        let mut api_key = sources.env.api_key.clone();
        let mut api_token = sources.env.api_token.clone();

        if let Some(path) = sources.file.as_deref()
            && path.exists()
        {
            let content = std::fs::read_to_string(path).map_err(|e| {
                crate::Error::config(format!(
                    "Failed to read credentials file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let file: CredentialsFile = toml::from_str(&content).map_err(|e| {
                crate::Error::config(format!(
                    "Invalid credentials file {}: {}",
                    path.display(),
                    e
                ))
            })?;

            if let Some(table) = file.cloudflare {
                tracing::debug!("Using credentials from {}", path.display());
                email = table.email;
                api_key = table.api_key;
                api_token = table.api_token;
            }
        }

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(api_token) {
            return Ok(Credentials::Token(token));
        }

        match (non_empty(email), non_empty(api_key)) {
            (Some(email), Some(api_key)) => Ok(Credentials::KeyPair { email, api_key }),
            _ => Err(crate::Error::config(format!(
                "No DNS provider credentials found. Set {} (or {} and {}), \
                or provide a {} file with a [CloudFlare] table",
                ENV_API_TOKEN, ENV_EMAIL, ENV_API_KEY, CREDENTIALS_FILE_NAME
            ))),
        }
    }
}
