// # Crawler Trait
//
// Resolves the SPF mechanisms configured for a sending domain into the
// ordered list of network blocks that should be published.
//
// ## Implementations
//
// - DNS-backed: `spflat-crawler` crate
//
// The output order is meaningful: it is hashed as given by
// [`crate::fingerprint`] and each entry is published positionally as
// `spf<index>.<domain>`.

use async_trait::async_trait;

/// Trait for SPF crawler implementations
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Flatten `mechanisms` for `domain`
    ///
    /// # Parameters
    ///
    /// - `domain`: The sending domain being flattened
    /// - `mechanisms`: SPF mechanism strings (e.g., `"include:_spf.example.net"`)
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Ordered network strings (e.g., `"10.0.0.0/24"`)
    /// - `Err(Error)`: If resolution fails
    async fn flatten(&self, domain: &str, mechanisms: &[String])
    -> Result<Vec<String>, crate::Error>;
}
