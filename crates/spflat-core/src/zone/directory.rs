//! Zone discovery by longest-suffix walk
//!
//! Registrations are often delegated below the registrable domain
//! (`mail.example.com` may be a zone of its own), so the walk starts at the
//! full name and strips one label at a time until the provider reports
//! exactly one zone for the remaining suffix.

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, Zone};
use tracing::debug;

/// Resolves domain names to provider zones
pub struct ZoneDirectory<'a> {
    provider: &'a dyn DnsProvider,
}

impl<'a> ZoneDirectory<'a> {
    /// Create a directory backed by `provider`
    pub fn new(provider: &'a dyn DnsProvider) -> Self {
        Self { provider }
    }

    /// Find the zone owning `fqdn`
    ///
    /// Tries `a.b.c`, then `b.c`, then `c`. A suffix for which the provider
    /// returns zero or several zones is skipped.
    ///
    /// # Returns
    ///
    /// - `Ok(Zone)`: The most specific owning zone
    /// - `Err(Error::ZoneNotFound)`: No suffix matched exactly one zone
    /// - `Err(Error)`: Provider failure, propagated as-is
    pub async fn resolve(&self, fqdn: &str) -> Result<Zone> {
        let labels: Vec<&str> = fqdn
            .trim_end_matches('.')
            .split('.')
            .filter(|label| !label.is_empty())
            .collect();

        for start in 0..labels.len() {
            let candidate = labels[start..].join(".");
            let mut zones = self.provider.list_zones(&candidate).await?;

            if zones.len() == 1 {
                let zone = zones.remove(0);
                debug!("Resolved {} to zone {} ({})", fqdn, zone.name, zone.id);
                return Ok(zone);
            }

            debug!(
                "{} zone(s) named {}, trying parent suffix",
                zones.len(),
                candidate
            );
        }

        Err(Error::zone_not_found(fqdn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{CreateFields, RecordFilter, ResourceRecord, UpdateFields};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Provider that only knows zones and records every name it is asked for
    struct ZonesOnly {
        zones: HashMap<String, Vec<Zone>>,
        queried: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ZonesOnly {
        fn new(zones: &[(&str, usize)]) -> Self {
            let zones = zones
                .iter()
                .map(|(name, count)| {
                    let list = (0..*count)
                        .map(|i| Zone {
                            id: format!("{}-{}", name, i),
                            name: name.to_string(),
                        })
                        .collect();
                    (name.to_string(), list)
                })
                .collect();
            Self {
                zones,
                queried: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DnsProvider for ZonesOnly {
        async fn list_zones(&self, name: &str) -> Result<Vec<Zone>> {
            self.queried.lock().unwrap().push(name.to_string());
            if self.fail {
                return Err(Error::provider("test", "connection reset"));
            }
            Ok(self.zones.get(name).cloned().unwrap_or_default())
        }

        async fn list_records(&self, _: &str, _: &RecordFilter) -> Result<Vec<ResourceRecord>> {
            unreachable!("zone lookups never list records")
        }

        async fn create_record(&self, _: &str, _: &CreateFields) -> Result<String> {
            unreachable!("zone lookups never create records")
        }

        async fn update_record(&self, _: &str, _: &str, _: &UpdateFields) -> Result<String> {
            unreachable!("zone lookups never update records")
        }

        async fn delete_record(&self, _: &str, _: &str) -> Result<String> {
            unreachable!("zone lookups never delete records")
        }

        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_walk_tries_each_suffix_in_order() {
        let provider = ZonesOnly::new(&[]);
        let result = ZoneDirectory::new(&provider).resolve("a.b.c").await;

        assert!(matches!(result, Err(Error::ZoneNotFound(ref name)) if name == "a.b.c"));
        assert_eq!(provider.queried(), vec!["a.b.c", "b.c", "c"]);
    }

    #[tokio::test]
    async fn test_walk_stops_at_first_single_match() {
        let provider = ZonesOnly::new(&[("example.com", 1), ("com", 1)]);
        let zone = ZoneDirectory::new(&provider)
            .resolve("spf0.example.com")
            .await
            .unwrap();

        assert_eq!(zone.name, "example.com");
        assert_eq!(provider.queried(), vec!["spf0.example.com", "example.com"]);
    }

    #[tokio::test]
    async fn test_delegated_subzone_wins_over_parent() {
        let provider = ZonesOnly::new(&[("mail.example.com", 1), ("example.com", 1)]);
        let zone = ZoneDirectory::new(&provider)
            .resolve("spf1.mail.example.com")
            .await
            .unwrap();

        assert_eq!(zone.name, "mail.example.com");
    }

    #[tokio::test]
    async fn test_ambiguous_suffix_is_skipped() {
        let provider = ZonesOnly::new(&[("example.com", 2), ("com", 1)]);
        let zone = ZoneDirectory::new(&provider)
            .resolve("example.com")
            .await
            .unwrap();

        assert_eq!(zone.name, "com");
    }

    #[tokio::test]
    async fn test_trailing_dot_is_ignored() {
        let provider = ZonesOnly::new(&[("example.com", 1)]);
        let zone = ZoneDirectory::new(&provider)
            .resolve("example.com.")
            .await
            .unwrap();

        assert_eq!(zone.id, "example.com-0");
        assert_eq!(provider.queried(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_empty_name_is_not_found_without_calls() {
        let provider = ZonesOnly::new(&[]);
        let result = ZoneDirectory::new(&provider).resolve("").await;

        assert!(matches!(result, Err(Error::ZoneNotFound(_))));
        assert!(provider.queried().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let mut provider = ZonesOnly::new(&[("example.com", 1)]);
        provider.fail = true;
        let result = ZoneDirectory::new(&provider).resolve("a.example.com").await;

        assert!(matches!(result, Err(Error::Provider { .. })));
        assert_eq!(provider.queried(), vec!["a.example.com"]);
    }
}
