//! Record-type-specialized view over a [`RecordStore`]
//!
//! A `RecordView` is parameterized by record type and default TTL and
//! addresses records by a short label that is qualified into the zone:
//!
//! ```rust,ignore
//! let txt = RecordView::open(provider, "example.com", RecordType::Txt, AUTOMATIC_TTL).await?;
//! txt.upsert("spf0", "10.0.0.0/24", true).await?;   // spf0.example.com
//! let value = txt.fetch("spf0.example.com").await?; // already qualified
//! ```

use crate::error::Result;
use crate::traits::{CreateFields, DnsProvider, RecordFilter, RecordType, UpdateFields, Zone};
use crate::zone::RecordStore;
use std::sync::Arc;
use tracing::debug;

/// Label-addressed record operations for one record type
#[derive(Debug)]
pub struct RecordView {
    store: RecordStore,
    record_type: RecordType,
    default_ttl: u32,
}

impl RecordView {
    /// Wrap an existing store
    pub fn new(store: RecordStore, record_type: RecordType, default_ttl: u32) -> Self {
        Self {
            store,
            record_type,
            default_ttl,
        }
    }

    /// Resolve the zone owning `domain` and open a view on it
    pub async fn open(
        provider: Arc<dyn DnsProvider>,
        domain: &str,
        record_type: RecordType,
        default_ttl: u32,
    ) -> Result<Self> {
        let store = RecordStore::open(provider, domain).await?;
        Ok(Self::new(store, record_type, default_ttl))
    }

    /// The zone this view operates on
    pub fn zone(&self) -> &Zone {
        self.store.zone()
    }

    /// Record type managed by this view
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Qualify `label` into the zone
    ///
    /// A label that already is the zone apex or ends in `.<zone>` is
    /// returned unchanged, so qualifying twice is a no-op.
    pub fn qualify(&self, label: &str) -> String {
        let zone = self.zone().name.trim_end_matches('.');
        let label = label.trim_end_matches('.');
        let lower = label.to_ascii_lowercase();
        let zone_lower = zone.to_ascii_lowercase();

        if lower == zone_lower || lower.ends_with(&format!(".{}", zone_lower)) {
            label.to_string()
        } else {
            format!("{}.{}", label, zone)
        }
    }

    fn filter_for(&self, fqdn: &str) -> RecordFilter {
        RecordFilter::exact(fqdn, self.record_type.clone())
    }

    /// Update the record at `label`, or create it when `allow_create` is set
    ///
    /// An existing record keeps its proxy flag and TTL; only name, type and
    /// content are replaced. New records get the view's default TTL and no
    /// proxy flag.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))`: Record updated or created
    /// - `Ok(None)`: Record absent and creation not allowed
    pub async fn upsert(
        &self,
        label: &str,
        content: &str,
        allow_create: bool,
    ) -> Result<Option<String>> {
        let fqdn = self.qualify(label);

        if let Some(existing) = self.store.find_one(&self.filter_for(&fqdn)).await? {
            let fields = UpdateFields::new(&fqdn, self.record_type.clone(), content)
                .with_proxied(existing.proxied)
                .with_ttl(existing.ttl);
            return self.store.update(&existing.id, &fields).await.map(Some);
        }

        if allow_create {
            let fields = CreateFields::new(&fqdn, self.record_type.clone(), content)
                .with_ttl(self.default_ttl);
            return self.store.create(&fields).await.map(Some);
        }

        debug!(
            "{} record {} does not exist and creation is not allowed",
            self.record_type, fqdn
        );
        Ok(None)
    }

    /// Create a record at `label` without checking for an existing one
    pub async fn add(&self, label: &str, content: &str) -> Result<String> {
        let fields = CreateFields::new(self.qualify(label), self.record_type.clone(), content)
            .with_ttl(self.default_ttl);
        self.store.create(&fields).await
    }

    /// Content of the record at `label`, if present
    pub async fn fetch(&self, label: &str) -> Result<Option<String>> {
        let fqdn = self.qualify(label);
        Ok(self
            .store
            .single(&self.filter_for(&fqdn))
            .await?
            .map(|record| record.content))
    }

    /// Delete the record at `label`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))`: Record deleted
    /// - `Ok(None)`: Nothing to delete
    pub async fn remove(&self, label: &str) -> Result<Option<String>> {
        let fqdn = self.qualify(label);
        match self.store.find_one(&self.filter_for(&fqdn)).await? {
            Some(existing) => self.store.delete(&existing.id).await.map(Some),
            None => {
                debug!("{} record {} already absent", self.record_type, fqdn);
                Ok(None)
            }
        }
    }
}
