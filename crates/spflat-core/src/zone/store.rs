//! Record CRUD scoped to one resolved zone
//!
//! `RecordStore` is a thin layer over [`DnsProvider`]: it validates
//! payloads, pins every call to its zone, and enforces that a
//! `(name, type)` lookup yields at most one record. "Not found" is an
//! ordinary outcome (`None`); "more than one" is a consistency error.

use crate::error::{Error, Result};
use crate::traits::{
    CreateFields, DnsProvider, RecordFilter, RecordType, ResourceRecord, UpdateFields, Zone,
};
use crate::zone::ZoneDirectory;
use std::sync::Arc;
use tracing::debug;

/// The fields of a uniquely-matched record needed to update it in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    /// Provider record id
    pub id: String,
    /// Current proxy flag
    pub proxied: bool,
    /// Current TTL
    pub ttl: u32,
}

impl From<&ResourceRecord> for RecordHandle {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            id: record.id.clone(),
            proxied: record.proxied,
            ttl: record.ttl,
        }
    }
}

/// Record operations within one provider zone
pub struct RecordStore {
    provider: Arc<dyn DnsProvider>,
    zone: Zone,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("provider", &self.provider.provider_name())
            .field("zone", &self.zone)
            .finish()
    }
}

impl RecordStore {
    /// Create a store for an already-resolved zone
    pub fn new(provider: Arc<dyn DnsProvider>, zone: Zone) -> Self {
        Self { provider, zone }
    }

    /// Resolve the zone owning `fqdn` and open a store on it
    pub async fn open(provider: Arc<dyn DnsProvider>, fqdn: &str) -> Result<Self> {
        let zone = ZoneDirectory::new(provider.as_ref()).resolve(fqdn).await?;
        Ok(Self::new(provider, zone))
    }

    /// The zone this store operates on
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Create a record and return its id
    ///
    /// No existence check is performed.
    pub async fn create(&self, fields: &CreateFields) -> Result<String> {
        fields.validate()?;
        debug!(
            "Creating {} record {} in zone {}",
            fields.record_type, fields.name, self.zone.name
        );
        self.provider.create_record(&self.zone.id, fields).await
    }

    /// List records matching `filter`
    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<ResourceRecord>> {
        self.provider.list_records(&self.zone.id, filter).await
    }

    /// Fetch the single record matching `filter`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: Exactly one match
    /// - `Ok(None)`: No match
    /// - `Err(Error::MultipleRecordsFound)`: Two or more matches
    pub async fn single(&self, filter: &RecordFilter) -> Result<Option<ResourceRecord>> {
        let mut records = self.list(filter).await?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(Error::multiple_records(
                filter.name.clone().unwrap_or_default(),
                filter
                    .record_type
                    .as_ref()
                    .map(RecordType::to_string)
                    .unwrap_or_default(),
                count,
            )),
        }
    }

    /// Id, proxy flag and TTL of the single record matching `filter`
    pub async fn find_one(&self, filter: &RecordFilter) -> Result<Option<RecordHandle>> {
        Ok(self.single(filter).await?.as_ref().map(RecordHandle::from))
    }

    /// Replace a record by id and return its id
    pub async fn update(&self, record_id: &str, fields: &UpdateFields) -> Result<String> {
        fields.validate()?;
        debug!(
            "Updating {} record {} ({}) in zone {}",
            fields.record_type, fields.name, record_id, self.zone.name
        );
        self.provider
            .update_record(&self.zone.id, record_id, fields)
            .await
    }

    /// Delete a record by id and return the deleted id
    pub async fn delete(&self, record_id: &str) -> Result<String> {
        debug!("Deleting record {} in zone {}", record_id, self.zone.name);
        self.provider.delete_record(&self.zone.id, record_id).await
    }
}
