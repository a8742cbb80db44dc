//! Test doubles shared by the contract tests
//!
//! The doubles record every call so tests can assert on what the core
//! asked of its collaborators, not only on what it returned.

#![allow(dead_code)]

use spflat_core::error::{Error, Result};
use spflat_core::traits::{
    ChangeNotice, CreateFields, Crawler, DnsProvider, Notifier, RecordFilter, RecordType,
    ResourceRecord, UpdateFields, Zone,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A provider call, as seen by the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListZones(String),
    ListRecords(String),
    Create(CreateFields),
    Update(String, UpdateFields),
    Delete(String),
}

struct StoredRecord {
    zone_id: String,
    record: ResourceRecord,
}

/// An in-memory DnsProvider holding zones and records
pub struct InMemoryProvider {
    zones: Vec<Zone>,
    records: Mutex<Vec<StoredRecord>>,
    calls: Mutex<Vec<ProviderCall>>,
    failing_names: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl InMemoryProvider {
    /// Provider serving the given `(id, name)` zones
    pub fn new(zones: &[(&str, &str)]) -> Self {
        Self {
            zones: zones
                .iter()
                .map(|(id, name)| Zone {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            records: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failing_names: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Seed a record; returns its id
    pub fn seed(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> String {
        let id = self.allocate_id();
        self.records.lock().unwrap().push(StoredRecord {
            zone_id: zone_id.to_string(),
            record: ResourceRecord {
                id: id.clone(),
                name: name.to_string(),
                record_type,
                content: content.to_string(),
                ttl,
                proxied,
            },
        });
        id
    }

    /// Make create/update calls for `name` fail
    pub fn fail_writes_for(&self, name: &str) {
        self.failing_names.lock().unwrap().push(name.to_string());
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of create, update and delete calls
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    ProviderCall::Create(_) | ProviderCall::Update(..) | ProviderCall::Delete(_)
                )
            })
            .count()
    }

    /// Number of create calls
    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Create(_)))
            .count()
    }

    /// The stored record named `name` (first match)
    pub fn record(&self, name: &str) -> Option<ResourceRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|stored| stored.record.name.eq_ignore_ascii_case(name))
            .map(|stored| stored.record.clone())
    }

    /// Number of stored records
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn allocate_id(&self) -> String {
        format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record_call(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_writable(&self, name: &str) -> Result<()> {
        if self
            .failing_names
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
        {
            return Err(Error::provider("memory", format!("write to {} rejected", name)));
        }
        Ok(())
    }
}

fn matches_filter(record: &ResourceRecord, filter: &RecordFilter) -> bool {
    let name_ok = filter
        .name
        .as_deref()
        .is_none_or(|name| record.name.eq_ignore_ascii_case(name));
    let type_ok = filter
        .record_type
        .as_ref()
        .is_none_or(|t| &record.record_type == t);
    name_ok && type_ok
}

#[async_trait::async_trait]
impl DnsProvider for InMemoryProvider {
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>> {
        self.record_call(ProviderCall::ListZones(name.to_string()));
        Ok(self
            .zones
            .iter()
            .filter(|zone| zone.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<ResourceRecord>> {
        self.record_call(ProviderCall::ListRecords(zone_id.to_string()));
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|stored| stored.zone_id == zone_id && matches_filter(&stored.record, filter))
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, fields: &CreateFields) -> Result<String> {
        self.record_call(ProviderCall::Create(fields.clone()));
        self.check_writable(&fields.name)?;
        Ok(self.seed(
            zone_id,
            &fields.name,
            fields.record_type.clone(),
            &fields.content,
            fields.ttl.unwrap_or(1),
            fields.proxied.unwrap_or(false),
        ))
    }

    async fn update_record(
        &self,
        _zone_id: &str,
        record_id: &str,
        fields: &UpdateFields,
    ) -> Result<String> {
        self.record_call(ProviderCall::Update(record_id.to_string(), fields.clone()));
        self.check_writable(&fields.name)?;

        let mut records = self.records.lock().unwrap();
        let stored = records
            .iter_mut()
            .find(|stored| stored.record.id == record_id)
            .ok_or_else(|| Error::provider("memory", format!("no record {}", record_id)))?;
        stored.record.name = fields.name.clone();
        stored.record.record_type = fields.record_type.clone();
        stored.record.content = fields.content.clone();
        if let Some(ttl) = fields.ttl {
            stored.record.ttl = ttl;
        }
        if let Some(proxied) = fields.proxied {
            stored.record.proxied = proxied;
        }
        Ok(record_id.to_string())
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> Result<String> {
        self.record_call(ProviderCall::Delete(record_id.to_string()));
        self.records
            .lock()
            .unwrap()
            .retain(|stored| stored.record.id != record_id);
        Ok(record_id.to_string())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// A Crawler returning canned results per domain
pub struct ScriptedCrawler {
    results: HashMap<String, std::result::Result<Vec<String>, String>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedCrawler {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return `records` when `domain` is flattened
    pub fn returning(mut self, domain: &str, records: &[&str]) -> Self {
        self.results.insert(
            domain.to_string(),
            Ok(records.iter().map(|r| r.to_string()).collect()),
        );
        self
    }

    /// Fail with `message` when `domain` is flattened
    pub fn failing(mut self, domain: &str, message: &str) -> Self {
        self.results
            .insert(domain.to_string(), Err(message.to_string()));
        self
    }

    /// Shared call counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

#[async_trait::async_trait]
impl Crawler for ScriptedCrawler {
    async fn flatten(&self, domain: &str, _mechanisms: &[String]) -> Result<Vec<String>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.results.get(domain) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(message)) => Err(Error::crawler(message.clone())),
            None => Err(Error::crawler(format!("no script for {}", domain))),
        }
    }
}

/// What a notifier was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
    pub domain: String,
    pub subject: String,
    pub previous: Vec<String>,
    pub current: Vec<String>,
}

/// Log shared between a test and its notifier
#[derive(Clone, Default)]
pub struct NoticeLog(Arc<Mutex<Vec<SentNotice>>>);

impl NoticeLog {
    pub fn entries(&self) -> Vec<SentNotice> {
        self.0.lock().unwrap().clone()
    }
}

/// A Notifier that records notices instead of sending them
pub struct RecordingNotifier {
    log: NoticeLog,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new(log: &NoticeLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    /// Records the attempt, then fails
    pub fn failing(log: &NoticeLog) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &ChangeNotice<'_>) -> Result<()> {
        self.log.0.lock().unwrap().push(SentNotice {
            domain: notice.domain.to_string(),
            subject: notice.subject(),
            previous: notice.previous.to_vec(),
            current: notice.current.to_vec(),
        });
        if self.fail {
            return Err(Error::notifier("mail server unavailable"));
        }
        Ok(())
    }
}
