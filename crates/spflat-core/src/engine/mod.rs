//! Reconciliation driver
//!
//! The driver is responsible for, per sending domain:
//! - Flattening the configured SPF mechanisms via the `Crawler`
//! - Fingerprinting the result and comparing it to the previous run
//! - Notifying operators of a change via the `Notifier`
//! - Publishing the flattened entries as TXT records via `RecordView`
//! - Assembling the state to persist for the next run
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐        ┌──────────────────────┐        ┌─────────────┐
//! │   Crawler   │──────▶ │ ReconciliationDriver │──────▶ │  Notifier   │
//! └─────────────┘        └──────────────────────┘        └─────────────┘
//!                                   │
//!                                   ▼
//!                   ┌──────────────────────────────┐
//!                   │ RecordView (TXT)             │
//!                   │  └ RecordStore               │
//!                   │     └ ZoneDirectory          │
//!                   │        └ DnsProvider         │
//!                   └──────────────────────────────┘
//! ```
//!
//! ## Decision Flow
//!
//! 1. Crawl and fingerprint
//! 2. Prior result exists: mismatch is "changed" (warn, maybe notify),
//!    match is "unchanged" (info only)
//! 3. Write when `(changed && update) || force_update`
//! 4. Persist the fresh state when `update || force_update` or there was
//!    no prior state at all; otherwise keep the prior state verbatim

use crate::config::{DEFAULT_ALERT_SUBJECT, DEFAULT_UPDATE_SUBJECT, EmailSettings, SendingDomain};
use crate::error::{Error, Result};
use crate::records::RecordView;
use crate::state::{FlattenedResult, PersistedState};
use crate::traits::dns_provider::AUTOMATIC_TTL;
use crate::traits::{ChangeNotice, Crawler, DnsProvider, Notifier, RecordType};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Prefix of the positional record names (`spf0.<domain>`, `spf1.<domain>`, ...)
const RECORD_PREFIX: &str = "spf";

/// What the caller allows this run to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunPolicy {
    /// Apply detected changes to DNS
    pub update: bool,
    /// Apply the flattening to DNS whether or not it changed
    pub force_update: bool,
    /// Send change notifications
    pub send_email: bool,
}

impl RunPolicy {
    /// Whether this run may write DNS at all
    pub fn writes_enabled(&self) -> bool {
        self.update || self.force_update
    }
}

/// Comparison of a fresh result against the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No previous result for this domain
    New,
    /// Fingerprint differs from the previous run
    Changed,
    /// Fingerprint matches the previous run
    Unchanged,
    /// The crawler failed; nothing was compared
    CrawlFailed,
}

/// What happened to one sending domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOutcome {
    /// The sending domain
    pub domain: String,
    /// Comparison result
    pub status: ChangeStatus,
    /// Whether a notification was delivered
    pub notified: bool,
    /// Records successfully upserted
    pub written: usize,
    /// Records whose upsert failed
    pub failed: usize,
    /// Why the write pass could not start (zone lookup failure)
    pub write_error: Option<String>,
}

impl DomainOutcome {
    fn new(domain: &str, status: ChangeStatus) -> Self {
        Self {
            domain: domain.to_string(),
            status,
            notified: false,
            written: 0,
            failed: 0,
            write_error: None,
        }
    }
}

/// Result of a full pass over all sending domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// State to persist for the next run
    pub state: PersistedState,
    /// Per-domain outcomes, in processing order
    pub outcomes: Vec<DomainOutcome>,
}

impl RunReport {
    /// Domains whose flattening changed since the previous run
    pub fn changed_domains(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ChangeStatus::Changed)
            .map(|o| o.domain.as_str())
            .collect()
    }

    /// Whether any crawl, zone lookup or record write failed
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| {
            o.status == ChangeStatus::CrawlFailed || o.failed > 0 || o.write_error.is_some()
        })
    }
}

/// Orchestrates crawl → fingerprint → compare → notify/write per domain
///
/// ## Threading
///
/// Domains are processed one after another and every external call is
/// awaited before the next one starts.
pub struct ReconciliationDriver {
    /// Flattens SPF mechanisms
    crawler: Box<dyn Crawler>,

    /// Publishes records (detection only when absent)
    provider: Option<Arc<dyn DnsProvider>>,

    /// Reports changes (notifications disabled when absent)
    notifier: Option<Box<dyn Notifier>>,

    /// Flags for this run
    policy: RunPolicy,

    /// Subject for changes that are not applied
    alert_subject: String,

    /// Subject for changes that are applied
    update_subject: String,
}

impl ReconciliationDriver {
    /// Create a driver
    ///
    /// # Parameters
    ///
    /// - `crawler`: Crawler implementation
    /// - `provider`: DNS provider implementation; only needed when the
    ///   policy enables writes
    /// - `notifier`: Notifier implementation, if notifications are possible
    /// - `policy`: Update/force/email flags
    pub fn new(
        crawler: Box<dyn Crawler>,
        provider: Option<Arc<dyn DnsProvider>>,
        notifier: Option<Box<dyn Notifier>>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            crawler,
            provider,
            notifier,
            policy,
            alert_subject: DEFAULT_ALERT_SUBJECT.to_string(),
            update_subject: DEFAULT_UPDATE_SUBJECT.to_string(),
        }
    }

    /// Use the subject templates from the email settings
    pub fn with_subjects(mut self, email: &EmailSettings) -> Self {
        self.alert_subject = email.subject.clone();
        self.update_subject = email.update_subject.clone();
        self
    }

    /// Reconcile every sending domain, in order
    ///
    /// # Parameters
    ///
    /// - `domains`: Sending domains in configuration order
    /// - `previous`: State loaded from the previous run
    ///
    /// # Returns
    ///
    /// The state to persist and the per-domain outcomes. Failures are
    /// reported in the outcomes; they never abort the pass.
    pub async fn run(&self, domains: &[SendingDomain], previous: PersistedState) -> RunReport {
        let mut current = PersistedState::new();
        let mut outcomes = Vec::with_capacity(domains.len());

        for entry in domains {
            let (result, outcome) = self.reconcile_domain(entry, previous.get(&entry.domain)).await;
            if let Some(result) = result {
                current.insert(entry.domain.clone(), result);
            }
            outcomes.push(outcome);
        }

        let state = if self.policy.writes_enabled() || previous.is_empty() {
            current
        } else {
            debug!("Detection-only run, keeping the previous state");
            previous
        };

        RunReport { state, outcomes }
    }

    /// Reconcile one sending domain
    ///
    /// Returns the result to record for the domain in the fresh state (if
    /// any) and the outcome.
    async fn reconcile_domain(
        &self,
        entry: &SendingDomain,
        previous: Option<&FlattenedResult>,
    ) -> (Option<FlattenedResult>, DomainOutcome) {
        let domain = entry.domain.as_str();

        let records = match self.crawler.flatten(domain, &entry.mechanisms).await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to flatten SPF for sender domain {}: {}", domain, e);
                return (
                    previous.cloned(),
                    DomainOutcome::new(domain, ChangeStatus::CrawlFailed),
                );
            }
        };

        let result = FlattenedResult::new(records);

        let status = match previous {
            None => {
                info!("No previous SPF result for sender domain {}", domain);
                ChangeStatus::New
            }
            Some(prev) if prev.same_as(&result) => {
                info!("NO SPF changes detected for sender domain {}", domain);
                ChangeStatus::Unchanged
            }
            Some(_) => {
                warn!("SPF changes detected for sender domain {}", domain);
                ChangeStatus::Changed
            }
        };

        let mut outcome = DomainOutcome::new(domain, status);

        if status == ChangeStatus::Changed
            && let Some(prev) = previous
        {
            outcome.notified = self.notify_change(domain, prev, &result).await;
        }

        let write =
            (status == ChangeStatus::Changed && self.policy.update) || self.policy.force_update;
        if !write {
            return (Some(result), outcome);
        }

        match self.write_records(domain, &result.records).await {
            Ok((written, failed)) => {
                outcome.written = written;
                outcome.failed = failed;
                (Some(result), outcome)
            }
            Err(e) => {
                error!("Cannot update SPF records for sender domain {}: {}", domain, e);
                outcome.write_error = Some(e.to_string());
                // Keep the old baseline so the change is picked up again next run
                (previous.cloned().or(Some(result)), outcome)
            }
        }
    }

    /// Send a change notice if notifications are enabled
    ///
    /// Returns whether a notice was delivered.
    async fn notify_change(
        &self,
        domain: &str,
        previous: &FlattenedResult,
        current: &FlattenedResult,
    ) -> bool {
        if !self.policy.send_email {
            return false;
        }
        let Some(notifier) = self.notifier.as_ref() else {
            debug!("No notifier configured, skipping notice for {}", domain);
            return false;
        };

        let subject_template = if self.policy.writes_enabled() {
            &self.update_subject
        } else {
            &self.alert_subject
        };

        let notice = ChangeNotice {
            domain,
            previous: &previous.records,
            current: &current.records,
            subject_template,
        };

        info!("Sending mismatch details email for sender domain {}", domain);
        match notifier.notify(&notice).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send change notice for {}: {}", domain, e);
                false
            }
        }
    }

    /// Upsert `spf<i>.<domain>` TXT records for every flattened entry
    ///
    /// Each record is written independently; a failed record is logged and
    /// counted but does not stop the others.
    ///
    /// # Returns
    ///
    /// - `Ok((written, failed))`: Per-record tally
    /// - `Err(Error)`: No provider, or the zone for `domain` could not be
    ///   resolved
    async fn write_records(&self, domain: &str, records: &[String]) -> Result<(usize, usize)> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::config("No DNS provider configured, records cannot be written"))?;
        let view = RecordView::open(
            Arc::clone(provider),
            domain,
            RecordType::Txt,
            AUTOMATIC_TTL,
        )
        .await?;

        info!(
            "Updating {} SPF record(s) for sender domain {}",
            records.len(),
            domain
        );

        let mut written = 0;
        let mut failed = 0;

        for (index, content) in records.iter().enumerate() {
            let name = format!("{}{}.{}", RECORD_PREFIX, index, domain);
            match view.upsert(&name, content, true).await {
                Ok(Some(id)) => {
                    info!("Updated {} TXT record ({})", name, id);
                    written += 1;
                }
                Ok(None) => {
                    warn!("Update of {} TXT record failed: record not written", name);
                    failed += 1;
                }
                Err(e) => {
                    warn!("Update of {} TXT record failed: {}", name, e);
                    failed += 1;
                }
            }
        }

        Ok((written, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_writes_enabled() {
        assert!(!RunPolicy::default().writes_enabled());
        assert!(
            RunPolicy {
                update: true,
                ..Default::default()
            }
            .writes_enabled()
        );
        assert!(
            RunPolicy {
                force_update: true,
                ..Default::default()
            }
            .writes_enabled()
        );
    }

    #[test]
    fn test_report_helpers() {
        let mut changed = DomainOutcome::new("a.example", ChangeStatus::Changed);
        changed.failed = 1;
        let report = RunReport {
            state: PersistedState::new(),
            outcomes: vec![
                changed,
                DomainOutcome::new("b.example", ChangeStatus::Unchanged),
            ],
        };
        assert_eq!(report.changed_domains(), vec!["a.example"]);
        assert!(report.has_failures());
    }
}
