//! Core traits for the reconciliation system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Zone listing and record CRUD via provider APIs
//! - [`Crawler`]: Flatten SPF mechanisms into network blocks
//! - [`Notifier`]: Report a changed flattening to operators

pub mod crawler;
pub mod dns_provider;
pub mod notifier;

pub use crawler::Crawler;
pub use dns_provider::{
    CreateFields, DnsProvider, MatchMode, RecordFilter, RecordType, ResourceRecord, UpdateFields,
    Zone,
};
pub use notifier::{ChangeNotice, Notifier};
