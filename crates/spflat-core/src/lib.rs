// # spflat-core
//
// Core library for keeping flattened SPF records published in DNS.
//
// ## Architecture Overview
//
// - **fingerprint**: Stable hash over a flattened address sequence
// - **Crawler**: Trait for resolving SPF mechanisms into network blocks
// - **DnsProvider**: Trait for zone listing and record CRUD via provider APIs
// - **Notifier**: Trait for telling operators a flattening has changed
// - **ZoneDirectory / RecordStore / RecordView**: Zone resolution and
//   idempotent record operations on top of a `DnsProvider`
// - **ReconciliationDriver**: crawl → fingerprint → compare → notify/write
// - **StateFile**: Persisted results of the previous run
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Provider, crawler and notifier live in their own crates
// 3. **Library-First**: The CLI is a thin wiring layer over this crate
// 4. **Explicit Inputs**: Credentials and settings are resolved once at
//    startup and passed down; nothing here reads the environment

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod records;
pub mod state;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{EmailSettings, SendingDomain, Settings};
pub use credentials::{CredentialSources, Credentials, EnvSnapshot};
pub use engine::{ChangeStatus, DomainOutcome, ReconciliationDriver, RunPolicy, RunReport};
pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use records::RecordView;
pub use state::{FlattenedResult, PersistedState, StateFile};
pub use traits::{ChangeNotice, Crawler, DnsProvider, Notifier};
pub use zone::{RecordStore, ZoneDirectory};
