//! Zone resolution and record operations within one zone
//!
//! - [`ZoneDirectory`]: finds the most specific provider zone owning a name
//! - [`RecordStore`]: record CRUD scoped to one resolved zone

pub mod directory;
pub mod store;

pub use directory::ZoneDirectory;
pub use store::{RecordHandle, RecordStore};
