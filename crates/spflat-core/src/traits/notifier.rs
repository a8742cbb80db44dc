// # Notifier Trait
//
// Tells operators that the flattening of a sending domain changed.
//
// ## Implementations
//
// - SMTP: `spflat-notify-smtp` crate

use async_trait::async_trait;

/// Placeholder replaced by the sending domain in subject templates
pub const ZONE_PLACEHOLDER: &str = "{zone}";

/// Details of one detected change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice<'a> {
    /// Sending domain whose flattening changed
    pub domain: &'a str,
    /// Addresses stored by the previous run
    pub previous: &'a [String],
    /// Addresses computed by this run
    pub current: &'a [String],
    /// Subject template containing `{zone}`
    pub subject_template: &'a str,
}

impl ChangeNotice<'_> {
    /// Subject line with `{zone}` replaced by the domain
    pub fn subject(&self) -> String {
        self.subject_template.replace(ZONE_PLACEHOLDER, self.domain)
    }

    /// Entries present before but not any more
    pub fn removed(&self) -> Vec<&str> {
        self.previous
            .iter()
            .filter(|addr| !self.current.contains(addr))
            .map(String::as_str)
            .collect()
    }

    /// Entries new in this run
    pub fn added(&self) -> Vec<&str> {
        self.current
            .iter()
            .filter(|addr| !self.previous.contains(addr))
            .map(String::as_str)
            .collect()
    }

    /// Entries present in both runs
    pub fn kept(&self) -> Vec<&str> {
        self.current
            .iter()
            .filter(|addr| self.previous.contains(addr))
            .map(String::as_str)
            .collect()
    }
}

/// Trait for change notification implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one change notice
    async fn notify(&self, notice: &ChangeNotice<'_>) -> Result<(), crate::Error>;
}
