//! Stable fingerprint over a flattened address sequence
//!
//! The fingerprint is only ever compared for equality against the
//! fingerprint stored by a previous run for the same sending domain.
//! Order is significant: the crawler's output order is hashed as given.

use sha2::{Digest, Sha256};

/// Terminator written after every entry so that `[]` and `[""]`,
/// or `["ab"]` and `["a", "b"]`, never hash the same input.
const ENTRY_TERMINATOR: &[u8] = b"\n";

/// Compute the hex-encoded SHA-256 fingerprint of `addresses`.
pub fn fingerprint<S: AsRef<str>>(addresses: &[S]) -> String {
    let mut hasher = Sha256::new();
    for address in addresses {
        hasher.update(address.as_ref().as_bytes());
        hasher.update(ENTRY_TERMINATOR);
    }
    hex::encode(hasher.finalize())
}
