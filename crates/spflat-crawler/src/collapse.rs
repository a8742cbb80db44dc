//! Reduction of flattened entries to a minimal covering set
//!
//! Entries covered by another entry are dropped and same-prefix sibling
//! networks are merged into their parent, until nothing changes. Survivors
//! keep the position of their first occurrence. Entries that do not parse as
//! a network are kept verbatim.

use ipnetwork::IpNetwork;

#[derive(Debug)]
struct Entry {
    text: String,
    network: Option<IpNetwork>,
}

/// Collapse `entries` into the smallest equivalent list of networks
pub fn collapse(entries: Vec<String>) -> Vec<String> {
    let mut entries = entries
        .into_iter()
        .map(|text| {
            let network = text.parse::<IpNetwork>().ok();
            Entry { text, network }
        })
        .collect::<Vec<_>>();

    loop {
        let before = entries.len();
        drop_covered(&mut entries);
        merge_siblings(&mut entries);
        if entries.len() == before {
            break;
        }
    }

    entries.into_iter().map(|entry| entry.text).collect()
}

fn covers(outer: IpNetwork, inner: IpNetwork) -> bool {
    outer.is_ipv4() == inner.is_ipv4()
        && outer.prefix() <= inner.prefix()
        && outer.contains(inner.network())
}

/// Drop entries inside a wider entry, or equal to an earlier one
fn drop_covered(entries: &mut Vec<Entry>) {
    let networks = entries.iter().map(|entry| entry.network).collect::<Vec<_>>();
    let mut index = 0;
    entries.retain(|entry| {
        let current = index;
        index += 1;
        let Some(inner) = entry.network else {
            return true;
        };
        !networks.iter().enumerate().any(|(other, outer)| {
            other != current
                && outer.is_some_and(|outer| {
                    covers(outer, inner) && (outer.prefix() < inner.prefix() || other < current)
                })
        })
    });
}

/// Merge the first sibling pair found, in place of the earlier one
fn merge_siblings(entries: &mut Vec<Entry>) {
    for first in 0..entries.len() {
        let Some(a) = entries[first].network else {
            continue;
        };
        for second in (first + 1)..entries.len() {
            let Some(b) = entries[second].network else {
                continue;
            };
            if let Some(parent) = parent_of(a, b) {
                entries[first] = Entry {
                    text: parent.to_string(),
                    network: Some(parent),
                };
                entries.remove(second);
                return;
            }
        }
    }
}

/// The parent network when `a` and `b` are its two halves
fn parent_of(a: IpNetwork, b: IpNetwork) -> Option<IpNetwork> {
    if a.is_ipv4() != b.is_ipv4() || a.prefix() != b.prefix() || a.prefix() == 0 {
        return None;
    }
    let prefix = a.prefix() - 1;
    let wide = IpNetwork::new(a.network(), prefix).ok()?;
    let parent = IpNetwork::new(wide.network(), prefix).ok()?;
    (a.network() != b.network() && parent.contains(b.network())).then_some(parent)
}
