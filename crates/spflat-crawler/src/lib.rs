// # SPF Crawler
//
// DNS-backed implementation of the `Crawler` trait.
//
// ## Flattening Rules
//
// - `ip4:` / `ip6:`: network string kept verbatim
// - `include:<d>` / `redirect=<d>`: the `v=spf1` TXT record of `<d>` is
//   fetched and its terms expanded in place
// - `a` / `mx`: resolved to addresses; a CIDR suffix turns each address
//   into its enclosing network
// - `all`, `ptr`, `exists:`, `exp=` and non-pass qualifiers contribute
//   nothing
//
// Output keeps first-seen order with duplicates dropped, then is collapsed:
// networks inside a wider entry are dropped and sibling networks merged.
// Addresses from a single `a`/`mx` lookup are sorted so round-robin answers
// do not change the result between runs.
//
// ## Limits
//
// - Include depth above 10 is an error
// - An include chain that revisits a domain is an error

pub mod collapse;
pub mod lookup;
pub mod term;

pub use collapse::collapse;
pub use lookup::{HickoryLookup, SpfLookup};
pub use term::{DualCidr, Term, parse_term};

use async_trait::async_trait;
use spflat_core::traits::Crawler;
use spflat_core::{Error, Result};
use std::collections::HashSet;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::pin::Pin;
use tracing::debug;

/// Deepest allowed include/redirect nesting
pub const MAX_INCLUDE_DEPTH: usize = 10;

const SPF_VERSION: &str = "v=spf1";

/// Flattens SPF mechanisms by walking DNS
#[derive(Debug)]
pub struct DnsCrawler<L = HickoryLookup> {
    lookup: L,
}

impl DnsCrawler<HickoryLookup> {
    /// Crawler using the system resolver configuration
    pub fn system() -> Result<Self> {
        Ok(Self::new(HickoryLookup::system()?))
    }

    /// Crawler querying the given nameservers
    pub fn with_nameservers(nameservers: &[IpAddr]) -> Self {
        Self::new(HickoryLookup::with_nameservers(nameservers))
    }
}

impl<L: SpfLookup> DnsCrawler<L> {
    /// Crawler over an arbitrary lookup backend
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// The single `v=spf1` record published at `domain`
    async fn spf_record(&self, domain: &str) -> Result<Vec<String>> {
        let mut records = self
            .lookup
            .txt(domain)
            .await?
            .into_iter()
            .filter(|txt| is_spf_record(txt))
            .collect::<Vec<_>>();

        match records.len() {
            0 => Err(Error::crawler(format!("No SPF record found for {}", domain))),
            1 => {
                let record = records.remove(0);
                Ok(record.split_whitespace().skip(1).map(String::from).collect())
            }
            n => Err(Error::crawler(format!(
                "{} SPF records found for {}",
                n, domain
            ))),
        }
    }

    /// Expand `terms` evaluated in the context of `domain`
    ///
    /// `chain` holds the include path from the sending domain down to
    /// `domain` and is used for loop detection.
    fn expand<'a>(
        &'a self,
        domain: &'a str,
        terms: &'a [String],
        chain: &'a mut Vec<String>,
        out: &'a mut Collector,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for raw in terms {
                match parse_term(raw)? {
                    Term::Ip4(network) | Term::Ip6(network) => out.push(network),
                    Term::Include(target) | Term::Redirect(target) => {
                        self.descend(&target, chain, out).await?;
                    }
                    Term::A { domain: host, cidr } => {
                        let host = host.as_deref().unwrap_or(domain);
                        self.push_host(host, cidr, out).await?;
                    }
                    Term::Mx { domain: host, cidr } => {
                        let host = host.as_deref().unwrap_or(domain);
                        let mut exchanges = self.lookup.mx(host).await?;
                        exchanges.sort();
                        for (_, exchange) in exchanges {
                            self.push_host(&exchange, cidr, out).await?;
                        }
                    }
                    Term::Ignored => {}
                }
            }
            Ok(())
        })
    }

    /// Fetch and expand the SPF record of an included domain
    async fn descend(
        &self,
        target: &str,
        chain: &mut Vec<String>,
        out: &mut Collector,
    ) -> Result<()> {
        let key = target.to_ascii_lowercase();
        if chain.contains(&key) {
            return Err(Error::crawler(format!(
                "SPF include loop: {} -> {}",
                chain.join(" -> "),
                target
            )));
        }
        // chain[0] is the sending domain itself
        if chain.len() > MAX_INCLUDE_DEPTH {
            return Err(Error::crawler(format!(
                "SPF include depth exceeds {} at {}",
                MAX_INCLUDE_DEPTH, target
            )));
        }

        debug!("Expanding SPF record of {}", target);
        let terms = self.spf_record(target).await?;

        chain.push(key);
        let result = self.expand(target, &terms, chain, out).await;
        chain.pop();
        result
    }

    /// Resolve `host` to addresses and record them
    async fn push_host(&self, host: &str, cidr: DualCidr, out: &mut Collector) -> Result<()> {
        let mut v4 = self.lookup.ipv4(host).await?;
        v4.sort();
        for addr in v4 {
            out.push(format_v4(addr, cidr.v4));
        }

        let mut v6 = self.lookup.ipv6(host).await?;
        v6.sort();
        for addr in v6 {
            out.push(format_v6(addr, cidr.v6));
        }
        Ok(())
    }
}

#[async_trait]
impl<L: SpfLookup> Crawler for DnsCrawler<L> {
    async fn flatten(&self, domain: &str, mechanisms: &[String]) -> Result<Vec<String>> {
        let mut chain = vec![domain.to_ascii_lowercase()];
        let mut out = Collector::default();
        self.expand(domain, mechanisms, &mut chain, &mut out).await?;
        let entries = collapse(out.entries);
        debug!("Flattened {} into {} entries", domain, entries.len());
        Ok(entries)
    }
}

fn is_spf_record(txt: &str) -> bool {
    let txt = txt.trim_start();
    txt.get(..SPF_VERSION.len())
        .is_some_and(|version| version.eq_ignore_ascii_case(SPF_VERSION))
        && txt[SPF_VERSION.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ')
}

fn format_v4(addr: Ipv4Addr, prefix: Option<u8>) -> String {
    match prefix {
        Some(bits) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(bits)).unwrap_or(0);
            format!("{}/{}", Ipv4Addr::from(u32::from(addr) & mask), bits)
        }
        None => addr.to_string(),
    }
}

fn format_v6(addr: Ipv6Addr, prefix: Option<u8>) -> String {
    match prefix {
        Some(bits) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(bits)).unwrap_or(0);
            format!("{}/{}", Ipv6Addr::from(u128::from(addr) & mask), bits)
        }
        None => addr.to_string(),
    }
}

/// Ordered, de-duplicated output
#[derive(Debug, Default)]
struct Collector {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl Collector {
    fn push(&mut self, entry: String) {
        if self.seen.insert(entry.clone()) {
            self.entries.push(entry);
        }
    }
}
