//! DNS lookups used while flattening
//!
//! "No such name" and "no records of that type" are empty results, not
//! errors; any other resolver failure is an error.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, TokioResolver};
use spflat_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Plain DNS port
const DNS_PORT: u16 = 53;

/// Record lookups needed to expand SPF terms
#[async_trait]
pub trait SpfLookup: Send + Sync {
    /// TXT strings at `name`, each record's segments concatenated
    async fn txt(&self, name: &str) -> Result<Vec<String>>;

    /// A records at `name`
    async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>>;

    /// AAAA records at `name`
    async fn ipv6(&self, name: &str) -> Result<Vec<Ipv6Addr>>;

    /// MX records at `name` as `(preference, exchange)`
    async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>>;
}

/// [`SpfLookup`] backed by hickory's tokio resolver
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl std::fmt::Debug for HickoryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryLookup").finish_non_exhaustive()
    }
}

impl HickoryLookup {
    /// Resolver using the system configuration (`/etc/resolv.conf`)
    pub fn system() -> Result<Self> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| Error::crawler(format!("failed to create resolver: {e}")))?
            .build();
        Ok(Self { resolver })
    }

    /// Resolver querying the given nameservers over plain DNS
    pub fn with_nameservers(nameservers: &[IpAddr]) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(nameservers, DNS_PORT, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);
        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        Self { resolver }
    }
}

fn lookup_error(kind: &str, name: &str, err: ResolveError) -> Result<()> {
    if err.is_no_records_found() {
        debug!(name, error = %err, "no {} records", kind);
        return Ok(());
    }
    Err(Error::crawler(format!("{kind} lookup for {name} failed: {err}")))
}

#[async_trait]
impl SpfLookup for HickoryLookup {
    async fn txt(&self, name: &str) -> Result<Vec<String>> {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|segment| String::from_utf8_lossy(segment))
                        .collect::<String>()
                })
                .collect()),
            Err(e) => lookup_error("TXT", name, e).map(|()| Vec::new()),
        }
    }

    async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>> {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|a| a.0).collect()),
            Err(e) => lookup_error("A", name, e).map(|()| Vec::new()),
        }
    }

    async fn ipv6(&self, name: &str) -> Result<Vec<Ipv6Addr>> {
        match self.resolver.ipv6_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|aaaa| aaaa.0).collect()),
            Err(e) => lookup_error("AAAA", name, e).map(|()| Vec::new()),
        }
    }

    async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>> {
        match self.resolver.mx_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| {
                    let exchange = mx.exchange().to_string();
                    (mx.preference(), exchange.trim_end_matches('.').to_string())
                })
                .collect()),
            Err(e) => lookup_error("MX", name, e).map(|()| Vec::new()),
        }
    }
}
