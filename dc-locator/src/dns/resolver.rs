use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use hickory_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use hickory_resolver::TokioAsyncResolver;
use shared::types::SrvEndpoint;
use crate::config::DnsConfig;
use crate::error::LookupError;

/// Source of raw SRV records.
#[async_trait]
pub trait SrvLookup: Send + Sync {
    /// Records for `name` in whatever order the server returned them.
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvEndpoint>, LookupError>;
}

/// SRV lookups through hickory, over TCP only.
///
/// Answer sets for large domains easily exceed the 512 byte datagram limit,
/// and servers truncate rather than fail, so UDP nameservers are never used.
pub struct HickorySrvLookup {
    resolver: TokioAsyncResolver,
    lifetime: Duration,
}

impl HickorySrvLookup {
    pub fn from_config(config: &DnsConfig) -> anyhow::Result<Self> {
        let resolver_config = if config.nameservers.is_empty() {
            let (system, _) = hickory_resolver::system_conf::read_system_conf()
                .context("Failed to read system DNS configuration")?;
            tcp_only(&system)
        } else {
            let mut group = NameServerConfigGroup::new();
            for addr in &config.nameservers {
                group.push(NameServerConfig::new(*addr, Protocol::Tcp));
            }
            ResolverConfig::from_parts(None, Vec::new(), group)
        };

        if resolver_config.name_servers().is_empty() {
            anyhow::bail!("No TCP nameservers available");
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout();
        opts.attempts = 1;
        // One pass per call, nothing worth caching
        opts.cache_size = 0;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
            lifetime: config.timeout(),
        })
    }
}

fn tcp_only(system: &ResolverConfig) -> ResolverConfig {
    let mut config = ResolverConfig::from_parts(
        system.domain().cloned(),
        system.search().to_vec(),
        NameServerConfigGroup::new(),
    );
    for ns in system.name_servers().iter().filter(|ns| ns.protocol == Protocol::Tcp) {
        config.add_name_server(ns.clone());
    }
    config
}

#[async_trait]
impl SrvLookup for HickorySrvLookup {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvEndpoint>, LookupError> {
        let lookup = tokio::time::timeout(self.lifetime, self.resolver.srv_lookup(name))
            .await
            .map_err(|_| LookupError::Timeout(self.lifetime))??;

        Ok(lookup
            .iter()
            .map(|srv| SrvEndpoint {
                host: srv.target().to_ascii().trim_end_matches('.').to_string(),
                port: srv.port(),
                priority: srv.priority(),
                weight: srv.weight(),
            })
            .collect())
    }
}

/// Resolve `record_name` into candidate endpoints ordered by priority
/// ascending, then weight descending.
///
/// Resolution failures are not errors for the caller: they are logged and
/// yield no candidates.
pub async fn resolve_endpoints<L: SrvLookup + ?Sized>(lookup: &L, record_name: &str) -> Vec<SrvEndpoint> {
    let records = match lookup.lookup_srv(record_name).await {
        Ok(records) => records,
        Err(LookupError::Unexpected(e)) => {
            tracing::warn!(
                "Unexpected error occurred when querying DNS for record {}: {}",
                record_name,
                e
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::info!("Unable to query DNS for record {} due to: {}", record_name, e);
            return Vec::new();
        }
    };

    let ordered = order_records(records);
    tracing::debug!(
        record = record_name,
        count = ordered.len(),
        "SRV records ordered by priority and weight: {:?}",
        ordered
    );
    ordered
}

/// Sort by (priority asc, weight desc), keeping input order on ties. Drops
/// "service not available" records (root target or port 0) and repeated
/// host/port pairs.
pub fn order_records(mut records: Vec<SrvEndpoint>) -> Vec<SrvEndpoint> {
    records.retain(|record| {
        let usable = !record.host.is_empty() && record.port != 0;
        if !usable {
            tracing::debug!("Skipping unusable SRV record {:?}", record);
        }
        usable
    });

    records.sort_by_key(|record| (record.priority, Reverse(record.weight)));

    let mut seen = HashSet::new();
    records.retain(|record| seen.insert((record.host.to_ascii_lowercase(), record.port)));
    records
}
