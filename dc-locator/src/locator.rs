//! Discovery entry points.
//!
//! A [`Locator`] turns a domain (and optionally a site) into an ordered list of
//! controller URIs in one pass: SRV lookup, concurrent reachability probes,
//! latency ordering. Nothing is cached between calls.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use shared::types::{RankedEndpoints, ServiceKind, ServiceQuery};
use crate::config::{Config, LdapConfig, ProbeConfig};
use crate::dns::{self, HickorySrvLookup, SrvLookup};
use crate::error::DiscoveryError;
use crate::probe::{KdcProbe, LdapProbe, Probe};
use crate::ranking;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

pub struct Locator<L> {
    lookup: L,
    probe: ProbeConfig,
    ldap: LdapConfig,
    cancel: CancellationToken,
}

impl Locator<HickorySrvLookup> {
    /// Locator backed by a TCP-only hickory resolver built from `config.dns`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let lookup = HickorySrvLookup::from_config(&config.dns)?;
        Ok(Self::new(lookup, config.probe.clone(), config.ldap.clone()))
    }
}

impl<L: SrvLookup> Locator<L> {
    pub fn new(lookup: L, probe: ProbeConfig, ldap: LdapConfig) -> Self {
        Self {
            lookup,
            probe,
            ldap,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling `token` abandons every probe in flight on this locator;
    /// those endpoints are reported unreachable.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Discover the LDAP domain controllers of `domain`, fastest first.
    ///
    /// With `secure`, only controllers that complete StartTLS are returned and
    /// the negotiation is part of the measured round trip.
    pub async fn discover_ldap_domain_controllers(
        &self,
        domain: &str,
        site: Option<&str>,
        server_limit: Option<usize>,
        secure: bool,
    ) -> Result<RankedEndpoints, DiscoveryError> {
        let query = ServiceQuery::ldap(domain, site.map(str::to_string), secure);
        self.discover(&query, server_limit).await
    }

    /// Discover the KDCs of `domain`, fastest first.
    pub async fn discover_kdc_domain_controllers(
        &self,
        domain: &str,
        site: Option<&str>,
        server_limit: Option<usize>,
    ) -> Result<RankedEndpoints, DiscoveryError> {
        let query = ServiceQuery::kdc(domain, site.map(str::to_string));
        self.discover(&query, server_limit).await
    }

    /// Run one discovery pass with the probe matching `query.kind`.
    pub async fn discover(
        &self,
        query: &ServiceQuery,
        server_limit: Option<usize>,
    ) -> Result<RankedEndpoints, DiscoveryError> {
        match query.kind {
            ServiceKind::Ldap => {
                let probe = LdapProbe::new(query.secure, self.ldap.tls_verify, self.probe.timeout());
                self.discover_with(query, server_limit, &probe).await
            }
            ServiceKind::Kdc => {
                let probe = KdcProbe::new(
                    self.probe.timeout(),
                    self.probe.connect_timeout(),
                    self.probe.kdc_strategy,
                );
                self.discover_with(query, server_limit, &probe).await
            }
        }
    }

    /// Run one discovery pass with a caller-supplied probe.
    pub async fn discover_with<P: Probe + ?Sized>(
        &self,
        query: &ServiceQuery,
        server_limit: Option<usize>,
        probe: &P,
    ) -> Result<RankedEndpoints, DiscoveryError> {
        validate_query(query, server_limit)?;

        tracing::info!("Discovering {} servers for domain {} in DNS", query.kind, query.domain);
        let record_name = query.record_name();
        let candidates = dns::resolve_endpoints(&self.lookup, &record_name).await;
        if candidates.is_empty() {
            return Ok(RankedEndpoints::default());
        }

        let cancel = self.cancel.child_token();
        let deadline = self.probe.deadline().map(|deadline| spawn_deadline(deadline, cancel.clone()));

        let ranked = ranking::rank(
            &candidates,
            probe,
            self.probe.max_concurrency,
            server_limit,
            &cancel,
        )
        .await;

        if let Some(deadline) = deadline {
            deadline.abort();
        }
        Ok(ranked)
    }
}

fn spawn_deadline(deadline: Duration, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        tracing::info!("Discovery deadline of {:?} reached, abandoning outstanding probes", deadline);
        cancel.cancel();
    })
}

fn validate_query(query: &ServiceQuery, server_limit: Option<usize>) -> Result<(), DiscoveryError> {
    if server_limit == Some(0) {
        return Err(DiscoveryError::InvalidLimit);
    }
    validate_domain(&query.domain)?;
    if let Some(site) = &query.site {
        validate_site(site)?;
    }
    Ok(())
}

fn validate_domain(domain: &str) -> Result<(), DiscoveryError> {
    let invalid = |reason: &str| DiscoveryError::InvalidDomain {
        domain: domain.to_string(),
        reason: reason.to_string(),
    };

    let name = domain.strip_suffix('.').unwrap_or(domain);
    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_DOMAIN_LEN {
        return Err(invalid("longer than 253 characters"));
    }
    for label in name.split('.') {
        check_label(label).map_err(|reason| invalid(reason))?;
    }
    Ok(())
}

fn validate_site(site: &str) -> Result<(), DiscoveryError> {
    if site.contains('.') {
        return Err(DiscoveryError::InvalidSite {
            site: site.to_string(),
            reason: "must be a single DNS label".to_string(),
        });
    }
    check_label(site).map_err(|reason| DiscoveryError::InvalidSite {
        site: site.to_string(),
        reason: reason.to_string(),
    })
}

fn check_label(label: &str) -> Result<(), &'static str> {
    if label.is_empty() {
        return Err("empty label");
    }
    if label.len() > MAX_LABEL_LEN {
        return Err("label longer than 63 characters");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err("label starts or ends with a hyphen");
    }
    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err("label contains characters outside [A-Za-z0-9_-]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use shared::types::{ProbeOutcome, SrvEndpoint};
    use crate::error::LookupError;

    struct FakeDns {
        records: HashMap<String, Vec<SrvEndpoint>>,
        queried: Mutex<Vec<String>>,
    }

    impl FakeDns {
        fn new(records: &[(&str, Vec<SrvEndpoint>)]) -> Self {
            Self {
                records: records
                    .iter()
                    .map(|(name, recs)| (name.to_string(), recs.clone()))
                    .collect(),
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SrvLookup for FakeDns {
        async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvEndpoint>, LookupError> {
            self.queried.lock().unwrap().push(name.to_string());
            self.records
                .get(name)
                .cloned()
                .ok_or_else(|| LookupError::Unexpected(anyhow::anyhow!("NXDOMAIN {}", name)))
        }
    }

    /// Latency per host in ms; missing hosts time out.
    struct FakeProbe {
        kind: ServiceKind,
        latencies: HashMap<String, u64>,
        probed: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        fn new(kind: ServiceKind, latencies: &[(&str, u64)]) -> Self {
            Self {
                kind,
                latencies: latencies.iter().map(|(h, ms)| (h.to_string(), *ms)).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Probe for FakeProbe {
        fn protocol(&self) -> ServiceKind {
            self.kind
        }

        async fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
            self.probed.lock().unwrap().push(host.to_string());
            match self.latencies.get(host) {
                Some(ms) => ProbeOutcome::reachable(
                    Duration::from_millis(*ms),
                    format!("ldap://{}:{}", host, port),
                ),
                None => ProbeOutcome::Unreachable,
            }
        }
    }

    fn srv(host: &str, priority: u16, weight: u16) -> SrvEndpoint {
        SrvEndpoint {
            host: host.to_string(),
            port: 389,
            priority,
            weight,
        }
    }

    fn locator(dns: FakeDns) -> Locator<FakeDns> {
        Locator::new(dns, ProbeConfig::default(), LdapConfig::default())
    }

    const LDAP_RECORD: &str = "_ldap._tcp.dc._msdcs.example.com";

    #[tokio::test]
    async fn test_two_reachable_one_timed_out() {
        let dns = FakeDns::new(&[(
            LDAP_RECORD,
            vec![srv("dc1.example.com", 0, 100), srv("dc2.example.com", 0, 100), srv("dc3.example.com", 0, 100)],
        )]);
        let probe = FakeProbe::new(ServiceKind::Ldap, &[("dc2.example.com", 50), ("dc3.example.com", 100)]);
        let query = ServiceQuery::ldap("example.com", None, false);

        let ranked = locator(dns).discover_with(&query, Some(1), &probe).await.unwrap();

        assert_eq!(
            ranked.full,
            vec!["ldap://dc2.example.com:389", "ldap://dc3.example.com:389"]
        );
        assert_eq!(ranked.limited, vec!["ldap://dc2.example.com:389"]);
    }

    #[tokio::test]
    async fn test_no_records_is_empty_result() {
        let dns = FakeDns::new(&[(LDAP_RECORD, Vec::new())]);
        let probe = FakeProbe::new(ServiceKind::Ldap, &[]);
        let query = ServiceQuery::ldap("example.com", None, true);

        let ranked = locator(dns).discover_with(&query, None, &probe).await.unwrap();

        assert!(ranked.full.is_empty());
        assert!(ranked.limited.is_empty());
        assert!(probe.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dns_failure_is_empty_result() {
        let dns = FakeDns::new(&[]);
        let probe = FakeProbe::new(ServiceKind::Kdc, &[]);
        let query = ServiceQuery::kdc("example.com", None);

        let ranked = locator(dns).discover_with(&query, Some(3), &probe).await.unwrap();

        assert_eq!(ranked, RankedEndpoints::default());
    }

    #[tokio::test]
    async fn test_site_scoped_record_names() {
        let dns = FakeDns::new(&[]);
        let probe = FakeProbe::new(ServiceKind::Kdc, &[]);
        let locator = locator(dns);

        locator
            .discover_with(&ServiceQuery::kdc("example.com", Some("Berlin".to_string())), None, &probe)
            .await
            .unwrap();
        locator
            .discover_with(&ServiceQuery::ldap("example.com", None, true), None, &probe)
            .await
            .unwrap();

        assert_eq!(
            *locator.lookup.queried.lock().unwrap(),
            vec![
                "_kerberos._tcp.Berlin._sites.dc._msdcs.example.com".to_string(),
                "_ldap._tcp.dc._msdcs.example.com".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_records_probed_once() {
        let dns = FakeDns::new(&[(
            LDAP_RECORD,
            vec![srv("dc1.example.com", 0, 100), srv("dc1.example.com", 1, 0)],
        )]);
        let probe = FakeProbe::new(ServiceKind::Ldap, &[("dc1.example.com", 5)]);
        let query = ServiceQuery::ldap("example.com", None, false);

        let ranked = locator(dns).discover_with(&query, None, &probe).await.unwrap();

        assert_eq!(ranked.full, vec!["ldap://dc1.example.com:389"]);
        assert_eq!(probe.probed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_fast() {
        let dns = FakeDns::new(&[]);
        let locator = locator(dns);

        let err = locator.discover_ldap_domain_controllers("example.com", None, Some(0), true).await;
        assert_eq!(err, Err(DiscoveryError::InvalidLimit));

        let err = locator.discover_kdc_domain_controllers("bad domain", None, None).await;
        assert!(matches!(err, Err(DiscoveryError::InvalidDomain { .. })));

        let err = locator.discover_kdc_domain_controllers("", None, None).await;
        assert!(matches!(err, Err(DiscoveryError::InvalidDomain { .. })));

        let err = locator.discover_kdc_domain_controllers("example.com", Some("a.b"), None).await;
        assert!(matches!(err, Err(DiscoveryError::InvalidSite { .. })));

        // Nothing reached DNS
        assert!(locator.lookup.queried.lock().unwrap().is_empty());
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("corp.example.com").is_ok());
        assert!(validate_domain("corp.example.com.").is_ok());
        assert!(validate_domain("my_corp.example").is_ok());
        assert!(validate_domain("-corp.example.com").is_err());
        assert!(validate_domain("corp..example.com").is_err());
        assert!(validate_domain(&"a".repeat(64)).is_err());
        assert!(validate_site("Default-First-Site-Name").is_ok());
        assert!(validate_site("").is_err());
    }

    #[tokio::test]
    async fn test_deadline_abandons_slow_probes() {
        struct StuckProbe;

        #[async_trait]
        impl Probe for StuckProbe {
            fn protocol(&self) -> ServiceKind {
                ServiceKind::Kdc
            }

            async fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
                if host == "stuck.example.com" {
                    std::future::pending::<()>().await;
                }
                ProbeOutcome::reachable(Duration::from_millis(3), format!("{}:{}", host, port))
            }
        }

        let dns = FakeDns::new(&[(
            "_kerberos._tcp.dc._msdcs.example.com",
            vec![srv("stuck.example.com", 0, 0), srv("dc1.example.com", 0, 0)],
        )]);
        let probe_config = ProbeConfig {
            deadline_ms: 100,
            ..ProbeConfig::default()
        };
        let locator = Locator::new(dns, probe_config, LdapConfig::default());

        let ranked = locator
            .discover_with(&ServiceQuery::kdc("example.com", None), None, &StuckProbe)
            .await
            .unwrap();

        assert_eq!(ranked.full, vec!["dc1.example.com:389"]);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let dns = FakeDns::new(&[(LDAP_RECORD, vec![srv("dc1.example.com", 0, 0)])]);
        let probe = FakeProbe::new(ServiceKind::Ldap, &[("dc1.example.com", 1)]);
        let token = CancellationToken::new();
        token.cancel();
        let locator = locator(dns).with_cancellation(token);

        let ranked = locator
            .discover_with(&ServiceQuery::ldap("example.com", None, false), None, &probe)
            .await
            .unwrap();

        assert!(ranked.full.is_empty());
    }
}
