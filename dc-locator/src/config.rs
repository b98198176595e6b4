use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::types::ServiceKind;
use crate::error::DiscoveryError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub ldap: LdapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub domain: String,
    #[serde(default)]
    pub site: Option<String>,
    /// Keep only the fastest N controllers in the limited list
    #[serde(default)]
    pub server_limit: Option<usize>,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ServiceKind>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Per-query timeout and overall lookup lifetime
    #[serde(default = "default_dns_timeout")]
    pub timeout_secs: u64,
    /// Explicit nameservers, queried over TCP. Empty means system config.
    #[serde(default)]
    pub nameservers: Vec<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Total budget for a single probe
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
    /// Budget for each individual connect attempt inside a probe
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Maximum probes in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Overall deadline for one ranking pass, 0 disables it
    #[serde(default)]
    pub deadline_ms: u64,
    #[serde(default)]
    pub kdc_strategy: FamilyStrategy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LdapConfig {
    /// Require StartTLS
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

/// How a KDC probe walks the address families of a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyStrategy {
    /// IPv6 first, IPv4 only after IPv6 fails
    Sequential,
    /// Both families at once, first successful connect wins
    #[default]
    Race,
}

fn default_kinds() -> Vec<ServiceKind> {
    vec![ServiceKind::Ldap, ServiceKind::Kdc]
}

fn default_dns_timeout() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    2000
}

fn default_connect_timeout() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dns_timeout(),
            nameservers: Vec::new(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            max_concurrency: default_max_concurrency(),
            deadline_ms: 0,
            kdc_strategy: FamilyStrategy::default(),
        }
    }
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            secure: default_true(),
            tls_verify: default_true(),
        }
    }
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), DiscoveryError> {
        if self.dns.timeout_secs == 0 {
            return Err(DiscoveryError::Config("dns.timeout_secs must be greater than zero".into()));
        }
        if self.probe.timeout_ms == 0 {
            return Err(DiscoveryError::Config("probe.timeout_ms must be greater than zero".into()));
        }
        if self.probe.connect_timeout_ms == 0 || self.probe.connect_timeout_ms > self.probe.timeout_ms {
            return Err(DiscoveryError::Config(
                "probe.connect_timeout_ms must be between 1 and probe.timeout_ms".into(),
            ));
        }
        if self.probe.max_concurrency == 0 {
            return Err(DiscoveryError::Config(
                "probe.max_concurrency must be greater than zero".into(),
            ));
        }
        if self.discovery.server_limit == Some(0) {
            return Err(DiscoveryError::InvalidLimit);
        }
        if self.discovery.kinds.is_empty() {
            return Err(DiscoveryError::Config("discovery.kinds must not be empty".into()));
        }
        Ok(())
    }
}
