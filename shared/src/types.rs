use std::fmt;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol;

/// Which controller service is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Directory servers (LDAP)
    Ldap,
    /// Ticket-granting servers (Kerberos KDC)
    Kdc,
}

impl ServiceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Ldap => "LDAP",
            ServiceKind::Kdc => "KDC",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a single discovery pass is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    pub domain: String,
    pub site: Option<String>,
    pub kind: ServiceKind,
    /// Require StartTLS. Only meaningful for LDAP.
    pub secure: bool,
}

impl ServiceQuery {
    pub fn ldap(domain: impl Into<String>, site: Option<String>, secure: bool) -> Self {
        Self {
            domain: domain.into(),
            site,
            kind: ServiceKind::Ldap,
            secure,
        }
    }

    pub fn kdc(domain: impl Into<String>, site: Option<String>) -> Self {
        Self {
            domain: domain.into(),
            site,
            kind: ServiceKind::Kdc,
            secure: false,
        }
    }

    /// The fully-qualified SRV record name this query resolves.
    pub fn record_name(&self) -> String {
        protocol::srv_record_name(self.kind, &self.domain, self.site.as_deref())
    }
}

/// One decoded SRV record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvEndpoint {
    /// Target hostname, trailing dot stripped
    pub host: String,

    pub port: u16,

    /// Lower is preferred
    pub priority: u16,

    /// Higher is preferred among records of equal priority
    pub weight: u16,
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { latency: Duration, uri: String },
    Unreachable,
}

impl ProbeOutcome {
    pub fn reachable(latency: Duration, uri: impl Into<String>) -> Self {
        ProbeOutcome::Reachable {
            latency,
            uri: uri.into(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Reachable { latency, .. } => Some(*latency),
            ProbeOutcome::Unreachable => None,
        }
    }
}

/// Reachable endpoints ordered fastest first.
///
/// `limited` is always a prefix of `full`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEndpoints {
    pub limited: Vec<String>,
    pub full: Vec<String>,
}

impl RankedEndpoints {
    /// Build from an already ordered list, truncating `limited` to `limit`
    /// entries when a limit is given.
    pub fn from_ordered(full: Vec<String>, limit: Option<usize>) -> Self {
        let limited = match limit {
            Some(limit) if limit < full.len() => full[..limit].to_vec(),
            _ => full.clone(),
        };
        Self { limited, full }
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// `(limited, full)`
    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.limited, self.full)
    }
}

/// Everything one invocation of the locator found, as printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub domain: String,
    pub site: Option<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldap: Option<RankedEndpoints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdc: Option<RankedEndpoints>,
}

impl DiscoveryReport {
    pub fn new(domain: impl Into<String>, site: Option<String>) -> Self {
        Self {
            domain: domain.into(),
            site,
            generated_at: Utc::now(),
            ldap: None,
            kdc: None,
        }
    }

    pub fn set(&mut self, kind: ServiceKind, ranked: RankedEndpoints) {
        match kind {
            ServiceKind::Ldap => self.ldap = Some(ranked),
            ServiceKind::Kdc => self.kdc = Some(ranked),
        }
    }

    /// True when no requested kind produced a reachable controller.
    pub fn nothing_reachable(&self) -> bool {
        self.ldap.as_ref().map_or(true, RankedEndpoints::is_empty)
            && self.kdc.as_ref().map_or(true, RankedEndpoints::is_empty)
    }
}
