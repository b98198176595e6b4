//! Reachability probes.
//!
//! A DNS registration says nothing about whether this host can actually reach
//! a controller: network partitions, firewalls and air gaps are common, and a
//! controller can simply be down. A probe performs the smallest exchange that
//! proves the service answers and reports how long it took. Every failure is
//! folded into [`ProbeOutcome::Unreachable`].

use async_trait::async_trait;
use shared::types::{ProbeOutcome, ServiceKind};

pub mod kdc;
pub mod ldap;

pub use kdc::KdcProbe;
pub use ldap::LdapProbe;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Which kind of controller this probe understands, used in log output.
    fn protocol(&self) -> ServiceKind;

    /// Probe one endpoint. Must return within the probe's own timeout.
    async fn probe(&self, host: &str, port: u16) -> ProbeOutcome;
}
