use std::time::{Duration, Instant};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Scope};
use shared::protocol::ldap_uri;
use shared::types::{ProbeOutcome, ServiceKind};
use super::Probe;

/// Root DSE attributes requested by the directory ping
const ROOT_DSE_ATTRS: [&str; 3] = ["defaultNamingContext", "dnsHostName", "supportedLDAPVersion"];

/// Measures an "LDAP ping": open a connection, optionally upgrade it with
/// StartTLS, and read the root DSE anonymously.
///
/// With `secure` set, a server that accepts the connection but cannot
/// negotiate TLS is unreachable for our purposes.
pub struct LdapProbe {
    secure: bool,
    tls_verify: bool,
    timeout: Duration,
}

impl LdapProbe {
    pub fn new(secure: bool, tls_verify: bool, timeout: Duration) -> Self {
        Self {
            secure,
            tls_verify,
            timeout,
        }
    }

    async fn ping(&self, uri: &str, start: Instant) -> Result<Duration, LdapError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.secure)
            .set_no_tls_verify(!self.tls_verify);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, uri).await?;
        let driver_uri = uri.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!("LDAP connection to {} ended with error: {}", driver_uri, e);
            }
        });

        let result = ldap
            .with_timeout(self.timeout)
            .search("", Scope::Base, "(objectClass=*)", ROOT_DSE_ATTRS.to_vec())
            .await
            .and_then(|search| search.success());
        let latency = start.elapsed();

        if let Err(e) = ldap.unbind().await {
            tracing::debug!("Failed to unbind from {}: {}", uri, e);
        }

        result.map(|_| latency)
    }
}

#[async_trait]
impl Probe for LdapProbe {
    fn protocol(&self) -> ServiceKind {
        ServiceKind::Ldap
    }

    async fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
        let uri = ldap_uri(host, port);
        let start = Instant::now();

        match tokio::time::timeout(self.timeout, self.ping(&uri, start)).await {
            Ok(Ok(latency)) => ProbeOutcome::reachable(latency, uri),
            Ok(Err(e)) => {
                if self.secure {
                    tracing::debug!(
                        "LDAP server {} was unreachable on port {} or failed to establish secure communication: {}",
                        host,
                        port,
                        e
                    );
                } else {
                    tracing::debug!("LDAP server {} was unreachable on port {}: {}", host, port, e);
                }
                ProbeOutcome::Unreachable
            }
            Err(_) => {
                tracing::debug!(
                    "LDAP server {} did not answer on port {} within {:?}",
                    host,
                    port,
                    self.timeout
                );
                ProbeOutcome::Unreachable
            }
        }
    }
}
