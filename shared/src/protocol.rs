use std::net::Ipv6Addr;
use crate::types::ServiceKind;

/// SRV record names for domain controllers, as registered by the directory
/// infrastructure itself. `{domain}` and `{site}` are substituted.
pub const LDAP_SRV_FORMAT: &str = "_ldap._tcp.dc._msdcs.{domain}";
pub const LDAP_SITE_AWARE_SRV_FORMAT: &str = "_ldap._tcp.{site}._sites.dc._msdcs.{domain}";
pub const KERBEROS_SRV_FORMAT: &str = "_kerberos._tcp.dc._msdcs.{domain}";
pub const KERBEROS_SITE_AWARE_SRV_FORMAT: &str = "_kerberos._tcp.{site}._sites.dc._msdcs.{domain}";

/// URI scheme used for LDAP endpoints
pub const LDAP_URI_SCHEME: &str = "ldap";

/// Build the SRV record name to query for a kind of controller, optionally
/// scoped to a site.
pub fn srv_record_name(kind: ServiceKind, domain: &str, site: Option<&str>) -> String {
    let template = match (kind, site) {
        (ServiceKind::Ldap, None) => LDAP_SRV_FORMAT,
        (ServiceKind::Ldap, Some(_)) => LDAP_SITE_AWARE_SRV_FORMAT,
        (ServiceKind::Kdc, None) => KERBEROS_SRV_FORMAT,
        (ServiceKind::Kdc, Some(_)) => KERBEROS_SITE_AWARE_SRV_FORMAT,
    };

    let name = template.replace("{domain}", domain);
    match site {
        Some(site) => name.replace("{site}", site),
        None => name,
    }
}

/// Combine a hostname or IP literal with a port. IPv6 literals are bracketed
/// so the port separator stays unambiguous.
pub fn format_host_port(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// `ldap://host:port`
pub fn ldap_uri(host: &str, port: u16) -> String {
    format!("{}://{}", LDAP_URI_SCHEME, format_host_port(host, port))
}
