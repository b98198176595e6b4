use anyhow::{Context, Result};
use dc_locator::{Config, Locator, ServiceKind};
use shared::types::DiscoveryReport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dc_locator=info"))
        )
        .init();

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/dc-locator/locator.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let locator = Locator::from_config(&config)
        .context("Failed to create DNS resolver")?;

    let discovery = &config.discovery;
    let site = discovery.site.as_deref();
    let mut report = DiscoveryReport::new(&discovery.domain, discovery.site.clone());

    for kind in &discovery.kinds {
        let ranked = match kind {
            ServiceKind::Ldap => {
                locator
                    .discover_ldap_domain_controllers(
                        &discovery.domain,
                        site,
                        discovery.server_limit,
                        config.ldap.secure,
                    )
                    .await
            }
            ServiceKind::Kdc => {
                locator
                    .discover_kdc_domain_controllers(&discovery.domain, site, discovery.server_limit)
                    .await
            }
        }
        .with_context(|| format!("{} discovery failed", kind))?;

        if ranked.is_empty() {
            tracing::warn!("No reachable {} servers found for domain {}", kind, discovery.domain);
        } else {
            tracing::info!("Found {} reachable {} servers", ranked.full.len(), kind);
        }
        report.set(*kind, ranked);
    }

    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize discovery report")?;
    println!("{}", json);

    if report.nothing_reachable() {
        anyhow::bail!("No reachable domain controllers found for {}", discovery.domain);
    }

    Ok(())
}
