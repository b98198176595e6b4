//! Locate Active Directory domain controllers through DNS SRV records and
//! order them by how quickly they actually answer.

pub mod config;
pub mod dns;
pub mod error;
pub mod locator;
pub mod probe;
pub mod ranking;

pub use config::Config;
pub use error::DiscoveryError;
pub use locator::Locator;
pub use shared::types::{RankedEndpoints, ServiceKind, ServiceQuery};
