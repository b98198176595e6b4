pub mod resolver;

pub use resolver::{order_records, resolve_endpoints, HickorySrvLookup, SrvLookup};
