//! Host name resolution for the feed client.
//!
//! reqwest reports resolver failures as generic connect errors. Routing
//! lookups through [`SystemResolver`] wraps them in [`DnsLookupError`], which
//! the client finds again by walking the error's source chain.

use std::io;
use std::net::SocketAddr;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use tracing::trace;

/// A failed host name lookup.
#[derive(Debug, Error)]
pub enum DnsLookupError {
    /// The system resolver returned an error.
    #[error("failed to resolve '{host}'")]
    Lookup {
        /// The host that was looked up.
        host: String,
        /// The resolver error.
        #[source]
        source: io::Error,
    },
    /// The lookup succeeded but produced no addresses.
    #[error("no addresses found for '{host}'")]
    NoAddresses {
        /// The host that was looked up.
        host: String,
    },
}

impl DnsLookupError {
    /// Returns the host that failed to resolve.
    pub fn host(&self) -> &str {
        match self {
            Self::Lookup { host, .. } | Self::NoAddresses { host } => host,
        }
    }
}

/// Resolves through the operating system via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(lookup(name.as_str().to_string()))
    }
}

async fn lookup(host: String) -> Result<Addrs, Box<dyn std::error::Error + Send + Sync>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map_err(|source| DnsLookupError::Lookup {
            host: host.clone(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(DnsLookupError::NoAddresses { host }.into());
    }

    trace!(host = %host, count = addrs.len(), "Resolved host");
    Ok(Box::new(addrs.into_iter()))
}
