//! Hostname resolution.

use crate::http::RetryPolicy;
use crate::traits::{ConnectorError, ConnectorResult, DnsResolver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Resolver backed by the operating system's name service.
///
/// Lookups go through the same fixed-interval retry policy as catalog calls,
/// so a hostname that never resolves ends in
/// [`ConnectorError::RetriesExhausted`].
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    retry: RetryPolicy,
}

impl SystemResolver {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    async fn lookup_once(hostname: &str) -> ConnectorResult<Ipv4Addr> {
        let addrs = tokio::net::lookup_host(format!("{}:0", hostname))
            .await
            .map_err(|e| ConnectorError::ResolutionFailed(format!("{}: {}", hostname, e)))?;

        addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| {
                ConnectorError::ResolutionFailed(format!("{}: no IPv4 address", hostname))
            })
    }
}

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolve_ipv4(&self, hostname: &str) -> ConnectorResult<Ipv4Addr> {
        let ip = self
            .retry
            .run(&format!("resolve {}", hostname), || Self::lookup_once(hostname))
            .await?;
        debug!(hostname, ip = %ip, "Resolved hostname");
        Ok(ip)
    }
}

/// Resolver with a fixed table, for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticResolver {
    table: HashMap<String, Ipv4Addr>,
    lookups: AtomicU64,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hostname to the table.
    pub fn with_host(mut self, hostname: &str, ip: Ipv4Addr) -> Self {
        self.table.insert(hostname.to_lowercase(), ip);
        self
    }

    /// Number of lookups served so far, hits and misses alike.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for StaticResolver {
    async fn resolve_ipv4(&self, hostname: &str) -> ConnectorResult<Ipv4Addr> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(&hostname.to_lowercase())
            .copied()
            .ok_or_else(|| ConnectorError::RetriesExhausted {
                attempts: 1,
                last_error: Box::new(ConnectorError::ResolutionFailed(hostname.to_string())),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    #[ignore = "uses the host resolver"]
    async fn test_system_resolver_localhost() {
        let resolver = SystemResolver::new(RetryPolicy::no_retry());
        let ip = resolver.resolve_ipv4("127.0.0.1").await.unwrap();
        assert_eq!(ip, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    #[ignore = "uses the host resolver"]
    async fn test_system_resolver_unresolvable_host_exhausts() {
        let resolver = SystemResolver::new(RetryPolicy::new(2, Duration::from_millis(1)));
        let err = resolver
            .resolve_ipv4("no-such-host.invalid")
            .await
            .unwrap_err();
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new().with_host("MTL-WEB-01", Ipv4Addr::new(10, 1, 2, 3));

        assert_eq!(
            resolver.resolve_ipv4("mtl-web-01").await.unwrap(),
            Ipv4Addr::new(10, 1, 2, 3)
        );
        assert!(resolver.resolve_ipv4("unknown").await.unwrap_err().is_exhausted());
        assert_eq!(resolver.lookup_count(), 2);
    }
}
