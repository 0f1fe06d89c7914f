//! Reachability probe trait definition.
//!
//! Defines the interface the resolution engine uses to test targets, so the
//! decision flow can run against recorded answers in tests.

use async_trait::async_trait;

/// Trait for reachability probes.
///
/// Both primitives fail closed: a timeout, a refusal, a resolver failure or a
/// cancelled run all answer `false`. Implementations never return errors to
/// the caller.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Whether a TCP connection to `host:port` can be established.
    async fn tcp_reachable(&self, host: &str, port: u16) -> bool;

    /// Whether `host` answers ICMP echo requests.
    async fn icmp_reachable(&self, host: &str) -> bool;

    /// Get the name of this prober.
    ///
    /// Used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}
