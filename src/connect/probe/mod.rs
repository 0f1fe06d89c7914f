//! Reachability probes.
//!
//! - [`Prober`]: the trait the resolution engine talks to
//! - [`SystemProber`]: native TCP connect plus the system `ping` tool
//! - [`any_reachable`]: "does any canary answer" checks used for diagnostics
//!
//! Probes run one at a time and never cache: every call re-tests its target.

mod icmp;
mod tcp;
mod traits;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use traits::Prober;

/// Prober backed by the operating system.
pub struct SystemProber {
    tcp_timeout: Duration,
    icmp_wait: Duration,
    icmp_count: u32,
    cancel: CancellationToken,
}

impl SystemProber {
    /// Create a prober whose probes all stop when `cancel` fires.
    pub fn new(
        tcp_timeout: Duration,
        icmp_wait: Duration,
        icmp_count: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tcp_timeout,
            icmp_wait,
            icmp_count: icmp_count.max(1),
            cancel,
        }
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn tcp_reachable(&self, host: &str, port: u16) -> bool {
        tcp::tcp_connect(host, port, self.tcp_timeout, &self.cancel)
            .await
            .is_ok()
    }

    async fn icmp_reachable(&self, host: &str) -> bool {
        icmp::icmp_echo(host, self.icmp_count, self.icmp_wait, &self.cancel).await
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Whether any of `targets` answers ICMP, tried in the given order.
///
/// Stops at the first reachable target. An empty list counts as reachable so
/// an unconfigured canary set never produces a false diagnosis.
pub async fn any_reachable(prober: &dyn Prober, targets: &[String]) -> bool {
    if targets.is_empty() {
        return true;
    }

    for target in targets {
        if prober.icmp_reachable(target).await {
            debug!("Canary {} is reachable", target);
            return true;
        }
    }

    debug!("None of {} canaries answered", targets.len());
    false
}
