//! VPN state detection.
//!
//! - **macOS**: the network connection list of `scutil --nc list`
//! - **Linux**: tunnel-like interfaces under `/sys/class/net` and their
//!   `operstate`
//!
//! Anything that cannot be inspected reads as "no VPN".

use std::path::PathBuf;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use super::traits::VpnState;

/// Matched anywhere in a service line, so names like `CorpVPN` count.
static VPN_SERVICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(PPP|VPN|L2TP|IPSEC|IKEV2)").expect("valid VPN service pattern")
});

/// Interface name prefixes used by VPN software.
const VPN_INTERFACE_PREFIXES: &[&str] = &["tun", "tap", "wg", "ppp", "ipsec", "utun"];

/// Connection state summary of a `scutil --nc list` listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ServiceSummary {
    configured: bool,
    connected: bool,
}

fn summarize_services(listing: &str) -> ServiceSummary {
    let vpn_lines = listing.lines().filter(|line| VPN_SERVICE.is_match(line));
    let mut summary = ServiceSummary::default();
    for line in vpn_lines {
        summary.configured = true;
        if line.contains("(Connected)") {
            summary.connected = true;
        }
    }
    summary
}

fn is_vpn_interface(name: &str) -> bool {
    VPN_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// `operstate` values other than `down` count as up; tunnels commonly report
/// `unknown` while passing traffic.
fn is_oper_up(state: &str) -> bool {
    let state = state.trim();
    !state.is_empty() && state != "down" && state != "notpresent"
}

/// [`VpnState`] of the machine this process runs on.
#[derive(Debug, Clone)]
pub struct SystemVpnState {
    sys_class_net: PathBuf,
}

impl Default for SystemVpnState {
    fn default() -> Self {
        Self {
            sys_class_net: PathBuf::from("/sys/class/net"),
        }
    }
}

impl SystemVpnState {
    pub fn new() -> Self {
        Self::default()
    }

    async fn scutil_services(&self) -> ServiceSummary {
        match Command::new("scutil").args(["--nc", "list"]).output().await {
            Ok(out) if out.status.success() => {
                summarize_services(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                debug!("scutil --nc list exited with {}", out.status);
                ServiceSummary::default()
            }
            Err(e) => {
                debug!("scutil unavailable: {}", e);
                ServiceSummary::default()
            }
        }
    }

    /// Names and operstates of VPN-like interfaces.
    async fn vpn_interfaces(&self) -> Vec<(String, String)> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.sys_class_net).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.sys_class_net.display(), e);
                return found;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_vpn_interface(&name) {
                continue;
            }
            let state = tokio::fs::read_to_string(entry.path().join("operstate"))
                .await
                .unwrap_or_default();
            debug!("VPN interface {} is {}", name, state.trim());
            found.push((name, state));
        }
        found
    }

    async fn summary(&self) -> ServiceSummary {
        if cfg!(target_os = "macos") {
            return self.scutil_services().await;
        }

        let interfaces = self.vpn_interfaces().await;
        ServiceSummary {
            configured: !interfaces.is_empty(),
            connected: interfaces.iter().any(|(_, state)| is_oper_up(state)),
        }
    }
}

#[async_trait]
impl VpnState for SystemVpnState {
    async fn is_vpn_active(&self) -> bool {
        self.summary().await.connected
    }

    async fn has_vpn_interface(&self) -> bool {
        self.summary().await.configured
    }
}
