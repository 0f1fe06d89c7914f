//! ICMP echo probe through the system `ping` tool.
//!
//! Sending raw ICMP needs elevated privileges on most platforms, so the probe
//! runs `ping` and reads its summary lines instead. Both the loss percentage
//! and the received count are checked: some tools print `0% packet loss`
//! alongside `0 packets received` when nothing was sent at all.

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static RECEIVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
        .expect("valid ping received pattern")
});

static LOSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)% packet loss").expect("valid ping loss pattern"));

/// Counters from a `ping` summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PingSummary {
    pub transmitted: u32,
    pub received: u32,
    pub loss_percent: f64,
}

impl PingSummary {
    /// Reachable iff less than 100% loss and at least one reply.
    pub fn is_reachable(&self) -> bool {
        self.loss_percent < 100.0 && self.received > 0
    }
}

/// Parse the summary of Linux (iputils, busybox) or BSD/macOS `ping` output.
pub(crate) fn parse_ping_summary(output: &str) -> Option<PingSummary> {
    let counts = RECEIVED.captures(output)?;
    let loss = LOSS.captures(output)?;

    Some(PingSummary {
        transmitted: counts.get(1)?.as_str().parse().ok()?,
        received: counts.get(2)?.as_str().parse().ok()?,
        loss_percent: loss.get(1)?.as_str().parse().ok()?,
    })
}

/// Build the platform's `ping` invocation.
fn ping_command(host: &str, count: u32, wait: Duration) -> Command {
    let mut cmd = Command::new("ping");
    cmd.arg("-c").arg(count.to_string());

    // BSD ping takes the reply wait in milliseconds, iputils in seconds.
    if cfg!(any(target_os = "macos", target_os = "freebsd")) {
        cmd.arg("-W").arg(wait.as_millis().max(1).to_string());
    } else {
        cmd.arg("-W").arg(wait.as_secs().max(1).to_string());
    }

    // `--` keeps a host starting with `-` from being read as an option.
    cmd.arg("--")
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Send `count` echo requests to `host`, waiting up to `wait` for each reply.
pub(crate) async fn icmp_echo(
    host: &str,
    count: u32,
    wait: Duration,
    cancel: &CancellationToken,
) -> bool {
    // Leave room for process start-up and resolver delays beyond the reply waits.
    let deadline = wait * count + Duration::from_secs(2);
    let mut cmd = ping_command(host, count, wait);
    let output = cmd.output();

    let output = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            debug!("ICMP probe to {} cancelled", host);
            return false;
        }

        result = tokio::time::timeout(deadline, output) => match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("Failed to run ping for {}: {}", host, e);
                return false;
            }
            Err(_elapsed) => {
                debug!("ICMP probe to {} exceeded {:?}", host, deadline);
                return false;
            }
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_ping_summary(&stdout) {
        Some(summary) => {
            debug!(
                "ICMP probe to {}: {} sent, {} received, {}% loss",
                host, summary.transmitted, summary.received, summary.loss_percent
            );
            summary.is_reachable()
        }
        None => {
            debug!("ICMP probe to {} produced no summary", host);
            false
        }
    }
}
