//! Native TCP connect probe.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connect::error::{ProbeFailure, classify_probe_error};

/// Attempt a TCP connection to `host:port` within `timeout`.
///
/// Name resolution counts against the same deadline. The connection is
/// dropped as soon as it is established.
pub(crate) async fn tcp_connect(
    host: &str,
    port: u16,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), ProbeFailure> {
    let connect = tokio::time::timeout(timeout, TcpStream::connect((host, port)));

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            debug!("TCP probe to {}:{} cancelled", host, port);
            Err(ProbeFailure::Other)
        }

        result = connect => match result {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(log_failure(host, port, &e)),
            Err(_elapsed) => {
                debug!("TCP probe to {}:{} timed out after {:?}", host, port, timeout);
                Err(ProbeFailure::Timeout)
            }
        }
    }
}

fn log_failure(host: &str, port: u16, err: &io::Error) -> ProbeFailure {
    let failure = classify_probe_error(err);
    debug!("TCP probe to {}:{} failed ({}): {}", host, port, failure, err);
    failure
}
