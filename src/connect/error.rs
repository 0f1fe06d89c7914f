//! Error types and probe-failure classification.
//!
//! Every failure the command can meet is one of the enums below. Most of them
//! never reach the resolution engine: inventory and SSH config failures are
//! converted into absent values at their call site, and probe failures are
//! collapsed into a plain "unreachable" boolean.
//!
//! # Probe Failure Classification
//!
//! Probe errors are classified only so the logs say *why* a target was
//! unreachable. The classification checks the `io::ErrorKind` first and falls
//! back to message patterns, because resolver failures surface as
//! `ErrorKind::Other` with a platform-specific message.
//!
//! ```rust,ignore
//! use std::io;
//! use sshdash::connect::error::{classify_probe_error, ProbeFailure};
//!
//! let err = io::Error::from(io::ErrorKind::ConnectionRefused);
//! assert_eq!(classify_probe_error(&err), ProbeFailure::Refused);
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a probe declared its target unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No answer before the deadline.
    Timeout,
    /// The host answered with a reset or ICMP unreachable.
    Refused,
    /// The name did not resolve to any address.
    Unresolved,
    /// Anything else (permission, routing, unknown).
    Other,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Timeout => write!(f, "timeout"),
            ProbeFailure::Refused => write!(f, "refused"),
            ProbeFailure::Unresolved => write!(f, "unresolved"),
            ProbeFailure::Other => write!(f, "other"),
        }
    }
}

/// Message patterns of name resolution failures across libc implementations.
const UNRESOLVED_PATTERNS: &[&str] = &[
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no address associated",
    "temporary failure in name resolution",
    "no such host",
];

/// Message patterns of refused or actively rejected connections.
const REFUSED_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "no route to host",
    "network is unreachable",
    "host is down",
];

/// Classify an I/O error raised while probing a target.
///
/// The error kind takes precedence; message patterns are only consulted when
/// the kind is not specific enough.
pub fn classify_probe_error(err: &io::Error) -> ProbeFailure {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => return ProbeFailure::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => return ProbeFailure::Refused,
        _ => {}
    }

    let message = err.to_string().to_lowercase();

    if UNRESOLVED_PATTERNS.iter().any(|p| message.contains(p)) {
        return ProbeFailure::Unresolved;
    }

    if REFUSED_PATTERNS.iter().any(|p| message.contains(p)) {
        return ProbeFailure::Refused;
    }

    if message.contains("timed out") || message.contains("timeout") {
        return ProbeFailure::Timeout;
    }

    ProbeFailure::Other
}

/// A host token that cannot produce a host at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostSpecError {
    #[error("no host was given")]
    Empty,
}

/// The user interrupted an interactive prompt.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("interrupted at a prompt")]
pub struct Interrupted;

/// Failures of a host resolution pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    HostSpec(#[from] HostSpecError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Failures of a single inventory lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The service answered well-formed, but holds no record for the name.
    #[error("no inventory record for {0}")]
    NotFound(String),
    /// Transport failure, timeout, malformed body or an embedded error text.
    #[error("inventory lookup failed: {0}")]
    LookupFailed(String),
    /// A credential prompt was interrupted before the lookup started.
    #[error("inventory lookup interrupted")]
    Interrupted,
}

impl From<Interrupted> for InventoryError {
    fn from(_: Interrupted) -> Self {
        InventoryError::Interrupted
    }
}

/// Failures of the SSH config store.
#[derive(Debug, Error)]
pub enum SshConfigError {
    #[error("an entry for {0} already exists")]
    AlreadyExists(String),
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures reading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Failures of the session launch collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the specified identity file cannot be read: {0}")]
    IdentityFileUnreadable(PathBuf),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Fatal errors of a command run.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
