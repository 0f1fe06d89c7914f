//! Data model shared by the resolution engine and its collaborators.

use std::fmt;

/// Default SSH port.
pub const SSH_PORT: u16 = 22;

/// A parsed `user@host:port` token.
///
/// Produced once per run by [`HostSpec::parse`](crate::connect::host_spec) and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub raw_input: String,
    pub user: Option<String>,
    /// Always non-empty.
    pub host: String,
    pub port: Option<u16>,
    pub inferred_domain: Option<String>,
}

impl HostSpec {
    /// Port to connect to, falling back to [`SSH_PORT`].
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(SSH_PORT)
    }
}

/// Reachability of one target. Built fresh for every probe, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub target: String,
    pub reachable_tcp22: bool,
    pub reachable_icmp: bool,
}

impl ProbeResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reachable_tcp22: false,
            reachable_icmp: false,
        }
    }
}

/// One named extension attribute of an inventory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAttribute {
    pub name: String,
    pub value: String,
}

/// A computer record fetched from the device-management inventory.
///
/// Attributes keep document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryRecord {
    pub computer_name: String,
    pub extension_attributes: Vec<ExtensionAttribute>,
}

impl InventoryRecord {
    /// Value of the first attribute named exactly `name`.
    pub fn extension_attribute(&self, name: &str) -> Option<&str> {
        self.extension_attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

/// Final address handed to session launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub fqdn_or_ip: String,
    pub via_alternate: bool,
}

/// Which network segments answered during the diagnostic stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityClassification {
    LocalNetworkUp,
    VpnActive,
    InternetUp,
    NoneDetermined,
}

/// The single message shown when every probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// ICMP answered but TCP 22 did not.
    SshRefused { host: String },
    /// Local canaries unreachable, VPN configured but not connected.
    CheckVpn,
    /// Internet canaries unreachable.
    NoInternet,
    /// Nothing more specific could be determined.
    HostUnreachable { host: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SshRefused { host } => write!(
                f,
                "The host {} is online, but is not accepting SSH connections",
                host
            ),
            Diagnostic::CheckVpn => write!(
                f,
                "Local network resources cannot be reached.  Should you be connected to the VPN?"
            ),
            Diagnostic::NoInternet => write!(
                f,
                "You may not have access to the internet. Please verify this, then try again."
            ),
            Diagnostic::HostUnreachable { host } => {
                write!(f, "The host {} cannot be reached.", host)
            }
        }
    }
}

/// Outcome of one pass through the resolution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A TCP-22 probe succeeded.
    Resolved {
        spec: HostSpec,
        endpoint: ResolvedEndpoint,
        /// Whether the host was registered in the SSH config during this run.
        registered: bool,
    },
    /// All probing failed; `probe` describes the working FQDN.
    Unreachable {
        spec: HostSpec,
        probe: ProbeResult,
        classification: ConnectivityClassification,
        diagnostic: Diagnostic,
    },
}

impl Resolution {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Resolution::Resolved { .. } => 0,
            Resolution::Unreachable { .. } => 1,
        }
    }
}
