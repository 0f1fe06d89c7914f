//! Configuration resolution for sshdash.
//!
//! Two layers feed a run:
//!
//! 1. **Settings file** - YAML with defaults, inventory details and canary
//!    lists. Read from `--config`, `SSHDASH_CONFIG`, or
//!    `<config dir>/sshdash/config.yml`. A missing file means "all defaults".
//! 2. **Tunables** - resolved with the priority parameter -> environment
//!    variable -> built-in default.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSHDASH_CONFIG` | `<config dir>/sshdash/config.yml` | Settings file path |
//! | `SSHDASH_TCP_TIMEOUT` | 5s | TCP port 22 probe timeout in seconds |
//! | `SSHDASH_ICMP_TIMEOUT` | 1s | ICMP reply wait in seconds |
//! | `SSHDASH_ICMP_COUNT` | 1 | Echo requests per ICMP probe |
//! | `SSHDASH_INVENTORY_TIMEOUT` | 15s | Inventory request timeout in seconds |
//! | `SSHDASH_JAMF` | unset | Enable or disable the inventory lookup |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::connect::error::SettingsError;
use crate::connect::types::SSH_PORT;

/// Default TCP probe timeout in seconds
pub(crate) const DEFAULT_TCP_TIMEOUT_SECS: u64 = 5;

/// Default ICMP reply wait in seconds
pub(crate) const DEFAULT_ICMP_TIMEOUT_SECS: u64 = 1;

/// Default number of echo requests per ICMP probe
pub(crate) const DEFAULT_ICMP_COUNT: u32 = 1;

/// Default inventory request timeout in seconds
pub(crate) const DEFAULT_INVENTORY_TIMEOUT_SECS: u64 = 15;

/// Environment variable name for the settings file path
pub(crate) const CONFIG_PATH_ENV_VAR: &str = "SSHDASH_CONFIG";

/// Environment variable name for the TCP probe timeout
pub(crate) const TCP_TIMEOUT_ENV_VAR: &str = "SSHDASH_TCP_TIMEOUT";

/// Environment variable name for the ICMP reply wait
pub(crate) const ICMP_TIMEOUT_ENV_VAR: &str = "SSHDASH_ICMP_TIMEOUT";

/// Environment variable name for the ICMP echo count
pub(crate) const ICMP_COUNT_ENV_VAR: &str = "SSHDASH_ICMP_COUNT";

/// Environment variable name for the inventory request timeout
pub(crate) const INVENTORY_TIMEOUT_ENV_VAR: &str = "SSHDASH_INVENTORY_TIMEOUT";

/// Environment variable name for the inventory lookup toggle
pub(crate) const JAMF_ENV_VAR: &str = "SSHDASH_JAMF";

/// Contents of the settings file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub defaults: Defaults,
    pub options: Options,
    pub jamf: Option<JamfSettings>,
    pub network: NetworkSettings,
    pub dotfiles: Option<String>,
}

/// Connection defaults applied when the host token and the command line are silent.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Defaults {
    pub username: Option<String>,
    pub port: Option<u16>,
    pub domain: Option<String>,
}

/// Feature toggles.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Install and use an identity when connecting.
    pub identity: bool,
    /// Query the inventory for an alternate address.
    pub jamf: bool,
}

/// Inventory service details.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct JamfSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    /// Extension attribute holding the last VPN-assigned IP.
    pub ea_vpn: Option<String>,
    /// Extension attribute holding a registered FQDN.
    pub ea_fqdn: Option<String>,
}

/// Canary addresses, probed in file order.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    pub local: Vec<String>,
    pub internet: Vec<String>,
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, SettingsError> {
        // An empty document deserializes to unit, not to a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Resolve the settings file path with priority: parameter -> env var -> default
pub(crate) fn resolve_settings_path(path_param: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Use parameter if provided
    if let Some(path) = path_param {
        return Some(path.to_path_buf());
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        return Some(PathBuf::from(env_path));
    }

    // Priority 3: Default location
    dirs::config_dir().map(|dir| dir.join("sshdash").join("config.yml"))
}

/// Resolve a duration in seconds with priority: parameter -> env var -> default
fn resolve_secs(param: Option<u64>, env_var: &str, default: u64) -> Duration {
    if let Some(secs) = param {
        return Duration::from_secs(secs);
    }

    if let Ok(env_secs) = env::var(env_var)
        && let Ok(secs) = env_secs.parse::<u64>()
    {
        return Duration::from_secs(secs);
    }

    Duration::from_secs(default)
}

/// Resolve the TCP probe timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_tcp_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_secs(timeout_param, TCP_TIMEOUT_ENV_VAR, DEFAULT_TCP_TIMEOUT_SECS)
}

/// Resolve the ICMP reply wait with priority: parameter -> env var -> default
pub(crate) fn resolve_icmp_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_secs(timeout_param, ICMP_TIMEOUT_ENV_VAR, DEFAULT_ICMP_TIMEOUT_SECS)
}

/// Resolve the inventory timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_inventory_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_secs(
        timeout_param,
        INVENTORY_TIMEOUT_ENV_VAR,
        DEFAULT_INVENTORY_TIMEOUT_SECS,
    )
}

/// Resolve the ICMP echo count with priority: parameter -> env var -> default.
/// Zero is never returned.
pub(crate) fn resolve_icmp_count(count_param: Option<u32>) -> u32 {
    if let Some(count) = count_param {
        return count.max(1);
    }

    if let Ok(env_count) = env::var(ICMP_COUNT_ENV_VAR)
        && let Ok(count) = env_count.parse::<u32>()
    {
        return count.max(1);
    }

    DEFAULT_ICMP_COUNT
}

/// Interpret a loosely typed boolean flag value.
///
/// Returns `None` for values that are neither truthy nor falsy.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve whether the inventory lookup is enabled with priority:
/// parameter -> env var -> settings file -> disabled
pub(crate) fn resolve_jamf_enabled(jamf_param: Option<&str>, settings: &Settings) -> bool {
    // Priority 1: Use parameter if provided
    if let Some(enabled) = jamf_param.and_then(parse_flag) {
        return enabled;
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_jamf) = env::var(JAMF_ENV_VAR)
        && let Some(enabled) = parse_flag(&env_jamf)
    {
        return enabled;
    }

    // Priority 3: Settings file
    settings.options.jamf
}

/// Connection defaults after merging the command line, the host token and the
/// settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveDefaults {
    pub user: Option<String>,
    pub port: u16,
    pub domain: Option<String>,
}

/// Merge defaults with priority: command line -> host token -> settings file.
pub(crate) fn resolve_defaults(
    cli_user: Option<&str>,
    cli_port: Option<u16>,
    cli_domain: Option<&str>,
    token_user: Option<&str>,
    token_port: Option<u16>,
    token_domain: Option<&str>,
    settings: &Defaults,
) -> EffectiveDefaults {
    let pick = |a: Option<&str>, b: Option<&str>, c: Option<&str>| {
        a.or(b)
            .or(c)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    EffectiveDefaults {
        user: pick(cli_user, token_user, settings.username.as_deref()),
        port: [cli_port, token_port, settings.port]
            .into_iter()
            .flatten()
            .find(|port| *port > 0)
            .unwrap_or(SSH_PORT),
        domain: pick(cli_domain, token_domain, settings.domain.as_deref()),
    }
}
