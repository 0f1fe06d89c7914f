//! Secret storage in the macOS keychain.
//!
//! The `security` command line tool is used so no keychain bindings are
//! linked. On other platforms, or when the tool fails, nothing is stored and
//! lookups come back empty.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::SecretStore;

/// Keychain service name under which secrets are filed.
pub const KEYCHAIN_SERVICE: &str = "sshdash";

/// [`SecretStore`] using `security find-generic-password` and
/// `add-generic-password`.
#[derive(Debug, Clone)]
pub struct KeychainSecretStore {
    service: String,
}

impl KeychainSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn find_args<'a>(&'a self, key: &'a str) -> [&'a str; 6] {
        ["find-generic-password", "-s", &self.service, "-a", key, "-w"]
    }
}

impl Default for KeychainSecretStore {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

#[async_trait]
impl SecretStore for KeychainSecretStore {
    async fn get_secret(&self, key: &str) -> Option<String> {
        let output = Command::new("security")
            .args(self.find_args(key))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let secret = String::from_utf8_lossy(&out.stdout)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                (!secret.is_empty()).then_some(secret)
            }
            Ok(out) => {
                debug!("No keychain item for {}/{} ({})", self.service, key, out.status);
                None
            }
            Err(e) => {
                debug!("Keychain unavailable: {}", e);
                None
            }
        }
    }

    async fn set_secret(&self, key: &str, value: &str) -> bool {
        let status = Command::new("security")
            .args([
                "add-generic-password",
                "-U",
                "-s",
                &self.service,
                "-a",
                key,
                "-w",
                value,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!("Could not store keychain item {}/{}: {}", self.service, key, status);
                false
            }
            Err(e) => {
                warn!("Keychain unavailable: {}", e);
                false
            }
        }
    }
}
