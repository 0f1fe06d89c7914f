//! Jamf client built on first use.
//!
//! Most runs never need an alternate address, so nothing about the inventory
//! (keychain access, credential prompts) happens until the primary probe
//! failed and the engine asks for a record.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connect::collab::{Prompt, SecretStore};
use crate::connect::config::JamfSettings;
use crate::connect::error::InventoryError;
use crate::connect::types::InventoryRecord;

use super::credentials::acquire_credentials;
use super::jamf::JamfClient;
use super::traits::Inventory;

/// [`Inventory`] that gathers credentials and builds a [`JamfClient`] the
/// first time it is used.
///
/// The outcome is kept for the rest of the run: credentials are asked for at
/// most once, and a run without a server URL stays without one.
pub struct OnDemandJamf<'a> {
    settings: JamfSettings,
    password_override: Option<String>,
    secrets: &'a dyn SecretStore,
    prompt: &'a dyn Prompt,
    timeout: Duration,
    cancel: CancellationToken,
    client: OnceCell<Option<JamfClient>>,
}

impl<'a> OnDemandJamf<'a> {
    pub fn new(
        settings: JamfSettings,
        password_override: Option<String>,
        secrets: &'a dyn SecretStore,
        prompt: &'a dyn Prompt,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            password_override,
            secrets,
            prompt,
            timeout,
            cancel,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<Option<&JamfClient>, InventoryError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                debug!("Building Jamf client");
                let credentials = acquire_credentials(
                    &self.settings,
                    self.password_override.clone(),
                    self.secrets,
                    self.prompt,
                )
                .await?;
                Ok::<_, InventoryError>(credentials.map(|credentials| {
                    JamfClient::new(&credentials, self.timeout, self.cancel.clone())
                }))
            })
            .await?;
        Ok(client.as_ref())
    }
}

#[async_trait]
impl Inventory for OnDemandJamf<'_> {
    async fn fetch_computer(&self, name: &str) -> Result<InventoryRecord, InventoryError> {
        match self.client().await? {
            Some(client) => client.fetch_computer(name).await,
            None => Err(InventoryError::LookupFailed(
                "no Jamf server configured".to_string(),
            )),
        }
    }

    async fn prepare(&self) -> Result<(), InventoryError> {
        self.client().await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "jamf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::inventory::credentials::tests::{MemorySecrets, ScriptedPrompt};
    use std::sync::atomic::Ordering;

    /// A local address nothing listens on.
    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn settings(url: Option<String>) -> JamfSettings {
        JamfSettings {
            url,
            username: Some("api".to_string()),
            ea_vpn: Some("VPN IP".to_string()),
            ea_fqdn: None,
        }
    }

    #[tokio::test]
    async fn test_nothing_is_gathered_before_first_use() {
        let secrets = MemorySecrets::default();
        let prompt = ScriptedPrompt::new(&["pw"], false);
        let inventory = OnDemandJamf::new(
            settings(Some("jss.example.com".to_string())),
            None,
            &secrets,
            &prompt,
            Duration::from_secs(1),
            CancellationToken::new(),
        );

        assert_eq!(inventory.name(), "jamf");
        assert_eq!(secrets.accesses.load(Ordering::SeqCst), 0);
        assert!(prompt.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_gathered_once_per_run() {
        let secrets = MemorySecrets::default();
        let prompt = ScriptedPrompt::new(&["pw"], false);
        let inventory = OnDemandJamf::new(
            settings(Some(closed_port_url().await)),
            None,
            &secrets,
            &prompt,
            Duration::from_secs(2),
            CancellationToken::new(),
        );

        inventory.prepare().await.unwrap();
        for _ in 0..2 {
            assert!(matches!(
                inventory.fetch_computer("mac-01").await,
                Err(InventoryError::LookupFailed(_))
            ));
        }

        assert_eq!(secrets.accesses.load(Ordering::SeqCst), 1);
        // Password, then the offer to save it.
        assert_eq!(prompt.asked.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_url_is_remembered() {
        let secrets = MemorySecrets::default();
        let prompt = ScriptedPrompt::new(&[""], false);
        let inventory = OnDemandJamf::new(
            settings(None),
            None,
            &secrets,
            &prompt,
            Duration::from_secs(1),
            CancellationToken::new(),
        );

        for _ in 0..2 {
            assert_eq!(
                inventory.fetch_computer("mac-01").await,
                Err(InventoryError::LookupFailed(
                    "no Jamf server configured".to_string()
                ))
            );
        }
        assert_eq!(*prompt.asked.lock().unwrap(), vec!["What is the url for Jamf?"]);
    }

    #[tokio::test]
    async fn test_interrupted_credential_prompt() {
        let secrets = MemorySecrets::default();
        let prompt = ScriptedPrompt::interrupted();
        let inventory = OnDemandJamf::new(
            settings(Some("jss.example.com".to_string())),
            None,
            &secrets,
            &prompt,
            Duration::from_secs(1),
            CancellationToken::new(),
        );

        assert_eq!(inventory.prepare().await, Err(InventoryError::Interrupted));
        assert_eq!(
            inventory.fetch_computer("mac-01").await,
            Err(InventoryError::Interrupted)
        );
    }
}
