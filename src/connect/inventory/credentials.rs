//! One-time acquisition of inventory credentials.
//!
//! Credentials are gathered at most once per run, the first time an alternate
//! address is needed, and never re-queried:
//!
//! - **URL**: settings file, else prompted
//! - **Username**: settings file, else prompted (defaults to the login name)
//! - **Password**: `SSHDASH_JAMF_PASSWORD`, else the secret store, else
//!   prompted with an offer to save it

use std::env;
use std::fmt;

use tracing::{debug, warn};

use crate::connect::collab::{Prompt, SecretStore};
use crate::connect::config::JamfSettings;
use crate::connect::error::Interrupted;

/// Secret store key of the inventory password.
pub const SECRET_KEY: &str = "jamf";

/// Environment variable name for the inventory password
pub(crate) const PASSWORD_ENV_VAR: &str = "SSHDASH_JAMF_PASSWORD";

/// Inventory service credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Password from the environment, if set and non-empty.
pub(crate) fn env_password() -> Option<String> {
    env::var(PASSWORD_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
}

/// Name of the local user, used as the default inventory username.
fn login_name() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}

fn configured(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Gather credentials for the inventory service.
///
/// Returns `Ok(None)` when no server URL is configured or entered, which
/// disables the inventory lookup for this run.
pub async fn acquire_credentials(
    settings: &JamfSettings,
    password_override: Option<String>,
    secrets: &dyn SecretStore,
    prompt: &dyn Prompt,
) -> Result<Option<Credentials>, Interrupted> {
    let url = match configured(settings.url.as_ref()) {
        Some(url) => Some(url),
        None => configured(Some(&prompt.ask_text("What is the url for Jamf?", None).await?)),
    };
    let Some(url) = url else {
        warn!("No Jamf URL configured, skipping inventory lookup");
        return Ok(None);
    };

    let username = match configured(settings.username.as_ref()) {
        Some(username) => username,
        None => {
            prompt
                .ask_text("What is the username for Jamf?", login_name().as_deref())
                .await?
        }
    };

    let password = if let Some(password) = password_override {
        debug!("Using Jamf password from {}", PASSWORD_ENV_VAR);
        password
    } else if let Some(password) = secrets.get_secret(SECRET_KEY).await {
        debug!("Using Jamf password from the secret store");
        password
    } else {
        let password = prompt
            .ask_password(&format!("What is the Jamf password for the user {}?", username))
            .await?;
        let save = prompt
            .ask_yes_no(
                "Would you like to save this password in your keychain for the future?",
                false,
            )
            .await?;
        if save && !secrets.set_secret(SECRET_KEY, &password).await {
            warn!("Could not save the Jamf password to the secret store");
        }
        password
    };

    Ok(Some(Credentials {
        url,
        username,
        password,
    }))
}
