//! Collaborator trait definitions.
//!
//! The resolution engine never touches the filesystem, the terminal or the
//! keychain directly. It talks to these traits, which keeps the decision flow
//! testable with in-memory implementations.

use async_trait::async_trait;

use crate::connect::error::{Interrupted, SshConfigError};

/// A host block to append to the SSH config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfigEntry {
    pub alias: String,
    pub hostname: String,
    pub port: u16,
    pub user: Option<String>,
}

/// Read and extend the user's SSH client configuration.
pub trait SshConfigStore: Send + Sync {
    /// Configured `HostName` for `alias`.
    ///
    /// `Some("")` means the alias exists without a `HostName`.
    fn lookup(&self, alias: &str) -> Option<String>;

    /// Append a host block. Fails with [`SshConfigError::AlreadyExists`]
    /// without writing when the alias already has a block.
    fn append_entry(&self, entry: &SshConfigEntry) -> Result<(), SshConfigError>;
}

/// Interactive questions to the user.
///
/// A prompt that cannot be shown yields its default. The only error is
/// [`Interrupted`]: the user pressed Ctrl-C and the run must stop.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn ask_yes_no(&self, question: &str, default: bool) -> Result<bool, Interrupted>;

    async fn ask_text(&self, question: &str, default: Option<&str>)
    -> Result<String, Interrupted>;

    /// Hidden input. Empty when the prompt cannot be shown.
    async fn ask_password(&self, question: &str) -> Result<String, Interrupted>;
}

/// Persistent storage for secrets such as the inventory password.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, key: &str) -> Option<String>;

    /// Returns `false` when the secret could not be stored.
    async fn set_secret(&self, key: &str, value: &str) -> bool;
}

/// VPN state of the local machine.
///
/// The two answers are independent: a machine may have a VPN configured that
/// is not connected.
#[async_trait]
pub trait VpnState: Send + Sync {
    async fn is_vpn_active(&self) -> bool;

    async fn has_vpn_interface(&self) -> bool;
}

/// A user-visible step of a command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TestingHost,
    CheckingInventory,
    TestingAlternate,
    AddingToConfig,
    UpdatingDotfiles,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::TestingHost => "Testing Host...",
            Step::CheckingInventory => "Checking Jamf...",
            Step::TestingAlternate => "Testing Alternate Host...",
            Step::AddingToConfig => "Adding Host to Config",
            Step::UpdatingDotfiles => "Updating Dotfiles...",
        }
    }
}

/// Outcome tag printed after a [`Step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pass,
    Fail,
    Error,
    Success,
    Done,
    Failed,
    /// A value found by the step, such as an alternate address.
    Found(String),
}

impl StepStatus {
    pub fn tag(&self) -> String {
        match self {
            StepStatus::Pass => "[PASS]".to_string(),
            StepStatus::Fail => "[FAIL]".to_string(),
            StepStatus::Error => "[ERROR]".to_string(),
            StepStatus::Success => "[SUCCESS]".to_string(),
            StepStatus::Done => "[DONE]".to_string(),
            StepStatus::Failed => "[FAILED]".to_string(),
            StepStatus::Found(value) => format!("[{}]", value),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StepStatus::Pass | StepStatus::Success | StepStatus::Done | StepStatus::Found(_)
        )
    }
}

/// Receives step progress for display.
pub trait ProgressSink: Send + Sync {
    fn begin(&self, step: Step);

    fn finish(&self, status: StepStatus);

    /// A final message, such as a diagnostic.
    fn report(&self, message: &str);
}
