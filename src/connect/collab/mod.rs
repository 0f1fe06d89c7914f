//! Collaborators of the resolution engine.
//!
//! Each concern is a trait in [`traits`] with one system implementation:
//!
//! | Trait | Implementation | Backed by |
//! |-------|----------------|-----------|
//! | [`SshConfigStore`] | [`FileSshConfigStore`] | `~/.ssh/config` |
//! | [`Prompt`] | [`DialoguerPrompt`] | terminal prompts |
//! | [`SecretStore`] | [`KeychainSecretStore`] | macOS keychain |
//! | [`VpnState`] | [`SystemVpnState`] | `scutil` or `/sys/class/net` |
//! | [`ProgressSink`] | [`TerminalProgress`] | stdout |

mod progress;
mod prompt;
mod secret;
mod ssh_config;
pub mod traits;
mod vpn;

pub use progress::TerminalProgress;
pub use prompt::DialoguerPrompt;
pub use secret::{KEYCHAIN_SERVICE, KeychainSecretStore};
pub use ssh_config::FileSshConfigStore;
pub use traits::{
    Prompt, ProgressSink, SecretStore, SshConfigEntry, SshConfigStore, Step, StepStatus, VpnState,
};
pub use vpn::SystemVpnState;
