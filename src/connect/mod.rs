//! Host resolution and session launch for `sshdash`.
//!
//! A run turns a `[user@]host[:port]` token into a connectable endpoint and
//! hands it to `ssh`:
//!
//! - [`host_spec`]: token parsing and domain inference
//! - [`engine`]: the resolution flow, from SSH config lookup to diagnostics
//! - [`probe`]: TCP and ICMP reachability
//! - [`inventory`] and [`alternate`]: alternate addresses from Jamf
//! - [`collab`]: SSH config, prompts, keychain, VPN state and progress output
//! - [`session`]: identity install, dotfile sync and the interactive session
//! - [`command`]: wiring of all of the above for one run

pub mod alternate;
pub mod cli;
pub mod collab;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod host_spec;
pub mod inventory;
pub mod probe;
pub mod session;
pub mod types;
