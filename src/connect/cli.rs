//! Command line definition.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "sshdash", version)]
#[command(
    about = "Connects to a host via SSH, automatically negotiating needed hostname or IP lookup."
)]
pub struct CommandLine {
    /// Host to connect to, as [user@]host[:port]
    pub host: String,

    /// Domain appended to bare host names
    #[arg(long, value_name = "DOMAIN")]
    pub default_domain: Option<String>,

    /// User to connect as when the host gives none
    #[arg(long, value_name = "USER")]
    pub default_user: Option<String>,

    /// Port to connect to when the host gives none
    #[arg(long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub default_port: Option<u16>,

    /// Identity file to install and use, or "false"
    #[arg(short, long, value_name = "PATH")]
    pub identity: Option<String>,

    /// Directory of dotfiles to push before connecting, or "false"
    #[arg(long, value_name = "DIR")]
    pub dotfiles: Option<String>,

    /// Look up alternate addresses in Jamf
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub jamf: Option<String>,

    /// Settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log level for the verbosity count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
