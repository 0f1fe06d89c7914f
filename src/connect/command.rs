//! One command run, from the host token to the interactive session.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connect::alternate::AlternateHostResolver;
use crate::connect::cli::CommandLine;
use crate::connect::collab::{
    DialoguerPrompt, FileSshConfigStore, KeychainSecretStore, ProgressSink, SystemVpnState,
    TerminalProgress,
};
use crate::connect::config::{
    Settings, resolve_icmp_count, resolve_icmp_timeout, resolve_inventory_timeout,
    resolve_jamf_enabled, resolve_settings_path, resolve_tcp_timeout,
};
use crate::connect::engine::{Collaborators, DefaultOverrides, HostResolutionEngine};
use crate::connect::error::{CommandError, ResolveError, SettingsError};
use crate::connect::inventory::{OnDemandJamf, env_password};
use crate::connect::probe::SystemProber;
use crate::connect::session::{
    SessionLauncher, connection_string, resolve_dotfiles, resolve_identity,
};
use crate::connect::types::Resolution;

/// Session launched.
pub const EXIT_SUCCESS: u8 = 0;

/// Diagnostic outcome or fatal error.
pub const EXIT_ERROR: u8 = 1;

/// Interrupted before a session was launched.
pub const EXIT_CANCELLED: u8 = 130;

/// Load the settings file named on the command line, in the environment or at
/// the default location.
pub fn load_settings(cli: &CommandLine) -> Result<Settings, SettingsError> {
    match resolve_settings_path(cli.config.as_deref()) {
        Some(path) => {
            debug!("Loading settings from {}", path.display());
            Settings::load(&path)
        }
        None => Ok(Settings::default()),
    }
}

fn overrides(cli: &CommandLine) -> DefaultOverrides {
    DefaultOverrides {
        user: cli.default_user.clone(),
        port: cli.default_port,
        domain: cli.default_domain.clone(),
    }
}

fn ssh_config_path() -> PathBuf {
    FileSshConfigStore::default_path().unwrap_or_else(|| PathBuf::from(".ssh").join("config"))
}

/// Run the command. Returns the process exit status; fatal errors are
/// returned for the caller to print.
pub async fn run(cli: CommandLine, cancel: CancellationToken) -> Result<u8, CommandError> {
    let settings = load_settings(&cli)?;
    let identity = resolve_identity(cli.identity.as_deref(), settings.options.identity)?;

    let ssh_config = FileSshConfigStore::new(ssh_config_path());
    let prompt = DialoguerPrompt::new(cancel.clone());
    let secrets = KeychainSecretStore::default();
    let vpn = SystemVpnState::new();
    let progress = TerminalProgress;
    let prober = SystemProber::new(
        resolve_tcp_timeout(None),
        resolve_icmp_timeout(None),
        resolve_icmp_count(None),
        cancel.clone(),
    );

    // Credentials are only gathered once the primary probe has failed.
    let jamf_settings = settings.jamf.clone().unwrap_or_default();
    let inventory = if !resolve_jamf_enabled(cli.jamf.as_deref(), &settings) {
        None
    } else if jamf_settings.ea_vpn.is_none() && jamf_settings.ea_fqdn.is_none() {
        info!("No Jamf extension attributes configured, skipping inventory lookup");
        None
    } else {
        Some(OnDemandJamf::new(
            jamf_settings.clone(),
            env_password(),
            &secrets,
            &prompt,
            resolve_inventory_timeout(None),
            cancel.clone(),
        ))
    };

    let mut engine = HostResolutionEngine::new(
        Collaborators {
            ssh_config: &ssh_config,
            prompt: &prompt,
            prober: &prober,
            vpn: &vpn,
            progress: &progress,
        },
        &settings,
        overrides(&cli),
    );
    if let Some(client) = inventory.as_ref() {
        engine = engine.with_alternate(AlternateHostResolver::new(
            client,
            jamf_settings.ea_vpn.clone(),
            jamf_settings.ea_fqdn.clone(),
        ));
    }

    println!();
    let resolution = tokio::select! {
        resolution = engine.resolve(&cli.host) => match resolution {
            Ok(resolution) => resolution,
            Err(ResolveError::Interrupted(_)) => {
                debug!("Interrupted at a prompt");
                return Ok(EXIT_CANCELLED);
            }
            Err(e) => return Err(e.into()),
        },
        _ = cancel.cancelled() => return Ok(EXIT_CANCELLED),
    };
    if cancel.is_cancelled() {
        return Ok(EXIT_CANCELLED);
    }

    let (spec, endpoint) = match resolution {
        Resolution::Resolved { spec, endpoint, .. } => (spec, endpoint),
        Resolution::Unreachable { diagnostic, .. } => {
            progress.report(&diagnostic.to_string());
            return Ok(EXIT_ERROR);
        }
    };

    let defaults = engine.effective_defaults(&spec);
    let conn = connection_string(defaults.user.as_deref(), &endpoint.fqdn_or_ip);
    info!(
        "Resolved {} to {} (alternate: {})",
        spec.raw_input, endpoint.fqdn_or_ip, endpoint.via_alternate
    );

    let launcher = SessionLauncher::new(&progress);
    launcher
        .ensure_identity(&conn, defaults.user.as_deref(), &identity)
        .await;
    if let Some(dir) = resolve_dotfiles(cli.dotfiles.as_deref(), settings.dotfiles.as_deref()) {
        launcher.sync_dotfiles(&dir, &conn).await;
    }
    launcher.connect(&conn, defaults.port, &identity).await?;

    Ok(EXIT_SUCCESS)
}
