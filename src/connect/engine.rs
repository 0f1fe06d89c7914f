//! The host resolution engine.
//!
//! One pass, no loops back:
//!
//! 1. Parse the host token
//! 2. Look the alias up in the SSH config
//! 3. Otherwise build the FQDN, offering to register undotted hosts
//! 4. Probe TCP 22 on the working FQDN
//! 5. On failure, ask the inventory for an alternate address
//! 6. Probe TCP 22 on the alternate
//! 7. If everything failed, pick exactly one diagnostic
//!
//! Collaborator failures never abort the pass. They only remove an option
//! (no alternate, no registration) and the flow carries on. The exception is
//! an interrupted prompt, which ends the pass before anything is written.

use tracing::{debug, info, warn};

use crate::connect::alternate::{AlternateHostResolver, AlternateLookup};
use crate::connect::collab::{
    ProgressSink, Prompt, SshConfigEntry, SshConfigStore, Step, StepStatus, VpnState,
};
use crate::connect::config::{EffectiveDefaults, NetworkSettings, Settings, resolve_defaults};
use crate::connect::error::{Interrupted, InventoryError, ResolveError};
use crate::connect::probe::{Prober, any_reachable};
use crate::connect::types::{
    ConnectivityClassification, Diagnostic, HostSpec, ProbeResult, Resolution, ResolvedEndpoint,
    SSH_PORT,
};

/// Connection defaults given on the command line. They win over the host
/// token and the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultOverrides {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub domain: Option<String>,
}

/// Everything the engine talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub ssh_config: &'a dyn SshConfigStore,
    pub prompt: &'a dyn Prompt,
    pub prober: &'a dyn Prober,
    pub vpn: &'a dyn VpnState,
    pub progress: &'a dyn ProgressSink,
}

/// How the working FQDN was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkingHost {
    fqdn: String,
    registered: bool,
}

/// Resolves host tokens to connectable endpoints.
pub struct HostResolutionEngine<'a> {
    collab: Collaborators<'a>,
    settings: &'a Settings,
    overrides: DefaultOverrides,
    alternate: Option<AlternateHostResolver<'a>>,
}

impl<'a> HostResolutionEngine<'a> {
    pub fn new(
        collab: Collaborators<'a>,
        settings: &'a Settings,
        overrides: DefaultOverrides,
    ) -> Self {
        Self {
            collab,
            settings,
            overrides,
            alternate: None,
        }
    }

    /// Enable alternate lookup through the inventory.
    pub fn with_alternate(mut self, resolver: AlternateHostResolver<'a>) -> Self {
        self.alternate = Some(resolver);
        self
    }

    /// Defaults in effect for `spec`.
    pub fn effective_defaults(&self, spec: &HostSpec) -> EffectiveDefaults {
        resolve_defaults(
            self.overrides.user.as_deref(),
            self.overrides.port,
            self.overrides.domain.as_deref(),
            spec.user.as_deref(),
            spec.port,
            spec.inferred_domain.as_deref(),
            &self.settings.defaults,
        )
    }

    /// Run the full resolution for a raw host token.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution, ResolveError> {
        let spec = HostSpec::parse(raw)?;
        let defaults = self.effective_defaults(&spec);
        debug!("Resolving {:?} with defaults {:?}", spec, defaults);

        let working = self.working_host(&spec, &defaults).await?;
        info!("Working FQDN for {} is {}", spec.host, working.fqdn);

        if let Some(endpoint) = self.probe_endpoints(&spec, &working.fqdn).await? {
            return Ok(Resolution::Resolved {
                spec,
                endpoint,
                registered: working.registered,
            });
        }

        let (probe, classification, diagnostic) = self.diagnose(&working.fqdn).await;
        warn!("{} unreachable: {}", working.fqdn, diagnostic);
        Ok(Resolution::Unreachable {
            spec,
            probe,
            classification,
            diagnostic,
        })
    }

    /// Steps 2 and 3: SSH config lookup, then FQDN construction.
    async fn working_host(
        &self,
        spec: &HostSpec,
        defaults: &EffectiveDefaults,
    ) -> Result<WorkingHost, Interrupted> {
        let unregistered = |fqdn: String| WorkingHost {
            fqdn,
            registered: false,
        };

        let working = match self.collab.ssh_config.lookup(&spec.host) {
            Some(hostname) if !hostname.trim().is_empty() => {
                debug!("SSH config maps {} to {}", spec.host, hostname);
                unregistered(hostname.trim().to_string())
            }
            Some(_) => match defaults.domain.as_deref() {
                Some(domain) => unregistered(format!("{}.{}", spec.host, domain)),
                None => unregistered(spec.host.clone()),
            },
            None if spec.host.contains('.') => unregistered(spec.host.clone()),
            None => {
                let add = self
                    .collab
                    .prompt
                    .ask_yes_no("This host is not in your SSH config.  Add it?", true)
                    .await?;
                if add {
                    WorkingHost {
                        fqdn: self.register(spec, defaults).await?,
                        registered: true,
                    }
                } else {
                    unregistered(spec.host.clone())
                }
            }
        };
        Ok(working)
    }

    /// Interactive SSH config registration. Returns the answered FQDN, which
    /// is used even when writing the entry fails. Nothing is written when a
    /// question is interrupted.
    async fn register(
        &self,
        spec: &HostSpec,
        defaults: &EffectiveDefaults,
    ) -> Result<String, Interrupted> {
        let prompt = self.collab.prompt;
        let default_fqdn = defaults
            .domain
            .as_deref()
            .map(|domain| format!("{}.{}", spec.host, domain));

        let alias = non_empty(
            prompt
                .ask_text("What is the alias for this entry?", Some(spec.host.as_str()))
                .await?,
        )
        .unwrap_or_else(|| spec.host.clone());
        let fqdn = non_empty(
            prompt
                .ask_text("What is the fully qualified domain name?", default_fqdn.as_deref())
                .await?,
        )
        .unwrap_or_else(|| spec.host.clone());
        let user = non_empty(
            prompt
                .ask_text("What username should be used to connect?", defaults.user.as_deref())
                .await?,
        );
        let port = ask_port(prompt, defaults.port).await?;

        let entry = SshConfigEntry {
            alias,
            hostname: fqdn.clone(),
            port,
            user,
        };

        self.collab.progress.begin(Step::AddingToConfig);
        match self.collab.ssh_config.append_entry(&entry) {
            Ok(()) => self.collab.progress.finish(StepStatus::Success),
            Err(e) => {
                warn!("Could not add {} to the SSH config: {}", entry.alias, e);
                self.collab.progress.finish(StepStatus::Error);
            }
        }

        Ok(fqdn)
    }

    /// Steps 4 to 6.
    async fn probe_endpoints(
        &self,
        spec: &HostSpec,
        fqdn: &str,
    ) -> Result<Option<ResolvedEndpoint>, Interrupted> {
        let progress = self.collab.progress;

        progress.begin(Step::TestingHost);
        if self.collab.prober.tcp_reachable(fqdn, SSH_PORT).await {
            progress.finish(StepStatus::Pass);
            return Ok(Some(ResolvedEndpoint {
                fqdn_or_ip: fqdn.to_string(),
                via_alternate: false,
            }));
        }
        progress.finish(StepStatus::Fail);

        let Some(resolver) = self.alternate.as_ref() else {
            return Ok(None);
        };

        // Credential prompts happen here, before the step line is printed.
        let prepared = resolver.prepare().await;
        if matches!(prepared, Err(InventoryError::Interrupted)) {
            return Err(Interrupted);
        }

        progress.begin(Step::CheckingInventory);
        let lookup = match prepared {
            Ok(()) => resolver.resolve(&spec.host).await,
            Err(e) => AlternateLookup::Failed(e),
        };
        let alternate = match lookup {
            AlternateLookup::Found(alternate) => alternate,
            AlternateLookup::Absent => {
                progress.finish(StepStatus::Error);
                return Ok(None);
            }
            AlternateLookup::Failed(InventoryError::Interrupted) => {
                progress.finish(StepStatus::Error);
                return Err(Interrupted);
            }
            AlternateLookup::Failed(e) => {
                debug!("Continuing without alternate: {}", e);
                progress.finish(StepStatus::Error);
                return Ok(None);
            }
        };
        progress.finish(StepStatus::Found(alternate.address.clone()));

        progress.begin(Step::TestingAlternate);
        if self
            .collab
            .prober
            .tcp_reachable(&alternate.address, SSH_PORT)
            .await
        {
            progress.finish(StepStatus::Pass);
            return Ok(Some(ResolvedEndpoint {
                fqdn_or_ip: alternate.address,
                via_alternate: true,
            }));
        }
        progress.finish(StepStatus::Fail);
        Ok(None)
    }

    /// Step 7: exactly one diagnostic, checks stop at the first conclusive
    /// answer.
    async fn diagnose(
        &self,
        fqdn: &str,
    ) -> (ProbeResult, ConnectivityClassification, Diagnostic) {
        let prober = self.collab.prober;
        let network: &NetworkSettings = &self.settings.network;

        let mut probe = ProbeResult::new(fqdn);
        probe.reachable_icmp = prober.icmp_reachable(fqdn).await;
        if probe.reachable_icmp {
            return (
                probe,
                ConnectivityClassification::NoneDetermined,
                Diagnostic::SshRefused {
                    host: fqdn.to_string(),
                },
            );
        }

        let local_up = any_reachable(prober, &network.local).await;
        let mut vpn_active = false;
        if !local_up {
            vpn_active = self.collab.vpn.is_vpn_active().await;
            if !vpn_active && self.collab.vpn.has_vpn_interface().await {
                return (
                    probe,
                    ConnectivityClassification::NoneDetermined,
                    Diagnostic::CheckVpn,
                );
            }
        }

        let classification = if vpn_active {
            ConnectivityClassification::VpnActive
        } else if local_up {
            ConnectivityClassification::LocalNetworkUp
        } else {
            ConnectivityClassification::NoneDetermined
        };

        if !any_reachable(prober, &network.internet).await {
            return (probe, classification, Diagnostic::NoInternet);
        }

        (
            probe,
            ConnectivityClassification::InternetUp,
            Diagnostic::HostUnreachable {
                host: fqdn.to_string(),
            },
        )
    }
}

fn non_empty(answer: String) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

/// Ask for a port until the answer is a valid port number.
///
/// A default of 0 is not a port and is replaced by the SSH port.
async fn ask_port(prompt: &dyn Prompt, default: u16) -> Result<u16, Interrupted> {
    let default = if default > 0 { default } else { SSH_PORT };
    let default_text = default.to_string();
    loop {
        let answer = prompt
            .ask_text("What port should be used to connect?", Some(default_text.as_str()))
            .await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<u16>() {
            Ok(port) if port > 0 => return Ok(port),
            _ => debug!("Not a port: {:?}", answer),
        }
    }
}
