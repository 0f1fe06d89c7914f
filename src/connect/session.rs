//! Session launch.
//!
//! Everything after resolution runs through external OpenSSH tools:
//!
//! - **Identity**: `ssh ... whoami` checks key auth, `ssh-copy-id` installs
//!   the key when it is missing
//! - **Dotfiles**: `rsync` dry run, then the real transfer when something
//!   changed
//! - **Connect**: interactive `ssh` with inherited stdio

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::connect::collab::{ProgressSink, Step, StepStatus};
use crate::connect::error::SessionError;
use crate::connect::types::SSH_PORT;

/// Which identity to use when connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChoice {
    Disabled,
    /// Install and use the default identity of the SSH client.
    Default,
    File(PathBuf),
}

impl IdentityChoice {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, IdentityChoice::Disabled)
    }

    fn path(&self) -> Option<&Path> {
        match self {
            IdentityChoice::File(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

fn is_disabled(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("false")
}

/// Pick the identity from `--identity` and the `options.identity` toggle.
///
/// A given path must be a readable file; this is checked before anything
/// touches the network.
pub fn resolve_identity(
    identity_param: Option<&str>,
    use_identity: bool,
) -> Result<IdentityChoice, SessionError> {
    match identity_param {
        Some(value) if is_disabled(value) => Ok(IdentityChoice::Disabled),
        Some(value) => {
            let path = PathBuf::from(value.trim());
            if path.is_file() && std::fs::File::open(&path).is_ok() {
                Ok(IdentityChoice::File(path))
            } else {
                Err(SessionError::IdentityFileUnreadable(path))
            }
        }
        None if use_identity => Ok(IdentityChoice::Default),
        None => Ok(IdentityChoice::Disabled),
    }
}

/// Pick the dotfile directory from `--dotfiles` and the settings file.
/// Anything that is not a directory disables the sync.
pub fn resolve_dotfiles(dotfiles_param: Option<&str>, configured: Option<&str>) -> Option<PathBuf> {
    let value = dotfiles_param.or(configured)?;
    if is_disabled(value) {
        return None;
    }
    let dir = PathBuf::from(value.trim());
    if dir.is_dir() {
        Some(dir)
    } else {
        debug!("Dotfiles path {} is not a directory", dir.display());
        None
    }
}

/// `user@host`, or the bare host when no user is known.
pub fn connection_string(user: Option<&str>, host: &str) -> String {
    match user.filter(|u| !u.is_empty()) {
        Some(user) => format!("{}@{}", user, host),
        None => host.to_string(),
    }
}

fn key_check_args(conn: &str) -> Vec<String> {
    [
        "-o",
        "StrictHostKeyChecking=no",
        "-o",
        "PreferredAuthentications=publickey",
        "-q",
        conn,
        "whoami",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Whether `whoami` output proves key authentication worked.
fn key_installed(whoami: &str, user: Option<&str>) -> bool {
    let who = whoami.trim();
    match user {
        Some(user) => who == user,
        None => !who.is_empty(),
    }
}

fn copy_id_args(conn: &str, identity: &IdentityChoice) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = identity.path() {
        args.push("-i".to_string());
        args.push(path.display().to_string());
    }
    args.push(conn.to_string());
    args
}

/// Dotfiles matched by the shell pattern `.??*`.
fn dotfile_sources(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list dotfiles in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut sources: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with('.') && name.chars().count() >= 3
        })
        .map(|entry| entry.path())
        .collect();
    sources.sort();
    sources
}

fn rsync_args(sources: &[PathBuf], conn: &str, dry_run: bool) -> Vec<String> {
    let mut args: Vec<String> = ["--exclude", ".git/", "--exclude", ".idea/", "-a", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if dry_run {
        args.push("--dry-run".to_string());
    }
    args.push("--no-perms".to_string());
    args.extend(sources.iter().map(|p| p.display().to_string()));
    args.push(format!("{}:", conn));
    args
}

/// File names from rsync `-i` itemized output.
fn itemized_files(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect()
}

fn ssh_args(conn: &str, port: u16, identity: &IdentityChoice) -> Vec<String> {
    let mut args = Vec::new();
    if port != SSH_PORT {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    if let Some(path) = identity.path() {
        args.push("-i".to_string());
        args.push(path.display().to_string());
    }
    args.push(conn.to_string());
    args
}

/// Launches the interactive session for a resolved endpoint.
pub struct SessionLauncher<'a> {
    progress: &'a dyn ProgressSink,
}

impl<'a> SessionLauncher<'a> {
    pub fn new(progress: &'a dyn ProgressSink) -> Self {
        Self { progress }
    }

    /// Make sure key authentication works, installing the key otherwise.
    pub async fn ensure_identity(&self, conn: &str, user: Option<&str>, identity: &IdentityChoice) {
        if !identity.is_enabled() {
            return;
        }

        let check = Command::new("ssh")
            .args(key_check_args(conn))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        let installed = match check {
            Ok(out) => key_installed(&String::from_utf8_lossy(&out.stdout), user),
            Err(e) => {
                warn!("Key check for {} failed: {}", conn, e);
                false
            }
        };
        if installed {
            debug!("Key authentication to {} works", conn);
            return;
        }

        println!(
            "Transferring Identity.  Remote Password for {} will be prompted for!",
            conn
        );
        match Command::new("ssh-copy-id")
            .args(copy_id_args(conn, identity))
            .status()
            .await
        {
            Ok(status) if status.success() => info!("Installed identity on {}", conn),
            Ok(status) => warn!("ssh-copy-id exited with {}", status),
            Err(e) => warn!("Failed to run ssh-copy-id: {}", e),
        }
    }

    /// Push changed dotfiles from `dir` to the remote home directory.
    pub async fn sync_dotfiles(&self, dir: &Path, conn: &str) {
        let sources = dotfile_sources(dir);
        if sources.is_empty() {
            debug!("No dotfiles in {}", dir.display());
            return;
        }

        let dry_run = match Command::new("rsync")
            .args(rsync_args(&sources, conn, true))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
        {
            Ok(out) if out.status.success() => out,
            Ok(out) => {
                debug!("rsync dry run exited with {}", out.status);
                return;
            }
            Err(e) => {
                warn!("Failed to run rsync: {}", e);
                return;
            }
        };
        if dry_run.stdout.is_empty() {
            debug!("Dotfiles on {} are up to date", conn);
            return;
        }

        self.progress.begin(Step::UpdatingDotfiles);
        let real = Command::new("rsync")
            .args(rsync_args(&sources, conn, false))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match real {
            Ok(out) if out.status.success() && !out.stdout.is_empty() => {
                self.progress.finish(StepStatus::Done);
                let output = String::from_utf8_lossy(&out.stdout);
                for file in itemized_files(&output) {
                    debug!("  {}", file);
                }
            }
            Ok(out) => {
                debug!("rsync exited with {}", out.status);
                self.progress.finish(StepStatus::Failed);
            }
            Err(e) => {
                warn!("Failed to run rsync: {}", e);
                self.progress.finish(StepStatus::Failed);
            }
        }
    }

    /// Run the interactive `ssh` session and wait for it to end.
    pub async fn connect(
        &self,
        conn: &str,
        port: u16,
        identity: &IdentityChoice,
    ) -> Result<ExitStatus, SessionError> {
        println!("Connecting to {} ...", conn);
        println!();

        let status = Command::new("ssh")
            .args(ssh_args(conn, port, identity))
            .status()
            .await
            .map_err(|source| SessionError::Spawn {
                program: "ssh",
                source,
            })?;

        info!("ssh session to {} ended with {}", conn, status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod identity {
        use super::*;

        #[test]
        fn test_readable_file() {
            let dir = TempDir::new().unwrap();
            let key = dir.path().join("id_ed25519");
            std::fs::write(&key, "key").unwrap();
            let choice = resolve_identity(key.to_str(), false).unwrap();
            assert_eq!(choice, IdentityChoice::File(key));
        }

        #[test]
        fn test_missing_file_is_fatal() {
            let err = resolve_identity(Some("/nonexistent/id_rsa"), true).unwrap_err();
            assert!(matches!(
                err,
                SessionError::IdentityFileUnreadable(ref p) if p == Path::new("/nonexistent/id_rsa")
            ));
        }

        #[test]
        fn test_directory_is_not_an_identity() {
            let dir = TempDir::new().unwrap();
            assert!(resolve_identity(dir.path().to_str(), false).is_err());
        }

        #[test]
        fn test_false_disables() {
            assert_eq!(resolve_identity(Some("False"), true).unwrap(), IdentityChoice::Disabled);
        }

        #[test]
        fn test_settings_toggle() {
            assert_eq!(resolve_identity(None, true).unwrap(), IdentityChoice::Default);
            assert_eq!(resolve_identity(None, false).unwrap(), IdentityChoice::Disabled);
        }

        #[test]
        fn test_key_installed() {
            assert!(key_installed("alice\n", Some("alice")));
            assert!(!key_installed("", Some("alice")));
            assert!(!key_installed("root\n", Some("alice")));
            assert!(key_installed("alice\n", None));
        }

        #[test]
        fn test_copy_id_args() {
            let file = IdentityChoice::File(PathBuf::from("/home/a/.ssh/id_rsa"));
            assert_eq!(
                copy_id_args("a@web", &file),
                vec!["-i", "/home/a/.ssh/id_rsa", "a@web"]
            );
            assert_eq!(copy_id_args("a@web", &IdentityChoice::Default), vec!["a@web"]);
        }

        #[test]
        fn test_key_check_args() {
            assert_eq!(
                key_check_args("a@web").join(" "),
                "-o StrictHostKeyChecking=no -o PreferredAuthentications=publickey -q a@web whoami"
            );
        }
    }

    mod dotfiles {
        use super::*;

        #[test]
        fn test_resolve_prefers_parameter() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().to_str().unwrap();
            assert_eq!(
                resolve_dotfiles(Some(path), Some("/nonexistent")),
                Some(dir.path().to_path_buf())
            );
            assert_eq!(resolve_dotfiles(None, Some(path)), Some(dir.path().to_path_buf()));
        }

        #[test]
        fn test_resolve_disabled() {
            let dir = TempDir::new().unwrap();
            assert_eq!(resolve_dotfiles(Some("false"), dir.path().to_str()), None);
            assert_eq!(resolve_dotfiles(Some("/nonexistent/dotfiles"), None), None);
            assert_eq!(resolve_dotfiles(None, None), None);
        }

        #[test]
        fn test_sources_match_dot_pattern() {
            let dir = TempDir::new().unwrap();
            for name in [".bashrc", ".vimrc", ".a", "README", ".git"] {
                std::fs::write(dir.path().join(name), "").unwrap();
            }
            let names: Vec<String> = dotfile_sources(dir.path())
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
                .collect();
            assert_eq!(names, vec![".bashrc", ".git", ".vimrc"]);
        }

        #[test]
        fn test_rsync_args() {
            let sources = vec![PathBuf::from("/d/.bashrc")];
            assert_eq!(
                rsync_args(&sources, "a@web", true).join(" "),
                "--exclude .git/ --exclude .idea/ -a -i --dry-run --no-perms /d/.bashrc a@web:"
            );
            assert!(!rsync_args(&sources, "a@web", false).contains(&"--dry-run".to_string()));
        }

        #[test]
        fn test_itemized_files() {
            let output = "<f.st...... .bashrc\n<f+++++++++ .vimrc\n\n";
            assert_eq!(itemized_files(output), vec![".bashrc", ".vimrc"]);
        }
    }

    mod connect {
        use super::*;

        #[test]
        fn test_connection_string() {
            assert_eq!(connection_string(Some("alice"), "web"), "alice@web");
            assert_eq!(connection_string(Some(""), "web"), "web");
            assert_eq!(connection_string(None, "10.0.0.5"), "10.0.0.5");
        }

        #[test]
        fn test_default_port_is_omitted() {
            assert_eq!(ssh_args("a@web", 22, &IdentityChoice::Default), vec!["a@web"]);
        }

        #[test]
        fn test_port_and_identity() {
            let file = IdentityChoice::File(PathBuf::from("/k"));
            assert_eq!(
                ssh_args("a@web", 2222, &file),
                vec!["-p", "2222", "-i", "/k", "a@web"]
            );
        }
    }
}
