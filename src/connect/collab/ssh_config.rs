//! SSH client config file store.
//!
//! Only the parts of `~/.ssh/config` needed for host resolution are modeled:
//! `Host` aliases and their `HostName`. Wildcard patterns are never matched.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::traits::{SshConfigEntry, SshConfigStore};
use crate::connect::error::SshConfigError;

/// One `Host` block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostBlock {
    aliases: Vec<String>,
    hostname: Option<String>,
}

/// Split a config line into keyword and value. Accepts `key value` and
/// `key=value`.
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let (key, value) = if let Some(eq_pos) = line.find('=') {
        let (k, v) = line.split_at(eq_pos);
        (k.trim(), v[1..].trim())
    } else if let Some(space_pos) = line.find(char::is_whitespace) {
        let (k, v) = line.split_at(space_pos);
        (k.trim(), v.trim())
    } else {
        return None;
    };
    Some((key, value))
}

fn parse_host_blocks(content: &str) -> Vec<HostBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<HostBlock> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = split_keyword(line) else {
            continue;
        };

        match key.to_lowercase().as_str() {
            "host" => {
                blocks.extend(current.take());
                current = Some(HostBlock {
                    aliases: value
                        .split_whitespace()
                        .filter(|a| !a.contains('*') && !a.contains('?') && !a.starts_with('!'))
                        .map(String::from)
                        .collect(),
                    hostname: None,
                });
            }
            // Match blocks end the preceding Host block but are not modeled.
            "match" => blocks.extend(current.take()),
            "hostname" => {
                if let Some(block) = current.as_mut()
                    && block.hostname.is_none()
                {
                    block.hostname = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    blocks.extend(current);
    blocks
}

/// [`SshConfigStore`] backed by an OpenSSH client config file.
pub struct FileSshConfigStore {
    path: PathBuf,
}

impl FileSshConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.ssh/config`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ssh").join("config"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_blocks(&self) -> Vec<HostBlock> {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_host_blocks(&content),
            Err(e) => {
                debug!("Cannot read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> SshConfigError {
        SshConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SshConfigStore for FileSshConfigStore {
    fn lookup(&self, alias: &str) -> Option<String> {
        self.read_blocks()
            .into_iter()
            .find(|block| block.aliases.iter().any(|a| a == alias))
            .map(|block| block.hostname.unwrap_or_default())
    }

    fn append_entry(&self, entry: &SshConfigEntry) -> Result<(), SshConfigError> {
        if self.lookup(&entry.alias).is_some() {
            info!("SSH config already has an entry for {}", entry.alias);
            return Err(SshConfigError::AlreadyExists(entry.alias.clone()));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        file.write_all(render_entry(entry).as_bytes())
            .map_err(|e| self.io_error(e))?;

        info!("Added {} to {}", entry.alias, self.path.display());
        Ok(())
    }
}

fn render_entry(entry: &SshConfigEntry) -> String {
    let mut block = format!(
        "\nHost {}\n    HostName {}\n    Port {}\n",
        entry.alias, entry.hostname, entry.port
    );
    if let Some(user) = entry.user.as_deref().filter(|u| !u.is_empty()) {
        block.push_str(&format!("    User {}\n", user));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(alias: &str) -> SshConfigEntry {
        SshConfigEntry {
            alias: alias.to_string(),
            hostname: format!("{}.example.com", alias),
            port: 22,
            user: Some("alice".to_string()),
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn test_basic_block() {
            let blocks = parse_host_blocks(
                "Host web\n    HostName web.example.com\n    User deploy\n    Port 2222\n",
            );
            assert_eq!(
                blocks,
                vec![HostBlock {
                    aliases: vec!["web".to_string()],
                    hostname: Some("web.example.com".to_string()),
                }]
            );
        }

        #[test]
        fn test_wildcards_are_skipped() {
            let blocks = parse_host_blocks("Host *\n    User root\nHost db* db\n    HostName db.lan\n");
            assert!(blocks[0].aliases.is_empty());
            assert_eq!(blocks[1].aliases, vec!["db".to_string()]);
        }

        #[test]
        fn test_equals_and_case_insensitive_keys() {
            let blocks = parse_host_blocks("host=web\nHOSTNAME = 10.0.0.5\n");
            assert_eq!(blocks[0].hostname.as_deref(), Some("10.0.0.5"));
        }

        #[test]
        fn test_comments_and_blank_lines() {
            let blocks = parse_host_blocks("# comment\n\nHost web\n  # HostName nope\n");
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].hostname, None);
        }

        #[test]
        fn test_lines_before_first_host_are_ignored() {
            let blocks = parse_host_blocks("HostName stray\nHost web\n");
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].hostname, None);
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn test_configured_hostname() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("config");
            fs::write(&path, "Host a b\n    HostName shared.example.com\n").unwrap();
            let store = FileSshConfigStore::new(&path);
            assert_eq!(store.lookup("b").as_deref(), Some("shared.example.com"));
            assert_eq!(store.lookup("c"), None);
        }

        #[test]
        fn test_alias_without_hostname() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("config");
            fs::write(&path, "Host web\n    User alice\n").unwrap();
            let store = FileSshConfigStore::new(&path);
            assert_eq!(store.lookup("web").as_deref(), Some(""));
        }

        #[test]
        fn test_missing_file() {
            let dir = TempDir::new().unwrap();
            let store = FileSshConfigStore::new(dir.path().join("nope"));
            assert_eq!(store.lookup("web"), None);
        }
    }

    mod append {
        use super::*;

        #[test]
        fn test_creates_file_and_directory() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(".ssh").join("config");
            let store = FileSshConfigStore::new(&path);

            store.append_entry(&entry("web")).unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert_eq!(
                content,
                "\nHost web\n    HostName web.example.com\n    Port 22\n    User alice\n"
            );
            assert_eq!(store.lookup("web").as_deref(), Some("web.example.com"));
        }

        #[test]
        fn test_second_append_is_a_no_op() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("config");
            let store = FileSshConfigStore::new(&path);

            store.append_entry(&entry("web")).unwrap();
            let err = store.append_entry(&entry("web")).unwrap_err();
            assert!(matches!(err, SshConfigError::AlreadyExists(ref a) if a == "web"));

            let content = fs::read_to_string(&path).unwrap();
            assert_eq!(content.matches("Host web").count(), 1);
        }

        #[test]
        fn test_preserves_existing_content() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("config");
            fs::write(&path, "Host db\n    HostName db.lan").unwrap();
            let store = FileSshConfigStore::new(&path);

            let mut new = entry("web");
            new.user = None;
            new.port = 2222;
            store.append_entry(&new).unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert!(content.starts_with("Host db\n    HostName db.lan\nHost web\n"));
            assert!(content.ends_with("Port 2222\n"));
            assert!(!content.contains("User"));
            assert_eq!(store.lookup("db").as_deref(), Some("db.lan"));
        }
    }
}
