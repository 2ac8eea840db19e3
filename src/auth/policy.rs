//! Signing policy: fingerprint to authorized groups
//!
//! The policy is assembled once at startup from two directories: YAML policy
//! files mapping group names to key names, and the agent's public-key files
//! binding each key name to a key blob. Both the MD5 and SHA-256 fingerprint
//! of every key are indexed to the same group set, so the fingerprint form a
//! client presents never matters. The finished index is immutable and shared
//! read-only across sessions.

use crate::auth::fingerprint::{md5_fingerprint, sha256_fingerprint};
use crate::error::{Error, Result};
use ssh_key::PublicKey;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Immutable mapping from key fingerprint to the groups allowed to sign
#[derive(Debug, Clone, Default)]
pub struct Policy {
    entries: HashMap<String, HashSet<String>>,
}

/// Fingerprints derived from one agent-held public key
#[derive(Debug, Clone)]
struct KeyFingerprints {
    md5: String,
    sha256: String,
}

impl Policy {
    /// Build a policy from explicit fingerprint-to-groups entries
    pub fn from_entries(entries: impl IntoIterator<Item = (String, HashSet<String>)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Load the policy from a directory of YAML policy files and a directory
    /// of agent public-key files
    ///
    /// Policy files (`*.yml`, `*.yaml`) each map a group name to a list of
    /// key names; multiple files are merged. A key name with no matching
    /// public key is dropped with a diagnostic. Unreadable directories and
    /// unparseable policy files are startup errors.
    pub fn load(auth_dir: &Path, key_dir: &Path) -> Result<Self> {
        let keys = load_key_index(key_dir)?;
        let mut entries: HashMap<String, HashSet<String>> = HashMap::new();

        for path in policy_files(auth_dir)? {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Policy(format!(
                    "failed to read policy file {}: {}",
                    path.display(),
                    e
                ))
            })?;

            let mapping: BTreeMap<String, Vec<String>> = serde_yaml::from_str(&content)?;

            for (group, key_names) in mapping {
                for name in key_names {
                    match keys.get(&name) {
                        Some(fps) => {
                            entries
                                .entry(fps.md5.clone())
                                .or_default()
                                .insert(group.clone());
                            entries
                                .entry(fps.sha256.clone())
                                .or_default()
                                .insert(group.clone());
                        }
                        None => warn!(
                            key = %name,
                            group = %group,
                            file = %path.display(),
                            "policy entry references unknown key, dropping"
                        ),
                    }
                }
            }
        }

        debug!(fingerprints = entries.len(), "policy index built");
        Ok(Self { entries })
    }

    /// Get the groups allowed to sign with the key identified by
    /// `fingerprint`, in either canonical form
    pub fn allowed_groups(&self, fingerprint: &str) -> Option<&HashSet<String>> {
        self.entries.get(fingerprint)
    }

    /// Check whether any of the given fingerprint forms is authorized for at
    /// least one of the peer's groups
    pub fn authorizes<'a>(
        &self,
        fingerprints: impl IntoIterator<Item = &'a str>,
        groups: &HashSet<String>,
    ) -> bool {
        fingerprints.into_iter().any(|fp| {
            self.allowed_groups(fp)
                .is_some_and(|allowed| !allowed.is_disjoint(groups))
        })
    }

    /// Number of indexed fingerprints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no fingerprints are indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collect `*.yml` / `*.yaml` files from the policy directory
fn policy_files(auth_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(auth_dir).map_err(|e| {
        Error::Policy(format!(
            "failed to read policy directory {}: {}",
            auth_dir.display(),
            e
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Policy(format!(
                "failed to read policy directory {}: {}",
                auth_dir.display(),
                e
            ))
        })?;
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => files.push(path),
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

/// Derive the key-name-to-fingerprints binding from the agent's public keys
///
/// Each `NAME.pub` file supplies the blob whose fingerprints are bound to
/// `NAME`. Files that fail to parse are skipped with a diagnostic.
fn load_key_index(key_dir: &Path) -> Result<HashMap<String, KeyFingerprints>> {
    let entries = std::fs::read_dir(key_dir).map_err(|e| {
        Error::Policy(format!(
            "failed to read key directory {}: {}",
            key_dir.display(),
            e
        ))
    })?;

    let mut keys = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Policy(format!(
                "failed to read key directory {}: {}",
                key_dir.display(),
                e
            ))
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pub") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Policy(format!("failed to read key file {}: {}", path.display(), e))
        })?;

        let public_key: PublicKey = match content.trim().parse() {
            Ok(key) => key,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unparseable public key");
                continue;
            }
        };
        let blob = match public_key.to_bytes() {
            Ok(blob) => blob,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unencodable public key");
                continue;
            }
        };

        keys.insert(
            name.to_string(),
            KeyFingerprints {
                md5: md5_fingerprint(&blob),
                sha256: sha256_fingerprint(&blob),
            },
        );
    }

    debug!(keys = keys.len(), "fingerprinted agent public keys");
    Ok(keys)
}
