//! Wildcard-aware SNI to certificate index.
//!
//! Domain patterns are stored reversed so suffix matching becomes prefix
//! matching:
//!
//! ```text
//! "a.com"    → "moc.a$"   exact; the terminator stops "xa.com" matching
//! "*.a.com"  → "moc.a."   wildcard; any further characters match
//! query "x.a.com" → "moc.a.x$" → longest prefix "moc.a." → "*.a.com"
//! ```

use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::model::ResourceKey;
use crate::radixtree::cert::{CertError, TlsCert};
use crate::radixtree::trie::Trie;
use crate::radixtree::{CertMatch, RadixTree, SniMatch};

const TERMINATOR: char = '$';

fn reversed(s: &str) -> String {
    s.chars().rev().collect()
}

/// Trie key for a normalized SNI pattern.
fn encode_pattern(sni: &str) -> String {
    match sni.strip_prefix('*') {
        Some(wildcard) => reversed(wildcard),
        None => {
            let mut key = reversed(sni);
            key.push(TERMINATOR);
            key
        }
    }
}

/// Trie key for a concrete hostname presented at handshake.
fn encode_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let mut key = reversed(&host);
    key.push(TERMINATOR);
    key
}

#[derive(Debug)]
struct TrackedCert {
    cert: Arc<TlsCert>,
    snis: HashSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    secret_map: HashMap<ResourceKey, TrackedCert>,
    path_document_map: HashMap<String, HashSet<ResourceKey>>,
    radix_tree: Trie<String>,
}

impl Inner {
    fn claim(&mut self, sni: &str, obj: &ResourceKey) {
        if !self.path_document_map.contains_key(sni) {
            self.radix_tree.insert(&encode_pattern(sni), sni.to_string());
        }
        self.path_document_map
            .entry(sni.to_string())
            .or_default()
            .insert(obj.clone());
    }

    fn release(&mut self, sni: &str, obj: &ResourceKey) {
        let Some(owners) = self.path_document_map.get_mut(sni) else {
            return;
        };
        owners.remove(obj);
        if owners.is_empty() {
            self.path_document_map.remove(sni);
            self.radix_tree.remove(&encode_pattern(sni));
        }
    }

    fn track(&mut self, obj: &ResourceKey, cert: TlsCert, snis: HashSet<String>) {
        for sni in &snis {
            self.claim(sni, obj);
        }
        self.secret_map.insert(
            obj.clone(),
            TrackedCert {
                cert: Arc::new(cert),
                snis,
            },
        );
    }

    fn untrack(&mut self, obj: &ResourceKey) -> bool {
        let Some(tracked) = self.secret_map.remove(obj) else {
            return false;
        };
        for sni in &tracked.snis {
            self.release(sni, obj);
        }
        true
    }

    /// Swap in new material for a tracked object. True if anything changed.
    fn replace(&mut self, obj: &ResourceKey, cert: TlsCert, snis: HashSet<String>) -> bool {
        let Some(old) = self.secret_map.remove(obj) else {
            self.track(obj, cert, snis);
            return true;
        };

        for sni in old.snis.difference(&snis) {
            self.release(sni, obj);
        }
        for sni in snis.difference(&old.snis) {
            self.claim(sni, obj);
        }

        let changed = old.snis != snis || *old.cert != cert;
        self.secret_map.insert(
            obj.clone(),
            TrackedCert {
                cert: Arc::new(cert),
                snis,
            },
        );
        changed
    }

    fn lookup(&self, host: &str) -> Option<(&String, &HashSet<ResourceKey>)> {
        let (_, sni) = self.radix_tree.longest_prefix(encode_host(host).as_bytes())?;
        let owners = self.path_document_map.get(sni)?;
        Some((sni, owners))
    }
}

/// SNI index guarded by a single read-write lock.
#[derive(Debug, Default)]
pub struct SuffixRadixTree {
    inner: RwLock<Inner>,
}

impl SuffixRadixTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked certificate owners.
    pub fn len(&self) -> usize {
        self.inner.read().secret_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn is_tracked(&self, obj: &ResourceKey) -> bool {
        self.inner.read().secret_map.contains_key(obj)
    }

    /// Distinct SNIs currently claimed, as (document map, trie) sizes.
    #[cfg(test)]
    pub fn sni_counts(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.path_document_map.len(), inner.radix_tree.len())
    }

    /// Owners claiming exactly `sni`.
    #[cfg(test)]
    pub fn owners(&self, sni: &str) -> Vec<ResourceKey> {
        self.inner
            .read()
            .path_document_map
            .get(sni)
            .map(|owners| owners.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn upsert(&self, obj: &ResourceKey, cert: TlsCert) -> Result<bool, CertError> {
        if cert.is_key_encrypted() {
            let removed = self.inner.write().untrack(obj);
            tracing::info!(
                resource = %obj,
                removed,
                "Skipping certificate with encrypted private key"
            );
            return Ok(false);
        }

        // Parse outside the lock; certificates can be large chains
        let snis = cert.sni_set()?;
        let mut inner = self.inner.write();

        if snis.is_empty() {
            let removed = inner.untrack(obj);
            tracing::info!(
                resource = %obj,
                removed,
                "Skipping certificate without any valid SNI"
            );
            return Ok(false);
        }

        if inner.secret_map.contains_key(obj) {
            let changed = inner.replace(obj, cert, snis);
            tracing::debug!(resource = %obj, changed, "Updated certificate");
            Ok(changed)
        } else {
            tracing::debug!(resource = %obj, snis = snis.len(), "Tracked certificate");
            inner.track(obj, cert, snis);
            Ok(true)
        }
    }
}

impl RadixTree for SuffixRadixTree {
    fn insert(&self, obj: &ResourceKey, cert: TlsCert) -> Result<bool, CertError> {
        self.upsert(obj, cert)
    }

    fn update(&self, obj: &ResourceKey, cert: TlsCert) -> Result<bool, CertError> {
        self.upsert(obj, cert)
    }

    fn delete(&self, obj: &ResourceKey) -> bool {
        let removed = self.inner.write().untrack(obj);
        if removed {
            tracing::debug!(resource = %obj, "Deleted certificate");
        }
        removed
    }

    fn match_longest_prefix(&self, host: &str) -> Option<SniMatch> {
        let inner = self.inner.read();
        let (sni, owners) = inner.lookup(host)?;
        let certs = owners
            .iter()
            .filter_map(|owner| inner.secret_map.get(owner))
            .map(|tracked| tracked.cert.clone())
            .collect();
        Some(SniMatch {
            sni: sni.clone(),
            certs,
        })
    }

    fn match_longest_prefix_with_random_cert(&self, host: &str) -> Option<CertMatch> {
        let inner = self.inner.read();
        let (sni, owners) = inner.lookup(host)?;
        // Owners sharing one SNI are interchangeable; no tie-break
        let owner = owners.iter().choose(&mut rand::thread_rng())?;
        let tracked = inner.secret_map.get(owner)?;
        Some(CertMatch {
            sni: sni.clone(),
            cert: tracked.cert.clone(),
        })
    }
}
