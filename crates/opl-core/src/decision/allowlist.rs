//! User allow-list and its persistence
//!
//! Domains the user has chosen to always allow. Membership covers the
//! domain and all of its subdomains, and short-circuits blocklist matching.

use crate::blocklist::{normalize_domain, normalize_host, suffixes};
use crate::error::{Error, Result};
use dashmap::DashSet;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable string-set storage for the allow-list
pub trait AllowListStore: Send + Sync {
    /// Load the stored domains
    fn load(&self) -> Result<HashSet<String>>;

    /// Replace the stored domains
    fn save(&self, domains: &HashSet<String>) -> Result<()>;
}

/// Allow-list backed by a plain text file
///
/// File format:
/// - One domain per line
/// - Lines starting with # are comments
/// - Empty lines are ignored
#[derive(Debug, Clone)]
pub struct FileAllowListStore {
    path: PathBuf,
}

impl FileAllowListStore {
    /// Create a store for `path`; the file need not exist yet
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AllowListStore for FileAllowListStore {
    fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No allow-list file yet");
            return Ok(HashSet::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let domains: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(normalize_host)
            .collect();

        info!("Loaded {} allowed domains from {}", domains.len(), self.path.display());
        Ok(domains)
    }

    fn save(&self, domains: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = domains.iter().collect();
        sorted.sort();

        let mut content = String::new();
        content.push_str("# Online Picket Line - Allowed domains\n");
        content.push_str("#\n");
        content.push_str("# One domain per line; subdomains are covered too\n");
        content.push_str("#\n\n");
        for domain in sorted {
            content.push_str(domain);
            content.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a torn file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Saved {} allowed domains to {}", domains.len(), self.path.display());
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryAllowListStore {
    domains: Mutex<HashSet<String>>,
    saves: Mutex<usize>,
}

impl MemoryAllowListStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create pre-populated with `domains`
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        *store.domains.lock() = domains
            .into_iter()
            .filter_map(|d| normalize_host(d.as_ref()))
            .collect();
        store
    }

    /// Current stored contents
    pub fn stored(&self) -> HashSet<String> {
        self.domains.lock().clone()
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl AllowListStore for MemoryAllowListStore {
    fn load(&self) -> Result<HashSet<String>> {
        Ok(self.domains.lock().clone())
    }

    fn save(&self, domains: &HashSet<String>) -> Result<()> {
        *self.domains.lock() = domains.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Live allow-list, persisted through an [`AllowListStore`] on every change
pub struct AllowList {
    domains: DashSet<String>,
    store: Arc<dyn AllowListStore>,
    persist_lock: Mutex<()>,
}

impl AllowList {
    /// Load from `store`
    pub fn load(store: Arc<dyn AllowListStore>) -> Result<Self> {
        let domains: DashSet<String> = store.load()?.into_iter().collect();
        Ok(Self {
            domains,
            store,
            persist_lock: Mutex::new(()),
        })
    }

    /// Start empty, ignoring whatever the store holds.
    ///
    /// Used when the store cannot be read; the first change overwrites it.
    pub fn empty(store: Arc<dyn AllowListStore>) -> Self {
        Self {
            domains: DashSet::new(),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Whether `domain` or one of its parent domains is allowed
    pub fn covers(&self, domain: &str) -> bool {
        let Some(host) = normalize_domain(domain) else {
            return false;
        };
        let covered = suffixes(&host).any(|candidate| self.domains.contains(candidate));
        covered
    }

    /// Whether exactly `domain` is on the list
    pub fn contains(&self, domain: &str) -> bool {
        normalize_domain(domain).is_some_and(|host| self.domains.contains(&host))
    }

    /// Add a domain and persist. Returns whether it was newly added.
    ///
    /// The in-memory list keeps the domain even if persisting fails.
    pub fn insert(&self, domain: &str) -> Result<bool> {
        let host = normalize_host(domain)
            .ok_or_else(|| Error::AllowListPersist(format!("not a valid domain: '{domain}'")))?;
        let added = self.domains.insert(host);
        if added {
            self.persist()?;
        }
        Ok(added)
    }

    /// Remove a domain and persist. Returns whether it was present.
    pub fn remove(&self, domain: &str) -> Result<bool> {
        let Some(host) = normalize_host(domain) else {
            return Ok(false);
        };
        let removed = self.domains.remove(&host).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Remove everything and persist
    pub fn clear(&self) -> Result<()> {
        self.domains.clear();
        self.persist()
    }

    /// All domains, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut out: Vec<String> = self.domains.iter().map(|d| d.clone()).collect();
        out.sort();
        out
    }

    /// Number of allowed domains
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    fn persist(&self) -> Result<()> {
        // Serialize saves so an older snapshot never overwrites a newer one
        let _guard = self.persist_lock.lock();
        let snapshot: HashSet<String> = self.domains.iter().map(|d| d.clone()).collect();
        self.store.save(&snapshot).map_err(|e| {
            warn!("Failed to persist allow-list: {}", e);
            Error::AllowListPersist(e.to_string())
        })
    }
}

impl std::fmt::Debug for AllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowList")
            .field("domains", &self.domains.len())
            .finish_non_exhaustive()
    }
}
