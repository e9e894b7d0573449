//! Blocklist index and its shared, swappable handle

use super::{normalize_domain, normalize_host, suffixes, BlocklistEntry};
use arc_swap::ArcSwap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable host → entry index
///
/// Lookups match the exact host or any proper subdomain of it, on label
/// boundaries only. When several entries cover a name the longest host
/// wins.
#[derive(Debug, Default, Clone)]
pub struct BlocklistIndex {
    entries: HashMap<String, BlocklistEntry>,
    skipped: usize,
}

impl BlocklistIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index; later entries for the same host replace earlier ones.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = BlocklistEntry>,
    {
        let mut index = Self::new();
        for entry in entries {
            // Entries built by hand may skip BlocklistEntry::new
            let Some(host) = normalize_host(&entry.host) else {
                debug!(host = %entry.host, "Skipping blocklist entry without a usable host");
                index.skipped += 1;
                continue;
            };
            index.entries.insert(host.clone(), BlocklistEntry { host, ..entry });
        }
        info!(
            hosts = index.entries.len(),
            skipped = index.skipped,
            "Built blocklist index"
        );
        index
    }

    /// Find the entry covering the DNS name `domain`, if any
    pub fn lookup(&self, domain: &str) -> Option<&BlocklistEntry> {
        let host = normalize_domain(domain)?;
        self.lookup_normalized(&host)
    }

    /// Lookup for a name that is already normalized
    pub fn lookup_normalized(&self, host: &str) -> Option<&BlocklistEntry> {
        suffixes(host).find_map(|candidate| self.entries.get(candidate))
    }

    /// Number of hosts in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries dropped at build time for lacking a usable host
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// All hosts, sorted
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }

    /// Distinct organization names, sorted
    pub fn organizations(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(|e| e.organization_name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Read side of whatever currently holds the blocklist
pub trait BlocklistView: Send + Sync {
    /// The index as of now; never a partially rebuilt one
    fn snapshot(&self) -> Arc<BlocklistIndex>;
}

/// Blocklist cell replaced wholesale on refresh
///
/// Readers never lock: they load the current `Arc` and keep using it even
/// if a refresh lands mid-lookup.
#[derive(Debug, Default)]
pub struct SharedBlocklist {
    current: ArcSwap<BlocklistIndex>,
}

impl SharedBlocklist {
    /// Create holding `index`
    pub fn new(index: BlocklistIndex) -> Self {
        Self {
            current: ArcSwap::from_pointee(index),
        }
    }

    /// Publish a new index
    pub fn replace(&self, index: Arc<BlocklistIndex>) {
        self.current.store(index);
    }

    /// Lookup against the current index
    pub fn lookup(&self, domain: &str) -> Option<BlocklistEntry> {
        self.current.load().lookup(domain).cloned()
    }
}

impl BlocklistView for SharedBlocklist {
    fn snapshot(&self) -> Arc<BlocklistIndex> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::ActionType;

    fn entry(host: &str, org: &str) -> BlocklistEntry {
        BlocklistEntry::new(host, format!("{org}-id"), org, ActionType::Strike, "act").unwrap()
    }

    #[test]
    fn test_exact_and_subdomain() {
        let index = BlocklistIndex::from_entries([entry("starbucks.com", "Starbucks")]);

        assert!(index.lookup("starbucks.com").is_some());
        assert!(index.lookup("store.starbucks.com").is_some());
        assert!(index.lookup("a.b.starbucks.com").is_some());
        assert!(index.lookup("STARBUCKS.COM").is_some());
        assert!(index.lookup("www.starbucks.com").is_some());
    }

    #[test]
    fn test_label_boundary() {
        let index = BlocklistIndex::from_entries([entry("example.com", "Example")]);

        assert!(index.lookup("notexample.com").is_none());
        assert!(index.lookup("example.com.evil.org").is_none());
        assert!(index.lookup("example.co").is_none());
        assert!(index.lookup("evil@example.com").is_none());
        assert!(index.lookup("example.com/x.evil.org").is_none());
    }

    #[test]
    fn test_most_specific_wins() {
        let index = BlocklistIndex::from_entries([
            entry("example.com", "Parent"),
            entry("shop.example.com", "Child"),
        ]);

        assert_eq!(index.lookup("a.shop.example.com").unwrap().organization_name, "Child");
        assert_eq!(index.lookup("blog.example.com").unwrap().organization_name, "Parent");
    }

    #[test]
    fn test_duplicate_last_wins() {
        let index = BlocklistIndex::from_entries([
            entry("example.com", "First"),
            entry("https://www.example.com/", "Second"),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("example.com").unwrap().organization_name, "Second");
    }

    #[test]
    fn test_skips_unusable_hosts() {
        let mut bad = entry("example.com", "Bad");
        bad.host = String::new();
        let index = BlocklistIndex::from_entries([bad, entry("ok.org", "Ok")]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped(), 1);
    }

    #[test]
    fn test_organizations_sorted_distinct() {
        let index = BlocklistIndex::from_entries([
            entry("b.com", "Beta"),
            entry("a.com", "Alpha"),
            entry("a2.com", "Alpha"),
        ]);
        assert_eq!(index.organizations(), ["Alpha", "Beta"]);
        assert_eq!(index.hosts(), ["a.com", "a2.com", "b.com"]);
    }

    #[test]
    fn test_shared_replace() {
        let shared = SharedBlocklist::new(BlocklistIndex::new());
        assert!(shared.lookup("example.com").is_none());

        let before = shared.snapshot();
        shared.replace(Arc::new(BlocklistIndex::from_entries([entry("example.com", "Ex")])));

        assert!(shared.lookup("example.com").is_some());
        // A reader holding the old snapshot keeps a complete, consistent view
        assert!(before.lookup("example.com").is_none());
    }
}
