//! Per-domain decision workflow
//!
//! Every blocklisted domain observed in a session gets one record and one
//! alert. The user then resolves it: allow once, allow always (durable), or
//! keep blocking. Traffic is forwarded regardless of the outcome; the
//! decision only controls alerting and the history shown to the user.
//!
//! ```text
//!   unseen ──match──▶ Pending ──allow once / always──▶ NotifiedAllowed
//!     │                  │
//!     │                  └──keep blocking──▶ NotifiedBlocked
//!     └──allow-listed──▶ (no record)
//! ```

mod allowlist;

pub use allowlist::{AllowList, AllowListStore, FileAllowListStore, MemoryAllowListStore};

use crate::blocklist::{normalize_domain, normalize_host, ActionType, BlocklistEntry, BlocklistView};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// State of a matched domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Alert raised, no answer yet
    Pending,
    /// User chose to respect the action
    NotifiedBlocked,
    /// User chose to proceed
    NotifiedAllowed,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::NotifiedBlocked => "blocked",
            Self::NotifiedAllowed => "allowed",
        })
    }
}

/// Answer reported back by the alert side-channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserAction {
    /// Proceed for this session only
    AllowOnce,
    /// Proceed and remember the domain
    AllowAlways,
    /// Respect the action
    KeepBlocking,
}

impl UserAction {
    /// Decision this action leads to
    pub fn decision(self) -> Decision {
        match self {
            Self::AllowOnce | Self::AllowAlways => Decision::NotifiedAllowed,
            Self::KeepBlocking => Decision::NotifiedBlocked,
        }
    }
}

/// Request for the alert side-channel to show something to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    /// Normalized observed domain
    pub domain: String,
    /// Organization display name
    pub organization_name: String,
    /// Organization id
    pub organization_id: String,
    /// Kind of action
    pub action_type: ActionType,
    /// Action id
    pub action_id: String,
}

impl AlertRequest {
    fn new(domain: &str, entry: &BlocklistEntry) -> Self {
        Self {
            domain: domain.to_string(),
            organization_name: entry.organization_name.clone(),
            organization_id: entry.organization_id.clone(),
            action_type: entry.action_type,
            action_id: entry.action_id.clone(),
        }
    }
}

/// History record for one matched domain
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    /// Normalized observed domain
    pub domain: String,
    /// Entry that matched
    pub entry: BlocklistEntry,
    /// Current state
    pub decision: Decision,
    /// Last user action, if any
    pub action: Option<UserAction>,
    /// When the domain was first observed
    pub first_seen: SystemTime,
    /// When the user last acted
    pub decided_at: Option<SystemTime>,
}

/// Combines the blocklist and allow-list into per-domain decisions
///
/// Safe to share between the tunnel worker (observations) and whatever
/// handles user answers (resolutions).
pub struct DecisionEngine {
    blocklist: Arc<dyn BlocklistView>,
    allowlist: AllowList,
    records: DashMap<String, DecisionRecord>,
    order: Mutex<Vec<String>>,
    alerted: DashSet<String>,
}

impl DecisionEngine {
    /// Create an engine reading from `blocklist`
    pub fn new(blocklist: Arc<dyn BlocklistView>, allowlist: AllowList) -> Self {
        Self {
            blocklist,
            allowlist,
            records: DashMap::new(),
            order: Mutex::new(Vec::new()),
            alerted: DashSet::new(),
        }
    }

    /// Feed one observed domain. Returns an alert the first time a
    /// blocklisted, non-allowed domain is seen in this session.
    pub fn on_domain_observed(&self, domain: &str) -> Option<AlertRequest> {
        let host = normalize_domain(domain)?;

        if self.records.contains_key(&host) {
            return None;
        }
        if self.allowlist.covers(&host) {
            debug!(domain = %host, "Domain is allow-listed");
            return None;
        }

        let index = self.blocklist.snapshot();
        let entry = index.lookup_normalized(&host)?;

        match self.records.entry(host.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let alert = AlertRequest::new(&host, entry);
                slot.insert(DecisionRecord {
                    domain: host.clone(),
                    entry: entry.clone(),
                    decision: Decision::Pending,
                    action: None,
                    first_seen: SystemTime::now(),
                    decided_at: None,
                });
                self.order.lock().push(host.clone());
                self.alerted.insert(host);
                info!(
                    domain = %alert.domain,
                    organization = %alert.organization_name,
                    action = %alert.action_type,
                    "Matched domain with active labor action"
                );
                Some(alert)
            }
        }
    }

    /// Apply the user's answer for `domain`.
    ///
    /// `AllowAlways` also adds the domain to the durable allow-list; if that
    /// write fails the session decision still stands and the error is
    /// returned.
    pub fn resolve(&self, domain: &str, action: UserAction) -> Result<Decision> {
        let unknown = || Error::UnknownDomain {
            domain: domain.to_string(),
        };
        let host = normalize_domain(domain).ok_or_else(unknown)?;

        let decision = {
            let mut record = self.records.get_mut(&host).ok_or_else(unknown)?;
            record.decision = action.decision();
            record.action = Some(action);
            record.decided_at = Some(SystemTime::now());
            record.decision
        };

        info!(domain = %host, ?action, "User resolved domain");

        if action == UserAction::AllowAlways {
            self.allowlist.insert(&host)?;
        }
        Ok(decision)
    }

    /// Remove a domain from the durable allow-list.
    ///
    /// A session record created by "allow always" is dropped too, so the
    /// domain alerts again on its next observation.
    pub fn remove_allowed(&self, domain: &str) -> Result<bool> {
        let removed = self.allowlist.remove(domain)?;
        if let Some(host) = normalize_host(domain) {
            let rearmed = self
                .records
                .remove_if(&host, |_, r| r.action == Some(UserAction::AllowAlways))
                .is_some();
            if rearmed {
                self.order.lock().retain(|d| d != &host);
            }
        }
        Ok(removed)
    }

    /// Current decision for `domain`, if it has a record
    pub fn decision(&self, domain: &str) -> Option<Decision> {
        let host = normalize_domain(domain)?;
        self.records.get(&host).map(|r| r.decision)
    }

    /// Records in order of first observation
    pub fn history(&self) -> Vec<DecisionRecord> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|domain| self.records.get(domain).map(|r| r.clone()))
            .collect()
    }

    /// Records still awaiting an answer
    pub fn pending(&self) -> Vec<DecisionRecord> {
        self.history()
            .into_iter()
            .filter(|r| r.decision == Decision::Pending)
            .collect()
    }

    /// Distinct domains alerted this session
    pub fn count(&self) -> usize {
        self.alerted.len()
    }

    /// Forget all session records; the allow-list is untouched
    pub fn clear_session(&self) {
        self.records.clear();
        self.order.lock().clear();
        self.alerted.clear();
    }

    /// The allow-list
    pub fn allowlist(&self) -> &AllowList {
        &self.allowlist
    }

    /// Allowed domains, sorted
    pub fn allowed_domains(&self) -> Vec<String> {
        self.allowlist.domains()
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("records", &self.records.len())
            .field("allowlist", &self.allowlist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::{BlocklistIndex, SharedBlocklist};

    fn engine_with(allowed: &[&str]) -> (DecisionEngine, Arc<MemoryAllowListStore>) {
        let index = BlocklistIndex::from_entries([BlocklistEntry::new(
            "starbucks.com",
            "emp-sbux",
            "Starbucks",
            ActionType::Strike,
            "act-42",
        )
        .unwrap()]);
        let store = Arc::new(MemoryAllowListStore::with_domains(allowed.iter().copied()));
        let allowlist = AllowList::load(store.clone()).unwrap();
        (
            DecisionEngine::new(Arc::new(SharedBlocklist::new(index)), allowlist),
            store,
        )
    }

    #[test]
    fn test_first_match_alerts_once() {
        let (engine, _) = engine_with(&[]);

        let alert = engine.on_domain_observed("store.starbucks.com").unwrap();
        assert_eq!(alert.domain, "store.starbucks.com");
        assert_eq!(alert.organization_name, "Starbucks");
        assert_eq!(alert.action_id, "act-42");
        assert_eq!(engine.decision("store.starbucks.com"), Some(Decision::Pending));

        assert!(engine.on_domain_observed("store.starbucks.com").is_none());
        assert!(engine.on_domain_observed("STORE.starbucks.com").is_none());
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_no_match_no_record() {
        let (engine, _) = engine_with(&[]);
        assert!(engine.on_domain_observed("example.org").is_none());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_allowlisted_stays_unseen() {
        let (engine, _) = engine_with(&["starbucks.com"]);

        assert!(engine.on_domain_observed("store.starbucks.com").is_none());
        assert_eq!(engine.decision("store.starbucks.com"), None);
        assert_eq!(engine.count(), 0);
    }

    #[test]
    fn test_keep_blocking() {
        let (engine, store) = engine_with(&[]);
        engine.on_domain_observed("starbucks.com").unwrap();

        let decision = engine.resolve("starbucks.com", UserAction::KeepBlocking).unwrap();
        assert_eq!(decision, Decision::NotifiedBlocked);
        assert!(engine.on_domain_observed("starbucks.com").is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_allow_once_is_session_only() {
        let (engine, store) = engine_with(&[]);
        engine.on_domain_observed("starbucks.com").unwrap();

        engine.resolve("starbucks.com", UserAction::AllowOnce).unwrap();
        assert_eq!(engine.decision("starbucks.com"), Some(Decision::NotifiedAllowed));
        assert!(!engine.allowlist().contains("starbucks.com"));
        assert_eq!(store.save_count(), 0);

        // A new session alerts again
        engine.clear_session();
        assert!(engine.on_domain_observed("starbucks.com").is_some());
    }

    #[test]
    fn test_allow_always_persists() {
        let (engine, store) = engine_with(&[]);
        engine.on_domain_observed("starbucks.com").unwrap();

        engine.resolve("starbucks.com", UserAction::AllowAlways).unwrap();
        assert!(store.stored().contains("starbucks.com"));

        engine.clear_session();
        assert!(engine.on_domain_observed("starbucks.com").is_none());
        assert!(engine.on_domain_observed("store.starbucks.com").is_none());
    }

    #[test]
    fn test_remove_allowed_rearms() {
        let (engine, _) = engine_with(&[]);
        engine.on_domain_observed("starbucks.com").unwrap();
        engine.resolve("starbucks.com", UserAction::AllowAlways).unwrap();

        assert!(engine.remove_allowed("starbucks.com").unwrap());
        assert!(engine.on_domain_observed("starbucks.com").is_some());
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let (engine, _) = engine_with(&[]);
        let err = engine.resolve("starbucks.com", UserAction::AllowOnce).unwrap_err();
        assert!(matches!(err, Error::UnknownDomain { .. }));
    }

    #[test]
    fn test_history_order() {
        let (engine, _) = engine_with(&[]);
        engine.on_domain_observed("b.starbucks.com");
        engine.on_domain_observed("a.starbucks.com");
        engine.on_domain_observed("example.org");

        let domains: Vec<_> = engine.history().into_iter().map(|r| r.domain).collect();
        assert_eq!(domains, ["b.starbucks.com", "a.starbucks.com"]);
        assert_eq!(engine.pending().len(), 2);
    }
}
