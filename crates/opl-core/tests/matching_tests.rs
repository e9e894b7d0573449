//! Integration tests for blocklist matching and the decision workflow

use opl_core::blocklist::{ActionType, BlocklistEntry, BlocklistIndex, SharedBlocklist};
use opl_core::decision::{AllowList, FileAllowListStore, MemoryAllowListStore};
use opl_core::packet::{decode_query, DnsQueryBuilder};
use opl_core::{Decision, DecisionEngine, UserAction};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

fn starbucks() -> BlocklistEntry {
    BlocklistEntry::new(
        "https://www.starbucks.com/",
        "emp-sbux",
        "Starbucks",
        ActionType::Strike,
        "act-42",
    )
    .unwrap()
}

fn engine(blocklist: Arc<SharedBlocklist>, allowed: &[&str]) -> DecisionEngine {
    let store = Arc::new(MemoryAllowListStore::with_domains(allowed.iter().copied()));
    DecisionEngine::new(blocklist, AllowList::load(store).unwrap())
}

// ============ Scenarios ============

#[test]
fn test_starbucks_frame_alerts() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = engine(blocklist.clone(), &[]);

    let frame = DnsQueryBuilder::new("store.starbucks.com").build().unwrap();
    let domain = decode_query(&frame).unwrap();
    assert_eq!(domain, "store.starbucks.com");
    assert_eq!(blocklist.lookup(&domain).unwrap().organization_name, "Starbucks");

    let alert = engine.on_domain_observed(&domain).unwrap();
    assert_eq!(alert.organization_id, "emp-sbux");
    assert_eq!(alert.action_type, ActionType::Strike);
    assert_eq!(engine.decision(&domain), Some(Decision::Pending));
    assert_eq!(engine.count(), 1);
}

#[test]
fn test_starbucks_allowlisted_stays_unseen() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = engine(blocklist, &["starbucks.com"]);

    let frame = DnsQueryBuilder::new("store.starbucks.com").build().unwrap();
    let domain = decode_query(&frame).unwrap();

    assert!(engine.on_domain_observed(&domain).is_none());
    assert_eq!(engine.decision(&domain), None);
    assert!(engine.history().is_empty());
}

#[test]
fn test_url_syntax_in_query_name_never_matches() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = engine(blocklist.clone(), &[]);

    // Labels "evil@starbucks" and "com"
    let frame = DnsQueryBuilder::new("evil@starbucks.com").build().unwrap();
    assert_eq!(decode_query(&frame), None);

    for name in ["evil@starbucks.com", "starbucks.com/x.evil.org", "starbucks.com:53"] {
        assert!(blocklist.lookup(name).is_none(), "{name}");
        assert!(engine.on_domain_observed(name).is_none(), "{name}");
    }
    assert!(engine.history().is_empty());
    assert_eq!(engine.count(), 0);
}

#[test]
fn test_allow_always_survives_refresh() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = engine(blocklist.clone(), &[]);

    engine.on_domain_observed("starbucks.com").unwrap();
    engine.resolve("starbucks.com", UserAction::AllowAlways).unwrap();

    // New session, fresh index carrying the same host
    engine.clear_session();
    blocklist.replace(Arc::new(BlocklistIndex::from_entries([starbucks()])));

    assert!(engine.on_domain_observed("starbucks.com").is_none());
    assert!(engine.on_domain_observed("order.starbucks.com").is_none());

    engine.remove_allowed("starbucks.com").unwrap();
    assert!(engine.on_domain_observed("order.starbucks.com").is_some());
}

#[test]
fn test_allow_always_persisted_to_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("allowed.txt");
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));

    {
        let store = Arc::new(FileAllowListStore::new(&path));
        let engine = DecisionEngine::new(blocklist.clone(), AllowList::load(store).unwrap());
        engine.on_domain_observed("starbucks.com").unwrap();
        engine.resolve("starbucks.com", UserAction::AllowAlways).unwrap();
    }

    // A restarted process reads the same file
    let store = Arc::new(FileAllowListStore::new(&path));
    let engine = DecisionEngine::new(blocklist, AllowList::load(store).unwrap());
    assert_eq!(engine.allowed_domains(), ["starbucks.com"]);
    assert!(engine.on_domain_observed("starbucks.com").is_none());
}

#[test]
fn test_last_action_wins() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = engine(blocklist, &[]);

    engine.on_domain_observed("starbucks.com").unwrap();
    engine.resolve("starbucks.com", UserAction::KeepBlocking).unwrap();
    engine.resolve("starbucks.com", UserAction::AllowOnce).unwrap();

    let record = &engine.history()[0];
    assert_eq!(record.decision, Decision::NotifiedAllowed);
    assert_eq!(record.action, Some(UserAction::AllowOnce));
    assert!(record.decided_at.is_some());
}

#[test]
fn test_concurrent_observations_alert_once() {
    let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([starbucks()])));
    let engine = Arc::new(engine(blocklist, &[]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..100)
                    .filter(|_| engine.on_domain_observed("store.starbucks.com").is_some())
                    .count()
            })
        })
        .collect();

    let alerts: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(alerts, 1);
    assert_eq!(engine.count(), 1);
}

// ============ Properties ============

fn label() -> impl Strategy<Value = String> {
    // No 'w' so a leading "www" label never appears
    "[a-v0-9]{1,6}"
}

fn host() -> impl Strategy<Value = String> {
    prop::collection::vec(label(), 1..4).prop_map(|labels| labels.join("."))
}

proptest! {
    #[test]
    fn prop_suffix_rule(h in host(), d in host()) {
        let entry = BlocklistEntry::new(&h, "o", "O", ActionType::Other, "a").unwrap();
        let index = BlocklistIndex::from_entries([entry]);

        let expected = d == h || d.ends_with(&format!(".{h}"));
        prop_assert_eq!(index.lookup(&d).is_some(), expected);
    }

    #[test]
    fn prop_subdomain_always_matches(h in host(), prefix in host()) {
        let entry = BlocklistEntry::new(&h, "o", "O", ActionType::Other, "a").unwrap();
        let index = BlocklistIndex::from_entries([entry]);

        let sub = format!("{prefix}.{h}");
        prop_assert!(index.lookup(&sub).is_some());
        prop_assert!(index.lookup(&sub.to_uppercase()).is_some());
    }

    #[test]
    fn prop_duplicate_observation_one_alert(h in host(), repeats in 1usize..10) {
        let entry = BlocklistEntry::new(&h, "o", "O", ActionType::Other, "a").unwrap();
        let blocklist = Arc::new(SharedBlocklist::new(BlocklistIndex::from_entries([entry])));
        let engine = engine(blocklist, &[]);

        let alerts = (0..repeats)
            .filter(|_| engine.on_domain_observed(&h).is_some())
            .count();
        prop_assert_eq!(alerts, 1);
    }
}
