//! Peer table (spec.md §4.9): an indexed `node_id -> PeerEntry` map with a
//! periodic sweep that downgrades peers by wall-clock time since their last
//! heartbeat, and a gossip merge that reconciles two peer views.
//!
//! Sharded with `DashMap` the way the teacher shards per-agent state in
//! `runtime/src/scheduler/mod.rs`; the secondary per-status index is a plain
//! `HashMap<PeerStatus, HashSet<PeerId>>` behind a `parking_lot::RwLock`
//! since it's only ever touched by the sweep and by reads, never on the hot
//! heartbeat path.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulcrum_common::PeerId;
use parking_lot::RwLock;

use crate::types::{FailureDetectorConfig, PeerEntry, PeerIdentity, PeerStatus};

pub struct PeerTable {
    peers: DashMap<PeerId, PeerEntry>,
    by_status: RwLock<HashMap<PeerStatus, HashSet<PeerId>>>,
    config: FailureDetectorConfig,
}

impl PeerTable {
    pub fn new(config: FailureDetectorConfig) -> Self {
        Self {
            peers: DashMap::new(),
            by_status: RwLock::new(HashMap::new()),
            config,
        }
    }

    fn reindex(&self, node_id: PeerId, old: Option<PeerStatus>, new: PeerStatus) {
        let mut index = self.by_status.write();
        if let Some(old) = old {
            if let Some(set) = index.get_mut(&old) {
                set.remove(&node_id);
            }
        }
        index.entry(new).or_default().insert(node_id);
    }

    /// Admit a peer (join or recovery). Any inbound heartbeat for a peer
    /// already present returns it to `active` and resets its timers.
    pub fn upsert(&self, identity: PeerIdentity, now: DateTime<Utc>) {
        let node_id = identity.node_id;
        let old_status = self.peers.get(&node_id).map(|e| e.status);
        self.peers
            .entry(node_id)
            .and_modify(|entry| {
                entry.identity = identity.clone();
                entry.status = PeerStatus::Active;
                entry.last_heartbeat_at = now;
            })
            .or_insert_with(|| PeerEntry::new(identity, now));
        self.reindex(node_id, old_status, PeerStatus::Active);
    }

    pub fn record_heartbeat(&self, node_id: PeerId, now: DateTime<Utc>, latency_ms: u64) -> bool {
        let old_status = self.peers.get(&node_id).map(|e| e.status);
        let Some(mut entry) = self.peers.get_mut(&node_id) else {
            return false;
        };
        entry.last_heartbeat_at = now;
        entry.last_latency_ms = latency_ms;
        entry.status = PeerStatus::Active;
        drop(entry);
        self.reindex(node_id, old_status, PeerStatus::Active);
        true
    }

    pub fn mark_left(&self, node_id: PeerId) {
        let old_status = self.peers.get(&node_id).map(|e| e.status);
        if let Some(mut entry) = self.peers.get_mut(&node_id) {
            entry.status = PeerStatus::Left;
        }
        self.reindex(node_id, old_status, PeerStatus::Left);
    }

    pub fn get(&self, node_id: PeerId) -> Option<PeerEntry> {
        self.peers.get(&node_id).map(|e| e.clone())
    }

    pub fn active_peers(&self) -> Vec<PeerEntry> {
        self.peers
            .iter()
            .filter(|e| e.status == PeerStatus::Active)
            .map(|e| e.clone())
            .collect()
    }

    pub fn all_peers(&self) -> Vec<PeerEntry> {
        self.peers.iter().map(|e| e.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Touch every entry exactly once, downgrading status by elapsed time
    /// since `last_heartbeat_at`, evicting entries past `evict_timeout_ms`.
    /// Returns the node ids that changed status this sweep (for the
    /// optimization loop / redelegation monitor to react to).
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<(PeerId, PeerStatus)> {
        let mut changed = Vec::new();
        let mut evicted = Vec::new();

        for mut entry in self.peers.iter_mut() {
            if entry.status == PeerStatus::Left {
                continue;
            }
            let elapsed = (now - entry.last_heartbeat_at).num_milliseconds().max(0);
            let next_status = if elapsed > self.config.evict_timeout_ms + self.config.unreachable_timeout_ms {
                None
            } else if elapsed > self.config.unreachable_timeout_ms {
                Some(PeerStatus::Unreachable)
            } else if elapsed > self.config.suspect_timeout_ms {
                Some(PeerStatus::Suspected)
            } else {
                Some(PeerStatus::Active)
            };

            match next_status {
                None => evicted.push(*entry.key()),
                Some(status) if status != entry.status => {
                    changed.push((*entry.key(), status));
                    entry.status = status;
                }
                _ => {}
            }
        }

        for (node_id, status) in &changed {
            self.reindex(*node_id, None, *status);
        }
        for node_id in evicted {
            self.peers.remove(&node_id);
            let mut index = self.by_status.write();
            for set in index.values_mut() {
                set.remove(&node_id);
            }
        }

        changed
    }

    /// Merge a remote peer view gossiped in from `sender`: for each entry,
    /// keep the max `joined_at` and the most recent `last_heartbeat_at`.
    /// Eventually consistent, no coordination.
    pub fn merge_gossip(&self, remote: Vec<PeerEntry>) {
        for remote_entry in remote {
            let node_id = remote_entry.identity.node_id;
            let old_status = self.peers.get(&node_id).map(|e| e.status);
            self.peers
                .entry(node_id)
                .and_modify(|local| {
                    if remote_entry.last_heartbeat_at > local.last_heartbeat_at {
                        local.last_heartbeat_at = remote_entry.last_heartbeat_at;
                        local.last_latency_ms = remote_entry.last_latency_ms;
                        local.status = remote_entry.status;
                    }
                    if remote_entry.joined_at > local.joined_at {
                        local.joined_at = remote_entry.joined_at;
                    }
                })
                .or_insert_with(|| remote_entry.clone());
            self.reindex(node_id, old_status, self.peers.get(&node_id).unwrap().status);
        }
    }

    /// A random sample of up to `n` active peers' views, for an outbound
    /// gossip round.
    pub fn sample_for_gossip(&self, n: usize) -> Vec<PeerEntry> {
        use rand::seq::SliceRandom;
        let mut all = self.active_peers();
        all.shuffle(&mut rand::thread_rng());
        all.truncate(n);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(node_id: PeerId) -> PeerIdentity {
        PeerIdentity {
            node_id,
            display_name: "peer".to_string(),
            api_url: "https://peer.example".to_string(),
            capabilities: vec!["code".to_string()],
            version: "1.0.0".to_string(),
            credentials: None,
        }
    }

    #[test]
    fn sweep_downgrades_by_elapsed_time() {
        let table = PeerTable::new(FailureDetectorConfig {
            suspect_timeout_ms: 1_000,
            unreachable_timeout_ms: 2_000,
            evict_timeout_ms: 3_000,
        });
        let node_id = PeerId::new();
        let t0 = Utc::now();
        table.upsert(identity(node_id), t0);

        let changed = table.sweep(t0 + chrono::Duration::milliseconds(1_500));
        assert_eq!(changed, vec![(node_id, PeerStatus::Suspected)]);

        let changed = table.sweep(t0 + chrono::Duration::milliseconds(2_500));
        assert_eq!(changed, vec![(node_id, PeerStatus::Unreachable)]);

        table.sweep(t0 + chrono::Duration::milliseconds(10_000));
        assert!(table.get(node_id).is_none());
    }

    #[test]
    fn heartbeat_recovers_a_suspected_peer() {
        let table = PeerTable::new(FailureDetectorConfig {
            suspect_timeout_ms: 1_000,
            unreachable_timeout_ms: 5_000,
            evict_timeout_ms: 10_000,
        });
        let node_id = PeerId::new();
        let t0 = Utc::now();
        table.upsert(identity(node_id), t0);
        table.sweep(t0 + chrono::Duration::milliseconds(1_500));
        assert_eq!(table.get(node_id).unwrap().status, PeerStatus::Suspected);

        table.record_heartbeat(node_id, t0 + chrono::Duration::milliseconds(1_600), 20);
        assert_eq!(table.get(node_id).unwrap().status, PeerStatus::Active);
    }

    #[test]
    fn gossip_merge_keeps_max_joined_at_and_latest_heartbeat() {
        let table = PeerTable::new(FailureDetectorConfig::default());
        let node_id = PeerId::new();
        let t0 = Utc::now();
        table.upsert(identity(node_id), t0);

        let mut remote_entry = table.get(node_id).unwrap();
        remote_entry.last_heartbeat_at = t0 + chrono::Duration::seconds(30);
        remote_entry.joined_at = t0 - chrono::Duration::seconds(60);

        table.merge_gossip(vec![remote_entry]);
        let merged = table.get(node_id).unwrap();
        assert_eq!(merged.last_heartbeat_at, t0 + chrono::Duration::seconds(30));
        assert_eq!(merged.joined_at, t0);
    }
}
