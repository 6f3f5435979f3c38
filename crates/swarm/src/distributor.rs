//! Work Distributor (spec.md §4.10): selects a peer for a task either by a
//! single weighted score or by a Pareto front with crowding-distance
//! tie-breaking.

use fulcrum_common::PeerId;

use crate::reputation::ReputationLedger;
use crate::types::PeerEntry;

#[derive(Debug, Clone, Copy)]
pub struct SelectionWeights {
    pub trust: f64,
    pub latency: f64,
    pub cost: f64,
    pub capability: f64,
}

/// `DEFAULT_SELECTION_WEIGHTS` (spec.md §4.10).
impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            trust: 0.4,
            latency: 0.25,
            cost: 0.2,
            capability: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateMetrics {
    pub node_id: PeerId,
    pub trust: f64,
    pub latency_ms: f64,
    pub avg_cost_usd: f64,
    pub capability_match: f64,
}

impl CandidateMetrics {
    fn score(&self, weights: &SelectionWeights) -> f64 {
        weights.trust * self.trust
            + weights.latency * (1.0 - (self.latency_ms / 10_000.0).min(1.0))
            + weights.cost * (1.0 - (self.avg_cost_usd / 1.0).min(1.0))
            + weights.capability * self.capability_match
    }
}

pub struct WorkDistributor<'a> {
    weights: SelectionWeights,
    reputation: &'a ReputationLedger,
}

impl<'a> WorkDistributor<'a> {
    pub fn new(weights: SelectionWeights, reputation: &'a ReputationLedger) -> Self {
        Self { weights, reputation }
    }

    /// Excludes peers that fail capability requirements, are quarantined by
    /// the anomaly detector, or whose reputation has dropped below the
    /// configured floor. Among the rest, picks the highest weighted score;
    /// ties break on `node_id` lexicographically for determinism.
    pub fn select_weighted(
        &self,
        peers: &[PeerEntry],
        required_capabilities: &[String],
        metrics: impl Fn(&PeerEntry) -> CandidateMetrics,
    ) -> Option<PeerId> {
        let mut candidates: Vec<(PeerId, f64)> = self
            .eligible(peers, required_capabilities)
            .map(|peer| {
                let m = metrics(peer);
                (peer.identity.node_id, m.score(&self.weights))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
        });
        candidates.into_iter().next().map(|(id, _)| id)
    }

    /// Pareto-optimal variant: compute the front over
    /// `(trust, -latency, -cost, capability)`, then within the front prefer
    /// the candidate with the largest crowding distance (most "different"
    /// from its neighbors), to spread delegations rather than converging on
    /// one dominant peer.
    pub fn select_pareto(
        &self,
        peers: &[PeerEntry],
        required_capabilities: &[String],
        metrics: impl Fn(&PeerEntry) -> CandidateMetrics,
    ) -> Option<PeerId> {
        let candidates: Vec<CandidateMetrics> = self
            .eligible(peers, required_capabilities)
            .map(&metrics)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let front = pareto_front(&candidates);
        if front.is_empty() {
            return None;
        }

        let distances = crowding_distances(&front);
        let mut ranked: Vec<(usize, f64)> = distances.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| front[a.0].node_id.to_string().cmp(&front[b.0].node_id.to_string()))
        });
        ranked.first().map(|(idx, _)| front[*idx].node_id)
    }

    fn eligible<'p>(
        &self,
        peers: &'p [PeerEntry],
        required_capabilities: &'p [String],
    ) -> impl Iterator<Item = &'p PeerEntry> + 'p {
        let reputation = self.reputation;
        peers.iter().filter(move |peer| {
            let node_id = peer.identity.node_id;
            if reputation.is_quarantined(node_id) {
                return false;
            }
            if reputation.score(node_id) < reputation.floor() {
                return false;
            }
            required_capabilities
                .iter()
                .all(|cap| peer.identity.capabilities.iter().any(|c| c == cap))
        })
    }
}

/// A point `p` is dominated if some other point is at least as good in
/// every objective and strictly better in at least one. Objectives here are
/// maximize-trust, minimize-latency, minimize-cost, maximize-capability.
fn dominates(a: &CandidateMetrics, b: &CandidateMetrics) -> bool {
    let ge = a.trust >= b.trust && a.latency_ms <= b.latency_ms && a.avg_cost_usd <= b.avg_cost_usd && a.capability_match >= b.capability_match;
    let gt = a.trust > b.trust || a.latency_ms < b.latency_ms || a.avg_cost_usd < b.avg_cost_usd || a.capability_match > b.capability_match;
    ge && gt
}

fn pareto_front(candidates: &[CandidateMetrics]) -> Vec<CandidateMetrics> {
    candidates
        .iter()
        .filter(|candidate| !candidates.iter().any(|other| dominates(other, candidate)))
        .cloned()
        .collect()
}

/// NSGA-II style crowding distance: for each objective, sort the front and
/// sum normalized gaps to each point's neighbors. Boundary points get
/// infinite distance so they are always preferred (keeps the extremes of
/// the front in rotation).
fn crowding_distances(front: &[CandidateMetrics]) -> Vec<f64> {
    let n = front.len();
    let mut distances = vec![0.0; n];
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let objectives: [(Box<dyn Fn(&CandidateMetrics) -> f64>, bool); 4] = [
        (Box::new(|c: &CandidateMetrics| c.trust), true),
        (Box::new(|c: &CandidateMetrics| c.latency_ms), false),
        (Box::new(|c: &CandidateMetrics| c.avg_cost_usd), false),
        (Box::new(|c: &CandidateMetrics| c.capability_match), true),
    ];

    for (extract, maximize) in &objectives {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let va = extract(&front[a]);
            let vb = extract(&front[b]);
            if *maximize {
                va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                vb.partial_cmp(&va).unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        distances[order[0]] = f64::INFINITY;
        distances[order[n - 1]] = f64::INFINITY;

        let min = extract(&front[order[0]]);
        let max = extract(&front[order[n - 1]]);
        let span = (max - min).abs().max(1e-9);

        for i in 1..n - 1 {
            if distances[order[i]].is_infinite() {
                continue;
            }
            let prev = extract(&front[order[i - 1]]);
            let next = extract(&front[order[i + 1]]);
            distances[order[i]] += (next - prev).abs() / span;
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PeerIdentity, PeerStatus};

    fn peer(node_id: PeerId, caps: &[&str]) -> PeerEntry {
        PeerEntry {
            identity: PeerIdentity {
                node_id,
                display_name: "p".to_string(),
                api_url: "https://p".to_string(),
                capabilities: caps.iter().map(|s| s.to_string()).collect(),
                version: "1".to_string(),
                credentials: None,
            },
            status: PeerStatus::Active,
            last_heartbeat_at: chrono::Utc::now(),
            last_latency_ms: 0,
            joined_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn weighted_selection_excludes_missing_capabilities() {
        let reputation = ReputationLedger::new(Default::default());
        let distributor = WorkDistributor::new(SelectionWeights::default(), &reputation);

        let a = peer(PeerId::new(), &["code"]);
        let b = peer(PeerId::new(), &["email"]);
        let peers = vec![a.clone(), b.clone()];

        let selected = distributor
            .select_weighted(&peers, &["code".to_string()], |p| CandidateMetrics {
                node_id: p.identity.node_id,
                trust: 0.5,
                latency_ms: 100.0,
                avg_cost_usd: 0.01,
                capability_match: 1.0,
            })
            .unwrap();
        assert_eq!(selected, a.identity.node_id);
    }

    #[test]
    fn weighted_selection_prefers_higher_score() {
        let reputation = ReputationLedger::new(Default::default());
        let distributor = WorkDistributor::new(SelectionWeights::default(), &reputation);

        let good = peer(PeerId::new(), &["code"]);
        let bad = peer(PeerId::new(), &["code"]);
        let peers = vec![good.clone(), bad.clone()];
        let good_id = good.identity.node_id;

        let selected = distributor
            .select_weighted(&peers, &[], |p| {
                if p.identity.node_id == good_id {
                    CandidateMetrics { node_id: p.identity.node_id, trust: 0.9, latency_ms: 50.0, avg_cost_usd: 0.01, capability_match: 1.0 }
                } else {
                    CandidateMetrics { node_id: p.identity.node_id, trust: 0.2, latency_ms: 500.0, avg_cost_usd: 0.5, capability_match: 0.5 }
                }
            })
            .unwrap();
        assert_eq!(selected, good_id);
    }

    #[test]
    fn pareto_front_excludes_dominated_candidates() {
        let dominant = CandidateMetrics { node_id: PeerId::new(), trust: 0.9, latency_ms: 50.0, avg_cost_usd: 0.01, capability_match: 1.0 };
        let dominated = CandidateMetrics { node_id: PeerId::new(), trust: 0.5, latency_ms: 200.0, avg_cost_usd: 0.5, capability_match: 0.5 };
        let front = pareto_front(&[dominant.clone(), dominated]);
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].node_id, dominant.node_id);
    }
}
