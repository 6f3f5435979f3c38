//! HTTP surface for the swarm wire protocol (spec.md §6's `/plugins/swarm/*`
//! route table). Aggregates every component built in this crate behind one
//! `SwarmState` and exposes it as an axum `Router`, in the same
//! `State<Arc<...>>` / `Path` / `Json` shape the teacher's own API layer
//! uses in `crates/runtime/src/api/routes.rs`.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use fulcrum_common::{ConsensusRoundId, ContractId, PeerId, SessionId, SigningIdentity, TaskId};
use fulcrum_journal::Journal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio_stream::StreamExt;

use crate::consensus::ConsensusRegistry;
use crate::contract;
use crate::distributor::{CandidateMetrics, SelectionWeights, WorkDistributor};
use crate::error::SwarmError;
use crate::escrow::EscrowLedger;
use crate::mesh::PeerTable;
use crate::monitor::{CheckpointsMissedHandler, TaskMonitor, TaskMonitorConfig};
use crate::redelegation::RedelegationMonitor;
use crate::reputation::{Outcome, ReputationLedger};
use crate::transport::Transport;
use crate::types::{
    ContractStatus, DelegationContract, MonitoringPolicy, PeerEntry, PeerIdentity, PeerStatus,
    ServiceLevelObjective,
};

pub struct SwarmState {
    pub self_identity: PeerIdentity,
    pub session_secret: Vec<u8>,
    /// When set, every inbound request must carry a matching
    /// `Authorization: Bearer <token>` header (spec.md §4.9); unset means
    /// the transport is unauthenticated.
    pub bearer_token: Option<String>,
    pub peers: PeerTable,
    pub reputation: ReputationLedger,
    pub selection_weights: SelectionWeights,
    pub transport: Transport,
    pub journal: Arc<dyn Journal>,
    pub contracts: Mutex<std::collections::HashMap<ContractId, DelegationContract>>,
    pub monitor: AsyncMutex<TaskMonitor>,
    pub redelegation: Mutex<RedelegationMonitor>,
    pub escrow: Mutex<EscrowLedger>,
    pub consensus: Mutex<ConsensusRegistry>,
    pub signing_identity: SigningIdentity,
}

impl SwarmState {
    pub fn new(
        self_identity: PeerIdentity,
        session_secret: Vec<u8>,
        journal: Arc<dyn Journal>,
        escrow_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, SwarmError> {
        Ok(Self {
            self_identity,
            session_secret,
            bearer_token: None,
            peers: PeerTable::new(Default::default()),
            reputation: ReputationLedger::new(Default::default()),
            selection_weights: SelectionWeights::default(),
            transport: Transport::new(Default::default()),
            journal,
            contracts: Mutex::new(std::collections::HashMap::new()),
            monitor: AsyncMutex::new(TaskMonitor::new(TaskMonitorConfig::default())),
            redelegation: Mutex::new(RedelegationMonitor::new()),
            escrow: Mutex::new(EscrowLedger::load(escrow_path)?),
            consensus: Mutex::new(ConsensusRegistry::new()),
            signing_identity: SigningIdentity::generate(&mut rand::rngs::OsRng),
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

async fn require_bearer_token(State(state): State<Arc<SwarmState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.bearer_token.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => next.run(request).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

fn error_response(err: SwarmError) -> (StatusCode, Json<ErrorBody>) {
    let kind = fulcrum_common::ErrorKind::from(&err);
    let status = match &err {
        SwarmError::NoPeers | SwarmError::UnknownPeer(_) | SwarmError::PeerQuarantined(_) => StatusCode::NOT_FOUND,
        SwarmError::InsufficientBalance(..) | SwarmError::InvalidConsensusParams(..) => StatusCode::BAD_REQUEST,
        SwarmError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: err.to_string(), code: kind.as_str().to_string() }))
}

pub fn router(state: Arc<SwarmState>) -> Router {
    Router::new()
        .route("/plugins/swarm/identity", get(get_identity))
        .route("/plugins/swarm/peers", get(list_peers))
        .route("/plugins/swarm/join", post(join))
        .route("/plugins/swarm/leave", post(leave))
        .route("/plugins/swarm/heartbeat", post(heartbeat))
        .route("/plugins/swarm/gossip", post(gossip))
        .route("/plugins/swarm/task", post(submit_task))
        .route("/plugins/swarm/result", post(submit_result))
        .route("/plugins/swarm/task/:task_id/status", get(task_status))
        .route("/plugins/swarm/task/:task_id/cancel", post(cancel_task))
        .route("/plugins/swarm/task/:task_id/checkpoints", get(task_checkpoints))
        .route("/plugins/swarm/events", get(events))
        .route("/plugins/swarm/verify/:task_id/consensus", post(open_consensus))
        .route("/plugins/swarm/verify/:task_id/vote", post(cast_vote))
        .route("/plugins/swarm/contracts/:contract_id/renegotiate", post(renegotiate))
        .route("/plugins/swarm/escrow/deposit", post(escrow_deposit))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .with_state(state)
}

async fn get_identity(State(state): State<Arc<SwarmState>>) -> Json<PeerIdentity> {
    Json(state.self_identity.clone())
}

#[derive(Deserialize)]
struct PeersQuery {
    status: Option<PeerStatus>,
}

async fn list_peers(State(state): State<Arc<SwarmState>>, Query(query): Query<PeersQuery>) -> Json<Vec<PeerEntry>> {
    let peers = state.peers.all_peers();
    let filtered = match query.status {
        Some(status) => peers.into_iter().filter(|p| p.status == status).collect(),
        None => peers,
    };
    Json(filtered)
}

#[derive(Deserialize)]
struct JoinRequest {
    identity: PeerIdentity,
}

async fn join(State(state): State<Arc<SwarmState>>, Json(request): Json<JoinRequest>) -> StatusCode {
    state.peers.upsert(request.identity, Utc::now());
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct LeaveRequest {
    node_id: PeerId,
    #[allow(dead_code)]
    reason: Option<String>,
}

async fn leave(State(state): State<Arc<SwarmState>>, Json(request): Json<LeaveRequest>) -> StatusCode {
    state.peers.mark_left(request.node_id);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    node_id: PeerId,
    #[allow(dead_code)]
    timestamp: chrono::DateTime<Utc>,
    #[allow(dead_code)]
    active_sessions: u32,
    #[allow(dead_code)]
    load: f64,
}

async fn heartbeat(State(state): State<Arc<SwarmState>>, Json(request): Json<HeartbeatRequest>) -> StatusCode {
    let found = state.peers.record_heartbeat(request.node_id, Utc::now(), 0);
    if found {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct GossipRequest {
    #[allow(dead_code)]
    sender_node_id: PeerId,
    peers: Vec<PeerEntry>,
}

async fn gossip(State(state): State<Arc<SwarmState>>, Json(request): Json<GossipRequest>) -> StatusCode {
    state.peers.merge_gossip(request.peers);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct SwarmTaskRequest {
    originator_session_id: SessionId,
    task_text: String,
    required_capabilities: Vec<String>,
    permission_boundary: Vec<String>,
    #[serde(default)]
    slo: ServiceLevelObjective,
    monitoring: MonitoringPolicy,
}

#[derive(Serialize)]
struct SwarmTaskResponse {
    task_id: TaskId,
    contract_id: ContractId,
    assigned_peer: PeerId,
}

/// Selects a peer by weighted score, creates and signs a delegation
/// contract, and starts tracking the task for checkpoints and possible
/// redelegation.
async fn submit_task(
    State(state): State<Arc<SwarmState>>,
    Json(request): Json<SwarmTaskRequest>,
) -> Result<Json<SwarmTaskResponse>, (StatusCode, Json<ErrorBody>)> {
    let peers = state.peers.active_peers();
    let distributor = WorkDistributor::new(state.selection_weights, &state.reputation);
    let assigned_peer = distributor
        .select_weighted(&peers, &request.required_capabilities, |p| CandidateMetrics {
            node_id: p.identity.node_id,
            trust: state.reputation.score(p.identity.node_id),
            latency_ms: p.last_latency_ms as f64,
            avg_cost_usd: 0.0,
            capability_match: 1.0,
        })
        .ok_or(SwarmError::NoPeers)
        .map_err(error_response)?;

    let task_id = TaskId::new();
    let (mut contract, _signature) = contract::create(
        &state.session_secret,
        task_id,
        request.originator_session_id,
        assigned_peer,
        request.permission_boundary.clone(),
        request.slo,
        request.monitoring,
        Utc::now(),
    )
    .map_err(error_response)?;

    // The selected peer accepting the delegation happens synchronously with
    // assignment here, so the contract goes straight from pending to active
    // (spec.md §3) rather than sitting unpromoted.
    contract::transition(&mut contract, ContractStatus::Active, "delegation accepted", true, Utc::now()).map_err(error_response)?;

    let contract_id = contract.contract_id;
    state.contracts.lock().insert(contract_id, contract);
    state.monitor.lock().await.track(task_id, assigned_peer);
    state.redelegation.lock().track(
        task_id,
        assigned_peer,
        request.task_text,
        request.originator_session_id,
        request.permission_boundary,
    );

    let _ = state
        .journal
        .emit(request.originator_session_id, "swarm.task_delegated", serde_json::json!({
            "task_id": task_id,
            "contract_id": contract_id,
            "peer_node_id": assigned_peer,
        }))
        .await;

    Ok(Json(SwarmTaskResponse { task_id, contract_id, assigned_peer }))
}

#[derive(Deserialize)]
struct SwarmTaskResult {
    task_id: TaskId,
    session_id: SessionId,
    peer_node_id: PeerId,
    success: bool,
    #[allow(dead_code)]
    output: serde_json::Value,
}

async fn submit_result(State(state): State<Arc<SwarmState>>, Json(result): Json<SwarmTaskResult>) -> StatusCode {
    state.monitor.lock().await.stop_tracking(result.task_id);
    state.redelegation.lock().stop_tracking(result.task_id);
    state.reputation.record_outcome(
        result.peer_node_id,
        if result.success { Outcome::Success } else { Outcome::Failure },
    );
    let _ = state
        .journal
        .emit(result.session_id, "swarm.task_result", serde_json::json!({
            "task_id": result.task_id,
            "peer_node_id": result.peer_node_id,
            "success": result.success,
        }))
        .await;
    StatusCode::NO_CONTENT
}

struct NoopMissedHandler;
impl CheckpointsMissedHandler for NoopMissedHandler {
    fn on_checkpoints_missed(&self, _task_id: TaskId, _peer_node_id: PeerId) {}
}

async fn task_status(
    State(state): State<Arc<SwarmState>>,
    Path(task_id): Path<TaskId>,
) -> Result<Json<Option<crate::monitor::CheckpointStatus>>, (StatusCode, Json<ErrorBody>)> {
    let Some(entry) = state.contracts.lock().values().find(|c| c.task_id == task_id).cloned() else {
        return Err(error_response(SwarmError::UnknownPeer(PeerId::nil())));
    };
    let peer = state.peers.get(entry.peer_node_id).ok_or(SwarmError::UnknownPeer(entry.peer_node_id)).map_err(error_response)?;
    let mut monitor = state.monitor.lock().await;
    let status = monitor
        .poll(&state.transport, task_id, &peer.identity.api_url, &NoopMissedHandler)
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}

async fn cancel_task(State(state): State<Arc<SwarmState>>, Path(task_id): Path<TaskId>) -> StatusCode {
    state.monitor.lock().await.stop_tracking(task_id);
    state.redelegation.lock().stop_tracking(task_id);
    if let Some(contract) = state.contracts.lock().values_mut().find(|c| c.task_id == task_id) {
        let _ = contract::transition(contract, ContractStatus::Cancelled, "cancelled by originator", true, Utc::now());
    }
    StatusCode::NO_CONTENT
}

async fn task_checkpoints(State(state): State<Arc<SwarmState>>, Path(task_id): Path<TaskId>) -> Json<serde_json::Value> {
    let tracked = state.redelegation.lock().get(task_id).cloned();
    Json(serde_json::json!({ "task_id": task_id, "tracked": tracked.is_some() }))
}

#[derive(Deserialize)]
struct EventsQuery {
    task_id: Option<TaskId>,
    #[allow(dead_code)]
    peer_node_id: Option<PeerId>,
    #[allow(dead_code)]
    types: Option<String>,
    #[allow(dead_code)]
    level: Option<String>,
}

async fn events(
    State(state): State<Arc<SwarmState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let subscription = state.journal.subscribe(None);
    let task_filter = query.task_id;
    let stream = subscription.into_stream().filter_map(move |event| {
        if let Some(task_id) = task_filter {
            let matches = event.payload.get("task_id").and_then(|v| v.as_str()) == Some(&task_id.to_string());
            if !matches {
                return None;
            }
        }
        let data = serde_json::to_string(&event).unwrap_or_default();
        Some(Ok(Event::default().event(event.event_type.clone()).data(data)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct OpenConsensusRequest {
    required_voters: u32,
    required_agreement: f64,
    ttl_ms: i64,
}

#[derive(Serialize)]
struct OpenConsensusResponse {
    round_id: ConsensusRoundId,
}

async fn open_consensus(
    State(state): State<Arc<SwarmState>>,
    Path(task_id): Path<TaskId>,
    Json(request): Json<OpenConsensusRequest>,
) -> Result<Json<OpenConsensusResponse>, (StatusCode, Json<ErrorBody>)> {
    let round_id = state
        .consensus
        .lock()
        .open(task_id, request.required_voters, request.required_agreement, request.ttl_ms, Utc::now())
        .map_err(error_response)?;
    Ok(Json(OpenConsensusResponse { round_id }))
}

#[derive(Deserialize)]
struct CastVoteRequest {
    round_id: ConsensusRoundId,
    voter: PeerId,
    result_hash: String,
    outcome_score: f64,
}

async fn cast_vote(
    State(state): State<Arc<SwarmState>>,
    Path(_task_id): Path<TaskId>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<crate::types::ConsensusRound>, (StatusCode, Json<ErrorBody>)> {
    let mut registry = state.consensus.lock();
    let round = registry
        .cast_vote(request.round_id, request.voter, request.result_hash, request.outcome_score, Utc::now())
        .map_err(error_response)?;
    Ok(Json(round.clone()))
}

#[derive(Deserialize)]
struct RenegotiateRequest {
    reason: String,
    accepted: bool,
}

async fn renegotiate(
    State(state): State<Arc<SwarmState>>,
    Path(contract_id): Path<ContractId>,
    Json(request): Json<RenegotiateRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let mut contracts = state.contracts.lock();
    let contract = contracts
        .get_mut(&contract_id)
        .ok_or_else(|| SwarmError::ContractViolated(contract_id, "unknown contract".to_string()))
        .map_err(error_response)?;
    // Request and decision happen in one round trip here: enter renegotiating,
    // then resolve it immediately. Accept applies the terms; reject leaves
    // the contract active with no effect, never parked in `renegotiating`.
    contract::request_renegotiation(contract).map_err(error_response)?;
    contract::resolve_renegotiation(contract, request.reason, request.accepted, Utc::now()).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct EscrowDepositRequest {
    node_id: PeerId,
    amount: f64,
}

async fn escrow_deposit(
    State(state): State<Arc<SwarmState>>,
    Json(request): Json<EscrowDepositRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state.escrow.lock().deposit(request.node_id, request.amount, Utc::now()).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
