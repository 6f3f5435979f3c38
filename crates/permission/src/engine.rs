//! `DefaultPermissionEngine`: the stateful core of spec.md §4.4. Session
//! state (grants, caches, rate buckets, time bounds) lives behind a
//! `DashMap` the way the teacher shards agent state in its scheduler and
//! resource manager, with the whole-table FIFO eviction and per-session
//! `tokio::sync::Mutex` prompt lock built on top of it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use dashmap::DashMap;
use fulcrum_common::SessionId;
use fulcrum_journal::Journal;
use futures::TryStreamExt;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::{FifoCache, MAX_CONSTRAINT_CACHE, MAX_OBSERVED_CACHE, MAX_SESSION_CACHES};
use crate::dct::{covers as dct_covers, DelegationCapabilityToken};
use crate::error::PermissionError;
use crate::grant::{
    Alternative, ApprovalDecision, Constraints, GrantEffect, LegacyDecision, PermissionGrant,
    RateBucket, StructuredDecision, TimeBound, Ttl,
};
use crate::scope::{scope_matches_grant, Scope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredPermission {
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct PermissionCheckRequest {
    pub session_id: SessionId,
    pub tool_name: String,
    pub step_id: Option<String>,
    pub permissions: Vec<RequiredPermission>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionCheckResult {
    pub allowed: bool,
    pub constraints: Option<Constraints>,
    pub observed: Option<String>,
    pub alternative: Option<Alternative>,
}

#[derive(Debug, Clone)]
pub struct ApprovalPromptRequest {
    pub session_id: SessionId,
    pub tool_name: String,
    pub missing_scopes: Vec<String>,
}

/// Implemented by whatever surfaces the approval UI — the CLI, a webhook
/// relay, or a test double. The engine guarantees at most one concurrent
/// call per session (spec.md §5's per-session prompt lock).
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn prompt(&self, request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError>;
}

#[derive(Default)]
struct SessionState {
    grants: HashMap<String, PermissionGrant>,
    constraint_cache: FifoCache<String, Constraints>,
    observed_cache: FifoCache<String, String>,
    rate_buckets: HashMap<String, RateBucket>,
    time_bounds: HashMap<String, TimeBound>,
    /// Conditional (rate/time-bounded) scopes already cross-checked against
    /// the journal this process lifetime (spec.md §4.4's history-poisoning
    /// guard — re-verified once per scope, not on every `isGranted` call).
    journal_verified: HashSet<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            grants: HashMap::new(),
            constraint_cache: FifoCache::new(MAX_CONSTRAINT_CACHE),
            observed_cache: FifoCache::new(MAX_OBSERVED_CACHE),
            rate_buckets: HashMap::new(),
            time_bounds: HashMap::new(),
            journal_verified: HashSet::new(),
        }
    }
}

pub struct DefaultPermissionEngine {
    journal: Arc<dyn Journal>,
    approval: Arc<dyn ApprovalChannel>,
    signing_secret: Vec<u8>,
    sessions: DashMap<SessionId, SessionState>,
    session_order: SyncMutex<VecDeque<SessionId>>,
    prompt_locks: DashMap<SessionId, Arc<AsyncMutex<()>>>,
    dct_registry: DashMap<SessionId, DelegationCapabilityToken>,
}

impl DefaultPermissionEngine {
    pub fn new(journal: Arc<dyn Journal>, approval: Arc<dyn ApprovalChannel>, signing_secret: Vec<u8>) -> Self {
        Self {
            journal,
            approval,
            signing_secret,
            sessions: DashMap::new(),
            session_order: SyncMutex::new(VecDeque::new()),
            prompt_locks: DashMap::new(),
            dct_registry: DashMap::new(),
        }
    }

    pub fn register_dct(&self, session_id: SessionId, token: DelegationCapabilityToken) -> Result<(), PermissionError> {
        crate::dct::verify(&self.signing_secret, &token)?;
        self.dct_registry.insert(session_id, token);
        Ok(())
    }

    fn touch_session(&self, session_id: SessionId) {
        if !self.sessions.contains_key(&session_id) {
            self.sessions.insert(session_id, SessionState::new());
            let mut order = self.session_order.lock();
            order.push_back(session_id);
            while order.len() > MAX_SESSION_CACHES {
                if let Some(oldest) = order.pop_front() {
                    self.sessions.remove(&oldest);
                    self.prompt_locks.remove(&oldest);
                    self.dct_registry.remove(&oldest);
                }
            }
        }
    }

    fn prompt_lock(&self, session_id: SessionId) -> Arc<AsyncMutex<()>> {
        self.prompt_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Install a session-TTL grant directly, bypassing the prompt flow.
    /// Used by DCT application and plugin-driven bootstrapping.
    pub fn pre_grant(&self, session_id: SessionId, scopes: &[String], granted_by: &str) {
        self.touch_session(session_id);
        let mut state = self.sessions.get_mut(&session_id).expect("just touched");
        for scope in scopes {
            state.grants.insert(
                scope.clone(),
                PermissionGrant {
                    scope: scope.clone(),
                    effect: GrantEffect::Allow,
                    granted_by: granted_by.to_string(),
                    granted_at: Utc::now(),
                    ttl: Ttl::Session,
                },
            );
        }
    }

    pub fn clear_session(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
        self.prompt_locks.remove(&session_id);
        self.dct_registry.remove(&session_id);
        self.session_order.lock().retain(|s| *s != session_id);
    }

    /// Exact match OR wildcard grant match, then rate bucket, then time
    /// bound — all three must succeed.
    pub async fn is_granted(&self, scope_str: &str, session_id: SessionId) -> Result<bool, PermissionError> {
        if let Some(token) = self.dct_registry.get(&session_id) {
            if crate::dct::verify(&self.signing_secret, &token).is_err() || !dct_covers(&token, scope_str) {
                return Ok(false);
            }
        }

        let requested = Scope::parse(scope_str)?;

        let matched_key = {
            let Some(state) = self.sessions.get(&session_id) else {
                return Ok(false);
            };
            state
                .grants
                .values()
                .find(|grant| {
                    Scope::parse_grant(&grant.scope)
                        .map(|g| scope_matches_grant(&g, &requested))
                        .unwrap_or(false)
                })
                .map(|grant| grant.scope.clone())
        };
        let Some(matched_key) = matched_key else {
            return Ok(false);
        };

        if self.has_conditional_state(session_id, &matched_key) {
            self.verify_against_journal(session_id, &matched_key).await?;
        }

        let mut state = self.sessions.get_mut(&session_id).expect("checked above");

        if let Some(bucket) = state.rate_buckets.get_mut(&matched_key) {
            if !bucket.try_consume(Utc::now()) {
                return Ok(false);
            }
        }

        if let Some(bound) = state.time_bounds.get(&matched_key) {
            if !time_bound_satisfied(bound) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn has_conditional_state(&self, session_id: SessionId, scope: &str) -> bool {
        self.sessions
            .get(&session_id)
            .map(|s| s.rate_buckets.contains_key(scope) || s.time_bounds.contains_key(scope))
            .unwrap_or(false)
    }

    /// Confirm a conditional grant traces back to an actual journaled
    /// `permission.granted` event rather than purely mutable state, once
    /// per (session, scope) for the life of this process.
    async fn verify_against_journal(&self, session_id: SessionId, scope: &str) -> Result<(), PermissionError> {
        {
            let state = self.sessions.get(&session_id).expect("checked by caller");
            if state.journal_verified.contains(scope) {
                return Ok(());
            }
        }

        let found = match self.journal.read_session(session_id, None).await {
            Ok(mut events) => {
                let mut found = false;
                while let Some(event) = events.try_next().await? {
                    if event.event_type == "permission.granted"
                        && event.payload.get("scope").and_then(|v| v.as_str()) == Some(scope)
                    {
                        found = true;
                        break;
                    }
                }
                found
            }
            Err(fulcrum_journal::JournalError::SessionNotFound(_)) => false,
            Err(err) => return Err(err.into()),
        };

        let mut state = self.sessions.get_mut(&session_id).expect("checked above");
        if found {
            state.journal_verified.insert(scope.to_string());
        } else {
            // No journaled grant backs this conditional state; drop it so
            // the next `isGranted` call denies rather than trusts memory.
            state.rate_buckets.remove(scope);
            state.time_bounds.remove(scope);
        }
        Ok(())
    }

    pub async fn check(&self, request: PermissionCheckRequest) -> Result<PermissionCheckResult, PermissionError> {
        self.touch_session(request.session_id);

        if let Some(denial) = self.dct_boundary_denial(&request).await? {
            return Ok(denial);
        }

        let missing = self.missing_scopes(&request).await?;
        if missing.is_empty() {
            return Ok(self.cached_result(&request));
        }

        let lock = self.prompt_lock(request.session_id);
        let _guard = lock.lock().await;

        // Re-check: a concurrent prompt may have installed a grant while we
        // waited for the lock.
        let missing = self.missing_scopes(&request).await?;
        if missing.is_empty() {
            return Ok(self.cached_result(&request));
        }

        self.journal
            .emit(
                request.session_id,
                "permission.requested",
                json!({ "tool": request.tool_name, "missing_scopes": missing }),
            )
            .await?;

        let decision = self
            .approval
            .prompt(ApprovalPromptRequest {
                session_id: request.session_id,
                tool_name: request.tool_name.clone(),
                missing_scopes: missing.clone(),
            })
            .await?;

        let result = self.apply_decision(&request, &missing, decision).await?;
        Ok(result)
    }

    /// Build the result for a request whose scopes are all already granted:
    /// `allowed=true` plus any cached constraints for `(session, tool, step)`
    /// or `(session, tool)`. Does not consult `isGranted` again.
    fn cached_result(&self, request: &PermissionCheckRequest) -> PermissionCheckResult {
        let state = self.sessions.get(&request.session_id);
        let step_key = format!("{}#{}", request.tool_name, request.step_id.as_deref().unwrap_or(""));
        let tool_key = request.tool_name.clone();

        let (constraints, observed) = match &state {
            Some(state) => (
                state
                    .constraint_cache
                    .get(&step_key)
                    .or_else(|| state.constraint_cache.get(&tool_key))
                    .cloned(),
                state.observed_cache.get(&tool_key).cloned(),
            ),
            None => (None, None),
        };

        PermissionCheckResult {
            allowed: true,
            constraints,
            observed,
            alternative: None,
        }
    }

    /// spec.md §4.4 DCT enforcer: if a DCT is registered for this session,
    /// every requested scope must be covered by it, checked before the
    /// prompt flow runs at all. A scope outside the boundary is an
    /// immediate denial, not a missing-grant prompt.
    async fn dct_boundary_denial(
        &self,
        request: &PermissionCheckRequest,
    ) -> Result<Option<PermissionCheckResult>, PermissionError> {
        let Some(token) = self.dct_registry.get(&request.session_id) else {
            return Ok(None);
        };
        let out_of_bounds: Vec<String> = request
            .permissions
            .iter()
            .map(|p| p.scope.clone())
            .filter(|scope| crate::dct::verify(&self.signing_secret, &token).is_err() || !dct_covers(&token, scope))
            .collect();
        if out_of_bounds.is_empty() {
            return Ok(None);
        }
        self.journal
            .emit(
                request.session_id,
                "permission.denied",
                json!({
                    "tool": request.tool_name,
                    "decision_type": "dct_boundary",
                    "scopes": out_of_bounds,
                    "reason": "outside DCT boundary",
                }),
            )
            .await?;
        Ok(Some(PermissionCheckResult { allowed: false, ..Default::default() }))
    }

    async fn missing_scopes(&self, request: &PermissionCheckRequest) -> Result<Vec<String>, PermissionError> {
        let mut missing = Vec::new();
        for permission in &request.permissions {
            if !self.is_granted(&permission.scope, request.session_id).await? {
                missing.push(permission.scope.clone());
            }
        }
        Ok(missing)
    }

    async fn apply_decision(
        &self,
        request: &PermissionCheckRequest,
        missing: &[String],
        decision: ApprovalDecision,
    ) -> Result<PermissionCheckResult, PermissionError> {
        let fallback_scope = missing.first().cloned().unwrap_or_default();
        let decision_type = decision.decision_type_name().to_string();

        if decision.is_denial() {
            let alternative = match &decision {
                ApprovalDecision::Structured(StructuredDecision::DenyWithAlternative { alternative, .. }) => {
                    Some(alternative.clone())
                }
                _ => None,
            };
            self.journal
                .emit(
                    request.session_id,
                    "permission.denied",
                    json!({ "tool": request.tool_name, "decision_type": decision_type, "scopes": missing }),
                )
                .await?;
            return Ok(PermissionCheckResult {
                allowed: false,
                alternative,
                ..Default::default()
            });
        }

        let granted_scope = decision.granted_scope(&fallback_scope);
        let mut state = self.sessions.get_mut(&request.session_id).expect("touched above");

        let mut result = PermissionCheckResult {
            allowed: true,
            ..Default::default()
        };

        match &decision {
            ApprovalDecision::Legacy(legacy) => {
                let ttl = Ttl::from_legacy(match legacy {
                    LegacyDecision::AllowOnce => "allow_once",
                    LegacyDecision::AllowSession => "allow_session",
                    LegacyDecision::AllowAlways => "allow_always",
                    LegacyDecision::Deny => unreachable!("denial handled above"),
                })
                .expect("legacy variant always maps");
                for scope in missing {
                    state.grants.insert(
                        scope.clone(),
                        PermissionGrant {
                            scope: scope.clone(),
                            effect: GrantEffect::Allow,
                            granted_by: "approval_prompt".to_string(),
                            granted_at: Utc::now(),
                            ttl,
                        },
                    );
                }
            }
            ApprovalDecision::Structured(StructuredDecision::AllowConstrained { scope, constraints }) => {
                state.grants.insert(
                    scope.clone(),
                    PermissionGrant {
                        scope: scope.clone(),
                        effect: GrantEffect::AllowConstrained {
                            constraints: constraints.clone(),
                        },
                        granted_by: "approval_prompt".to_string(),
                        granted_at: Utc::now(),
                        ttl: Ttl::Session,
                    },
                );
                state
                    .constraint_cache
                    .insert(request.tool_name.clone(), constraints.clone());
                result.constraints = Some(constraints.clone());
            }
            ApprovalDecision::Structured(StructuredDecision::AllowObserved { scope, telemetry_level }) => {
                state.grants.insert(
                    scope.clone(),
                    PermissionGrant {
                        scope: scope.clone(),
                        effect: GrantEffect::AllowObserved {
                            telemetry_level: telemetry_level.clone(),
                        },
                        granted_by: "approval_prompt".to_string(),
                        granted_at: Utc::now(),
                        ttl: Ttl::Session,
                    },
                );
                state.observed_cache.insert(request.tool_name.clone(), telemetry_level.clone());
                result.observed = Some(telemetry_level.clone());
            }
            ApprovalDecision::Structured(StructuredDecision::AllowRateLimited {
                scope,
                max_calls_per_window,
                window_ms,
            }) => {
                state.grants.insert(
                    scope.clone(),
                    PermissionGrant {
                        scope: scope.clone(),
                        effect: GrantEffect::Allow,
                        granted_by: "approval_prompt".to_string(),
                        granted_at: Utc::now(),
                        ttl: Ttl::Session,
                    },
                );
                state
                    .rate_buckets
                    .insert(scope.clone(), RateBucket::new(*max_calls_per_window, *window_ms, Utc::now()));
                state.journal_verified.insert(scope.clone());
            }
            ApprovalDecision::Structured(StructuredDecision::AllowTimeBounded {
                scope,
                cron_expression,
                window_duration_ms,
                timezone,
            }) => {
                state.grants.insert(
                    scope.clone(),
                    PermissionGrant {
                        scope: scope.clone(),
                        effect: GrantEffect::Allow,
                        granted_by: "approval_prompt".to_string(),
                        granted_at: Utc::now(),
                        ttl: Ttl::Session,
                    },
                );
                state.time_bounds.insert(
                    scope.clone(),
                    TimeBound {
                        cron_expression: cron_expression.clone(),
                        window_duration_ms: *window_duration_ms,
                        timezone: timezone.clone(),
                        prev_cron_fire: previous_cron_fire(cron_expression),
                    },
                );
                state.journal_verified.insert(scope.clone());
            }
            ApprovalDecision::Structured(StructuredDecision::DenyWithAlternative { .. }) => {
                unreachable!("denial handled above")
            }
        }
        drop(state);

        self.journal
            .emit(
                request.session_id,
                "permission.granted",
                json!({
                    "tool": request.tool_name,
                    "decision_type": decision_type,
                    "scope": granted_scope,
                }),
            )
            .await?;

        Ok(result)
    }
}

fn time_bound_satisfied(bound: &TimeBound) -> bool {
    match bound.prev_cron_fire {
        Some(prev) => {
            let elapsed = (Utc::now() - prev).num_milliseconds().max(0) as u64;
            elapsed < bound.window_duration_ms
        }
        None => false,
    }
}

fn previous_cron_fire(expression: &str) -> Option<chrono::DateTime<Utc>> {
    let schedule: Schedule = expression.parse().ok()?;
    // `cron` only walks forward; approximate "most recent fire" by probing
    // backwards from now in window-sized steps bounded to a day.
    let now = Utc::now();
    let mut probe = now - chrono::Duration::days(1);
    let mut last = None;
    for fire in schedule.after(&probe).take(1000) {
        if fire > now {
            break;
        }
        last = Some(fire);
        probe = fire;
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_journal::FileJournal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysAllowOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApprovalChannel for AlwaysAllowOnce {
        async fn prompt(&self, _request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApprovalDecision::Legacy(LegacyDecision::AllowSession))
        }
    }

    fn engine(dir: &tempfile::TempDir) -> (Arc<DefaultPermissionEngine>, Arc<AlwaysAllowOnce>) {
        let journal: Arc<dyn Journal> = Arc::new(FileJournal::open(dir.path().join("j.ndjson")).unwrap());
        let approval = Arc::new(AlwaysAllowOnce { calls: AtomicUsize::new(0) });
        let engine = Arc::new(DefaultPermissionEngine::new(journal, approval.clone(), b"secret".to_vec()));
        (engine, approval)
    }

    #[tokio::test]
    async fn missing_scope_triggers_prompt_and_installs_grant() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, approval) = engine(&dir);
        let session = SessionId::new();

        let result = engine
            .check(PermissionCheckRequest {
                session_id: session,
                tool_name: "fs_write".to_string(),
                step_id: None,
                permissions: vec![RequiredPermission { scope: "fs:write:/tmp/a".to_string() }],
            })
            .await
            .unwrap();

        assert!(result.allowed);
        assert_eq!(approval.calls.load(Ordering::SeqCst), 1);

        // second call for the same scope should be satisfied by the cached grant
        let result2 = engine
            .check(PermissionCheckRequest {
                session_id: session,
                tool_name: "fs_write".to_string(),
                step_id: None,
                permissions: vec![RequiredPermission { scope: "fs:write:/tmp/a".to_string() }],
            })
            .await
            .unwrap();
        assert!(result2.allowed);
        assert_eq!(approval.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_checks_prompt_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, approval) = engine(&dir);
        let session = SessionId::new();

        let req = || PermissionCheckRequest {
            session_id: session,
            tool_name: "net_fetch".to_string(),
            step_id: None,
            permissions: vec![RequiredPermission { scope: "net:fetch:example.com".to_string() }],
        };

        let (a, b) = tokio::join!(engine.check(req()), engine.check(req()));
        assert!(a.unwrap().allowed);
        assert!(b.unwrap().allowed);
        assert_eq!(approval.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_session_removes_grants() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _approval) = engine(&dir);
        let session = SessionId::new();
        engine.pre_grant(session, &["fs:read:/tmp".to_string()], "bootstrap");
        assert!(engine.is_granted("fs:read:/tmp", session).await.unwrap());
        engine.clear_session(session);
        assert!(!engine.is_granted("fs:read:/tmp", session).await.unwrap());
    }

    /// spec.md §4.4 DCT enforcer: a scope outside the registered DCT's
    /// boundary is denied immediately, without ever invoking the approval
    /// prompt (which would otherwise hand the session a fresh grant it has
    /// no business holding).
    #[tokio::test]
    async fn dct_boundary_denies_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, approval) = engine(&dir);
        let parent = SessionId::new();
        let child = SessionId::new();

        let token = crate::dct::issue(
            b"secret",
            parent,
            child,
            &["fs:read:/tmp".to_string()],
            &["fs:read:/tmp".to_string()],
            chrono::Duration::hours(1),
        )
        .unwrap();
        engine.register_dct(child, token).unwrap();

        let result = engine
            .check(PermissionCheckRequest {
                session_id: child,
                tool_name: "fs_write".to_string(),
                step_id: None,
                permissions: vec![RequiredPermission { scope: "fs:write:/tmp/a".to_string() }],
            })
            .await
            .unwrap();

        assert!(!result.allowed);
        assert_eq!(approval.calls.load(Ordering::SeqCst), 0);

        let events: Vec<_> = engine.journal.read_session(child, None).await.unwrap().try_collect().await.unwrap();
        let denial = events.iter().find(|e| e.event_type == "permission.denied").expect("permission.denied event");
        assert_eq!(denial.payload.get("reason").and_then(serde_json::Value::as_str), Some("outside DCT boundary"));
    }
}
