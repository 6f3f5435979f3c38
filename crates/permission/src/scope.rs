//! Scope algebra (spec.md §4.4): a scope is `domain:action:target?` where
//! `target` may itself contain colons. Matching a request scope against a
//! grant scope is always a 3-way comparison; there is no hierarchical
//! ("prefix") matching on `target` by design — a grant target of `a:*`
//! matches only the literal target `*`, not `a:b`.

use crate::error::PermissionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub domain: String,
    pub action: String,
    pub target: Option<String>,
}

impl Scope {
    /// Parse a scope as it appears in a permission *request*. Wildcards in
    /// any position are accepted syntactically (a request never legally
    /// contains one, but we don't police that here — `scope_matches_grant`
    /// only treats `*` specially on the grant side).
    pub fn parse(raw: &str) -> Result<Self, PermissionError> {
        let mut parts = raw.splitn(3, ':');
        let domain = parts.next().filter(|s| !s.is_empty());
        let action = parts.next().filter(|s| !s.is_empty());
        let target = parts.next().map(|s| s.to_string());

        match (domain, action) {
            (Some(domain), Some(action)) => Ok(Self {
                domain: domain.to_string(),
                action: action.to_string(),
                target,
            }),
            _ => Err(PermissionError::MalformedScope(raw.to_string())),
        }
    }

    /// Parse a scope as it appears in a *grant*. A wildcard domain is a
    /// validation error at grant time — it is never legal, even though `*`
    /// is legal for action and target.
    pub fn parse_grant(raw: &str) -> Result<Self, PermissionError> {
        let scope = Self::parse(raw)?;
        if scope.domain == "*" {
            return Err(PermissionError::WildcardDomain(raw.to_string()));
        }
        Ok(scope)
    }

    pub fn to_canonical_string(&self) -> String {
        match &self.target {
            Some(target) => format!("{}:{}:{}", self.domain, self.action, target),
            None => format!("{}:{}", self.domain, self.action),
        }
    }
}

/// `true` iff a grant for `grant_scope` covers a request for
/// `requested_scope`: domain matches exactly, action matches exactly or the
/// grant's action is `*`, and target matches exactly or the grant's target
/// is `*`.
pub fn scope_matches_grant(grant_scope: &Scope, requested_scope: &Scope) -> bool {
    if grant_scope.domain != requested_scope.domain {
        return false;
    }
    if grant_scope.action != "*" && grant_scope.action != requested_scope.action {
        return false;
    }
    match (&grant_scope.target, &requested_scope.target) {
        (Some(g), _) if g == "*" => true,
        (Some(g), Some(r)) => g == r,
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let g = Scope::parse_grant("fs:read:/tmp/a").unwrap();
        let r = Scope::parse("fs:read:/tmp/a").unwrap();
        assert!(scope_matches_grant(&g, &r));
    }

    #[test]
    fn wildcard_action_and_target() {
        let g = Scope::parse_grant("fs:*:*").unwrap();
        let r = Scope::parse("fs:write:/tmp/a").unwrap();
        assert!(scope_matches_grant(&g, &r));
    }

    #[test]
    fn domain_mismatch_never_matches() {
        let g = Scope::parse_grant("fs:*:*").unwrap();
        let r = Scope::parse("net:write:example.com").unwrap();
        assert!(!scope_matches_grant(&g, &r));
    }

    #[test]
    fn wildcard_domain_on_grant_is_rejected() {
        let err = Scope::parse_grant("*:read:/tmp").unwrap_err();
        assert!(matches!(err, PermissionError::WildcardDomain(_)));
    }

    #[test]
    fn trailing_wildcard_target_does_not_hierarchically_match() {
        let g = Scope::parse_grant("fs:read:a:*").unwrap();
        let r = Scope::parse("fs:read:a:b").unwrap();
        // grant target is the literal string "a:*", not a prefix pattern
        assert!(!scope_matches_grant(&g, &r));
    }
}
