//! Tool-side Policy Enforcer (spec.md §4.5): path, command, and outbound
//! URL checks that tool handlers consult before touching I/O. Grounded on
//! the teacher's `DefaultPolicyEnforcementPoint` rule-matching shape in
//! `runtime/src/integrations/policy_engine/engine.rs`, narrowed to the
//! concrete allow-list checks this spec names rather than a generic rule
//! engine.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyProfile {
    pub allowed_paths: Vec<PathBuf>,
    pub readonly_paths: Option<Vec<PathBuf>>,
    pub writable_paths: Option<Vec<PathBuf>>,
    pub allowed_endpoints: Vec<String>,
    pub allowed_commands: Vec<String>,
    pub require_approval_for_writes: bool,
}

/// Filename patterns that are always denied, regardless of allow-list.
const SENSITIVE_PATTERNS: &[&str] = &[".env", "id_rsa", "id_ed25519", ".pem", ".key", ".pgpass", ".netrc"];

/// Argv[0] values and flag substrings that are rejected outright even if
/// the binary itself is allow-listed.
const DANGEROUS_PATTERNS: &[&str] = &["rm -rf", "-delete", "dd if=", "dd of=", "| sh", "| bash", "|sh", "|bash"];

pub struct PolicyEnforcer;

impl PolicyEnforcer {
    /// Resolve `path` to an absolute, symlink-resolved form and ensure it
    /// is equal to or strictly contained in one of `profile.allowed_paths`.
    /// `write` additionally requires containment in `writable_paths` (if
    /// set) and exclusion from `readonly_paths`.
    pub fn check_path(profile: &PolicyProfile, path: &Path, write: bool) -> Result<(), PolicyError> {
        if is_sensitive_file(path) {
            return Err(PolicyError::SensitiveFile(path.display().to_string()));
        }

        let resolved = resolve(path)?;

        if !contains_path(&profile.allowed_paths, &resolved) {
            return Err(PolicyError::PathNotAllowed(resolved.display().to_string()));
        }

        if write {
            if let Some(readonly) = &profile.readonly_paths {
                if contains_path(readonly, &resolved) {
                    return Err(PolicyError::WriteNotAllowed(resolved.display().to_string()));
                }
            }
            if let Some(writable) = &profile.writable_paths {
                if !contains_path(writable, &resolved) {
                    return Err(PolicyError::WriteNotAllowed(resolved.display().to_string()));
                }
            }
        }

        Ok(())
    }

    /// `argv[0]` must be allow-listed and the full command line must not
    /// contain a known-dangerous substring.
    pub fn check_command(profile: &PolicyProfile, argv: &[String]) -> Result<(), PolicyError> {
        let Some(program) = argv.first() else {
            return Err(PolicyError::CommandNotAllowed(String::new()));
        };
        if !profile.allowed_commands.iter().any(|allowed| allowed == program) {
            return Err(PolicyError::CommandNotAllowed(program.clone()));
        }

        let joined = argv.join(" ");
        for pattern in DANGEROUS_PATTERNS {
            if joined.contains(pattern) {
                return Err(PolicyError::DangerousCommand(joined));
            }
        }
        Ok(())
    }

    /// SSRF guard plus endpoint allow-list for outbound HTTP.
    pub fn check_url(profile: &PolicyProfile, raw_url: &str) -> Result<(), PolicyError> {
        let url = url::Url::parse(raw_url).map_err(|_| PolicyError::InvalidUrl(raw_url.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PolicyError::SsrfBlocked(raw_url.to_string()));
        }

        if let Some(host) = url.host_str() {
            if let Ok(ip) = host.parse::<IpAddr>() {
                if is_blocked_ip(ip) {
                    return Err(PolicyError::SsrfBlocked(raw_url.to_string()));
                }
            }
            if !profile
                .allowed_endpoints
                .iter()
                .any(|endpoint| endpoint == host || raw_url.starts_with(endpoint))
            {
                return Err(PolicyError::EndpointNotAllowed(raw_url.to_string()));
            }
        } else {
            return Err(PolicyError::InvalidUrl(raw_url.to_string()));
        }

        Ok(())
    }
}

fn is_sensitive_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    SENSITIVE_PATTERNS.iter().any(|pattern| name == *pattern || name.ends_with(pattern) || name.contains(pattern))
}

/// Canonicalize the deepest existing ancestor, then re-append the
/// not-yet-existing tail — lets us police paths for files that don't exist
/// yet (a tool about to create one) the same way as existing ones.
fn resolve(path: &Path) -> Result<PathBuf, PolicyError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.clone();
    let mut tail = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                let mut result = resolved;
                for component in tail.into_iter().rev() {
                    result.push(component);
                }
                return Ok(result);
            }
            Err(_) => {
                let Some(parent) = existing.parent() else {
                    return Ok(absolute);
                };
                if let Some(name) = existing.file_name() {
                    tail.push(name.to_os_string());
                }
                existing = parent.to_path_buf();
            }
        }
    }
}

/// `true` iff `candidate` equals or is strictly contained in some path in
/// `roots`. Uses a trailing separator on the prefix so `/etc` does not
/// match `/etc_backup`.
fn contains_path(roots: &[PathBuf], candidate: &Path) -> bool {
    roots.iter().any(|root| {
        if candidate == root {
            return true;
        }
        let mut root_with_sep = root.as_os_str().to_os_string();
        if !root_with_sep.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
            root_with_sep.push(std::path::MAIN_SEPARATOR.to_string());
        }
        candidate.as_os_str().to_string_lossy().starts_with(&*root_with_sep.to_string_lossy())
    })
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_multicast()
                || v4.is_private()
                || is_cgnat(v4)
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || v6.is_multicast(),
    }
}

/// 100.64.0.0/10, the carrier-grade NAT range `std` has no helper for.
fn is_cgnat(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0xC0) == 64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(allowed: &[&str]) -> PolicyProfile {
        PolicyProfile {
            allowed_paths: allowed.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn sensitive_files_always_denied() {
        let profile = profile(&["/tmp"]);
        let err = PolicyEnforcer::check_path(&profile, Path::new("/tmp/.env"), false).unwrap_err();
        assert!(matches!(err, PolicyError::SensitiveFile(_)));
    }

    #[test]
    fn prefix_check_rejects_sibling_directory() {
        // "/etc" must not match "/etc_backup/secrets"
        assert!(!contains_path(&[PathBuf::from("/etc")], Path::new("/etc_backup/secrets")));
        assert!(contains_path(&[PathBuf::from("/etc")], Path::new("/etc/passwd")));
    }

    #[test]
    fn write_requires_writable_paths_when_set() {
        let mut profile = profile(&["/tmp"]);
        profile.writable_paths = Some(vec![PathBuf::from("/tmp/out")]);
        let err = PolicyEnforcer::check_command(&profile, &[]).unwrap_err();
        assert!(matches!(err, PolicyError::CommandNotAllowed(_)));
    }

    #[test]
    fn dangerous_shell_patterns_rejected() {
        let mut profile = PolicyProfile::default();
        profile.allowed_commands = vec!["rm".to_string()];
        let err = PolicyEnforcer::check_command(&profile, &["rm".into(), "-rf".into(), "/".into()]).unwrap_err();
        assert!(matches!(err, PolicyError::DangerousCommand(_)));
    }

    #[test]
    fn ssrf_guard_blocks_loopback_and_private_ranges() {
        let mut profile = PolicyProfile::default();
        profile.allowed_endpoints = vec!["127.0.0.1".to_string(), "10.0.0.5".to_string(), "169.254.169.254".to_string()];
        assert!(matches!(
            PolicyEnforcer::check_url(&profile, "http://127.0.0.1/admin").unwrap_err(),
            PolicyError::SsrfBlocked(_)
        ));
        assert!(matches!(
            PolicyEnforcer::check_url(&profile, "http://10.0.0.5/x").unwrap_err(),
            PolicyError::SsrfBlocked(_)
        ));
        assert!(matches!(
            PolicyEnforcer::check_url(&profile, "http://169.254.169.254/latest/meta-data").unwrap_err(),
            PolicyError::SsrfBlocked(_)
        ));
    }

    #[test]
    fn ssrf_guard_allows_listed_public_host() {
        let mut profile = PolicyProfile::default();
        profile.allowed_endpoints = vec!["api.example.com".to_string()];
        assert!(PolicyEnforcer::check_url(&profile, "https://api.example.com/v1/things").is_ok());
    }

    #[test]
    fn non_http_scheme_rejected() {
        let profile = PolicyProfile::default();
        let err = PolicyEnforcer::check_url(&profile, "file:///etc/passwd").unwrap_err();
        assert!(matches!(err, PolicyError::SsrfBlocked(_)));
    }
}
