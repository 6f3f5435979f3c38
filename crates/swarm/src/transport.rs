//! HTTP(S) request/response transport for the swarm wire protocol
//! (spec.md §4.9, §6). Every outbound URL passes an SSRF guard modeled on
//! `fulcrum_permission::PolicyEnforcer::check_url`'s IP-blocking logic,
//! generalized here since a peer's `api_url` is dynamic rather than drawn
//! from a static allow-list.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SwarmError;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct Transport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        base_url: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, SwarmError> {
        let url = join_url(base_url, path)?;
        guard_url(&url)?;

        let mut request = self.client.post(url).json(body).timeout(self.config.timeout);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::time::timeout(self.config.timeout, request.send())
            .await
            .map_err(|_| SwarmError::Timeout(self.config.timeout.as_millis() as u64))??;

        if !response.status().is_success() {
            return Err(SwarmError::PeerRejected(response.status().as_u16()));
        }
        Ok(response.json::<Resp>().await?)
    }

    pub async fn get<Resp: DeserializeOwned>(&self, base_url: &str, path: &str) -> Result<Resp, SwarmError> {
        let url = join_url(base_url, path)?;
        guard_url(&url)?;

        let mut request = self.client.get(url).timeout(self.config.timeout);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::time::timeout(self.config.timeout, request.send())
            .await
            .map_err(|_| SwarmError::Timeout(self.config.timeout.as_millis() as u64))??;

        if !response.status().is_success() {
            return Err(SwarmError::PeerRejected(response.status().as_u16()));
        }
        Ok(response.json::<Resp>().await?)
    }
}

/// URL-encode each path segment before joining, so a malicious `task_id`
/// can't smuggle an extra path component into the request.
fn join_url(base_url: &str, path: &str) -> Result<url::Url, SwarmError> {
    let mut url = url::Url::parse(base_url).map_err(|_| SwarmError::SsrfBlocked(base_url.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| SwarmError::SsrfBlocked(base_url.to_string()))?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(SwarmError::SsrfBlocked(base_url.to_string()));
            }
            segments.push(segment);
        }
    }
    Ok(url)
}

fn guard_url(url: &url::Url) -> Result<(), SwarmError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SwarmError::SsrfBlocked(url.to_string()));
    }
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_blocked_ip(ip) {
                return Err(SwarmError::SsrfBlocked(url.to_string()));
            }
        }
    } else {
        return Err(SwarmError::SsrfBlocked(url.to_string()));
    }
    Ok(())
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_multicast()
                || v4.is_unspecified()
                || is_cgnat(v4)
                || v4 == Ipv4Addr::new(169, 254, 169, 254) // cloud metadata endpoint
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || (v6.segments()[0] & 0xfe00) == 0xfc00,
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

    #[test]
    fn rejects_loopback_and_private_hosts() {
        assert!(guard_url(&url::Url::parse("http://127.0.0.1/peers").unwrap()).is_err());
        assert!(guard_url(&url::Url::parse("http://10.0.0.5/peers").unwrap()).is_err());
        assert!(guard_url(&url::Url::parse("http://169.254.169.254/latest").unwrap()).is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(guard_url(&url::Url::parse("file:///etc/passwd").unwrap()).is_err());
    }

    #[test]
    fn rejects_cgnat_and_multicast_hosts() {
        assert!(guard_url(&url::Url::parse("http://100.64.0.1/peers").unwrap()).is_err());
        assert!(guard_url(&url::Url::parse("http://224.0.0.1/peers").unwrap()).is_err());
    }

    #[test]
    fn allows_ordinary_https_hosts() {
        assert!(guard_url(&url::Url::parse("https://peer.example.com/join").unwrap()).is_ok());
    }

    #[test]
    fn rejects_dot_segments_in_path() {
        assert!(join_url("https://peer.example.com", "task/../../secret").is_err());
    }
}
