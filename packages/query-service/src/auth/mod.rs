//! Auth & rate-limit identity (spec §4.13): tier resolution from the
//! `X-API-Key` header, and the in-process registry credentials resolve
//! against. Rate-limiting itself lives in `crate::middleware::rate_limit`,
//! which only needs the [`Tier`] this module resolves.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::ApiError;

/// Caller class, ordered so `t1 <= t2` iff every endpoint open to `t1` is
/// also open to `t2` (spec §4.13 tier hierarchy, §8 monotonicity property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Public,
    Registered,
    Premium,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Public => "PUBLIC",
            Tier::Registered => "REGISTERED",
            Tier::Premium => "PREMIUM",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "public" => Some(Tier::Public),
            "registered" => Some(Tier::Registered),
            "premium" => Some(Tier::Premium),
            _ => None,
        }
    }

    /// Requests-per-hour quota (spec §4.13).
    pub fn requests_per_hour(self) -> u32 {
        match self {
            Tier::Public => 100,
            Tier::Registered => 1_000,
            Tier::Premium => 999_999,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct ApiKeyRecord {
    tier: Tier,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process credential registry (spec §4.13: "a recognized credential
/// resolves to its declared tier from an in-process registry").
#[derive(Clone, Default)]
pub struct ApiKeyRegistry {
    keys: Arc<DashMap<String, ApiKeyRecord>>,
}

impl ApiKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: impl Into<String>, tier: Tier) {
        self.keys.insert(key.into(), ApiKeyRecord { tier, expires_at: None });
    }

    pub fn register_with_expiry(&self, key: impl Into<String>, tier: Tier, expires_at: DateTime<Utc>) {
        self.keys.insert(key.into(), ApiKeyRecord { tier, expires_at: Some(expires_at) });
    }

    /// Parses `QUERY_SERVICE_API_KEYS`-style entries: `key:tier` pairs
    /// separated by commas, e.g. `kp_aaaa...:registered,kp_bbbb...:premium`.
    pub fn from_spec(spec: &str) -> Self {
        let registry = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((key, tier_raw)) = entry.split_once(':') else {
                continue;
            };
            if let Some(tier) = Tier::parse(tier_raw) {
                registry.register(key.to_string(), tier);
            }
        }
        registry
    }

    /// An expired key behaves as unrecognized (spec §4.13).
    fn resolve(&self, key: &str) -> Option<Tier> {
        let record = self.keys.get(key)?;
        match record.expires_at {
            Some(exp) if exp <= Utc::now() => None,
            _ => Some(record.tier),
        }
    }
}

/// `kp_` followed by exactly 32 hex characters, either case.
fn is_well_formed(key: &str) -> bool {
    key.len() == 35 && key.starts_with("kp_") && key[3..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// A credential that was present and well-formed, carried in request
/// extensions so the rate limiter can bucket by key instead of IP.
#[derive(Debug, Clone)]
pub struct PresentedApiKey(pub String);

/// Resolves the caller's tier from the `X-API-Key` header (spec §4.13).
/// Absence yields `PUBLIC`; a malformed or unrecognized header is a typed
/// auth failure the caller maps to a 401 response.
pub fn resolve_tier(
    headers: &HeaderMap,
    registry: &ApiKeyRegistry,
) -> Result<(Tier, Option<PresentedApiKey>), ApiError> {
    let Some(raw) = headers.get("x-api-key") else {
        return Ok((Tier::Public, None));
    };
    let key = raw
        .to_str()
        .map_err(|_| ApiError::Unauthorized("X-API-Key header is not valid UTF-8".into()))?;

    if !is_well_formed(key) {
        return Err(ApiError::Unauthorized("malformed API key".into()));
    }

    match registry.resolve(key) {
        Some(tier) => Ok((tier, Some(PresentedApiKey(key.to_string())))),
        None => Err(ApiError::Unauthorized("unrecognized API key".into())),
    }
}

/// Passes when `caller >= required`, else `FORBIDDEN` with both tiers named
/// (spec §4.12 tier gating, §8 scenario 4).
pub fn require_tier(caller: Tier, required: Tier) -> Result<(), ApiError> {
    if caller >= required {
        Ok(())
    } else {
        Err(ApiError::Forbidden { current_tier: caller, required_tier: required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key.parse().unwrap());
        headers
    }

    #[test]
    fn absent_header_yields_public_tier() {
        let registry = ApiKeyRegistry::new();
        let (tier, key) = resolve_tier(&HeaderMap::new(), &registry).unwrap();
        assert_eq!(tier, Tier::Public);
        assert!(key.is_none());
    }

    #[test]
    fn well_formed_but_unrecognized_is_unauthorized() {
        let registry = ApiKeyRegistry::new();
        let headers = headers_with("kp_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert!(matches!(resolve_tier(&headers, &registry), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn thirty_one_hex_chars_is_unauthorized() {
        let registry = ApiKeyRegistry::new();
        let headers = headers_with("kp_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert!(matches!(resolve_tier(&headers, &registry), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn uppercase_hex_registered_key_grants_access() {
        let registry = ApiKeyRegistry::new();
        let key = "kp_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        registry.register(key, Tier::Registered);
        let headers = headers_with(key);
        let (tier, presented) = resolve_tier(&headers, &registry).unwrap();
        assert_eq!(tier, Tier::Registered);
        assert_eq!(presented.unwrap().0, key);
    }

    #[test]
    fn expired_key_behaves_as_unrecognized() {
        let registry = ApiKeyRegistry::new();
        let key = "kp_bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        registry.register_with_expiry(key, Tier::Premium, Utc::now() - chrono::Duration::hours(1));
        let headers = headers_with(key);
        assert!(matches!(resolve_tier(&headers, &registry), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn tier_ordering_is_monotonic() {
        assert!(Tier::Public < Tier::Registered);
        assert!(Tier::Registered < Tier::Premium);
        assert!(require_tier(Tier::Premium, Tier::Public).is_ok());
        assert!(require_tier(Tier::Public, Tier::Registered).is_err());
    }
}
