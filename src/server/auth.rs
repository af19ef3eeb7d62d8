//! Bearer-token auth and optional DID signature co-check.
//!
//! [`AuthContext::authenticate`] is the single entry point both the Axum
//! middleware and the Tonic interceptor call, so bearer-extraction and
//! introspection-caching logic exists in exactly one place regardless of
//! which wire transport a request arrived on.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{A2AError, A2AResult};

/// Result of token introspection.
#[derive(Debug, Clone, Deserialize)]
pub struct Introspection {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// DID signature material attached to a request, once verified.
#[derive(Debug, Clone)]
pub struct DidSignatureInfo {
    pub did: String,
    pub verified: bool,
}

/// Authenticated identity attached to a request after [`AuthContext::authenticate`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub client_id: String,
    pub scope: Vec<String>,
    pub exp: i64,
    pub is_m2m: bool,
    pub signature_info: Option<DidSignatureInfo>,
}

/// Validates opaque bearer tokens against an external identity provider.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn introspect(&self, token: &str) -> A2AResult<Introspection>;
}

struct CachedIntrospection {
    introspection: Introspection,
    cached_at: Instant,
}

/// Introspects tokens against an Ory Hydra-style admin introspection endpoint.
///
/// Caches results for `ttl` so that repeated calls within the same short
/// window don't each round-trip to the identity provider.
pub struct HydraTokenValidator {
    client: reqwest::Client,
    admin_url: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedIntrospection>>,
}

impl HydraTokenValidator {
    pub fn new(admin_url: impl Into<String>, timeout: Duration, verify_tls: bool) -> A2AResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| A2AError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            admin_url: admin_url.into(),
            ttl: Duration::from_secs(30),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl TokenValidator for HydraTokenValidator {
    async fn introspect(&self, token: &str) -> A2AResult<Introspection> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(token) {
                if entry.cached_at.elapsed() < self.ttl {
                    return Ok(entry.introspection.clone());
                }
            }
        }

        let url = format!("{}/admin/oauth2/introspect", self.admin_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| A2AError::unauthenticated(format!("token introspection failed: {e}")))?;

        let introspection: Introspection = response
            .json()
            .await
            .map_err(|e| A2AError::unauthenticated(format!("malformed introspection response: {e}")))?;

        let mut cache = self.cache.write().await;
        cache.insert(
            token.to_string(),
            CachedIntrospection {
                introspection: introspection.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(introspection)
    }
}

/// Extract a bearer token from an `Authorization: Bearer <token>` value.
pub fn extract_bearer_token(authorization: Option<&str>) -> Option<String> {
    let header = authorization?;
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Maximum allowed clock skew, in seconds, for a DID-signed request.
pub const MAX_SIGNATURE_AGE_SECS: i64 = 300;

/// Verifies DID-based request signatures, consumed as an external capability
/// (the core never signs, only verifies).
pub trait DidVerifier: Send + Sync {
    /// Verify `signature` over the canonical `(body, timestamp, did)` payload
    /// using `public_key_multibase`. Returns `Ok(true)` only on a valid,
    /// well-formed signature within [`MAX_SIGNATURE_AGE_SECS`] of `now`.
    fn verify(
        &self,
        body: &str,
        did: &str,
        timestamp: i64,
        signature_b64: &str,
        public_key_multibase: &str,
        now: i64,
    ) -> bool;
}

/// Builds the canonical signed payload: `{"body":…, "did":…, "timestamp":…}`
/// with keys sorted, matching the source's `json.dumps(..., sort_keys=True)`.
fn canonical_payload(body: &str, did: &str, timestamp: i64) -> String {
    let mut map: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    map.insert("body", serde_json::Value::String(body.to_string()));
    map.insert("did", serde_json::Value::String(did.to_string()));
    map.insert("timestamp", serde_json::Value::Number(timestamp.into()));
    serde_json::to_string(&map).unwrap_or_default()
}

/// Ed25519 [`DidVerifier`] backed by the `ed25519-dalek`/`multibase` crates.
pub struct Ed25519DidVerifier;

impl DidVerifier for Ed25519DidVerifier {
    fn verify(
        &self,
        body: &str,
        did: &str,
        timestamp: i64,
        signature_b64: &str,
        public_key_multibase: &str,
        now: i64,
    ) -> bool {
        if (now - timestamp).abs() > MAX_SIGNATURE_AGE_SECS {
            return false;
        }

        let Ok((_, key_bytes)) = multibase::decode(public_key_multibase) else {
            return false;
        };
        let Ok(key_bytes): Result<[u8; 32], _> = key_bytes.try_into() else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };

        let Ok(signature_bytes) = base64_decode(signature_b64) else {
            return false;
        };
        let Ok(signature_bytes): Result<[u8; 64], _> = signature_bytes.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(&signature_bytes);

        let payload = canonical_payload(body, did, timestamp);
        verifying_key.verify_strict(payload.as_bytes(), &signature).is_ok()
    }
}

fn base64_decode(s: &str) -> Result<Vec<u8>, ()> {
    BASE64_STANDARD.decode(s).map_err(|_| ())
}

/// Request-local headers relevant to authentication, transport-agnostic so
/// the same [`AuthContext::authenticate`] serves both HTTP and gRPC metadata.
pub struct AuthHeaders<'a> {
    pub authorization: Option<&'a str>,
    pub did: Option<&'a str>,
    pub did_signature: Option<&'a str>,
    pub did_timestamp: Option<&'a str>,
}

/// Endpoints that never require a bearer token.
pub const PUBLIC_PATHS: &[&str] = &["/.well-known/agent.json", "/docs", "/favicon.ico", "/metrics"];

/// Shared authentication entry point for both wire transports.
pub struct AuthContext {
    validator: std::sync::Arc<dyn TokenValidator>,
    did_verifier: std::sync::Arc<dyn DidVerifier>,
    public_key_lookup: Option<std::sync::Arc<dyn Fn(&str) -> Option<String> + Send + Sync>>,
}

impl AuthContext {
    pub fn new(validator: std::sync::Arc<dyn TokenValidator>) -> Self {
        Self {
            validator,
            did_verifier: std::sync::Arc::new(Ed25519DidVerifier),
            public_key_lookup: None,
        }
    }

    /// Authenticate a request: extract + introspect the bearer token, then
    /// additively verify a DID signature co-check if signature headers are
    /// present and a public-key lookup has been configured.
    pub async fn authenticate(&self, body: &str, headers: AuthHeaders<'_>, now: i64) -> A2AResult<Principal> {
        let token = extract_bearer_token(headers.authorization)
            .ok_or_else(|| A2AError::unauthenticated("Missing authorization token"))?;

        let introspection = self.validator.introspect(&token).await?;
        if !introspection.active {
            return Err(A2AError::unauthenticated("Invalid authorization token"));
        }

        let scope = introspection
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let signature_info = self.verify_did_signature(body, &headers, now);

        Ok(Principal {
            client_id: introspection.client_id.unwrap_or_default(),
            scope,
            exp: introspection.exp.unwrap_or(0),
            is_m2m: false,
            signature_info,
        })
    }

    fn verify_did_signature(&self, body: &str, headers: &AuthHeaders<'_>, now: i64) -> Option<DidSignatureInfo> {
        let did = headers.did?;
        let signature = headers.did_signature?;
        let timestamp: i64 = headers.did_timestamp?.parse().ok()?;
        let lookup = self.public_key_lookup.as_ref()?;
        let public_key = lookup(did)?;
        let verified = self
            .did_verifier
            .verify(body, did, timestamp, signature, &public_key, now);
        Some(DidSignatureInfo {
            did: did.to_string(),
            verified,
        })
    }
}
