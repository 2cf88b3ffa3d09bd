use std::sync::Arc;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Verified identity extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
}

/// Why a token was refused. Every validation failure resolves to one of
/// these; nothing else escapes the validator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Rejection {
    #[error("missing token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("audience mismatch")]
    WrongAudience,
    #[error("issuer mismatch")]
    WrongIssuer,
    #[error("no signing key matches the token's key id")]
    UnknownKey,
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Issuer base URL; the JWKS document lives at
    /// `{issuer}/.well-known/jwks.json`.
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies bearer tokens against the issuer's published RS256 keys.
///
/// The JWKS document is fetched once and cached. A token whose `kid` is not
/// in the cache triggers one re-fetch (key rotation) before the token is
/// rejected as unknown.
#[derive(Clone)]
pub struct TokenValidator {
    inner: Arc<ValidatorInner>,
}

struct ValidatorInner {
    config: ValidatorConfig,
    http: reqwest::Client,
    keys: RwLock<Option<JwkSet>>,
    // True when the key set was supplied at construction; never re-fetched.
    static_keys: bool,
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            inner: Arc::new(ValidatorInner {
                config,
                http: reqwest::Client::new(),
                keys: RwLock::new(None),
                static_keys: false,
            }),
        }
    }

    /// Validator with a pre-loaded key set. No network fetches; used by
    /// tests and deployments that pin the issuer keys.
    pub fn with_keys(config: ValidatorConfig, keys: JwkSet) -> Self {
        Self {
            inner: Arc::new(ValidatorInner {
                config,
                http: reqwest::Client::new(),
                keys: RwLock::new(Some(keys)),
                static_keys: true,
            }),
        }
    }

    /// Verify signature, expiry, audience, and issuer. Every failure path
    /// resolves to a `Rejection` value.
    pub async fn validate(&self, token: &str) -> Result<Identity, Rejection> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Rejection::MissingToken);
        }

        let header = decode_header(token).map_err(|_| Rejection::Malformed)?;
        let kid = header.kid.ok_or(Rejection::Malformed)?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| Rejection::KeyFetch(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.inner.config.audience]);
        validation.set_issuer(&[&self.inner.config.issuer]);

        let data = decode::<Claims>(token, &key, &validation).map_err(map_decode_error)?;

        Ok(Identity {
            subject: data.claims.sub,
            email: data.claims.email,
        })
    }

    /// Look up the key for `kid`, re-fetching the JWKS once on a miss to
    /// pick up rotated keys.
    async fn signing_key(&self, kid: &str) -> Result<Jwk, Rejection> {
        {
            let keys = self.inner.keys.read().await;
            if let Some(set) = keys.as_ref() {
                if let Some(jwk) = set.find(kid) {
                    return Ok(jwk.clone());
                }
                if self.inner.static_keys {
                    return Err(Rejection::UnknownKey);
                }
                debug!("kid {} not in cached JWKS, refreshing", kid);
            }
        }

        if self.inner.static_keys {
            return Err(Rejection::UnknownKey);
        }

        self.refresh_keys().await?;

        let keys = self.inner.keys.read().await;
        keys.as_ref()
            .and_then(|set| set.find(kid))
            .cloned()
            .ok_or(Rejection::UnknownKey)
    }

    async fn refresh_keys(&self) -> Result<(), Rejection> {
        let url = format!(
            "{}/.well-known/jwks.json",
            self.inner.config.issuer.trim_end_matches('/')
        );

        let set: JwkSet = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Rejection::KeyFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| Rejection::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| Rejection::KeyFetch(e.to_string()))?;

        info!("Fetched {} signing keys from {}", set.keys.len(), url);
        *self.inner.keys.write().await = Some(set);
        Ok(())
    }
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> Rejection {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::ExpiredSignature => Rejection::Expired,
        ErrorKind::InvalidSignature => Rejection::BadSignature,
        ErrorKind::InvalidAudience => Rejection::WrongAudience,
        ErrorKind::InvalidIssuer => Rejection::WrongIssuer,
        _ => Rejection::Malformed,
    }
}
