//! Google OIDC identity token sources.
//!
//! A [`TokenSource`] hands out a bearer ID token on demand. The credential
//! provider reads the current token on every exchange and never mutates it.

pub mod cache;
pub mod metadata;
pub mod service_account;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{env, fmt, path::Path, sync::Arc};
use tracing::debug;

use crate::error::TokenSourceError;

pub use cache::CachingTokenSource;
pub use metadata::MetadataTokenSource;
pub use service_account::ServiceAccountTokenSource;

/// Standard Application Default Credentials variable
const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// OIDC identity token issued by Google
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken {
    pub access_token: String,
    /// Taken from the JWT `exp` claim, if the token carries one
    pub expiry: Option<DateTime<Utc>>,
}

impl IdentityToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let expiry = jwt_expiry(&access_token);
        Self {
            access_token,
            expiry,
        }
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityToken")
            .field("access_token", &"********")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Source of identity tokens. Implementations must tolerate repeated calls and
/// may cache internally.
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError> {
        (**self).token().await
    }
}

/// Always returns the same token
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: IdentityToken,
}

impl StaticTokenSource {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: IdentityToken::new(access_token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError> {
        Ok(self.token.clone())
    }
}

/// Build the token source for `audience`.
///
/// Resolution order: explicit key file, `GOOGLE_APPLICATION_CREDENTIALS`, then
/// the metadata server. The result reuses tokens until they are close to expiry.
pub async fn default_token_source(
    audience: &str,
    credential_file: Option<&Path>,
) -> Result<Arc<dyn TokenSource>, TokenSourceError> {
    let key_file = credential_file
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(GOOGLE_APPLICATION_CREDENTIALS).map(Into::into));

    let source: Arc<dyn TokenSource> = match key_file {
        Some(path) => {
            debug!("Using service account key file: {}", path.display());
            let inner = ServiceAccountTokenSource::from_file(&path, audience).await?;
            Arc::new(CachingTokenSource::new(inner))
        }
        None => {
            debug!("Using metadata server identity token");
            Arc::new(CachingTokenSource::new(MetadataTokenSource::new(audience)?))
        }
    };

    Ok(source)
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Read the `exp` claim without verifying the signature
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claim.exp?, 0)
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "aud": "https://sts.amazonaws.com", "exp": exp }).to_string(),
    );
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
