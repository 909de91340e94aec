use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Duration};
use tokio::fs;
use tracing::{debug, info};

use super::{IdentityToken, TokenSource};
use crate::error::TokenSourceError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of the signed assertion, the maximum Google accepts
const ASSERTION_LIFETIME_SECS: i64 = 3600;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields of a service account JSON key that are needed to mint ID tokens
#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    key_type: String,
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    target_audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Mints ID tokens by exchanging a self-signed JWT assertion at Google's
/// OAuth2 token endpoint.
#[derive(Clone)]
pub struct ServiceAccountTokenSource {
    client: Client,
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    audience: String,
}

impl ServiceAccountTokenSource {
    pub async fn from_file(
        path: impl AsRef<Path>,
        audience: impl Into<String>,
    ) -> Result<Self, TokenSourceError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| TokenSourceError::KeyFile {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&contents, audience)
    }

    pub fn from_json(json: &str, audience: impl Into<String>) -> Result<Self, TokenSourceError> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).map_err(|e| TokenSourceError::InvalidKey(e.to_string()))?;

        if key.key_type != "service_account" {
            return Err(TokenSourceError::InvalidKey(format!(
                "expected credential type 'service_account', found '{}'",
                key.key_type
            )));
        }

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| TokenSourceError::InvalidKey(e.to_string()))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            encoding_key,
            audience: audience.into(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    fn sign_assertion(&self) -> Result<String, TokenSourceError> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            sub: &self.client_email,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            target_audience: &self.audience,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError> {
        debug!(
            "Requesting identity token for {} from {}",
            self.client_email, self.token_uri
        );
        let assertion = self.sign_assertion()?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenSourceError::Status {
                endpoint: "token endpoint",
                status: status.as_u16(),
                body,
            });
        }

        let token_response: TokenResponse = response.json().await?;
        let id_token = token_response
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenSourceError::MissingIdToken)?;

        info!("Obtained identity token for {}", self.client_email);
        Ok(IdentityToken::new(id_token))
    }
}
