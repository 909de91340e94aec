use async_trait::async_trait;
use reqwest::Client;
use std::{env, time::Duration};
use tracing::{debug, info};
use url::Url;

use super::{IdentityToken, TokenSource};
use crate::error::TokenSourceError;

/// Overrides the metadata server host, as honored by Google client libraries
const GCE_METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const IDENTITY_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/identity";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches ID tokens from the GCE / GKE / Cloud Run metadata server
#[derive(Debug, Clone)]
pub struct MetadataTokenSource {
    client: Client,
    base_url: String,
    audience: String,
}

impl MetadataTokenSource {
    pub fn new(audience: impl Into<String>) -> Result<Self, TokenSourceError> {
        let host = env::var(GCE_METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Self::with_base_url(format!("http://{host}"), audience)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, TokenSourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            audience: audience.into(),
        })
    }

    fn identity_url(&self) -> Result<Url, TokenSourceError> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(IDENTITY_PATH))
            .map_err(|e| {
                TokenSourceError::Unavailable(format!(
                    "invalid metadata server URL '{}': {e}",
                    self.base_url
                ))
            })?;
        url.query_pairs_mut()
            .append_pair("audience", &self.audience)
            .append_pair("format", "full");
        Ok(url)
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError> {
        let url = self.identity_url()?;
        debug!("Requesting identity token from metadata server: {}", url);

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TokenSourceError::Status {
                endpoint: "metadata server",
                status: status.as_u16(),
                body,
            });
        }

        let token = body.trim();
        if token.is_empty() {
            return Err(TokenSourceError::Unavailable(
                "metadata server returned an empty token".to_string(),
            ));
        }

        info!("Obtained identity token from metadata server");
        Ok(IdentityToken::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::fake_jwt;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_token_for_audience() {
        let server = MockServer::start().await;
        let jwt = fake_jwt(4_102_444_800);
        Mock::given(method("GET"))
            .and(path(format!("/{IDENTITY_PATH}")))
            .and(header("Metadata-Flavor", "Google"))
            .and(query_param("audience", "https://sts.amazonaws.com"))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{jwt}\n")))
            .expect(1)
            .mount(&server)
            .await;

        let source =
            MetadataTokenSource::with_base_url(server.uri(), "https://sts.amazonaws.com").unwrap();
        let token = source.token().await.unwrap();

        assert_eq!(token.access_token, jwt);
        assert_eq!(token.expiry.map(|e| e.timestamp()), Some(4_102_444_800));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let source = MetadataTokenSource::with_base_url(server.uri(), "aud").unwrap();
        match source.token().await.unwrap_err() {
            TokenSourceError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;

        let source = MetadataTokenSource::with_base_url(server.uri(), "aud").unwrap();
        assert!(matches!(
            source.token().await.unwrap_err(),
            TokenSourceError::Unavailable(_)
        ));
    }

    #[test]
    #[serial]
    fn test_metadata_host_env_override() {
        let original = env::var(GCE_METADATA_HOST_ENV).ok();

        unsafe {
            env::set_var(GCE_METADATA_HOST_ENV, "127.0.0.1:8080");
        }
        let source = MetadataTokenSource::new("aud").unwrap();
        assert_eq!(
            source.identity_url().unwrap().as_str(),
            "http://127.0.0.1:8080/computeMetadata/v1/instance/service-accounts/default/identity?audience=aud&format=full"
        );

        unsafe {
            match original {
                Some(val) => env::set_var(GCE_METADATA_HOST_ENV, val),
                None => env::remove_var(GCE_METADATA_HOST_ENV),
            }
        }
    }
}
