use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{Client as StsClient, error::ProvideErrorMetadata};
use aws_smithy_types::error::display::DisplayErrorContext;
use chrono::DateTime;
use std::fmt;
use tracing::{debug, info, warn};

use super::TemporaryCredentials;
use crate::constants::DEFAULT_AWS_REGION;
use crate::error::ExchangeError;

/// Parameters of an `AssumeRoleWithWebIdentity` call
#[derive(Clone, PartialEq, Eq)]
pub struct WebIdentityRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: Option<i32>,
    pub web_identity_token: String,
}

impl WebIdentityRequest {
    /// Request template without a token; the token is filled in per exchange
    pub fn new(role_arn: impl Into<String>, role_session_name: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: role_session_name.into(),
            duration_seconds: None,
            web_identity_token: String::new(),
        }
    }

    pub fn with_duration_seconds(mut self, duration_seconds: i32) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }
}

impl fmt::Debug for WebIdentityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebIdentityRequest")
            .field("role_arn", &self.role_arn)
            .field("role_session_name", &self.role_session_name)
            .field("duration_seconds", &self.duration_seconds)
            .field("web_identity_token", &"********")
            .finish()
    }
}

/// Exchanges a web identity token for temporary credentials
#[async_trait]
pub trait RoleExchange: Send + Sync + fmt::Debug {
    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> Result<TemporaryCredentials, ExchangeError>;
}

/// [`RoleExchange`] backed by AWS STS
#[derive(Debug, Clone)]
pub struct StsRoleExchange {
    client: StsClient,
}

impl StsRoleExchange {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }

    /// Build an STS client from the shared AWS config for `profile`.
    ///
    /// The loader is told not to resolve credentials: the call is unsigned, and
    /// resolving them could re-enter this tool through `credential_process`.
    pub async fn from_env(profile: &str, region: Option<String>) -> Self {
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .no_credentials();

        // Priority: --region -> ENV vars / config file -> DEFAULT_AWS_REGION
        let config = match region {
            Some(region) => loader.region(Region::new(region)).load().await,
            None => {
                let loaded = loader.load().await;
                match loaded.region() {
                    Some(region) => {
                        info!("Using region: {}", region);
                        loaded
                    }
                    None => {
                        info!(
                            "No region configured, using default {} for STS",
                            DEFAULT_AWS_REGION
                        );
                        aws_config::defaults(BehaviorVersion::latest())
                            .profile_name(profile)
                            .no_credentials()
                            .region(Region::new(DEFAULT_AWS_REGION))
                            .load()
                            .await
                    }
                }
            }
        };

        Self::new(StsClient::new(&config))
    }
}

#[async_trait]
impl RoleExchange for StsRoleExchange {
    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> Result<TemporaryCredentials, ExchangeError> {
        info!("Calling AWS STS AssumeRoleWithWebIdentity");
        debug!("Role ARN: {}", request.role_arn);
        debug!("Session name: {}", request.role_session_name);
        debug!("Duration: {:?} seconds", request.duration_seconds);

        let response = self
            .client
            .assume_role_with_web_identity()
            .role_arn(&request.role_arn)
            .role_session_name(&request.role_session_name)
            .web_identity_token(&request.web_identity_token)
            .set_duration_seconds(request.duration_seconds)
            .send()
            .await
            .map_err(|sdk_error| {
                warn!(error = %DisplayErrorContext(&sdk_error), "STS returned an error assuming web identity role");
                let rejection = sdk_error.as_service_error().map(|service_error| {
                    (
                        service_error.code().unwrap_or("Unknown").to_string(),
                        service_error.message().unwrap_or("no message").to_string(),
                    )
                });
                match rejection {
                    Some((code, message)) => ExchangeError::Rejected {
                        code,
                        message,
                        source: Box::new(sdk_error),
                    },
                    None => ExchangeError::Sts(Box::new(sdk_error)),
                }
            })?;

        let sts_creds = response
            .credentials()
            .ok_or(ExchangeError::MissingCredentials)?;

        let expiration = sts_creds.expiration();
        let expiration = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or(ExchangeError::InvalidExpiration)?;

        info!("Successfully obtained AWS credentials, expiring at {}", expiration);
        Ok(TemporaryCredentials::new(
            sts_creds.access_key_id(),
            sts_creds.secret_access_key(),
            sts_creds.session_token(),
            expiration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sts::config::{Config as StsConfig, retry::RetryConfig};
    use aws_sdk_sts::error::SdkError;
    use aws_sdk_sts::operation::assume_role_with_web_identity::AssumeRoleWithWebIdentityError;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUCCESS_BODY: &str = r#"<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <SubjectFromWebIdentityToken>111111111111111111111</SubjectFromWebIdentityToken>
    <Audience>https://sts.amazonaws.com</Audience>
    <AssumedRoleUser>
      <Arn>arn:aws:sts::123456789012:assumed-role/s3reader/app1</Arn>
      <AssumedRoleId>AROAEXAMPLE:app1</AssumedRoleId>
    </AssumedRoleUser>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secret</SecretAccessKey>
      <SessionToken>sess</SessionToken>
      <Expiration>2024-01-02T16:04:05Z</Expiration>
    </Credentials>
    <Provider>accounts.google.com</Provider>
  </AssumeRoleWithWebIdentityResult>
  <ResponseMetadata>
    <RequestId>c6104cbe-af31-11e0-8154-cbc7ccf896c7</RequestId>
  </ResponseMetadata>
</AssumeRoleWithWebIdentityResponse>"#;

    const ERROR_BODY: &str = r#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <Error>
    <Type>Sender</Type>
    <Code>InvalidIdentityToken</Code>
    <Message>Incorrect token audience</Message>
  </Error>
  <RequestId>c6104cbe-af31-11e0-8154-cbc7ccf896c7</RequestId>
</ErrorResponse>"#;

    fn exchange_for(server: &MockServer) -> StsRoleExchange {
        let config = StsConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(server.uri())
            .retry_config(RetryConfig::disabled())
            .build();
        StsRoleExchange::new(StsClient::from_conf(config))
    }

    fn request() -> WebIdentityRequest {
        WebIdentityRequest {
            web_identity_token: "tok123".to_string(),
            ..WebIdentityRequest::new("arn:aws:iam::123456789012:role/s3reader", "app1")
                .with_duration_seconds(3600)
        }
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=AssumeRoleWithWebIdentity"))
            .and(body_string_contains("WebIdentityToken=tok123"))
            .and(body_string_contains("RoleSessionName=app1"))
            .and(body_string_contains("DurationSeconds=3600"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let creds = exchange_for(&server)
            .assume_role_with_web_identity(&request())
            .await
            .unwrap();

        assert_eq!(creds.access_key_id, "ASIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "secret");
        assert_eq!(creds.session_token, "sess");
        assert_eq!(creds.expiration.timestamp(), 1_704_211_445);
        assert_eq!(creds.provider_name, None);
        assert!(creds.can_expire);
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(ERROR_BODY))
            .mount(&server)
            .await;

        let err = exchange_for(&server)
            .assume_role_with_web_identity(&request())
            .await
            .unwrap_err();

        match err {
            ExchangeError::Rejected {
                code,
                message,
                source,
            } => {
                assert_eq!(code, "InvalidIdentityToken");
                assert_eq!(message, "Incorrect token audience");
                let sdk_error = source
                    .downcast_ref::<SdkError<AssumeRoleWithWebIdentityError>>()
                    .expect("source should be the STS SDK error");
                assert!(
                    sdk_error
                        .as_service_error()
                        .is_some_and(|e| e.is_invalid_identity_token_exception())
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_debug_redacts_token() {
        let printed = format!("{:?}", request());
        assert!(printed.contains("s3reader"));
        assert!(!printed.contains("tok123"));
    }
}
