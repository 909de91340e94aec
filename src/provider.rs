//! Web identity credential provider.
//!
//! [`WebIdentityCredentialsProvider`] fetches a Google ID token, exchanges it
//! through `AssumeRoleWithWebIdentity` and keeps the last result together with
//! its expiration. Consumers ask [`is_expired`](CredentialsSource::is_expired)
//! before signing and call [`retrieve`](CredentialsSource::retrieve) when a
//! refresh is due. The provider can also be installed directly into an AWS SDK
//! config, since it implements [`ProvideCredentials`].

use async_trait::async_trait;
use aws_credential_types::provider::{self, ProvideCredentials, error::CredentialsError, future};
use chrono::{DateTime, Duration, Utc};
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::aws::{RoleExchange, TemporaryCredentials, WebIdentityRequest};
use crate::error::{Error, Result};
use crate::google::TokenSource;

/// Provider name attached to credentials when the exchange reports none
pub const PROVIDER_NAME: &str = "GCPProvider";

/// Credentials are reported expired this long before they actually lapse
pub const DEFAULT_REFRESH_TOLERANCE: Duration = Duration::seconds(60);

/// Wall clock used for expiry decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A source of temporary AWS credentials with an expiry check
#[async_trait]
pub trait CredentialsSource: Send + Sync {
    /// Obtain fresh credentials. Always performs an exchange.
    async fn retrieve(&self) -> Result<TemporaryCredentials>;

    /// Whether the held credentials need to be refreshed. `true` before the
    /// first successful [`retrieve`](Self::retrieve).
    fn is_expired(&self) -> bool;

    /// Expiration of the last retrieved credentials
    fn expires_at(&self) -> Option<DateTime<Utc>>;
}

/// Exchanges Google ID tokens for AWS temporary credentials
#[derive(Debug)]
pub struct WebIdentityCredentialsProvider {
    request_template: WebIdentityRequest,
    token_source: Arc<dyn TokenSource>,
    exchange: Arc<dyn RoleExchange>,
    clock: Arc<dyn Clock>,
    refresh_tolerance: Duration,
    // Held for the whole token-fetch + exchange + store sequence
    exchange_lock: Mutex<()>,
    current: RwLock<Option<TemporaryCredentials>>,
}

impl WebIdentityCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Return the held credentials while they are valid, otherwise exchange.
    ///
    /// Callers that queue behind an in-flight exchange reuse its result.
    pub async fn credentials(&self) -> Result<TemporaryCredentials> {
        if let Some(creds) = self.valid_credentials() {
            debug!("Reusing cached AWS credentials");
            return Ok(creds);
        }

        let _guard = self.exchange_lock.lock().await;
        if let Some(creds) = self.valid_credentials() {
            debug!("Credentials refreshed by a concurrent caller");
            return Ok(creds);
        }
        self.exchange_locked().await
    }

    pub fn refresh_tolerance(&self) -> Duration {
        self.refresh_tolerance
    }

    fn valid_credentials(&self) -> Option<TemporaryCredentials> {
        let now = self.clock.now();
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|creds| !self.expired_at(creds.expiration, now))
            .cloned()
    }

    fn expired_at(&self, expiration: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now + self.refresh_tolerance >= expiration
    }

    /// Caller must hold `exchange_lock`
    async fn exchange_locked(&self) -> Result<TemporaryCredentials> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(Error::TokenSource)?;

        let request = WebIdentityRequest {
            web_identity_token: token.access_token,
            ..self.request_template.clone()
        };

        let mut creds = self
            .exchange
            .assume_role_with_web_identity(&request)
            .await
            .map_err(Error::Exchange)?;

        if creds.provider_name.as_deref().is_none_or(str::is_empty) {
            creds.provider_name = Some(PROVIDER_NAME.to_string());
        }

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(creds.clone());

        info!(
            "Obtained AWS credentials for {} expiring at {}",
            self.request_template.role_arn, creds.expiration
        );
        Ok(creds)
    }
}

#[async_trait]
impl CredentialsSource for WebIdentityCredentialsProvider {
    async fn retrieve(&self) -> Result<TemporaryCredentials> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange_locked().await
    }

    fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expiration) => self.expired_at(expiration, self.clock.now()),
            None => true,
        }
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|creds| creds.expiration)
    }
}

impl ProvideCredentials for WebIdentityCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.sdk_credentials())
    }
}

impl WebIdentityCredentialsProvider {
    async fn sdk_credentials(&self) -> provider::Result {
        match self.credentials().await {
            Ok(creds) => Ok(creds.to_sdk_credentials(PROVIDER_NAME)),
            Err(Error::Config(msg)) => Err(CredentialsError::invalid_configuration(msg)),
            Err(e) => Err(CredentialsError::provider_error(e)),
        }
    }
}

/// Builder for [`WebIdentityCredentialsProvider`]
#[derive(Default)]
pub struct Builder {
    request: Option<WebIdentityRequest>,
    token_source: Option<Arc<dyn TokenSource>>,
    exchange: Option<Arc<dyn RoleExchange>>,
    clock: Option<Arc<dyn Clock>>,
    refresh_tolerance: Option<Duration>,
}

impl Builder {
    /// Role, session name and duration used for every exchange
    pub fn request(mut self, request: WebIdentityRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(token_source);
        self
    }

    pub fn exchange(mut self, exchange: Arc<dyn RoleExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to [`DEFAULT_REFRESH_TOLERANCE`]
    pub fn refresh_tolerance(mut self, tolerance: Duration) -> Self {
        self.refresh_tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<WebIdentityCredentialsProvider> {
        let request = self
            .request
            .ok_or_else(|| Error::Config("a role assumption request is required".to_string()))?;
        if request.role_arn.trim().is_empty() {
            return Err(Error::Config("role ARN cannot be empty".to_string()));
        }
        if request.role_session_name.trim().is_empty() {
            return Err(Error::Config("role session name cannot be empty".to_string()));
        }

        let refresh_tolerance = self.refresh_tolerance.unwrap_or(DEFAULT_REFRESH_TOLERANCE);
        if refresh_tolerance < Duration::zero() {
            return Err(Error::Config(
                "refresh tolerance cannot be negative".to_string(),
            ));
        }

        Ok(WebIdentityCredentialsProvider {
            request_template: request,
            token_source: self
                .token_source
                .ok_or_else(|| Error::Config("a token source is required".to_string()))?,
            exchange: self
                .exchange
                .ok_or_else(|| Error::Config("a role exchange client is required".to_string()))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            refresh_tolerance,
            exchange_lock: Mutex::new(()),
            current: RwLock::new(None),
        })
    }
}
