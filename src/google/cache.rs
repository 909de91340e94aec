use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{IdentityToken, TokenSource};
use crate::error::TokenSourceError;

/// Tokens this close to their `exp` are treated as already expired
const EARLY_EXPIRY: Duration = Duration::seconds(10);

/// Reuses the wrapped source's token until it nears its own expiry.
///
/// Tokens without a readable `exp` claim are never reused.
#[derive(Debug)]
pub struct CachingTokenSource<S> {
    inner: S,
    cached: Mutex<Option<IdentityToken>>,
}

impl<S: TokenSource> CachingTokenSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

fn is_fresh(token: &IdentityToken) -> bool {
    token
        .expiry
        .is_some_and(|expiry| Utc::now() + EARLY_EXPIRY < expiry)
}

#[async_trait]
impl<S: TokenSource> TokenSource for CachingTokenSource<S> {
    async fn token(&self) -> Result<IdentityToken, TokenSourceError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| is_fresh(t)) {
            debug!("Reusing cached identity token");
            return Ok(token.clone());
        }

        let token = self.inner.token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}
