//! Bridge Google OIDC identity tokens to temporary AWS credentials.
//!
//! ```no_run
//! # async fn run() -> Result<(), awscompat::Error> {
//! use std::sync::Arc;
//! use awscompat::aws::{StsRoleExchange, WebIdentityRequest};
//! use awscompat::google::StaticTokenSource;
//! use awscompat::provider::{CredentialsSource, WebIdentityCredentialsProvider};
//!
//! let provider = WebIdentityCredentialsProvider::builder()
//!     .request(WebIdentityRequest::new("arn:aws:iam::123456789012:role/s3reader", "app1"))
//!     .token_source(Arc::new(StaticTokenSource::new("eyJhbGciOi...")))
//!     .exchange(Arc::new(StsRoleExchange::from_env("default", None).await))
//!     .build()?;
//!
//! if provider.is_expired() {
//!     let creds = provider.retrieve().await?;
//!     println!("expires at {}", creds.expiration);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod google;
pub mod provider;

pub use error::{Error, ExchangeError, Result, TokenSourceError};
pub use provider::{CredentialsSource, WebIdentityCredentialsProvider};
