pub mod auth;
pub mod configure;
pub mod process;

use anyhow::{Context, Result};
use clap::Args;
use std::{path::PathBuf, sync::Arc};
use tracing::info;

use crate::{
    aws::{StsRoleExchange, TemporaryCredentials, WebIdentityRequest},
    config::{self, ExchangeSettings, Overrides},
    google,
    provider::{CredentialsSource, WebIdentityCredentialsProvider},
};

pub use auth::AuthCommand;
pub use configure::ConfigureCommand;
pub use process::ProcessCommand;

/// Exchange options shared by `process`, `auth` and `configure`; unset values
/// fall back to the profile configuration
#[derive(Debug, Clone, Default, Args)]
pub struct ExchangeArgs {
    #[arg(
        long,
        global = true,
        help = "Audience value for the ID token [default: https://sts.amazonaws.com]"
    )]
    pub audience: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Use a GCP service account key file instead of the metadata server"
    )]
    pub gcp_credential_file: Option<PathBuf>,

    #[arg(long, global = true, value_name = "ARN", help = "AWS role ARN to assume (required)")]
    pub aws_arn: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "NAME",
        help = "AWS role session name [default: gcp-<uuid>]"
    )]
    pub aws_session_name: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Requested credential lifetime in seconds [default: 3600]"
    )]
    pub aws_duration: Option<i32>,

    #[arg(long, global = true, help = "AWS region of the STS endpoint")]
    pub region: Option<String>,
}

impl From<ExchangeArgs> for Overrides {
    fn from(args: ExchangeArgs) -> Self {
        Self {
            audience: args.audience,
            gcp_credential_file: args.gcp_credential_file,
            role_arn: args.aws_arn,
            role_session_name: args.aws_session_name,
            duration_seconds: args.aws_duration,
            region: args.region,
        }
    }
}

/// Resolve settings for `profile` and perform a single exchange
pub(crate) async fn exchange_credentials(
    profile: &str,
    args: ExchangeArgs,
) -> Result<TemporaryCredentials> {
    let config = config::load_or_default(profile).await?;
    let settings = ExchangeSettings::resolve(args.into(), config)?;

    info!(
        "Exchanging Google ID token for role {} (session {})",
        settings.role_arn, settings.role_session_name
    );

    let token_source =
        google::default_token_source(&settings.audience, settings.gcp_credential_file.as_deref())
            .await
            .context("Error creating Google token source")?;
    let exchange = StsRoleExchange::from_env(profile, settings.region.clone()).await;

    let provider = WebIdentityCredentialsProvider::builder()
        .request(
            WebIdentityRequest::new(settings.role_arn, settings.role_session_name)
                .with_duration_seconds(settings.duration_seconds),
        )
        .token_source(token_source)
        .exchange(Arc::new(exchange))
        .build()?;

    provider
        .retrieve()
        .await
        .context("Error exchanging Google ID token for AWS credentials")
}
