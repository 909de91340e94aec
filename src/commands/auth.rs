use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Args;
use tracing::info;

use super::{ExchangeArgs, exchange_credentials};
use crate::aws;

#[derive(Debug, Clone, Default, Args)]
pub struct AuthCommand {}

impl AuthCommand {
    pub async fn execute(self, profile: &str, exchange: ExchangeArgs) -> Result<()> {
        info!("Starting authentication for profile: {}", profile);

        let credentials = exchange_credentials(profile, exchange).await?;

        aws::credentials::save_credentials(profile, &credentials)
            .await
            .context("Failed to save AWS credentials")?;

        println!("AWS credentials saved to {profile} profile.");
        println!(
            "Credentials will expire at: {}",
            credentials
                .expiration
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        Ok(())
    }
}
