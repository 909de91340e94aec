use anyhow::{Context, Result};
use clap::Args;

use super::{ExchangeArgs, exchange_credentials};
use crate::aws::process::ProcessCredentials;

/// Prints credentials in the AWS CLI `credential_process` format
#[derive(Debug, Clone, Default, Args)]
pub struct ProcessCommand {}

impl ProcessCommand {
    pub async fn execute(self, profile: &str, exchange: ExchangeArgs) -> Result<()> {
        let credentials = exchange_credentials(profile, exchange).await?;

        let output = ProcessCredentials::from(&credentials)
            .to_json()
            .context("Error marshalling process credential output")?;
        println!("{output}");

        Ok(())
    }
}
