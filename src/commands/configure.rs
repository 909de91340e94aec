use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Input, theme::ColorfulTheme};
use std::path::PathBuf;
use tracing::info;

use super::ExchangeArgs;
use crate::config::{self, Config, Overrides};
use crate::error::Error;

/// Stores role and token settings for a profile.
///
/// With any exchange flag given (`--aws-arn`, `--audience`, ...) the flags are
/// merged into the stored profile without prompting. Otherwise each setting is
/// asked for interactively.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigureCommand {}

impl ConfigureCommand {
    pub async fn execute(self, profile: &str, exchange: ExchangeArgs) -> Result<()> {
        let existing = config::load(profile).await?;
        let overrides = Overrides::from(exchange);

        let updated = if overrides.is_empty() {
            prompt(profile, existing)?
        } else {
            info!("Updating profile '{}' from command line flags", profile);
            apply_overrides(existing.unwrap_or_default(), overrides)?
        };

        config::save(profile, &updated).await?;
        println!("Configuration saved for profile: {profile}");
        Ok(())
    }
}

/// Merge flag values into a stored profile. Unset flags keep the stored value.
fn apply_overrides(config: Config, overrides: Overrides) -> Result<Config, Error> {
    let role_arn = match overrides.role_arn {
        Some(arn) if !config::is_valid_role_arn(&arn) => {
            return Err(Error::Config(format!(
                "'{arn}' is not an IAM role ARN (arn:aws:iam::<account-id>:role/<name>)"
            )));
        }
        Some(arn) => Some(arn),
        None => config.role_arn,
    };

    let duration_seconds = overrides
        .duration_seconds
        .unwrap_or(config.duration_seconds);
    config::validate_duration(duration_seconds).map_err(|e| Error::Config(e.to_string()))?;

    Ok(Config {
        role_arn,
        audience: overrides.audience.unwrap_or(config.audience),
        gcp_credential_file: overrides.gcp_credential_file.or(config.gcp_credential_file),
        role_session_name: overrides.role_session_name.or(config.role_session_name),
        duration_seconds,
        region: overrides.region.or(config.region),
    })
}

fn prompt(profile: &str, existing: Option<Config>) -> Result<Config> {
    println!("Configuring awscompat for profile: {profile}");
    if existing.is_some() {
        println!("Press Enter to keep current values, or type new values.");
    }
    println!();

    let theme = ColorfulTheme::default();
    let current = existing.unwrap_or_default();

    let role_arn = Input::<String>::with_theme(&theme)
        .with_prompt("AWS Role ARN")
        .default(current.role_arn.clone().unwrap_or_default())
        .allow_empty(current.role_arn.is_some())
        .validate_with(|input: &String| {
            if config::is_valid_role_arn(input) {
                Ok(())
            } else {
                Err("AWS Role ARN must look like arn:aws:iam::<account-id>:role/<name>")
            }
        })
        .interact_text()
        .context("Failed to read AWS Role ARN")?;

    let audience = Input::<String>::with_theme(&theme)
        .with_prompt("ID token audience")
        .default(current.audience)
        .interact_text()
        .context("Failed to read audience")?;

    let gcp_credential_file = Input::<String>::with_theme(&theme)
        .with_prompt("GCP service account key file (empty for metadata server)")
        .default(
            current
                .gcp_credential_file
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()
        .context("Failed to read GCP credential file")?;

    let duration_seconds = Input::<i32>::with_theme(&theme)
        .with_prompt("Session duration seconds (900-43200)")
        .default(current.duration_seconds)
        .validate_with(|input: &i32| config::validate_duration(*input))
        .interact_text()
        .context("Failed to read session duration")?;

    let region = Input::<String>::with_theme(&theme)
        .with_prompt("STS region (empty to use the AWS profile region)")
        .default(current.region.unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read region")?;

    Ok(Config {
        role_arn: Some(role_arn),
        audience,
        gcp_credential_file: config::non_empty(Some(&gcp_credential_file)).map(PathBuf::from),
        role_session_name: current.role_session_name,
        duration_seconds,
        region: config::non_empty(Some(&region)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CONFIG_FILE_ENV, DEFAULT_AUDIENCE};
    use serial_test::serial;
    use std::env;

    const ROLE: &str = "arn:aws:iam::123456789012:role/s3reader";

    #[test]
    fn test_apply_overrides_keeps_unset_values() {
        let stored = Config {
            role_arn: Some(ROLE.to_string()),
            region: Some("eu-west-1".to_string()),
            duration_seconds: 1800,
            ..Config::default()
        };
        let overrides = Overrides {
            audience: Some("https://example.com".to_string()),
            ..Overrides::default()
        };

        let updated = apply_overrides(stored, overrides).unwrap();
        assert_eq!(updated.role_arn.as_deref(), Some(ROLE));
        assert_eq!(updated.audience, "https://example.com");
        assert_eq!(updated.region.as_deref(), Some("eu-west-1"));
        assert_eq!(updated.duration_seconds, 1800);
    }

    #[test]
    fn test_apply_overrides_rejects_non_role_arn() {
        let overrides = Overrides {
            role_arn: Some("arn:aws:iam::123456789012:user/bob".to_string()),
            ..Overrides::default()
        };
        let err = apply_overrides(Config::default(), overrides).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("user/bob"));
    }

    #[test]
    fn test_apply_overrides_rejects_out_of_range_duration() {
        let overrides = Overrides {
            role_arn: Some(ROLE.to_string()),
            duration_seconds: Some(60),
            ..Overrides::default()
        };
        let err = apply_overrides(Config::default(), overrides).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    #[serial]
    async fn test_execute_with_flags_writes_profile_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let original = env::var(CONFIG_FILE_ENV).ok();
        unsafe {
            env::set_var(CONFIG_FILE_ENV, &path);
        }

        let first = ConfigureCommand::default()
            .execute(
                "work",
                ExchangeArgs {
                    aws_arn: Some(ROLE.to_string()),
                    aws_duration: Some(900),
                    ..ExchangeArgs::default()
                },
            )
            .await;
        let second = ConfigureCommand::default()
            .execute(
                "work",
                ExchangeArgs {
                    region: Some("us-west-2".to_string()),
                    ..ExchangeArgs::default()
                },
            )
            .await;
        let stored = config::load_from(&path, "work").await;

        unsafe {
            match original {
                Some(val) => env::set_var(CONFIG_FILE_ENV, val),
                None => env::remove_var(CONFIG_FILE_ENV),
            }
        }

        first.unwrap();
        second.unwrap();
        let stored = stored.unwrap().unwrap();
        assert_eq!(stored.role_arn.as_deref(), Some(ROLE));
        assert_eq!(stored.duration_seconds, 900);
        assert_eq!(stored.region.as_deref(), Some("us-west-2"));
        assert_eq!(stored.audience, DEFAULT_AUDIENCE);
    }
}
