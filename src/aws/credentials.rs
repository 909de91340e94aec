use anyhow::{Context, Result};
use chrono::SecondsFormat;
use ini::Ini;
use std::{io, path::Path};
use tokio::{fs, io::AsyncWriteExt};
use tracing;

use super::TemporaryCredentials;
use crate::constants;

/// Save credentials to the AWS shared credentials file
pub async fn save_credentials(profile: &str, creds: &TemporaryCredentials) -> Result<()> {
    let path = constants::get_aws_credentials_path()
        .context("Failed to determine AWS credentials path")?;
    save_credentials_to(&path, profile, creds).await
}

/// Write `creds` into the `profile` section of the credentials file at `path`.
///
/// Other profiles are preserved. A file that exists but does not parse is left
/// as is and reported as an error.
pub async fn save_credentials_to(
    path: &Path,
    profile: &str,
    creds: &TemporaryCredentials,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut ini = match fs::read_to_string(path).await {
        Ok(contents) => Ini::load_from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ini::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let expiration = creds
        .expiration
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    ini.with_section(Some(profile))
        .set("aws_access_key_id", &creds.access_key_id)
        .set("aws_secret_access_key", &creds.secret_access_key)
        .set("aws_session_token", &creds.session_token)
        .set("aws_session_expiration", &expiration);

    let mut contents = Vec::new();
    ini.write_to(&mut contents)
        .context("Failed to serialize credentials")?;

    write_private(path, &contents)
        .await
        .with_context(|| format!("Failed to write credentials file {}", path.display()))?;

    tracing::info!("Credentials saved to profile: {}", profile);
    Ok(())
}

/// Write `contents` to `path` readable by the owner only. Permissions are
/// narrowed before any bytes land, also when the file already existed.
async fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }

    file.write_all(contents).await?;
    file.flush().await
}
