use crate::constants::{
    self, DEFAULT_AUDIENCE, DEFAULT_DURATION_SECONDS, MAX_DURATION_SECONDS, MIN_DURATION_SECONDS,
};
use crate::error::Error;
use anyhow::{Context, Result};
use ini::{Ini, Properties};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::debug;

/// Per-profile settings persisted by `awscompat configure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub role_arn: Option<String>,
    pub audience: String,
    pub gcp_credential_file: Option<PathBuf>,
    pub role_session_name: Option<String>,
    pub duration_seconds: i32,
    pub region: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role_arn: None,
            audience: DEFAULT_AUDIENCE.to_string(),
            gcp_credential_file: None,
            role_session_name: None,
            duration_seconds: DEFAULT_DURATION_SECONDS,
            region: None,
        }
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}

impl Config {
    fn from_ini_section(section: &Properties) -> Result<Self, Error> {
        let duration_seconds = match section.get("duration_seconds").map(str::trim) {
            None | Some("") => DEFAULT_DURATION_SECONDS,
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("duration_seconds must be a whole number, got '{raw}'"))
            })?,
        };

        Ok(Self {
            role_arn: non_empty(section.get("role_arn")),
            audience: section
                .get("audience")
                .unwrap_or(DEFAULT_AUDIENCE)
                .to_string(),
            gcp_credential_file: non_empty(section.get("gcp_credential_file")).map(PathBuf::from),
            role_session_name: non_empty(section.get("role_session_name")),
            duration_seconds,
            region: non_empty(section.get("region")),
        })
    }

    fn save_to_ini(&self, ini: &mut Ini, profile: &str) {
        let mut section = ini.with_section(Some(section_name(profile)));
        section
            .set("role_arn", self.role_arn.clone().unwrap_or_default())
            .set("audience", &self.audience)
            .set(
                "gcp_credential_file",
                self.gcp_credential_file
                    .as_deref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
            )
            .set(
                "role_session_name",
                self.role_session_name.clone().unwrap_or_default(),
            )
            .set("duration_seconds", self.duration_seconds.to_string())
            .set("region", self.region.clone().unwrap_or_default());
    }
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Load the profile from the default config path. `None` when the file or the
/// profile section does not exist.
pub async fn load(profile: &str) -> Result<Option<Config>, Error> {
    match constants::get_config_path() {
        Some(path) => load_from(&path, profile).await,
        None => Ok(None),
    }
}

pub async fn load_from(path: &Path, profile: &str) -> Result<Option<Config>, Error> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No config file at {}", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            )));
        }
    };
    let ini = Ini::load_from_str(&contents).map_err(|e| {
        Error::Config(format!("failed to parse config file {}: {e}", path.display()))
    })?;

    match ini.section(Some(section_name(profile))) {
        Some(section) => Config::from_ini_section(section).map(Some).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!(
                "profile '{profile}' in {}: {msg}",
                path.display()
            )),
            other => other,
        }),
        None => {
            debug!("Profile '{}' not found in {}", profile, path.display());
            Ok(None)
        }
    }
}

/// Load the profile, falling back to defaults when nothing is configured.
/// A config file that exists but cannot be read or parsed is an error.
pub async fn load_or_default(profile: &str) -> Result<Config, Error> {
    Ok(load(profile).await?.unwrap_or_default())
}

pub async fn save(profile: &str, config: &Config) -> Result<()> {
    let path = get_config_path()?;
    save_to(&path, profile, config).await
}

pub async fn save_to(path: &Path, profile: &str, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Start fresh only when there is no file; a broken one is left untouched
    let mut ini = match fs::read_to_string(path).await {
        Ok(contents) => Ini::load_from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ini::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };

    config.save_to_ini(&mut ini, profile);

    ini.write_to_file(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Everything one exchange needs, after merging flags, profile and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    pub audience: String,
    pub gcp_credential_file: Option<PathBuf>,
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: i32,
    pub region: Option<String>,
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub audience: Option<String>,
    pub gcp_credential_file: Option<PathBuf>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub duration_seconds: Option<i32>,
    pub region: Option<String>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.audience.is_none()
            && self.gcp_credential_file.is_none()
            && self.role_arn.is_none()
            && self.role_session_name.is_none()
            && self.duration_seconds.is_none()
            && self.region.is_none()
    }
}

impl ExchangeSettings {
    /// Flags win over profile values, which win over built-in defaults
    pub fn resolve(overrides: Overrides, config: Config) -> Result<Self, Error> {
        let role_arn = overrides
            .role_arn
            .or(config.role_arn)
            .filter(|arn| !arn.trim().is_empty())
            .ok_or_else(|| Error::Config("--aws-arn cannot be null".to_string()))?;

        let duration_seconds = overrides
            .duration_seconds
            .unwrap_or(config.duration_seconds);
        validate_duration(duration_seconds).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            audience: overrides.audience.unwrap_or(config.audience),
            gcp_credential_file: overrides.gcp_credential_file.or(config.gcp_credential_file),
            role_arn,
            role_session_name: overrides
                .role_session_name
                .or(config.role_session_name)
                .unwrap_or_else(constants::default_session_name),
            duration_seconds,
            region: overrides.region.or(config.region),
        })
    }
}

pub(crate) fn validate_duration(duration_seconds: i32) -> Result<(), &'static str> {
    if (MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&duration_seconds) {
        Ok(())
    } else {
        Err("--aws-duration must be between 900 and 43200 seconds")
    }
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_config_path().context("Failed to determine awscompat config path")
}

pub(crate) fn is_valid_role_arn(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(6, ':').collect();

    parts.len() == 6
        && parts[0] == "arn"
        && parts[1].starts_with("aws")
        && parts[2] == "iam"
        && parts[4].len() == 12
        && parts[4].chars().all(|c| c.is_ascii_digit())
        && parts[5].strip_prefix("role/").is_some_and(|name| !name.is_empty())
}
