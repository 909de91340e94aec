use std::{env, path::PathBuf};

use dirs;
use uuid::Uuid;

/// Configuration directory name under ~/.config
pub const CONFIG_DIR_NAME: &str = "awscompat";

/// Profile configuration file name
pub const CONFIG_FILE_NAME: &str = "config";

/// Overrides the profile configuration file location
pub const CONFIG_FILE_ENV: &str = "AWSCOMPAT_CONFIG_FILE";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// Default audience requested for the Google ID token
pub const DEFAULT_AUDIENCE: &str = "https://sts.amazonaws.com";

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Default requested session duration in seconds
pub const DEFAULT_DURATION_SECONDS: i32 = 3600;

/// STS lower bound for DurationSeconds
pub const MIN_DURATION_SECONDS: i32 = 900;

/// STS upper bound for DurationSeconds
pub const MAX_DURATION_SECONDS: i32 = 43200;

/// Prefix of generated role session names
pub const SESSION_NAME_PREFIX: &str = "gcp";

/// Generate a unique role session name, e.g. `gcp-1b4e28ba-2fa1-11d2-883f-0016d3cca427`
pub fn default_session_name() -> String {
    format!("{SESSION_NAME_PREFIX}-{}", Uuid::new_v4())
}

/// Get the profile configuration file path
/// Respects AWSCOMPAT_CONFIG_FILE environment variable if set
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    // ~/.config/awscompat/config on all platforms
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}

/// Get the AWS credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn get_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join("credentials"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_session_name_is_unique() {
        let a = default_session_name();
        let b = default_session_name();
        assert!(a.starts_with("gcp-"));
        assert_eq!(a.len(), "gcp-".len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    #[serial]
    fn test_get_config_path_with_env() {
        let original = env::var(CONFIG_FILE_ENV).ok();

        unsafe {
            env::set_var(CONFIG_FILE_ENV, "/custom/awscompat/config");
        }
        let path = get_config_path();
        assert_eq!(path, Some(PathBuf::from("/custom/awscompat/config")));

        unsafe {
            match original {
                Some(val) => env::set_var(CONFIG_FILE_ENV, val),
                None => env::remove_var(CONFIG_FILE_ENV),
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_config_path_default() {
        let original = env::var(CONFIG_FILE_ENV).ok();

        unsafe {
            env::remove_var(CONFIG_FILE_ENV);
        }
        let path = get_config_path();

        if let Some(p) = path {
            let path_str = p.to_string_lossy();
            assert!(path_str.contains(CONFIG_DIR_NAME));
            assert!(path_str.ends_with(CONFIG_FILE_NAME));
        }

        unsafe {
            if let Some(val) = original {
                env::set_var(CONFIG_FILE_ENV, val);
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_credentials_path_with_env() {
        let original = env::var("AWS_SHARED_CREDENTIALS_FILE").ok();

        unsafe {
            env::set_var("AWS_SHARED_CREDENTIALS_FILE", "/custom/path/credentials");
        }
        let path = get_aws_credentials_path();
        assert_eq!(path, Some(PathBuf::from("/custom/path/credentials")));

        unsafe {
            match original {
                Some(val) => env::set_var("AWS_SHARED_CREDENTIALS_FILE", val),
                None => env::remove_var("AWS_SHARED_CREDENTIALS_FILE"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_credentials_path_default() {
        let original = env::var("AWS_SHARED_CREDENTIALS_FILE").ok();

        unsafe {
            env::remove_var("AWS_SHARED_CREDENTIALS_FILE");
        }
        let path = get_aws_credentials_path();

        if let Some(p) = path {
            let path_str = p.to_string_lossy();
            assert!(path_str.contains(AWS_CONFIG_DIR_NAME));
            assert!(path_str.contains("credentials"));
        }

        unsafe {
            if let Some(val) = original {
                env::set_var("AWS_SHARED_CREDENTIALS_FILE", val);
            }
        }
    }
}
