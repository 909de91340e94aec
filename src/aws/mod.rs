use chrono::{DateTime, Utc};
use std::{fmt, time::SystemTime};

pub mod credentials;
pub mod process;
pub mod sts;

pub use sts::{RoleExchange, StsRoleExchange, WebIdentityRequest};

/// AWS temporary credentials returned by a web identity exchange
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
    /// Name of the provider that produced these credentials, if the exchange reported one
    pub provider_name: Option<String>,
    pub can_expire: bool,
}

impl TemporaryCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expiration,
            provider_name: None,
            can_expire: true,
        }
    }

    /// Convert into the AWS SDK credential type.
    ///
    /// The SDK only accepts a static provider name, so `provider_name` is
    /// replaced by `sdk_provider_name`.
    pub fn to_sdk_credentials(
        &self,
        sdk_provider_name: &'static str,
    ) -> aws_credential_types::Credentials {
        let expiry = self.can_expire.then(|| SystemTime::from(self.expiration));
        aws_credential_types::Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            Some(self.session_token.clone()),
            expiry,
            sdk_provider_name,
        )
    }
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blank = "********";
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &blank)
            .field("session_token", &blank)
            .field("expiration", &self.expiration)
            .field("provider_name", &self.provider_name)
            .field("can_expire", &self.can_expire)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = TemporaryCredentials::new(
            "AKIAEXAMPLE",
            "very-secret",
            "session-blob",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        let printed = format!("{creds:?}");
        assert!(printed.contains("AKIAEXAMPLE"));
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("session-blob"));
    }

    #[test]
    fn test_to_sdk_credentials() {
        let expiration = DateTime::from_timestamp(1_700_000_000, 250).unwrap();
        let creds = TemporaryCredentials::new("AKIA", "secret", "sess", expiration);

        let sdk = creds.to_sdk_credentials("TestProvider");
        assert_eq!(sdk.access_key_id(), "AKIA");
        assert_eq!(sdk.secret_access_key(), "secret");
        assert_eq!(sdk.session_token(), Some("sess"));
        assert_eq!(sdk.expiry(), Some(SystemTime::from(expiration)));
    }

    #[test]
    fn test_to_sdk_credentials_without_expiry() {
        let mut creds = TemporaryCredentials::new(
            "AKIA",
            "secret",
            "sess",
            DateTime::from_timestamp(0, 0).unwrap(),
        );
        creds.can_expire = false;
        assert_eq!(creds.to_sdk_credentials("TestProvider").expiry(), None);
    }
}
