//! Output format for the AWS CLI `credential_process` setting.
//!
//! See <https://docs.aws.amazon.com/cli/latest/userguide/cli-configure-sourcing-external.html>.

use serde::Serialize;

use super::TemporaryCredentials;

/// Expiration layout expected by `credential_process` consumers
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

const PROCESS_CREDENTIALS_VERSION: u8 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessCredentials {
    pub version: u8,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

impl ProcessCredentials {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&TemporaryCredentials> for ProcessCredentials {
    fn from(creds: &TemporaryCredentials) -> Self {
        Self {
            version: PROCESS_CREDENTIALS_VERSION,
            access_key_id: creds.access_key_id.clone(),
            secret_access_key: creds.secret_access_key.clone(),
            session_token: creds.session_token.clone(),
            expiration: creds.expiration.format(EXPIRATION_FORMAT).to_string(),
        }
    }
}
