use thiserror::Error;

/// Failure to obtain an identity token from a [`TokenSource`](crate::google::TokenSource).
#[derive(Debug, Error)]
pub enum TokenSourceError {
    #[error("HTTP request for identity token failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to read service account key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service account key: {0}")]
    InvalidKey(String),
    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("token endpoint response did not contain an id_token")]
    MissingIdToken,
    #[error("identity token unavailable: {0}")]
    Unavailable(String),
}

/// Failure of the `AssumeRoleWithWebIdentity` exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("STS AssumeRoleWithWebIdentity failed: {0}")]
    Sts(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("STS returned no credentials")]
    MissingCredentials,
    #[error("STS returned an unrepresentable expiration timestamp")]
    InvalidExpiration,
    /// STS answered with a service error, e.g. `InvalidIdentityToken`
    #[error("role assumption rejected: {code}: {message}")]
    Rejected {
        code: String,
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to obtain identity token")]
    TokenSource(#[source] TokenSourceError),
    #[error("failed to exchange identity token for AWS credentials")]
    Exchange(#[source] ExchangeError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
