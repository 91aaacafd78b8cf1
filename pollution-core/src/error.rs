use thiserror::Error;

/// Failures while obtaining a bearer token from the pollution API.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Pollution API rejected the configured credentials")]
    InvalidCredentials,

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error("Login request failed: {0}")]
    Transport(String),
}

/// Failures while fetching pollution readings.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Pollution API request failed: {0}")]
    NetworkFailure(String),

    #[error("Pollution API returned 401 Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Pollution API rejected the request: {0}")]
    BadRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid pagination: {0}")]
    BadPagination(String),
}

/// Request-level error returned by the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Upstream(UpstreamError::Auth(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_is_wrapped_as_upstream() {
        let err: Error = AuthError::InvalidCredentials.into();
        assert!(matches!(
            err,
            Error::Upstream(UpstreamError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn validation_error_message_mentions_pagination() {
        let err: Error = ValidationError::BadPagination("page must be >= 1".into()).into();
        assert_eq!(err.to_string(), "Invalid pagination: page must be >= 1");
    }
}
