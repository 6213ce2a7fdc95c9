//! Conversions from common error types into `ClientError`.

use super::types::ClientError;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_errors_become_json_errors() {
        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::JsonError(_)));
    }
}
