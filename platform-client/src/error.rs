use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors raised while talking to a platform API
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PlatformError {
    /// HTTP status of the failed response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Api { status, .. } => Some(*status),
            PlatformError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// The response body parsed as JSON, when it is JSON
    pub fn body_json(&self) -> Option<Value> {
        match self {
            PlatformError::Api { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// An identifier reported in the error body at `pointer`
    ///
    /// Create calls that lose a race against an identical entity answer with
    /// the id of the entity that already exists, e.g. at
    /// `/context/distributor/id`.
    pub fn conflicting_id(&self, pointer: &str) -> Option<String> {
        self.body_json()?
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_id_from_body() {
        let err = PlatformError::Api {
            status: 409,
            body: r#"{"context": {"distributor": {"id": "dist-9"}}}"#.to_string(),
        };
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.conflicting_id("/context/distributor/id"),
            Some("dist-9".to_string())
        );
        assert_eq!(err.conflicting_id("/context/other"), None);
    }

    #[test]
    fn test_non_json_body() {
        let err = PlatformError::Api {
            status: 500,
            body: "Internal Server Error".to_string(),
        };
        assert!(err.body_json().is_none());
        assert!(err.conflicting_id("/context/distributor/id").is_none());
        assert_eq!(PlatformError::Network("reset".into()).status(), None);
    }
}
