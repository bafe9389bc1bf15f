use reqwest::StatusCode;
use serde::Deserialize;

pub type Result<T> = std::result::Result<T, DropboxError>;

#[derive(Debug, thiserror::Error)]
pub enum DropboxError {
    #[error("Dropbox access token must not be empty")]
    MissingToken,

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("{route} returned {status}: {}", .error.error_summary)]
    Api {
        route: String,
        status: StatusCode,
        error: ApiError,
    },

    #[error("request to {route} failed")]
    Http {
        route: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {route}")]
    Decode {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{route} response carried no Dropbox-API-Result header")]
    MissingApiResult { route: String },
}

impl DropboxError {
    /// True when the API reported that the addressed path does not exist. The
    /// HTTP status alone says nothing: a bare 404 is an unknown route.
    pub fn is_not_found(&self) -> bool {
        match self {
            DropboxError::Api { error, .. } => error.is_path_not_found(),
            _ => false,
        }
    }

    /// True for a 416 answer to a ranged download, i.e. an offset past end of file.
    pub fn is_range_not_satisfiable(&self) -> bool {
        matches!(
            self,
            DropboxError::Api { status, .. } if *status == StatusCode::RANGE_NOT_SATISFIABLE
        )
    }
}

/// Dropbox API v2 error envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error_summary: String,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ApiError {
    /// Decode an error body, keeping the raw text when it is not a JSON envelope.
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| ApiError {
            error_summary: body.trim().to_string(),
            error: None,
        })
    }

    /// Matches `path/not_found/..` and `path_lookup/not_found/..` summaries and
    /// the equivalent structured union.
    pub fn is_path_not_found(&self) -> bool {
        let mut segments = self.error_summary.split('/');
        if let (Some(kind), Some(reason)) = (segments.next(), segments.next())
            && matches!(kind, "path" | "path_lookup")
            && reason.starts_with("not_found")
        {
            return true;
        }

        let Some(error) = self.error.as_ref() else {
            return false;
        };
        let Some(tag) = error.get(".tag").and_then(|t| t.as_str()) else {
            return false;
        };
        error
            .get(tag)
            .and_then(|inner| inner.get(".tag"))
            .and_then(|t| t.as_str())
            == Some("not_found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_not_found() {
        let err = ApiError::from_body(r#"{"error_summary":"path/not_found/..","error":{}}"#);
        assert!(err.is_path_not_found());

        let err = ApiError::from_body(r#"{"error_summary":"path_lookup/not_found/."}"#);
        assert!(err.is_path_not_found());
    }

    #[test]
    fn structured_not_found() {
        let err = ApiError::from_body(
            r#"{"error_summary":"","error":{".tag":"path","path":{".tag":"not_found"}}}"#,
        );
        assert!(err.is_path_not_found());
    }

    #[test]
    fn other_errors_are_not_not_found() {
        let err = ApiError::from_body(
            r#"{"error_summary":"path/conflict/folder/..","error":{".tag":"path","path":{".tag":"conflict","conflict":{".tag":"folder"}}}}"#,
        );
        assert!(!err.is_path_not_found());

        let err = ApiError::from_body("Error in call to API function: bad token");
        assert!(!err.is_path_not_found());
        assert!(err.error_summary.starts_with("Error in call"));
    }

    #[test]
    fn api_error_classification() {
        let err = DropboxError::Api {
            route: "files/get_metadata".into(),
            status: StatusCode::CONFLICT,
            error: ApiError::from_body(r#"{"error_summary":"path/not_found/"}"#),
        };
        assert!(err.is_not_found());
        assert!(!err.is_range_not_satisfiable());

        let err = DropboxError::Api {
            route: "files/download".into(),
            status: StatusCode::RANGE_NOT_SATISFIABLE,
            error: ApiError::default(),
        };
        assert!(err.is_range_not_satisfiable());
        assert!(!DropboxError::MissingToken.is_not_found());
    }

    #[test]
    fn unknown_route_is_not_a_missing_path() {
        let err = DropboxError::Api {
            route: "files/get_metadata".into(),
            status: StatusCode::NOT_FOUND,
            error: ApiError::from_body("Unknown API route"),
        };
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "files/get_metadata returned 404 Not Found: Unknown API route"
        );
    }
}
