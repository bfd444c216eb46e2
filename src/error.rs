use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the routing proxy and the backend store.
///
/// None of these are fatal to the client: they surface as a status line and the operation
/// stays retryable.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{}", status_message(.status, .body))]
    Status { status: StatusCode, body: String },

    /// The body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider answered but without a drawable route.
    #[error("No route returned")]
    NoRoute,

    /// An endpoint could not be built from the configured base url.
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

fn status_message(status: &StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        format!("backend returned {status}")
    } else {
        body.trim().to_string()
    }
}
