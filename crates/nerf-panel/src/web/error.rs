use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{Error, ErrorKind};

/// Handler error; renders as `{ "error": ..., "code": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Panel(Error),
    /// The tab was disabled on the command line or in the config file.
    TabDisabled(&'static str),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Panel(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Panel(e) => match e.kind() {
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, e.kind().code(), e.to_string()),
                ErrorKind::Schema => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    e.kind().code(),
                    e.to_string(),
                ),
                // The tab stays usable; the browser shows the message as the job status.
                ErrorKind::Launch => {
                    let body = json!({
                        "status": e.to_string(),
                        "error": e.to_string(),
                        "code": e.kind().code(),
                    });
                    return (StatusCode::OK, axum::Json(body)).into_response();
                }
                ErrorKind::Config | ErrorKind::Other => {
                    tracing::error!(error = %e, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        e.kind().code(),
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::TabDisabled(tab) => (
                StatusCode::NOT_FOUND,
                "TAB_DISABLED",
                format!("The {tab} tab is disabled"),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
