use spin_sdk::http::Response;
use thiserror::Error;
use tracing::error;

use crate::core::db::{DbError, UniqueField};
use crate::core::validation::FieldError;
use crate::graph::GraphError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation Failed")]
    ValidationFailed(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::ValidationFailed(_) => 422,
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }
}

/// The one place errors become HTTP responses: `{ message, data? }` with the
/// status carried by the variant.
impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let message = match &err {
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({ "message": message });
        if let ApiError::ValidationFailed(fields) = &err {
            body["data"] = serde_json::json!(fields);
        }

        Response::builder()
            .status(err.status())
            .header("content-type", "application/json")
            .body(serde_json::to_vec(&body).unwrap_or_default())
            .build()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound(msg) => ApiError::NotFound(msg.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// A unique field lost to a concurrent request after validation passed;
/// reported exactly as the validator would have.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let (param, msg) = match err {
            DbError::Taken(UniqueField::Email) => ("email", "E-mail address already in use."),
            DbError::Taken(UniqueField::Username) => ("username", "Username already in use."),
            DbError::Store(err) => return err.into(),
        };
        ApiError::ValidationFailed(vec![FieldError {
            location: "body".to_string(),
            param: param.to_string(),
            msg: msg.to_string(),
            value: None,
        }])
    }
}
