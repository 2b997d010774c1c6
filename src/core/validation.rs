//! Request body checks. Every failing rule contributes one [`FieldError`];
//! a request with any of them is rejected as a whole with a 422.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use spin_sdk::http::Request;

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub location: String,
    pub param: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, param: &str, msg: &str, value: Option<&str>) {
        self.reject_at("body", param, msg, value);
    }

    /// Like [`Validator::reject`] for a part of the request other than the
    /// JSON body fields, e.g. an uploaded file.
    pub fn reject_at(&mut self, location: &str, param: &str, msg: &str, value: Option<&str>) {
        self.errors.push(FieldError {
            location: location.to_string(),
            param: param.to_string(),
            msg: msg.to_string(),
            value: value.map(str::to_string),
        });
    }

    /// Rejects `param` unless `ok` holds.
    pub fn ensure(&mut self, ok: bool, param: &str, msg: &str, value: Option<&str>) {
        if !ok {
            self.reject(param, msg, value);
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(self.errors))
        }
    }
}

/// Parses the body as a JSON object. An empty body counts as `{}`.
pub fn parse_body(req: &Request) -> Result<serde_json::Value, ApiError> {
    let body = req.body();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::json!({}));
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) if value.is_object() => Ok(value),
        _ => {
            let mut v = Validator::new();
            v.reject("body", "Request body must be a JSON object", None);
            Err(ApiError::ValidationFailed(v.errors))
        }
    }
}

/// Trimmed string field, `None` when absent or not a string.
pub fn trimmed(body: &serde_json::Value, key: &str) -> Option<String> {
    body[key].as_str().map(|s| s.trim().to_string())
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Regex should compile")
    })
}

pub fn is_email(value: &str) -> bool {
    email_regex().is_match(value)
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}
