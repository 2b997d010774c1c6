//! Signup, login and the auth gate that resolves bearer tokens to users.

use spin_sdk::http::{Request, Response};
use tracing::{debug, info};

use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, json, verify_password};
use crate::core::store::KvStore;
use crate::core::validation::{is_email, normalize_email, parse_body, trimmed, Validator};
use crate::config::MIN_PASSWORD_LENGTH;
use crate::models::models::User;
use crate::models::views::LoginView;
use crate::AppContext;

const NO_TOKEN: &str = "Forbidden route, to access must provide a valid Authorization";
const BAD_TOKEN: &str = "Invalid Authorization token";
const UNKNOWN_USER: &str = "Could not find user provided by Authorization";
const WRONG_CREDENTIALS: &str = "Wrong email or password!";

/// How a route treats a missing `Authorization` header. A header that is
/// present is verified the same way in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Required,
    Public,
}

/// Resolves the request's bearer token to a stored user.
///
/// `Ok(None)` only happens in [`AuthMode::Public`] when no header was sent.
/// Every other failure is a 403.
pub fn authenticate(ctx: &AppContext, req: &Request, mode: AuthMode) -> Result<Option<User>, ApiError> {
    let header = req
        .header("authorization")
        .and_then(|h| h.as_str())
        .map(str::trim)
        .unwrap_or_default();

    if header.is_empty() {
        return match mode {
            AuthMode::Public => Ok(None),
            AuthMode::Required => Err(ApiError::Forbidden(NO_TOKEN.to_string())),
        };
    }

    // The scheme word is not checked: `Bearer`, `Token` or anything else
    // followed by the token is accepted.
    let token = match header.split_once(char::is_whitespace) {
        Some((_, token)) if !token.trim().is_empty() => token.trim(),
        _ => return Err(ApiError::Forbidden(BAD_TOKEN.to_string())),
    };

    let claims = ctx.tokens.verify(token).map_err(|err| {
        debug!(error = %err, "rejected bearer token");
        ApiError::Forbidden(BAD_TOKEN.to_string())
    })?;

    match db::load_user(ctx.store(), &claims.user_id)? {
        Some(user) => Ok(Some(user)),
        None => Err(ApiError::Forbidden(UNKNOWN_USER.to_string())),
    }
}

/// Runs `handler` with the authenticated user, or rejects the request
/// before `handler` is touched.
pub fn required<F>(ctx: &AppContext, req: &Request, handler: F) -> Result<Response, ApiError>
where
    F: FnOnce(User) -> Result<Response, ApiError>,
{
    match authenticate(ctx, req, AuthMode::Required)? {
        Some(user) => handler(user),
        None => Err(ApiError::Forbidden(NO_TOKEN.to_string())),
    }
}

/// Runs `handler` with the caller if one authenticated, anonymously
/// otherwise. A bad token is still rejected.
pub fn public<F>(ctx: &AppContext, req: &Request, handler: F) -> Result<Response, ApiError>
where
    F: FnOnce(Option<User>) -> Result<Response, ApiError>,
{
    handler(authenticate(ctx, req, AuthMode::Public)?)
}

struct SignupForm {
    email: String,
    password: String,
    username: String,
}

fn validate_signup(store: &dyn KvStore, body: &serde_json::Value) -> Result<SignupForm, ApiError> {
    let mut v = Validator::new();

    let email = normalize_email(body["email"].as_str().unwrap_or_default());
    if !is_email(&email) {
        v.reject("email", "Enter a valid e-mail address", Some(email.as_str()));
    } else if db::find_user_by_email(store, &email)?.is_some() {
        v.reject("email", "E-mail address already in use.", Some(email.as_str()));
    }

    let password = trimmed(body, "password").unwrap_or_default();
    v.ensure(
        password.chars().count() >= MIN_PASSWORD_LENGTH,
        "password",
        "Password must be at least 6 characters",
        None,
    );

    let username = trimmed(body, "username").unwrap_or_default();
    if username.is_empty() {
        v.reject("username", "Username must not be empty", None);
    } else if db::find_user_by_username(store, &username)?.is_some() {
        v.reject("username", "Username already in use.", Some(username.as_str()));
    }

    v.finish()?;
    Ok(SignupForm {
        email,
        password,
        username,
    })
}

pub fn signup(ctx: &AppContext, req: &Request) -> Result<Response, ApiError> {
    let body = parse_body(req)?;
    let form = validate_signup(ctx.store(), &body)?;

    let user = User::new(form.username, form.email, hash_password(&form.password)?);
    db::insert_user(ctx.store(), &user)?;
    let token = ctx.tokens.issue(&user)?;

    info!(user_id = %user.id, "user signed up");
    json(
        201,
        &serde_json::json!({
            "message": "User created!",
            "userID": user.id,
            "token": token,
        }),
    )
}

/// Dry run of the signup checks, for forms validating as the user types.
pub fn validate(ctx: &AppContext, req: &Request) -> Result<Response, ApiError> {
    let body = parse_body(req)?;
    validate_signup(ctx.store(), &body)?;
    json(200, &serde_json::json!({}))
}

pub fn login(ctx: &AppContext, req: &Request) -> Result<Response, ApiError> {
    let body = parse_body(req)?;

    let mut v = Validator::new();
    let email = normalize_email(body["email"].as_str().unwrap_or_default());
    v.ensure(is_email(&email), "email", "Enter a valid e-mail address", Some(email.as_str()));
    let password = trimmed(&body, "password").unwrap_or_default();
    v.ensure(!password.is_empty(), "password", "Password must not be empty", None);
    v.finish()?;

    let user = match db::find_user_by_email(ctx.store(), &email)? {
        Some(user) if verify_password(&password, &user.password) => user,
        _ => return Err(ApiError::Unauthorized(WRONG_CREDENTIALS.to_string())),
    };

    let token = ctx.tokens.issue(&user)?;
    info!(user_id = %user.id, "user logged in");
    json(200, &LoginView::new(&ctx.config.site_url, &user, token))
}
