use chrono::Utc;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::{MAX_BIO_LENGTH, MIN_PASSWORD_LENGTH};
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, json, sanitize_text, validate_uuid, verify_password};
use crate::core::validation::{is_email, normalize_email, parse_body, trimmed, Validator};
use crate::feed::{self, PageRequest};
use crate::models::models::User;
use crate::models::views::{AccountView, ProfileView};
use crate::tweets::render_tweets;
use crate::{pictures, AppContext};

const USER_NOT_FOUND: &str = "User not found!";

pub(crate) fn find_user(ctx: &AppContext, id: &str) -> Result<User, ApiError> {
    if !validate_uuid(id) {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    db::load_user(ctx.store(), id)?.ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
}

pub fn user_details(ctx: &AppContext, viewer: Option<&User>, id: &str) -> Result<Response, ApiError> {
    let user = find_user(ctx, id)?;

    json(
        200,
        &serde_json::json!({
            "message": "User found!",
            "user": ProfileView::new(&ctx.config.site_url, &user, viewer),
        }),
    )
}

pub fn user_tweets(ctx: &AppContext, viewer: Option<&User>, id: &str, req: &Request) -> Result<Response, ApiError> {
    let author = find_user(ctx, id)?;
    let page = feed::authored(ctx.store(), &author.id, PageRequest::from_uri(&req.uri()))?;
    let tweets = render_tweets(ctx.store(), &ctx.config.site_url, &page.items, viewer)?;

    json(
        200,
        &serde_json::json!({
            "message": "Tweets found",
            "moreResults": page.more_results,
            "tweets": tweets,
        }),
    )
}

/// Updates the caller's own account. The current password must accompany
/// every change. An optional `picture` (base64 PNG or JPEG) replaces the
/// profile picture.
pub fn update_profile(ctx: &AppContext, user: User, req: &Request) -> Result<Response, ApiError> {
    let store = ctx.store();
    let body = parse_body(req)?;
    let mut v = Validator::new();

    let email = body["email"].as_str().map(normalize_email);
    if let Some(email) = &email {
        if !is_email(email) {
            v.reject("email", "Enter a valid e-mail address", Some(email.as_str()));
        } else if db::find_user_by_email(store, email)?.is_some_and(|other| other.id != user.id) {
            v.reject("email", "E-mail address already in use.", Some(email.as_str()));
        }
    }

    let new_password = trimmed(&body, "new_password");
    if let Some(new_password) = &new_password {
        v.ensure(
            new_password.chars().count() >= MIN_PASSWORD_LENGTH,
            "new_password",
            "New password must be at least 6 characters",
            None,
        );
    }

    let password = trimmed(&body, "password").unwrap_or_default();
    v.ensure(
        !password.is_empty(),
        "password",
        "Enter the current password to apply changes",
        None,
    );

    let username = trimmed(&body, "username");
    if let Some(username) = &username {
        if username.is_empty() {
            v.reject("username", "Username must not be empty", None);
        } else if db::find_user_by_username(store, username)?.is_some_and(|other| other.id != user.id) {
            v.reject("username", "Username already in use.", Some(username.as_str()));
        }
    }

    let bio = trimmed(&body, "bio");
    if let Some(bio) = &bio {
        v.ensure(
            bio.chars().count() <= MAX_BIO_LENGTH,
            "bio",
            "Bio maximum characters is 280",
            None,
        );
    }

    let picture = body["picture"].as_str().and_then(|raw| pictures::read_upload(raw, &mut v));

    v.finish()?;

    if !verify_password(&password, &user.password) {
        return Err(ApiError::BadRequest("Wrong password".to_string()));
    }

    let password_hash = new_password.map(|p| hash_password(&p)).transpose()?;
    let uploads_dir = ctx.config.uploads_dir.as_str();
    let picture = picture
        .map(|image| pictures::store_picture(uploads_dir, &user.id, &image))
        .transpose()?;

    // Another request may have claimed the address or name since validation.
    if let Err(err) = db::reindex_user(store, &user, email.as_deref(), username.as_deref()) {
        if let Some(picture) = &picture {
            pictures::remove_picture(uploads_dir, &user.id, picture);
        }
        return Err(err.into());
    }
    let bio = bio.map(|b| sanitize_text(&b));
    let name = trimmed(&body, "name").map(|n| sanitize_text(&n));

    // Applied to the stored record so edges written since the auth gate
    // loaded the user survive.
    let mut replaced = None;
    let found = db::update_user(store, &user.id, |stored| {
        if let Some(email) = email {
            stored.email = email;
        }
        if let Some(username) = username {
            stored.username = username;
        }
        if let Some(hash) = password_hash {
            stored.password = hash;
        }
        if let Some(bio) = bio {
            stored.bio = Some(bio).filter(|b| !b.is_empty());
        }
        if let Some(name) = name {
            stored.name = Some(name).filter(|n| !n.is_empty());
        }
        if let Some(picture) = &picture {
            replaced = Some(std::mem::replace(&mut stored.picture, picture.clone()));
        }
        stored.updated_at = Utc::now();
    })?;
    if !found {
        if let Some(picture) = &picture {
            pictures::remove_picture(uploads_dir, &user.id, picture);
        }
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    if let Some(old) = replaced {
        pictures::remove_picture(uploads_dir, &user.id, &old);
    }

    let user = db::load_user(store, &user.id)?.ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    info!(user_id = %user.id, "profile updated");

    json(
        200,
        &serde_json::json!({
            "message": "User updated!",
            "user": AccountView::new(&ctx.config.site_url, &user),
        }),
    )
}
