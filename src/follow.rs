use spin_sdk::http::{Request, Response};

use crate::core::errors::ApiError;
use crate::core::helpers::{json, message, validate_uuid};
use crate::feed::{self, Page, PageRequest};
use crate::graph;
use crate::models::models::User;
use crate::models::views::UserCard;
use crate::AppContext;

const USER_NOT_FOUND: &str = "User not found!";

pub fn handle_follow(ctx: &AppContext, user: &User, target_id: &str) -> Result<Response, ApiError> {
    if !validate_uuid(target_id) {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    let outcome = graph::follow(ctx.store(), user, target_id)?;
    message(outcome.message())
}

pub fn handle_unfollow(ctx: &AppContext, user: &User, target_id: &str) -> Result<Response, ApiError> {
    if !validate_uuid(target_id) {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    let outcome = graph::unfollow(ctx.store(), user, target_id)?;
    message(outcome.message())
}

fn edge_response(ctx: &AppContext, field: &str, msg: &str, page: Option<Page<User>>) -> Result<Response, ApiError> {
    let page = page.ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    let site_url = &ctx.config.site_url;
    let page = page.map(|u| UserCard::new(site_url, &u));

    json(
        200,
        &serde_json::json!({
            field: page.items,
            "message": msg,
            "moreResults": page.more_results,
        }),
    )
}

pub fn get_followers_list(ctx: &AppContext, user_id: &str, req: &Request) -> Result<Response, ApiError> {
    if !validate_uuid(user_id) {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    let page = feed::followers(ctx.store(), user_id, PageRequest::from_uri(&req.uri()))?;
    edge_response(ctx, "followers", "Followers found!", page)
}

pub fn get_following_list(ctx: &AppContext, user_id: &str, req: &Request) -> Result<Response, ApiError> {
    if !validate_uuid(user_id) {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }
    let page = feed::following(ctx.store(), user_id, PageRequest::from_uri(&req.uri()))?;
    edge_response(ctx, "following", "Following found!", page)
}
