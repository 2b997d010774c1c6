use spin_sdk::http::{Request, Response};

use crate::auth::{self, public, required};
use crate::core::errors::ApiError;
use crate::core::helpers::json;
use crate::{follow, pictures, tweets, users, AppContext};

/// Dispatches one request. Handler errors are turned into responses here and
/// nowhere else.
pub fn route(ctx: &AppContext, req: Request) -> Response {
    let method = req.method().to_string();
    let path = req.path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    dispatch(ctx, &req, method.as_str(), &segments).unwrap_or_else(Response::from)
}

fn dispatch(ctx: &AppContext, req: &Request, method: &str, segments: &[&str]) -> Result<Response, ApiError> {
    match (method, segments) {
        ("GET", []) => json(200, &serde_json::json!({ "hello": "world" })),

        ("POST", ["signup"]) => auth::signup(ctx, req),
        ("POST", ["signup", "validate"]) => auth::validate(ctx, req),
        ("POST", ["login"]) => auth::login(ctx, req),

        ("GET", ["tweets"]) => required(ctx, req, |user| tweets::list_timeline(ctx, &user, req)),
        ("POST", ["tweets"]) => required(ctx, req, |user| tweets::create_tweet(ctx, &user, req)),
        ("GET", ["tweets", id]) => public(ctx, req, |viewer| tweets::tweet_details(ctx, viewer.as_ref(), id)),
        ("PUT", ["tweets", id]) => required(ctx, req, |user| tweets::update_tweet(ctx, &user, id, req)),
        ("DELETE", ["tweets", id]) => required(ctx, req, |user| tweets::delete_tweet(ctx, &user, id)),
        ("PUT", ["tweets", id, "like"]) => required(ctx, req, |user| tweets::like_tweet(ctx, &user, id)),
        ("PUT", ["tweets", id, "unlike"]) => required(ctx, req, |user| tweets::unlike_tweet(ctx, &user, id)),
        ("GET", ["tweets", id, "likes"]) => {
            public(ctx, req, |viewer| tweets::tweet_likes(ctx, viewer.as_ref(), id, req))
        }

        ("PUT", ["users"]) => required(ctx, req, |user| users::update_profile(ctx, user, req)),
        ("GET", ["users", id]) => public(ctx, req, |viewer| users::user_details(ctx, viewer.as_ref(), id)),
        ("PUT", ["users", id, "follow"]) => required(ctx, req, |user| follow::handle_follow(ctx, &user, id)),
        ("PUT", ["users", id, "unfollow"]) => required(ctx, req, |user| follow::handle_unfollow(ctx, &user, id)),
        ("GET", ["users", id, "followers"]) => public(ctx, req, |_| follow::get_followers_list(ctx, id, req)),
        ("GET", ["users", id, "following"]) => public(ctx, req, |_| follow::get_following_list(ctx, id, req)),
        ("GET", ["users", id, "tweets"]) => {
            public(ctx, req, |viewer| users::user_tweets(ctx, viewer.as_ref(), id, req))
        }

        ("GET", ["uf", owner, file]) => pictures::serve_picture(&ctx.config.uploads_dir, owner, file),

        _ => Err(ApiError::NotFound("No route found".to_string())),
    }
}
