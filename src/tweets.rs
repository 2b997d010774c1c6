use std::collections::HashMap;

use chrono::Utc;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::MAX_TWEET_LENGTH;
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{json, message, sanitize_text, validate_uuid};
use crate::core::store::KvStore;
use crate::core::validation::{parse_body, trimmed, Validator};
use crate::feed::{self, PageRequest};
use crate::graph;
use crate::models::models::{Tweet, User};
use crate::models::views::{LikerView, TweetView};
use crate::AppContext;

const TWEET_NOT_FOUND: &str = "Tweet not found!";

fn read_content(req: &Request) -> Result<String, ApiError> {
    let body = parse_body(req)?;
    let content = trimmed(&body, "content").unwrap_or_default();

    let mut v = Validator::new();
    v.ensure(
        content.chars().count() <= MAX_TWEET_LENGTH,
        "content",
        "Tweet content max characters is 140",
        Some(content.as_str()),
    );
    v.ensure(!content.is_empty(), "content", "Tweet content must not be empty", Some(content.as_str()));
    v.finish()?;

    Ok(sanitize_text(&content))
}

fn find_tweet(ctx: &AppContext, id: &str) -> Result<Tweet, ApiError> {
    if !validate_uuid(id) {
        return Err(ApiError::NotFound(TWEET_NOT_FOUND.to_string()));
    }
    db::load_tweet(ctx.store(), id)?.ok_or_else(|| ApiError::NotFound(TWEET_NOT_FOUND.to_string()))
}

/// Builds views for `tweets`, loading each distinct author once. Tweets
/// whose author record is missing are left out.
pub fn render_tweets(
    store: &dyn KvStore,
    site_url: &str,
    tweets: &[Tweet],
    viewer: Option<&User>,
) -> anyhow::Result<Vec<TweetView>> {
    let mut authors: HashMap<String, Option<User>> = HashMap::new();
    let mut views = Vec::with_capacity(tweets.len());

    for tweet in tweets {
        if !authors.contains_key(&tweet.author_id) {
            let author = db::load_user(store, &tweet.author_id)?;
            authors.insert(tweet.author_id.clone(), author);
        }
        if let Some(Some(author)) = authors.get(&tweet.author_id) {
            views.push(TweetView::new(site_url, tweet, author, viewer));
        }
    }

    Ok(views)
}

pub fn create_tweet(ctx: &AppContext, user: &User, req: &Request) -> Result<Response, ApiError> {
    let content = read_content(req)?;

    let tweet = Tweet::new(user.id.clone(), content);
    db::insert_tweet(ctx.store(), &tweet)?;
    info!(tweet_id = %tweet.id, author = %user.id, "tweet created");

    json(
        201,
        &serde_json::json!({
            "message": "Tweet created!",
            "tweet": TweetView::new(&ctx.config.site_url, &tweet, user, Some(user)),
        }),
    )
}

pub fn tweet_details(ctx: &AppContext, viewer: Option<&User>, id: &str) -> Result<Response, ApiError> {
    let tweet = find_tweet(ctx, id)?;
    let author = db::load_user(ctx.store(), &tweet.author_id)?
        .ok_or_else(|| ApiError::NotFound(TWEET_NOT_FOUND.to_string()))?;

    json(
        200,
        &serde_json::json!({
            "message": "Tweet found!",
            "tweet": TweetView::new(&ctx.config.site_url, &tweet, &author, viewer),
        }),
    )
}

pub fn update_tweet(ctx: &AppContext, user: &User, id: &str, req: &Request) -> Result<Response, ApiError> {
    let content = read_content(req)?;

    let mut tweet = find_tweet(ctx, id)?;
    if tweet.author_id != user.id {
        return Err(ApiError::Forbidden("Only the author can update this tweet".to_string()));
    }

    if tweet.content != content {
        tweet.content = content;
        tweet.updated_at = Utc::now();
        db::save_tweet(ctx.store(), &tweet)?;
    }

    json(
        200,
        &serde_json::json!({
            "message": "Tweet updated successfully",
            "tweet": TweetView::new(&ctx.config.site_url, &tweet, user, Some(user)),
        }),
    )
}

pub fn delete_tweet(ctx: &AppContext, user: &User, id: &str) -> Result<Response, ApiError> {
    let tweet = find_tweet(ctx, id)?;
    if tweet.author_id != user.id {
        return Err(ApiError::Forbidden("Only the author can delete this tweet".to_string()));
    }

    db::remove_tweet(ctx.store(), &tweet)?;
    info!(tweet_id = %tweet.id, "tweet deleted");
    message("Tweet deleted")
}

/// The caller's timeline: own tweets plus those of followed users.
pub fn list_timeline(ctx: &AppContext, user: &User, req: &Request) -> Result<Response, ApiError> {
    let page = feed::timeline(ctx.store(), user, PageRequest::from_uri(&req.uri()))?;
    let tweets = render_tweets(ctx.store(), &ctx.config.site_url, &page.items, Some(user))?;

    json(
        200,
        &serde_json::json!({
            "message": "Tweets found",
            "moreResults": page.more_results,
            "tweets": tweets,
        }),
    )
}

pub fn like_tweet(ctx: &AppContext, user: &User, id: &str) -> Result<Response, ApiError> {
    if !validate_uuid(id) {
        return Err(ApiError::NotFound(TWEET_NOT_FOUND.to_string()));
    }
    let outcome = graph::like(ctx.store(), user, id)?;
    message(outcome.message())
}

pub fn unlike_tweet(ctx: &AppContext, user: &User, id: &str) -> Result<Response, ApiError> {
    if !validate_uuid(id) {
        return Err(ApiError::NotFound(TWEET_NOT_FOUND.to_string()));
    }
    let outcome = graph::unlike(ctx.store(), user, id)?;
    message(outcome.message())
}

pub fn tweet_likes(ctx: &AppContext, viewer: Option<&User>, id: &str, req: &Request) -> Result<Response, ApiError> {
    if !validate_uuid(id) {
        return Err(ApiError::NotFound(TWEET_NOT_FOUND.to_string()));
    }
    let page = feed::likers(ctx.store(), id, PageRequest::from_uri(&req.uri()))?
        .ok_or_else(|| ApiError::NotFound(TWEET_NOT_FOUND.to_string()))?;

    let site_url = &ctx.config.site_url;
    let page = page.map(|liker| LikerView::new(site_url, &liker, viewer));

    json(
        200,
        &serde_json::json!({
            "likes": page.items,
            "message": "Liked list found!",
            "moreResults": page.more_results,
        }),
    )
}
