//! Document access for users and tweets on top of [`KvStore`].
//!
//! Emails and usernames are unique through `email:` / `username:` index
//! keys claimed with [`KvStore::update`]; tweets are indexed per author,
//! newest first. Every index write goes through `update`, so concurrent
//! requests on one store never drop each other's entries.

use thiserror::Error;

use crate::config::{author_tweets_key, email_key, tweet_key, user_key, username_key};
use crate::core::store::{JsonStore, KvStore};
use crate::models::models::{Tweet, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0:?} already in use")]
    Taken(UniqueField),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub fn load_user(store: &dyn KvStore, id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(id))
}

pub fn save_user(store: &dyn KvStore, user: &User) -> anyhow::Result<()> {
    store.set_json(&user_key(&user.id), user)
}

/// Applies `change` to the stored user atomically. `Ok(false)` when there is
/// no such user.
pub fn update_user(store: &dyn KvStore, id: &str, change: impl FnOnce(&mut User)) -> anyhow::Result<bool> {
    store.update_json(&user_key(id), |current: Option<User>| match current {
        Some(mut user) => {
            change(&mut user);
            (Some(user), true)
        }
        None => (None, false),
    })
}

/// Points `key` at `id` unless another user already holds it.
fn claim(store: &dyn KvStore, key: &str, id: &str) -> anyhow::Result<bool> {
    store.update_json(key, |holder: Option<String>| match holder {
        Some(other) if other != id => (Some(other), false),
        _ => (Some(id.to_string()), true),
    })
}

/// Drops `key` if it still points at `id`.
fn release(store: &dyn KvStore, key: &str, id: &str) -> anyhow::Result<()> {
    store.update_json(key, |holder: Option<String>| match holder {
        Some(other) if other != id => (Some(other), ()),
        _ => (None, ()),
    })
}

/// Stores a new user after claiming its email and username. Nothing is
/// left claimed when either is taken.
pub fn insert_user(store: &dyn KvStore, user: &User) -> Result<(), DbError> {
    if !claim(store, &email_key(&user.email), &user.id)? {
        return Err(DbError::Taken(UniqueField::Email));
    }
    if !claim(store, &username_key(&user.username), &user.id)? {
        release(store, &email_key(&user.email), &user.id)?;
        return Err(DbError::Taken(UniqueField::Username));
    }

    save_user(store, user)?;
    Ok(())
}

/// Moves the unique index entries of `user` to `email` / `username` before
/// the document itself changes. On conflict the previous claims stay.
pub fn reindex_user(
    store: &dyn KvStore,
    user: &User,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<(), DbError> {
    let email = email.filter(|e| *e != user.email);
    let username = username.filter(|u| *u != user.username);

    if let Some(email) = email {
        if !claim(store, &email_key(email), &user.id)? {
            return Err(DbError::Taken(UniqueField::Email));
        }
    }
    if let Some(username) = username {
        if !claim(store, &username_key(username), &user.id)? {
            if let Some(email) = email {
                release(store, &email_key(email), &user.id)?;
            }
            return Err(DbError::Taken(UniqueField::Username));
        }
    }

    if email.is_some() {
        release(store, &email_key(&user.email), &user.id)?;
    }
    if username.is_some() {
        release(store, &username_key(&user.username), &user.id)?;
    }
    Ok(())
}

/// Loads the users behind `ids` in order, skipping ids with no record.
pub fn load_users(store: &dyn KvStore, ids: &[String]) -> anyhow::Result<Vec<User>> {
    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = load_user(store, id)? {
            users.push(user);
        }
    }
    Ok(users)
}

fn find_indexed(store: &dyn KvStore, key: &str, matches: impl Fn(&User) -> bool) -> anyhow::Result<Option<User>> {
    let Some(id) = store.get_json::<String>(key)? else {
        return Ok(None);
    };
    // An index entry can outlive a failed document write; trust the document.
    Ok(load_user(store, &id)?.filter(|u| matches(u)))
}

pub fn find_user_by_email(store: &dyn KvStore, email: &str) -> anyhow::Result<Option<User>> {
    find_indexed(store, &email_key(email), |u| u.email == email)
}

pub fn find_user_by_username(store: &dyn KvStore, username: &str) -> anyhow::Result<Option<User>> {
    find_indexed(store, &username_key(username), |u| u.username == username)
}

pub fn load_tweet(store: &dyn KvStore, id: &str) -> anyhow::Result<Option<Tweet>> {
    store.get_json(&tweet_key(id))
}

pub fn save_tweet(store: &dyn KvStore, tweet: &Tweet) -> anyhow::Result<()> {
    store.set_json(&tweet_key(&tweet.id), tweet)
}

/// Atomic counterpart of [`update_user`] for tweets.
pub fn update_tweet(store: &dyn KvStore, id: &str, change: impl FnOnce(&mut Tweet)) -> anyhow::Result<bool> {
    store.update_json(&tweet_key(id), |current: Option<Tweet>| match current {
        Some(mut tweet) => {
            change(&mut tweet);
            (Some(tweet), true)
        }
        None => (None, false),
    })
}

/// Stores a new tweet and prepends it to its author's index.
pub fn insert_tweet(store: &dyn KvStore, tweet: &Tweet) -> anyhow::Result<()> {
    save_tweet(store, tweet)?;

    store.update_json(&author_tweets_key(&tweet.author_id), |ids: Option<Vec<String>>| {
        let mut ids = ids.unwrap_or_default();
        ids.insert(0, tweet.id.clone());
        (Some(ids), ())
    })
}

pub fn remove_tweet(store: &dyn KvStore, tweet: &Tweet) -> anyhow::Result<()> {
    store.delete(&tweet_key(&tweet.id))?;

    store.update_json(&author_tweets_key(&tweet.author_id), |ids: Option<Vec<String>>| {
        let mut ids = ids.unwrap_or_default();
        ids.retain(|id| id != &tweet.id);
        (Some(ids), ())
    })
}

pub fn author_tweet_ids(store: &dyn KvStore, author_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(store.get_json(&author_tweets_key(author_id))?.unwrap_or_default())
}

pub fn load_tweets(store: &dyn KvStore, ids: &[String]) -> anyhow::Result<Vec<Tweet>> {
    let mut tweets = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(tweet) = load_tweet(store, id)? {
            tweets.push(tweet);
        }
    }
    Ok(tweets)
}
