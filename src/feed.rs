//! Paginated read views: timelines, likers, followers and following.
//!
//! Every list is two reads: the page itself and a separate total count used
//! for `moreResults`. Nothing pins a snapshot between them, so under
//! concurrent writes the flag is approximate.

use std::cmp::Reverse;

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::core::db;
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::store::KvStore;
use crate::models::models::{Tweet, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Reads `limit` and `offset` from the query string of `uri`. The limit
    /// is capped at [`MAX_PAGE_LIMIT`].
    pub fn from_uri(uri: &str) -> Self {
        let params = parse_query_params(uri);
        Self {
            limit: get_int(&params, "limit", DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            offset: get_int(&params, "offset", 0),
        }
    }

    pub fn more_results(&self, total: usize) -> bool {
        total > self.offset.saturating_add(self.limit)
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items.iter().skip(self.offset).take(self.limit).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub more_results: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            more_results: self.more_results,
        }
    }
}

/// The user's own tweets merged with those of everyone they follow,
/// newest first.
pub fn timeline(store: &dyn KvStore, user: &User, page: PageRequest) -> anyhow::Result<Page<Tweet>> {
    let mut authors = Vec::with_capacity(user.following.len() + 1);
    authors.push(user.id.clone());
    authors.extend(user.following.iter().cloned());

    let mut tweets = Vec::new();
    for author in &authors {
        let ids = db::author_tweet_ids(store, author)?;
        tweets.extend(db::load_tweets(store, &ids)?);
    }
    tweets.sort_by_key(|t| Reverse(t.created_at));
    let items = page.slice(&tweets);

    let total = count_tweets(store, &authors)?;
    Ok(Page {
        items,
        more_results: page.more_results(total),
    })
}

pub fn authored(store: &dyn KvStore, author_id: &str, page: PageRequest) -> anyhow::Result<Page<Tweet>> {
    let ids = db::author_tweet_ids(store, author_id)?;
    let items = db::load_tweets(store, &page.slice(&ids))?;

    let total = count_tweets(store, &[author_id.to_string()])?;
    Ok(Page {
        items,
        more_results: page.more_results(total),
    })
}

fn count_tweets(store: &dyn KvStore, authors: &[String]) -> anyhow::Result<usize> {
    let mut total = 0;
    for author in authors {
        total += db::author_tweet_ids(store, author)?.len();
    }
    Ok(total)
}

/// Users who liked the tweet, in like order. `None` when the tweet is gone.
pub fn likers(store: &dyn KvStore, tweet_id: &str, page: PageRequest) -> anyhow::Result<Option<Page<User>>> {
    let Some(tweet) = db::load_tweet(store, tweet_id)? else {
        return Ok(None);
    };
    let items = db::load_users(store, &page.slice(&tweet.likes))?;

    let total = db::load_tweet(store, tweet_id)?.map_or(0, |t| t.likes.len());
    Ok(Some(Page {
        items,
        more_results: page.more_results(total),
    }))
}

pub fn followers(store: &dyn KvStore, user_id: &str, page: PageRequest) -> anyhow::Result<Option<Page<User>>> {
    edge_page(store, user_id, page, |u| &u.followers)
}

pub fn following(store: &dyn KvStore, user_id: &str, page: PageRequest) -> anyhow::Result<Option<Page<User>>> {
    edge_page(store, user_id, page, |u| &u.following)
}

fn edge_page(
    store: &dyn KvStore,
    user_id: &str,
    page: PageRequest,
    edges: impl Fn(&User) -> &Vec<String>,
) -> anyhow::Result<Option<Page<User>>> {
    let Some(user) = db::load_user(store, user_id)? else {
        return Ok(None);
    };
    let items = db::load_users(store, &page.slice(edges(&user)))?;

    let total = db::load_user(store, user_id)?.map_or(0, |u| edges(&u).len());
    Ok(Some(Page {
        items,
        more_results: page.more_results(total),
    }))
}
