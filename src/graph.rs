//! Follow and like toggles.
//!
//! A follow edge lives in two documents: the followed user's `followers`
//! and the follower's `following`. `A ∈ B.followers ⇔ B ∈ A.following`
//! must hold between requests. The store has no multi-document
//! transactions, so each follow/unfollow writes the followed side first and
//! the follower side second. When the second write fails the first one is
//! rolled back; when the rollback fails too, the pair is appended to
//! `graph_repairs` and [`repair_pending`] restores it later.
//!
//! Likes live on the tweet alone and need none of this.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::GRAPH_REPAIRS_KEY;
use crate::core::db;
use crate::core::store::{JsonStore, KvStore};
use crate::models::models::{GraphAction, GraphRepair, User};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{action:?} {follower_id} -> {followed_id} failed and was rolled back: {reason}")]
    PartialWrite {
        follower_id: String,
        followed_id: String,
        action: GraphAction,
        reason: String,
    },
    #[error("{action:?} {follower_id} -> {followed_id} left asymmetric, repair recorded: {reason}")]
    Inconsistent {
        follower_id: String,
        followed_id: String,
        action: GraphAction,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Result of a toggle that did not fail. Repeating a toggle is never an
/// error; it reports the state it found instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Followed,
    AlreadyFollowing,
    SelfFollow,
    Unfollowed,
    NotFollowing,
    Liked,
    AlreadyLiked,
    Unliked,
    NotLiked,
}

impl Toggle {
    pub fn message(self) -> &'static str {
        match self {
            Toggle::Followed => "Following!",
            Toggle::AlreadyFollowing => "Already following!",
            Toggle::SelfFollow => "Can't follow yourself!",
            Toggle::Unfollowed => "Unfollowed!",
            Toggle::NotFollowing => "Already not a follower",
            Toggle::Liked => "Liked!",
            Toggle::AlreadyLiked => "Tweet already liked!",
            Toggle::Unliked => "Unliked",
            Toggle::NotLiked => "Tweet already unliked",
        }
    }

    /// Whether the toggle wrote anything.
    pub fn changed(self) -> bool {
        matches!(
            self,
            Toggle::Followed | Toggle::Unfollowed | Toggle::Liked | Toggle::Unliked
        )
    }
}

const USER_NOT_FOUND: &str = "User not found!";
const TWEET_NOT_FOUND: &str = "Tweet not found!";

pub fn follow(store: &dyn KvStore, actor: &User, target_id: &str) -> Result<Toggle, GraphError> {
    if actor.id == target_id {
        return Ok(Toggle::SelfFollow);
    }

    let target = db::load_user(store, target_id)?.ok_or(GraphError::NotFound(USER_NOT_FOUND))?;
    if target.is_followed_by(&actor.id) {
        return Ok(Toggle::AlreadyFollowing);
    }

    let found = db::update_user(store, target_id, |followed| {
        if !followed.is_followed_by(&actor.id) {
            followed.followers.push(actor.id.clone());
        }
    })?;
    if !found {
        return Err(GraphError::NotFound(USER_NOT_FOUND));
    }

    mirror_write(
        store,
        &actor.id,
        target_id,
        GraphAction::Follow,
        || {
            update_user(store, &actor.id, |follower| {
                if !follower.follows(target_id) {
                    follower.following.push(target_id.to_string());
                }
            })
        },
        || {
            update_user(store, target_id, |followed| {
                followed.followers.retain(|id| id != &actor.id);
            })
        },
    )?;

    info!(follower = %actor.id, followed = %target_id, "follow edge added");
    Ok(Toggle::Followed)
}

pub fn unfollow(store: &dyn KvStore, actor: &User, target_id: &str) -> Result<Toggle, GraphError> {
    let target = db::load_user(store, target_id)?.ok_or(GraphError::NotFound(USER_NOT_FOUND))?;
    if !target.is_followed_by(&actor.id) {
        return Ok(Toggle::NotFollowing);
    }

    let found = db::update_user(store, target_id, |followed| {
        followed.followers.retain(|id| id != &actor.id);
    })?;
    if !found {
        return Err(GraphError::NotFound(USER_NOT_FOUND));
    }

    mirror_write(
        store,
        &actor.id,
        target_id,
        GraphAction::Unfollow,
        || {
            update_user(store, &actor.id, |follower| {
                follower.following.retain(|id| id != target_id);
            })
        },
        || {
            update_user(store, target_id, |followed| {
                if !followed.is_followed_by(&actor.id) {
                    followed.followers.push(actor.id.clone());
                }
            })
        },
    )?;

    info!(follower = %actor.id, followed = %target_id, "follow edge removed");
    Ok(Toggle::Unfollowed)
}

pub fn like(store: &dyn KvStore, actor: &User, tweet_id: &str) -> Result<Toggle, GraphError> {
    let tweet = db::load_tweet(store, tweet_id)?.ok_or(GraphError::NotFound(TWEET_NOT_FOUND))?;
    if tweet.is_liked_by(&actor.id) {
        return Ok(Toggle::AlreadyLiked);
    }

    let found = db::update_tweet(store, tweet_id, |tweet| {
        if !tweet.is_liked_by(&actor.id) {
            tweet.likes.push(actor.id.clone());
        }
    })?;
    if !found {
        return Err(GraphError::NotFound(TWEET_NOT_FOUND));
    }
    Ok(Toggle::Liked)
}

pub fn unlike(store: &dyn KvStore, actor: &User, tweet_id: &str) -> Result<Toggle, GraphError> {
    let tweet = db::load_tweet(store, tweet_id)?.ok_or(GraphError::NotFound(TWEET_NOT_FOUND))?;
    if !tweet.is_liked_by(&actor.id) {
        return Ok(Toggle::NotLiked);
    }

    let found = db::update_tweet(store, tweet_id, |tweet| {
        tweet.likes.retain(|id| id != &actor.id);
    })?;
    if !found {
        return Err(GraphError::NotFound(TWEET_NOT_FOUND));
    }
    Ok(Toggle::Unliked)
}

/// [`db::update_user`] that fails if the user is gone.
fn update_user(store: &dyn KvStore, id: &str, change: impl FnOnce(&mut User)) -> anyhow::Result<()> {
    if db::update_user(store, id, change)? {
        Ok(())
    } else {
        anyhow::bail!("user {id} disappeared mid-update")
    }
}

/// Runs the follower-side write after the followed side is already saved.
/// On failure the followed side is rolled back with `undo`; if that fails
/// as well the edge is recorded for [`repair_pending`].
fn mirror_write(
    store: &dyn KvStore,
    follower_id: &str,
    followed_id: &str,
    action: GraphAction,
    second: impl FnOnce() -> anyhow::Result<()>,
    undo: impl FnOnce() -> anyhow::Result<()>,
) -> Result<(), GraphError> {
    let err = match second() {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    warn!(follower = %follower_id, followed = %followed_id, ?action, error = %err, "second graph write failed, rolling back");

    let reason = format!("{err:#}");
    match undo() {
        Ok(()) => Err(GraphError::PartialWrite {
            follower_id: follower_id.to_string(),
            followed_id: followed_id.to_string(),
            action,
            reason,
        }),
        Err(undo_err) => {
            error!(follower = %follower_id, followed = %followed_id, ?action, error = %undo_err, "graph rollback failed, edge is asymmetric");
            let repair = GraphRepair {
                follower_id: follower_id.to_string(),
                followed_id: followed_id.to_string(),
                action,
                recorded_at: Utc::now(),
            };
            if let Err(record_err) = record_repair(store, repair) {
                error!(follower = %follower_id, followed = %followed_id, error = %record_err, "could not record graph repair");
            }
            Err(GraphError::Inconsistent {
                follower_id: follower_id.to_string(),
                followed_id: followed_id.to_string(),
                action,
                reason,
            })
        }
    }
}

fn record_repair(store: &dyn KvStore, repair: GraphRepair) -> anyhow::Result<()> {
    store.update_json(GRAPH_REPAIRS_KEY, |pending: Option<Vec<GraphRepair>>| {
        let mut pending = pending.unwrap_or_default();
        pending.push(repair);
        (Some(pending), ())
    })
}

pub fn pending_repairs(store: &dyn KvStore) -> anyhow::Result<Vec<GraphRepair>> {
    Ok(store.get_json(GRAPH_REPAIRS_KEY)?.unwrap_or_default())
}

/// Restores every recorded pair to its state before the failed operation:
/// a failed follow ends absent on both sides, a failed unfollow present on
/// both. Pairs that are already symmetric, or whose users are gone, are
/// dropped untouched. Entries that fail again stay queued. Returns the
/// number of entries resolved.
pub fn repair_pending(store: &dyn KvStore) -> anyhow::Result<usize> {
    let pending = pending_repairs(store)?;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut resolved = Vec::new();
    for repair in pending {
        match restore_edge(store, &repair) {
            Ok(()) => resolved.push(repair),
            Err(err) => {
                warn!(follower = %repair.follower_id, followed = %repair.followed_id, error = %err, "graph repair failed, keeping it queued");
            }
        }
    }

    // Entries recorded while this pass ran are kept.
    let remaining = store.update_json(GRAPH_REPAIRS_KEY, |queue: Option<Vec<GraphRepair>>| {
        let mut queue = queue.unwrap_or_default();
        queue.retain(|entry| !resolved.contains(entry));
        let left = queue.len();
        (Some(queue), left)
    })?;
    info!(resolved = resolved.len(), remaining, "graph repairs processed");
    Ok(resolved.len())
}

fn restore_edge(store: &dyn KvStore, repair: &GraphRepair) -> anyhow::Result<()> {
    let (Some(follower), Some(followed)) = (
        db::load_user(store, &repair.follower_id)?,
        db::load_user(store, &repair.followed_id)?,
    ) else {
        return Ok(());
    };

    if followed.is_followed_by(&follower.id) == follower.follows(&followed.id) {
        return Ok(());
    }

    let (follower_id, followed_id) = (&follower.id, &followed.id);
    match repair.action {
        GraphAction::Follow => {
            db::update_user(store, followed_id, |u| u.followers.retain(|id| id != follower_id))?;
            db::update_user(store, follower_id, |u| u.following.retain(|id| id != followed_id))?;
        }
        GraphAction::Unfollow => {
            db::update_user(store, followed_id, |u| {
                if !u.is_followed_by(follower_id) {
                    u.followers.push(follower_id.clone());
                }
            })?;
            db::update_user(store, follower_id, |u| {
                if !u.follows(followed_id) {
                    u.following.push(followed_id.clone());
                }
            })?;
        }
    }
    Ok(())
}
