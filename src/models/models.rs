use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_PICTURE;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub picture: String,
    /// Ids of users following this one.
    #[serde(default)]
    pub followers: Vec<String>,
    /// Ids of users this one follows.
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password: password_hash,
            name: None,
            bio: None,
            picture: DEFAULT_PICTURE.to_string(),
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_followed_by(&self, user_id: &str) -> bool {
        self.followers.iter().any(|id| id == user_id)
    }

    pub fn follows(&self, user_id: &str) -> bool {
        self.following.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tweet {
    pub id: String,
    pub author_id: String,
    pub content: String,
    /// Ids of users who liked the tweet, in like order.
    #[serde(default)]
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tweet {
    pub fn new(author_id: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            author_id,
            content,
            likes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }
}

/// Bearer token payload. Never stored; re-derived at login and signup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub email: String,
}

impl Claims {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphAction {
    Follow,
    Unfollow,
}

/// A follow edge left asymmetric after a failed dual write whose rollback
/// also failed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GraphRepair {
    pub follower_id: String,
    pub followed_id: String,
    pub action: GraphAction,
    pub recorded_at: DateTime<Utc>,
}
