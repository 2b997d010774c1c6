//! Response bodies. Each view is built once from domain records and never
//! patched afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DEFAULT_PICTURE;
use crate::models::models::{Tweet, User};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PictureUrls {
    pub picture: String,
    pub picture_thumb: String,
}

impl PictureUrls {
    pub fn for_user(site_url: &str, user: &User) -> Self {
        if user.picture == DEFAULT_PICTURE {
            return Self {
                picture: format!("{site_url}/uf/default/default-original.png"),
                picture_thumb: format!("{site_url}/uf/default/default-thumb.png"),
            };
        }
        Self {
            picture: format!("{site_url}/uf/{}/{}-original.jpeg", user.id, user.picture),
            picture_thumb: format!("{site_url}/uf/{}/{}-thumb.jpeg", user.id, user.picture),
        }
    }
}

/// Short public card used for tweet authors and follower lists.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub pictures: PictureUrls,
}

impl UserCard {
    pub fn new(site_url: &str, user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            pictures: PictureUrls::for_user(site_url, user),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    #[serde(rename = "_id")]
    pub id: String,
    pub author: UserCard,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_liked: bool,
    pub likes_count: usize,
}

impl TweetView {
    pub fn new(site_url: &str, tweet: &Tweet, author: &User, viewer: Option<&User>) -> Self {
        Self {
            id: tweet.id.clone(),
            author: UserCard::new(site_url, author),
            content: tweet.content.clone(),
            created_at: tweet.created_at,
            updated_at: tweet.updated_at,
            is_liked: viewer.is_some_and(|v| tweet.is_liked_by(&v.id)),
            likes_count: tweet.likes.len(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LikerView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: String,
    #[serde(flatten)]
    pub pictures: PictureUrls,
    pub is_following: bool,
}

impl LikerView {
    pub fn new(site_url: &str, liker: &User, viewer: Option<&User>) -> Self {
        Self {
            id: liker.id.clone(),
            username: liker.username.clone(),
            name: liker.name.clone(),
            bio: liker.bio.clone().unwrap_or_default(),
            pictures: PictureUrls::for_user(site_url, liker),
            is_following: viewer.is_some_and(|v| liker.is_followed_by(&v.id)),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: String,
    #[serde(flatten)]
    pub pictures: PictureUrls,
    pub followers_count: usize,
    pub following_count: usize,
    pub is_following: bool,
}

impl ProfileView {
    pub fn new(site_url: &str, user: &User, viewer: Option<&User>) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            bio: user.bio.clone().unwrap_or_default(),
            pictures: PictureUrls::for_user(site_url, user),
            followers_count: user.followers.len(),
            following_count: user.following.len(),
            is_following: viewer.is_some_and(|v| user.is_followed_by(&v.id)),
        }
    }
}

/// The caller's own account after an update.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub bio: String,
    #[serde(flatten)]
    pub pictures: PictureUrls,
}

impl AccountView {
    pub fn new(site_url: &str, user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            bio: user.bio.clone().unwrap_or_default(),
            pictures: PictureUrls::for_user(site_url, user),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginView {
    pub bio: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub pictures: PictureUrls,
    pub token: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
}

impl LoginView {
    pub fn new(site_url: &str, user: &User, token: String) -> Self {
        Self {
            bio: user.bio.clone().unwrap_or_default(),
            name: user.name.clone(),
            pictures: PictureUrls::for_user(site_url, user),
            token,
            user_id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}
