use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Image, User};

// Request bodies

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub age: i64,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordUpdate {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrivateUpdate {
    pub private: bool,
}

/// OAuth2-style password form; `username` carries the email address.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub daytime: Option<String>,
    pub weather: Option<String>,
    pub indoor: Option<bool>,
    pub primary_object: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub age: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserOut {
    fn from(u: User) -> Self {
        Self { id: u.id, username: u.username, age: u.age, email: u.email, created_at: u.created_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOut {
    pub id: i64,
    pub image_url: String,
    pub public_id: String,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    pub indoor: bool,
    pub daytime: Option<String>,
    pub weather: Option<String>,
    pub primary_object: Option<String>,
    pub filter1: Option<String>,
    pub filter2: Option<String>,
    pub owner_id: i64,
}

impl From<Image> for ImageOut {
    fn from(i: Image) -> Self {
        Self {
            id: i.id,
            image_url: i.image_url,
            public_id: i.public_id,
            private: i.private,
            created_at: i.created_at,
            indoor: i.indoor,
            daytime: i.daytime,
            weather: i.weather,
            primary_object: i.primary_object,
            filter1: i.filter1,
            filter2: i.filter2,
            owner_id: i.owner_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// Outcome of removing every image of a user from cloud storage.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserImagesDeletion {
    pub total: usize,
    pub cloud_deleted: usize,
    pub db_deleted: usize,
    /// `public_id`s that could not be removed from storage.
    pub failures: Vec<String>,
}
