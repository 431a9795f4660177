//! Database rows and the queries that read and write them.
//!
//! Handlers never build SQL themselves; they call into this module so the
//! visibility rule ("owner, or not private") lives in one place.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

/// A row of the `users` table, including the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub age: i64,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// A row of the `images` table.
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub indoor: bool,
    pub daytime: Option<String>,
    pub weather: Option<String>,
    pub image_url: String,
    pub public_id: String,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    pub primary_object: Option<String>,
    pub filter1: Option<String>,
    pub filter2: Option<String>,
    pub owner_id: i64,
}

/// Values for a freshly ingested image.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub indoor: bool,
    pub daytime: Option<String>,
    pub weather: Option<String>,
    pub image_url: String,
    pub public_id: String,
    pub primary_object: Option<String>,
    pub filter1: Option<String>,
    pub filter2: Option<String>,
    pub owner_id: i64,
}

/// Optional metadata filters for search.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub daytime: Option<String>,
    pub weather: Option<String>,
    pub indoor: Option<bool>,
    pub primary_object: Option<String>,
}

/// Limit/offset pair, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub skip: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 1000;
    pub const MAX_SKIP: i64 = 100_000;

    pub fn new(limit: i64, skip: i64) -> Self {
        Self { limit: limit.clamp(1, Self::MAX_LIMIT), skip: skip.clamp(0, Self::MAX_SKIP) }
    }
}

const IMAGE_COLUMNS: &str = "id, indoor, daytime, weather, image_url, public_id, private, created_at, \
     primary_object, filter1, filter2, owner_id";

const LIKE_ESCAPE: char = '!';

pub(crate) fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

// ---- users ----

pub async fn insert_user(
    db: &SqlitePool,
    username: &str,
    age: i64,
    email: &str,
    password_hash: &str,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, age, email, password) VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, username, age, email, password, created_at",
    )
    .bind(username)
    .bind(age)
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await
}

pub async fn find_user(db: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, username, age, email, password, created_at FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_email(db: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, age, email, password, created_at FROM users WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn update_user_password(db: &SqlitePool, id: i64, password_hash: &str) -> sqlx::Result<bool> {
    let res = sqlx::query("UPDATE users SET password = ?1 WHERE id = ?2")
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Deletes the user; owned image rows go with it through the cascade.
pub async fn delete_user(db: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM users WHERE id = ?1").bind(id).execute(db).await?;
    Ok(res.rows_affected() > 0)
}

// ---- images ----

pub async fn insert_image(db: &SqlitePool, new: &NewImage) -> sqlx::Result<Image> {
    let sql = format!(
        "INSERT INTO images (indoor, daytime, weather, image_url, public_id, private, primary_object, \
         filter1, filter2, owner_id) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9) RETURNING {}",
        IMAGE_COLUMNS
    );
    sqlx::query_as::<_, Image>(&sql)
        .bind(new.indoor)
        .bind(&new.daytime)
        .bind(&new.weather)
        .bind(&new.image_url)
        .bind(&new.public_id)
        .bind(&new.primary_object)
        .bind(&new.filter1)
        .bind(&new.filter2)
        .bind(new.owner_id)
        .fetch_one(db)
        .await
}

pub async fn find_image(db: &SqlitePool, id: i64) -> sqlx::Result<Option<Image>> {
    let sql = format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS);
    sqlx::query_as::<_, Image>(&sql).bind(id).fetch_optional(db).await
}

pub async fn set_image_private(db: &SqlitePool, id: i64, private: bool) -> sqlx::Result<Option<Image>> {
    let sql = format!("UPDATE images SET private = ?1 WHERE id = ?2 RETURNING {}", IMAGE_COLUMNS);
    sqlx::query_as::<_, Image>(&sql).bind(private).bind(id).fetch_optional(db).await
}

pub async fn delete_image(db: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM images WHERE id = ?1").bind(id).execute(db).await?;
    Ok(res.rows_affected() > 0)
}

/// All images owned by `owner_id`, regardless of privacy.
pub async fn images_owned_by(db: &SqlitePool, owner_id: i64) -> sqlx::Result<Vec<Image>> {
    let sql = format!("SELECT {} FROM images WHERE owner_id = ?1 ORDER BY id", IMAGE_COLUMNS);
    sqlx::query_as::<_, Image>(&sql).bind(owner_id).fetch_all(db).await
}

/// Images of `owner_id` as seen by `requester_id`: private ones only for the owner.
/// Returns the page and the total number of visible rows.
pub async fn images_for_owner(
    db: &SqlitePool,
    owner_id: i64,
    requester_id: Option<i64>,
    page: Page,
) -> sqlx::Result<(Vec<Image>, i64)> {
    let public_only = requester_id != Some(owner_id);

    let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM images WHERE owner_id = ");
    count.push_bind(owner_id);
    if public_only {
        count.push(" AND private = 0");
    }
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {} FROM images WHERE owner_id = ", IMAGE_COLUMNS));
    qb.push_bind(owner_id);
    if public_only {
        qb.push(" AND private = 0");
    }
    push_order_and_page(&mut qb, page);
    let rows = qb.build_query_as::<Image>().fetch_all(db).await?;
    Ok((rows, total))
}

/// Images visible to `requester_id` (own or public), narrowed by `filter`.
pub async fn search_images(
    db: &SqlitePool,
    requester_id: i64,
    filter: &ImageFilter,
    page: Page,
) -> sqlx::Result<Vec<Image>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM images WHERE (owner_id = ", IMAGE_COLUMNS));
    qb.push_bind(requester_id).push(" OR private = 0)");

    for (column, value) in [
        ("daytime", &filter.daytime),
        ("weather", &filter.weather),
        ("primary_object", &filter.primary_object),
    ] {
        let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        // Term and column fold through the same LOWER()
        let pattern = format!("%{}%", escape_like_pattern(value));
        qb.push(format!(" AND LOWER({}) LIKE LOWER(", column))
            .push_bind(pattern)
            .push(") ESCAPE '!'");
    }
    if let Some(indoor) = filter.indoor {
        qb.push(" AND indoor = ").push_bind(indoor);
    }

    push_order_and_page(&mut qb, page);
    qb.build_query_as::<Image>().fetch_all(db).await
}

fn push_order_and_page(qb: &mut QueryBuilder<Sqlite>, page: Page) {
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);
}
