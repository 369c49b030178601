use chrono::{DateTime, Utc};
use scrape_types::{ScrapeError, User};
use sqlx::PgPool;

/// Read-mostly access to `users`. No lifecycle beyond seed, per the data
/// model — this repository only ever looks users up by username.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ScrapeError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, ScrapeError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}
