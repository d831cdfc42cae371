//! # User Repository
//!
//! Accounts and API tokens.
//!
//! Registration flows live outside this system; accounts are created by the
//! seed binary and tests, and tokens are resolved on every request.

use chrono::Utc;
use market_core::{NewUser, NotificationEvent, User};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::outbox::enqueue_in;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, middle_name, company, position, kind";

/// Repository for accounts and tokens.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an account and queues `UserRegistered` in the same transaction.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the e-mail is taken
    pub async fn create(&self, user: &NewUser) -> DbResult<User> {
        let email = user.email.trim().to_lowercase();
        debug!(email = %email, kind = ?user.kind, "Creating user");

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (
                email, first_name, last_name, middle_name, company, position, kind, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .bind(&user.company)
        .bind(&user.position)
        .bind(user.kind)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &email),
            other => other,
        })?;

        let id = inserted.last_insert_rowid();
        enqueue_in(
            &mut tx,
            &NotificationEvent::UserRegistered {
                user_id: id,
                email: email.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        info!(user_id = id, "User created");

        Ok(User {
            id,
            email,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            company: user.company.clone(),
            position: user.position.clone(),
            kind: user.kind,
        })
    }

    /// Gets an account by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets an account by e-mail (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Resolves an API token to its account.
    pub async fn find_by_token(&self, key: &str) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users u JOIN user_tokens t ON t.user_id = u.id WHERE t.key = ?1",
            prefixed_columns("u")
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Issues a new API token for an account.
    pub async fn create_token(&self, user_id: i64) -> DbResult<String> {
        let key = Uuid::new_v4().simple().to_string();

        sqlx::query("INSERT INTO user_tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(&key)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        debug!(user_id, "Token issued");
        Ok(key)
    }
}

fn prefixed_columns(alias: &str) -> String {
    USER_COLUMNS
        .split(", ")
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Unit Tests
// =============================================================================
