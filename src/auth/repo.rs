//! User repository contract and its SQLite implementation.
//!
//! The rest of the crate depends on the [`UserRepository`] trait, never on
//! SQL. Uniqueness of `email`, `github_id` and `google_id` is enforced by
//! the schema; a violation surfaces as [`RepoError::UniqueViolation`] so the
//! resolver can treat a lost first-contact race as "someone else just
//! created this user" instead of a fatal error.

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::models::{ProviderKind, User, UserDraft, UserPatch};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),
}

fn map_sqlx(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return RepoError::UniqueViolation;
        }
    }
    RepoError::Database(e)
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_provider_id(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<User>, RepoError>;
    async fn create(&self, draft: UserDraft) -> Result<User, RepoError>;
    async fn update_by_email(
        &self,
        email: &str,
        patch: UserPatch,
    ) -> Result<Option<User>, RepoError>;
    async fn delete(&self, id: &str) -> Result<(), RepoError>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        // email column is COLLATE NOCASE, the comparison is case-insensitive
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepoError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_by_provider_id(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<User>, RepoError> {
        // column name comes from a closed enum, never from input
        let sql = format!("SELECT * FROM users WHERE {} = ?", provider.column());
        sqlx::query_as::<_, User>(&sql)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn create(&self, draft: UserDraft) -> Result<User, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password, github_id, google_id, avatar_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&draft.email)
        .bind(&draft.name)
        .bind(&draft.password)
        .bind(&draft.github_id)
        .bind(&draft.google_id)
        .bind(&draft.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        // fetch back so server-assigned timestamps are returned
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn update_by_email(
        &self,
        email: &str,
        patch: UserPatch,
    ) -> Result<Option<User>, RepoError> {
        // COALESCE keeps existing values when the patch omits a field, and
        // is_email_verified only ever moves to true
        let verified = patch.is_email_verified.filter(|v| *v);

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                avatar_url = COALESCE(?, avatar_url),
                github_id = COALESCE(?, github_id),
                google_id = COALESCE(?, google_id),
                is_email_verified = COALESCE(?, is_email_verified),
                updated_at = datetime('now')
            WHERE email = ?
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.avatar_url)
        .bind(&patch.github_id)
        .bind(&patch.google_id)
        .bind(verified)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_email(email).await
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }
}
