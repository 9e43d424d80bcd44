use std::time::Duration;

use sqlx::{FromRow, PgPool};
use time::{Duration as TimeDuration, OffsetDateTime};
use uuid::Uuid;

/// Stored refresh token. The table is what gives logout its meaning: a
/// revoked token no longer refreshes, whatever its JWT expiry says.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl RefreshToken {
    pub async fn store(
        db: &PgPool,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let expires_at =
            OffsetDateTime::now_utc() + TimeDuration::seconds(ttl.as_secs() as i64);
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find(db: &PgPool, token: &str) -> anyhow::Result<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT token, user_id, expires_at, created_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn revoke(db: &PgPool, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Drops every stored token for the user; logout in one statement.
    pub async fn revoke_all(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired(db: &PgPool) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < now()")
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
