use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{ListUsersParams, UpdateUserRequest};

/// User record as stored. `password` (hash) and `salt` serialize on purpose:
/// every outbound representation goes through `sanitize_response`, which is
/// the boundary that strips them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub salt: String,
    pub bio: Option<String>,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

const USER_COLUMNS: &str =
    "id, name, username, email, password, salt, bio, email_verified, created_at, updated_at";

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
        salt: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, username, email, password, salt)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(username)
        .bind(email)
        .bind(password)
        .bind(salt)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Partial profile update; absent fields keep their stored value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &UpdateUserRequest,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                username = COALESCE($3, username),
                email = COALESCE($4, email),
                bio = COALESCE($5, bio),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.username.as_deref())
        .bind(update.email.as_deref())
        .bind(update.bio.as_deref())
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Replaces hash and salt together in one statement; the pair is never
    /// updated partially.
    pub async fn update_credentials(
        db: &PgPool,
        id: Uuid,
        password: &str,
        salt: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password = $2, salt = $3, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password)
            .bind(salt)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn search(db: &PgPool, params: &ListUsersParams) -> anyhow::Result<Vec<User>> {
        let pattern = params
            .search
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE $1::text IS NULL
               OR name ILIKE $1 OR username ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Loads a user together with its relations as a JSON value, ready for
    /// sanitization. Relations are attached as nested arrays.
    pub async fn find_with_relations(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Value>> {
        let Some(user) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };

        let addresses = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, street, city, country, postal_code, created_at
            FROM addresses
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(db)
        .await?;

        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name ASC
            "#,
        )
        .bind(id)
        .fetch_all(db)
        .await?;

        let mut value = serde_json::to_value(&user)?;
        value["addresses"] = serde_json::to_value(addresses)?;
        value["roles"] = serde_json::to_value(roles)?;
        Ok(Some(value))
    }
}
