use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::sanitize::sanitize_response;
use super::dto::UpdatePasswordRequest;
use super::error::UserError;
use super::repo::User;

/// Fresh random salt, stored next to the hash and reused for verification.
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).as_str().to_owned()
}

/// Argon2 hash of `plain` under an explicit salt. The same (password, salt)
/// pair always produces the same PHC string.
pub fn hash_with_salt(plain: &str, salt: &str) -> anyhow::Result<String> {
    let salt = SaltString::from_b64(salt).map_err(|e| {
        error!(error = %e, "invalid salt string");
        anyhow::anyhow!(e.to_string())
    })?;
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Recomputes the hash for `plain` under `salt` and compares it byte for
/// byte with the stored hash.
pub fn verify(plain: &str, salt: &str, stored_hash: &str) -> anyhow::Result<bool> {
    Ok(hash_with_salt(plain, salt)? == stored_hash)
}

/// Rotates a user's password. The record must exist, the old password must
/// verify against the stored hash+salt, and the new password must differ
/// from the old one; only then are hash and salt replaced, together, in one
/// update. Returns the sanitized record re-fetched with its relations.
pub async fn change_password(
    db: &PgPool,
    user_id: Uuid,
    request: &UpdatePasswordRequest,
) -> Result<Value, UserError> {
    let user = User::find_by_id(db, user_id)
        .await
        .map_err(UserError::internal)?
        .ok_or_else(|| UserError::NotFound("User not found".into()))?;

    validate_rotation(
        &request.old_password,
        &request.new_password,
        &user.salt,
        &user.password,
    )?;

    let salt = generate_salt();
    let hash = hash_with_salt(&request.new_password, &salt).map_err(UserError::internal)?;
    User::update_credentials(db, user_id, &hash, &salt)
        .await
        .map_err(UserError::internal)?;
    debug!(user_id = %user_id, "credentials rotated");

    let updated = User::find_with_relations(db, user_id)
        .await
        .map_err(UserError::internal)?
        .ok_or_else(|| UserError::NotFound("User not found".into()))?;
    Ok(sanitize_response(&updated))
}

fn validate_rotation(
    old_password: &str,
    new_password: &str,
    salt: &str,
    stored_hash: &str,
) -> Result<(), UserError> {
    if !verify(old_password, salt, stored_hash).map_err(UserError::internal)? {
        return Err(UserError::Validation("Wrong old/current password.".into()));
    }
    if new_password == old_password {
        return Err(UserError::Validation(
            "New Password can not be the same as the old password.".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_a_fixed_salt() {
        let salt = generate_salt();
        let a = hash_with_salt("hunter2hunter2", &salt).expect("hash");
        let b = hash_with_salt("hunter2hunter2", &salt).expect("hash");
        assert_eq!(a, b);
    }

    #[test]
    fn verify_accepts_the_original_password() {
        let salt = generate_salt();
        let hash = hash_with_salt("correct-horse-battery-staple", &salt).expect("hash");
        assert!(verify("correct-horse-battery-staple", &salt, &hash).expect("verify"));
    }

    #[test]
    fn verify_rejects_a_wrong_password() {
        let salt = generate_salt();
        let hash = hash_with_salt("correct-horse-battery-staple", &salt).expect("hash");
        assert!(!verify("wrong-password", &salt, &hash).expect("verify"));
    }

    #[test]
    fn verify_errors_on_malformed_salt() {
        let err = verify("anything", "not a valid salt!", "whatever").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn rotation_invalidates_the_old_password() {
        let old_salt = generate_salt();
        let old_hash = hash_with_salt("old-password", &old_salt).expect("hash");

        let new_salt = generate_salt();
        let new_hash = hash_with_salt("new-password", &new_salt).expect("hash");

        assert_ne!(old_salt, new_salt);
        assert!(verify("new-password", &new_salt, &new_hash).expect("verify"));
        assert!(!verify("old-password", &new_salt, &new_hash).expect("verify"));
        // the old pair still verifies the old password; the record replaces both at once
        assert!(verify("old-password", &old_salt, &old_hash).expect("verify"));
    }

    #[test]
    fn rejects_wrong_old_password() {
        let salt = generate_salt();
        let hash = hash_with_salt("stored-password", &salt).expect("hash");
        let err = validate_rotation("guess", "brand-new", &salt, &hash).unwrap_err();
        match err {
            UserError::Validation(message) => {
                assert_eq!(message, "Wrong old/current password.")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_new_password_equal_to_old() {
        let salt = generate_salt();
        let hash = hash_with_salt("stored-password", &salt).expect("hash");
        let err = validate_rotation("stored-password", "stored-password", &salt, &hash)
            .unwrap_err();
        match err {
            UserError::Validation(message) => {
                assert_eq!(
                    message,
                    "New Password can not be the same as the old password."
                )
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_old_password_wins_over_new_equals_old() {
        // Both conditions hold, the wrong-password message is reported first.
        let salt = generate_salt();
        let hash = hash_with_salt("stored-password", &salt).expect("hash");
        let err = validate_rotation("guess", "guess", &salt, &hash).unwrap_err();
        match err {
            UserError::Validation(message) => {
                assert_eq!(message, "Wrong old/current password.")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_valid_rotation() {
        let salt = generate_salt();
        let hash = hash_with_salt("stored-password", &salt).expect("hash");
        assert!(validate_rotation("stored-password", "brand-new", &salt, &hash).is_ok());
    }
}
