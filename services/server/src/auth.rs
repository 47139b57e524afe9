//! Authentication collaborator: password hashing and bearer-token
//! minting/verification (spec.md §1, explicitly out of core scope — the
//! core calls through this module's interface only).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::Store;

const TOKEN_TTL_DAYS: i64 = 30;

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing is infallible for valid input")
        .to_string()
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Decodes a base64 `user:pass` pair (the `login`/`acc` `secret` field for
/// the `basic` scheme).
pub fn decode_basic_secret(secret_b64: &str) -> Option<(String, String)> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(secret_b64)
        .ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_owned(), pass.to_owned()))
}

fn sha256_hex(raw: &str) -> Vec<u8> {
    Sha256::digest(raw.as_bytes()).to_vec()
}

/// Mints a fresh bearer token, persists its hash via the Store, and returns
/// the raw token (given to the client) and its expiry.
pub async fn mint_token(
    store: &dyn Store,
    user_id: Uuid,
) -> Result<(String, chrono::DateTime<Utc>), crate::store::StoreError> {
    let mut raw_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw_bytes);
    let raw_token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw_bytes);
    let expires_at = Utc::now() + Duration::days(TOKEN_TTL_DAYS);
    store
        .create_auth_token(user_id, &sha256_hex(&raw_token), expires_at)
        .await?;
    Ok((raw_token, expires_at))
}

pub async fn validate_token(store: &dyn Store, raw_token: &str) -> Option<Uuid> {
    store.validate_token(&sha256_hex(raw_token)).await.ok()?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn basic_secret_decodes_user_and_pass() {
        let secret = base64::engine::general_purpose::STANDARD.encode("alice:hunter2");
        let (user, pass) = decode_basic_secret(&secret).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn basic_secret_rejects_malformed_base64() {
        assert!(decode_basic_secret("not base64!!").is_none());
    }
}
