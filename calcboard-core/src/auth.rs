//! Accounts and bearer tokens
//!
//! Registration validates the payload and stores a salted, iterated SHA-256
//! digest of the password. Login issues an opaque access token and a refresh
//! token; only their SHA-256 hashes are persisted. [`resolve_caller`] turns a
//! presented access token into the owning [`User`], which every calculation
//! and statistics operation is then scoped by.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{AuthToken, NewUser, PasswordHash, TokenKind, User};

/// Digest rounds applied to each password.
pub const PASSWORD_ROUNDS: u32 = 10_000;

const LOGIN_FAILED: &str = "invalid username or password";

/// Tokens handed back after login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

/// Successful login: the token pair plus the account it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
}

impl LoginResult {
    fn new(tokens: TokenPair, user: User) -> Self {
        Self {
            tokens,
            user_id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            is_verified: user.is_verified,
        }
    }
}

// ============================================
// Passwords and tokens
// ============================================

/// Hex digest of `password` under `salt`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..PASSWORD_ROUNDS {
        digest = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(digest)
            .finalize();
    }
    hex::encode(digest)
}

/// Hash `password` under a fresh random salt.
pub fn new_password_hash(password: &str) -> PasswordHash {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = hash_password(password, &salt);
    PasswordHash { salt, digest }
}

/// Check `password` against a stored digest.
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    let candidate = hash_password(password, &stored.salt);
    constant_time_eq(candidate.as_bytes(), stored.digest.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A fresh opaque bearer token.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Storage key for a bearer token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ============================================
// Registration
// ============================================

fn validate_registration(new_user: &NewUser) -> Result<()> {
    let username = new_user.username.trim();
    if !(3..=50).contains(&username.chars().count()) {
        return Err(Error::Validation(
            "username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(Error::Validation(
            "username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }

    if !is_valid_email(new_user.email.trim()) {
        return Err(Error::Validation("invalid email address".to_string()));
    }

    if new_user.first_name.trim().is_empty() || new_user.last_name.trim().is_empty() {
        return Err(Error::Validation(
            "first and last name are required".to_string(),
        ));
    }

    let password = &new_user.password;
    if password.chars().count() < 8 {
        return Err(Error::Validation(
            "password must be at least 8 characters long".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(Error::Validation(
            "password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(Error::Validation(
            "password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(
            "password must contain at least one digit".to_string(),
        ));
    }
    if new_user.password != new_user.confirm_password {
        return Err(Error::Validation("passwords do not match".to_string()));
    }

    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Create a new account.
pub fn register(db: &Database, new_user: &NewUser) -> Result<User> {
    validate_registration(new_user)?;

    let username = new_user.username.trim();
    let email = new_user.email.trim();
    if db.username_taken(username)? || db.email_taken(email)? {
        return Err(Error::Conflict("username or email already exists".to_string()));
    }

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: email.to_string(),
        first_name: new_user.first_name.trim().to_string(),
        last_name: new_user.last_name.trim().to_string(),
        is_active: true,
        is_verified: false,
        created_at: now,
        updated_at: now,
        last_login: None,
    };
    db.insert_user(&user, &new_password_hash(&new_user.password))?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

// ============================================
// Sessions
// ============================================

fn issue_pair(db: &Database, config: &AuthConfig, user_id: &str) -> Result<TokenPair> {
    let now = Utc::now();
    let access_token = generate_token();
    let refresh_token = generate_token();
    let lifetime = |d: Option<Duration>| {
        d.and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| Error::Config("token lifetime out of range".to_string()))
    };
    let expires_at = lifetime(Duration::try_minutes(config.access_token_minutes))?;
    let refresh_expires_at = lifetime(Duration::try_days(config.refresh_token_days))?;

    db.insert_token(&AuthToken {
        token_hash: hash_token(&access_token),
        user_id: user_id.to_string(),
        kind: TokenKind::Access,
        created_at: now,
        expires_at,
    })?;
    db.insert_token(&AuthToken {
        token_hash: hash_token(&refresh_token),
        user_id: user_id.to_string(),
        kind: TokenKind::Refresh,
        created_at: now,
        expires_at: refresh_expires_at,
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "bearer",
        expires_at,
    })
}

/// Authenticate by username or email and issue a token pair.
///
/// Unknown accounts, wrong passwords and inactive accounts all fail the same way.
pub fn login(
    db: &Database,
    config: &AuthConfig,
    identifier: &str,
    password: &str,
) -> Result<LoginResult> {
    let Some((mut user, stored)) = db.find_credentials(identifier.trim())? else {
        tracing::debug!("Login for unknown account");
        return Err(Error::AuthFailure(LOGIN_FAILED.to_string()));
    };

    if !user.is_active || !verify_password(password, &stored) {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(Error::AuthFailure(LOGIN_FAILED.to_string()));
    }

    let now = Utc::now();
    db.record_login(&user.id, now)?;
    db.purge_expired_tokens(now)?;
    user.last_login = Some(now);
    user.updated_at = now;

    let tokens = issue_pair(db, config, &user.id)?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(LoginResult::new(tokens, user))
}

fn load_token(db: &Database, token: &str, kind: TokenKind) -> Result<AuthToken> {
    let invalid = || Error::AuthFailure("could not validate credentials".to_string());

    let stored = db.get_token(&hash_token(token))?.ok_or_else(invalid)?;
    if stored.kind != kind || stored.is_expired(Utc::now()) {
        return Err(invalid());
    }
    Ok(stored)
}

fn active_user(db: &Database, user_id: &str) -> Result<User> {
    match db.get_user(user_id)? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(Error::AuthFailure("could not validate credentials".to_string())),
    }
}

/// Resolve a presented access token to its active owner.
pub fn resolve_caller(db: &Database, access_token: &str) -> Result<User> {
    let stored = load_token(db, access_token, TokenKind::Access)?;
    active_user(db, &stored.user_id)
}

/// Exchange a refresh token for a new pair. The old refresh token is revoked.
pub fn refresh(db: &Database, config: &AuthConfig, refresh_token: &str) -> Result<TokenPair> {
    let stored = load_token(db, refresh_token, TokenKind::Refresh)?;
    rotate(db, config, &stored)
}

/// Consume `stored` and issue a new pair. Only the caller that deletes the
/// refresh token gets new tokens.
fn rotate(db: &Database, config: &AuthConfig, stored: &AuthToken) -> Result<TokenPair> {
    let user = active_user(db, &stored.user_id)?;

    if !db.delete_token(&stored.token_hash)? {
        tracing::warn!(user_id = %user.id, "Refresh token already consumed");
        return Err(Error::AuthFailure(
            "could not validate credentials".to_string(),
        ));
    }
    let tokens = issue_pair(db, config, &user.id)?;

    tracing::info!(user_id = %user.id, "Tokens refreshed");
    Ok(tokens)
}

/// Revoke a token. Unknown tokens are ignored.
pub fn logout(db: &Database, token: &str) -> Result<()> {
    if db.delete_token(&hash_token(token))? {
        tracing::info!("Token revoked");
    }
    Ok(())
}
