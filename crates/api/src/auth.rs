//! Credential resolution and account management.
//!
//! The core never parses or validates a credential; this module owns the
//! whole lifecycle. Passwords are hashed with PBKDF2, and a successful login
//! issues an opaque random session token persisted with an expiry. Resolving
//! a principal is therefore a storage lookup, not a decode.

use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use fastaid_core::constants::SESSION_TTL_HOURS;
use fastaid_core::{
    Database, NewUser, Principal, TriageError, TriageResult, User, UserRole, UserStore,
};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::RngCore;
use rusqlite::{params, OptionalExtension};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// Number of random bytes in a session token.
const TOKEN_BYTES: usize = 32;

/// Hash a plain password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a plain password against its stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Pbkdf2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Register a new account, hashing the password.
pub fn register_user(
    users: &UserStore,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<User, ApiError> {
    if name.trim().is_empty() {
        return Err(TriageError::InvalidInput("name is required".to_string()).into());
    }
    if email.trim().is_empty() || !email.contains('@') {
        return Err(TriageError::InvalidInput("a valid email is required".to_string()).into());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(TriageError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ))
        .into());
    }

    let password_hash = hash_password(password)?;
    let user = users.create(NewUser {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        password_hash,
        role,
        medical_history: None,
    })?;
    Ok(user)
}

/// Session-token issue and lookup over the shared database handle.
#[derive(Clone)]
pub struct SessionService {
    db: Database,
    users: UserStore,
}

impl SessionService {
    pub fn new(db: Database) -> Self {
        let users = UserStore::new(db.clone());
        Self { db, users }
    }

    /// Authenticate with email and password; on success issue a session
    /// token. Returns `None` for a wrong email or password — the two cases
    /// are indistinguishable to the caller.
    pub fn login(&self, email: &str, password: &str) -> Result<Option<(String, User)>, ApiError> {
        let Some((user, stored_hash)) = self.users.get_by_email_with_credentials(email)? else {
            return Ok(None);
        };
        if !verify_password(password, &stored_hash) {
            return Ok(None);
        }

        let token = self.issue(user.id)?;
        Ok(Some((token, user)))
    }

    /// Resolve an opaque token to its user, or `None` when the token is
    /// unknown or expired.
    pub fn resolve(&self, token: &str) -> TriageResult<Option<User>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    let user_id: i64 = row.get(0)?;
                    let expires_at: String = row.get(1)?;
                    Ok((user_id, expires_at))
                },
            )
            .optional()
        })?;

        let Some((user_id, expires_raw)) = row else {
            return Ok(None);
        };

        let expired = DateTime::parse_from_rfc3339(&expires_raw)
            .map(|ts| ts.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            self.db.with_conn(|conn| {
                conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            })?;
            return Ok(None);
        }

        match self.users.get(user_id) {
            Ok(user) => Ok(Some(user)),
            Err(TriageError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn issue(&self, user_id: i64) -> TriageResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now.to_rfc3339(), expires_at.to_rfc3339()],
            )
        })?;
        Ok(token)
    }
}

/// Extractor that resolves the bearer token into the requesting user.
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal::new(self.0.id, self.0.role)
    }
}

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;

        let user = state
            .sessions
            .resolve(token)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser(user))
    }
}
