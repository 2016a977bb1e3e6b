//! User identity and role semantics.
//!
//! A user is created at registration and carries one of three closed roles.
//! Patients additionally own an opaque medical-history document that the
//! prediagnosis pipeline feeds to the external generator.

use crate::db::Database;
use crate::error::{TriageError, TriageResult};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type UserId = i64;

/// Closed set of principal roles.
///
/// Role-based dispatch throughout the core is an exhaustive match over this
/// enum, so adding a role is a compile-time-checked change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Doctor => "doctor",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown user role: {0}")]
pub struct UnknownRole(String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "admin" => Ok(UserRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A registered user.
///
/// The password hash is deliberately not part of this record; it is only
/// surfaced by [`UserStore::get_by_email_with_credentials`] for the login
/// flow.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Opaque structured document; the core stores and forwards it without
    /// interpreting anything beyond the optional `age` field.
    pub medical_history: Option<serde_json::Value>,
}

/// Input for user creation.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub medical_history: Option<serde_json::Value>,
}

/// User record operations over the database handle.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new user, rejecting duplicate email addresses.
    pub fn create(&self, new_user: NewUser) -> TriageResult<User> {
        let existing = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM users WHERE email = ?1",
                params![new_user.email],
                |_| Ok(()),
            )
            .optional()
        })?;
        if existing.is_some() {
            return Err(TriageError::AlreadyExists(format!(
                "email {}",
                new_user.email
            )));
        }

        let history_json = medical_history_to_json(new_user.medical_history.as_ref())?;
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, password_hash, role, medical_history)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new_user.name,
                    new_user.email,
                    new_user.password_hash,
                    new_user.role.as_str(),
                    history_json,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        self.get(id)
    }

    /// Fetch a user by id.
    pub fn get(&self, id: UserId) -> TriageResult<User> {
        let user = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, role, medical_history FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
        })?;
        user.ok_or(TriageError::NotFound("user"))
    }

    /// Fetch a user by email, or `None` if no such account exists.
    pub fn get_by_email(&self, email: &str) -> TriageResult<Option<User>> {
        let user = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, role, medical_history FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()
        })?;
        Ok(user)
    }

    /// Fetch a user together with their stored password hash, for the login
    /// flow only.
    pub fn get_by_email_with_credentials(
        &self,
        email: &str,
    ) -> TriageResult<Option<(User, String)>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, role, medical_history, password_hash
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    let user = user_from_row(row)?;
                    let hash: String = row.get(5)?;
                    Ok((user, hash))
                },
            )
            .optional()
        })?;
        Ok(row)
    }

    /// Replace a user's medical-history document.
    pub fn update_medical_history(
        &self,
        id: UserId,
        medical_history: serde_json::Value,
    ) -> TriageResult<User> {
        let history_json = medical_history_to_json(Some(&medical_history))?;
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET medical_history = ?1 WHERE id = ?2",
                params![history_json, id],
            )
        })?;
        if updated == 0 {
            return Err(TriageError::NotFound("user"));
        }
        self.get(id)
    }
}

fn medical_history_to_json(
    medical_history: Option<&serde_json::Value>,
) -> TriageResult<Option<String>> {
    medical_history
        .map(|doc| {
            serde_json::to_string(doc)
                .map_err(|e| TriageError::InvalidInput(format!("medical history: {e}")))
        })
        .transpose()
}

fn user_from_row(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    let role_raw: String = row.get(3)?;
    let role = UserRole::from_str(&role_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let history_raw: Option<String> = row.get(4)?;
    let medical_history = history_raw
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role,
        medical_history,
    })
}
