//! Conversation store.
//!
//! Owns the `Conversation`, `Message` and `Prediagnosis` entities and their
//! relationships. Operations here are atomic storage primitives with no
//! policy awareness — the triage layer composes them with the access policy
//! engine. Every "get by id" on a nonexistent id reports not-found rather
//! than returning a placeholder, so callers must branch explicitly.

use crate::db::{self, Database};
use crate::error::{TriageError, TriageResult};
use crate::generator::PrediagnosisDraft;
use crate::identity::UserId;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub type ConversationId = Uuid;

// ============================================================================
// ENTITIES
// ============================================================================

/// The unit of triage interaction between one patient and at most one
/// assigned doctor.
#[derive(Clone, Debug, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Immutable owner.
    pub patient_id: UserId,
    /// Mutable assignment; `None` until a doctor is assigned.
    pub doctor_id: Option<UserId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Bumped by every message append and doctor (re)assignment.
    pub updated_at: DateTime<Utc>,
}

/// Author role of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown message role: {0}")]
pub struct UnknownMessageRole(String);

impl FromStr for MessageRole {
    type Err = UnknownMessageRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(UnknownMessageRole(other.to_string())),
        }
    }
}

/// A single immutable message within a conversation.
#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A structured triage suggestion attached to a conversation.
///
/// Immutable once created; a conversation may accumulate several over time
/// and "the" prediagnosis is the most recently created one.
#[derive(Clone, Debug, Serialize)]
pub struct Prediagnosis {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub patient_id: UserId,
    /// The reviewing doctor, if one was assigned when the record was
    /// created. `None` marks an AI-produced record pending human review.
    pub doctor_id: Option<UserId>,
    pub potential_diseases: String,
    pub course_of_action: String,
    pub support_messages: String,
    pub recommended_practitioners: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// STORE
// ============================================================================

/// Atomic operations over conversations and their dependents.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new conversation owned by `patient_id`.
    pub fn create(
        &self,
        patient_id: UserId,
        title: fastaid_types::NonEmptyText,
    ) -> TriageResult<Conversation> {
        let id = Uuid::new_v4();
        let now = db::now();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, patient_id, doctor_id, title, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?4)",
                params![
                    id.to_string(),
                    patient_id,
                    title.as_str(),
                    db::format_timestamp(&now),
                ],
            )
        })?;

        Ok(Conversation {
            id,
            patient_id,
            doctor_id: None,
            title: title.into_inner(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a conversation by id.
    pub fn get(&self, id: ConversationId) -> TriageResult<Conversation> {
        let conversation = self.db.with_conn(|conn| get_conversation(conn, id))?;
        conversation.ok_or(TriageError::NotFound("conversation"))
    }

    /// List a patient's conversations, most recently updated first.
    pub fn list_for_patient(
        &self,
        patient_id: UserId,
        limit: usize,
    ) -> TriageResult<Vec<Conversation>> {
        let conversations = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, patient_id, doctor_id, title, created_at, updated_at
                 FROM conversations WHERE patient_id = ?1
                 ORDER BY updated_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![patient_id, limit as i64], conversation_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(conversations)
    }

    /// Set the assigned doctor and bump `updated_at`.
    ///
    /// Does not itself check the doctor-role constraint — that is composed
    /// by the triage layer before this is called.
    pub fn assign_doctor(
        &self,
        id: ConversationId,
        doctor_id: UserId,
    ) -> TriageResult<Conversation> {
        self.set_doctor(id, Some(doctor_id))
    }

    /// Clear the assigned doctor and bump `updated_at`.
    pub fn remove_doctor(&self, id: ConversationId) -> TriageResult<Conversation> {
        self.set_doctor(id, None)
    }

    fn set_doctor(
        &self,
        id: ConversationId,
        doctor_id: Option<UserId>,
    ) -> TriageResult<Conversation> {
        let now = db::now();
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET doctor_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![doctor_id, db::format_timestamp(&now), id.to_string()],
            )
        })?;
        if updated == 0 {
            return Err(TriageError::NotFound("conversation"));
        }
        self.get(id)
    }

    /// Replace the conversation title and bump `updated_at`.
    pub fn update_title(
        &self,
        id: ConversationId,
        title: fastaid_types::NonEmptyText,
    ) -> TriageResult<Conversation> {
        let now = db::now();
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title.as_str(), db::format_timestamp(&now), id.to_string()],
            )
        })?;
        if updated == 0 {
            return Err(TriageError::NotFound("conversation"));
        }
        self.get(id)
    }

    /// Bump `updated_at` without touching any other column.
    ///
    /// Used when a dependent record is attached outside a message append,
    /// so the conversation surfaces at the top of recency-ordered listings.
    pub(crate) fn touch(&self, id: ConversationId) -> TriageResult<()> {
        let now = db::now();
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![db::format_timestamp(&now), id.to_string()],
            )
        })?;
        if updated == 0 {
            return Err(TriageError::NotFound("conversation"));
        }
        Ok(())
    }

    /// Append a message and bump the parent's `updated_at` in one
    /// transaction, so a reader never observes one without the other.
    pub fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        role: MessageRole,
        content: fastaid_types::NonEmptyText,
    ) -> TriageResult<Message> {
        let now = db::now();
        let message = self.db.with_tx(|tx| {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1",
                    params![conversation_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    conversation_id.to_string(),
                    sender_id,
                    role.as_str(),
                    content.as_str(),
                    db::format_timestamp(&now),
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![db::format_timestamp(&now), conversation_id.to_string()],
            )?;

            Ok(Some(id))
        })?;

        let id = message.ok_or(TriageError::NotFound("conversation"))?;
        Ok(Message {
            id,
            conversation_id,
            sender_id,
            role,
            content: content.into_inner(),
            created_at: now,
        })
    }

    /// List a conversation's messages in creation (append) order.
    pub fn list_messages(
        &self,
        conversation_id: ConversationId,
        limit: Option<usize>,
    ) -> TriageResult<Vec<Message>> {
        self.ensure_exists(conversation_id)?;
        let messages = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY id ASC LIMIT ?2",
            )?;
            let limit = limit.map(|l| l as i64).unwrap_or(-1);
            let rows = stmt.query_map(params![conversation_id.to_string(), limit], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(messages)
    }

    /// Record a prediagnosis against an existing conversation.
    ///
    /// Pure append: the parent conversation is only checked for existence,
    /// not mutated.
    pub fn record_prediagnosis(
        &self,
        conversation_id: ConversationId,
        patient_id: UserId,
        doctor_id: Option<UserId>,
        draft: &PrediagnosisDraft,
    ) -> TriageResult<Prediagnosis> {
        self.ensure_exists(conversation_id)?;
        let now = db::now();
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO prediagnoses (conversation_id, patient_id, doctor_id,
                     potential_diseases, course_of_action, support_messages,
                     recommended_practitioners, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    conversation_id.to_string(),
                    patient_id,
                    doctor_id,
                    draft.potential_diseases,
                    draft.course_of_action,
                    draft.support_messages,
                    draft.recommended_practitioners,
                    db::format_timestamp(&now),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Prediagnosis {
            id,
            conversation_id,
            patient_id,
            doctor_id,
            potential_diseases: draft.potential_diseases.clone(),
            course_of_action: draft.course_of_action.clone(),
            support_messages: draft.support_messages.clone(),
            recommended_practitioners: draft.recommended_practitioners.clone(),
            created_at: now,
        })
    }

    /// The most recently created prediagnosis for a conversation.
    pub fn latest_prediagnosis(
        &self,
        conversation_id: ConversationId,
    ) -> TriageResult<Prediagnosis> {
        self.ensure_exists(conversation_id)?;
        let prediagnosis = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, conversation_id, patient_id, doctor_id, potential_diseases,
                        course_of_action, support_messages, recommended_practitioners, created_at
                 FROM prediagnoses WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![conversation_id.to_string()],
                prediagnosis_from_row,
            )
            .optional()
        })?;
        prediagnosis.ok_or(TriageError::NotFound("prediagnosis"))
    }

    /// All prediagnoses for a conversation, newest first.
    pub fn list_prediagnoses(
        &self,
        conversation_id: ConversationId,
    ) -> TriageResult<Vec<Prediagnosis>> {
        self.ensure_exists(conversation_id)?;
        let prediagnoses = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, patient_id, doctor_id, potential_diseases,
                        course_of_action, support_messages, recommended_practitioners, created_at
                 FROM prediagnoses WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![conversation_id.to_string()], prediagnosis_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(prediagnoses)
    }

    /// All prediagnoses recorded for a patient across conversations, newest
    /// first.
    pub fn list_prediagnoses_for_patient(
        &self,
        patient_id: UserId,
        limit: usize,
    ) -> TriageResult<Vec<Prediagnosis>> {
        let prediagnoses = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, patient_id, doctor_id, potential_diseases,
                        course_of_action, support_messages, recommended_practitioners, created_at
                 FROM prediagnoses WHERE patient_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![patient_id, limit as i64], prediagnosis_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(prediagnoses)
    }

    fn ensure_exists(&self, id: ConversationId) -> TriageResult<()> {
        let exists = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(()),
            )
            .optional()
        })?;
        exists.ok_or(TriageError::NotFound("conversation")).map(|_| ())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn get_conversation(
    conn: &Connection,
    id: ConversationId,
) -> Result<Option<Conversation>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, patient_id, doctor_id, title, created_at, updated_at
         FROM conversations WHERE id = ?1",
        params![id.to_string()],
        conversation_from_row,
    )
    .optional()
}

fn conversation_from_row(row: &Row<'_>) -> Result<Conversation, rusqlite::Error> {
    let id_raw: String = row.get(0)?;
    let created_raw: String = row.get(4)?;
    let updated_raw: String = row.get(5)?;
    Ok(Conversation {
        id: db::parse_uuid(0, &id_raw)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        title: row.get(3)?,
        created_at: db::parse_timestamp(4, &created_raw)?,
        updated_at: db::parse_timestamp(5, &updated_raw)?,
    })
}

fn message_from_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let conversation_raw: String = row.get(1)?;
    let role_raw: String = row.get(3)?;
    let created_raw: String = row.get(5)?;
    let role = MessageRole::from_str(&role_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: db::parse_uuid(1, &conversation_raw)?,
        sender_id: row.get(2)?,
        role,
        content: row.get(4)?,
        created_at: db::parse_timestamp(5, &created_raw)?,
    })
}

fn prediagnosis_from_row(row: &Row<'_>) -> Result<Prediagnosis, rusqlite::Error> {
    let conversation_raw: String = row.get(1)?;
    let created_raw: String = row.get(8)?;
    Ok(Prediagnosis {
        id: row.get(0)?,
        conversation_id: db::parse_uuid(1, &conversation_raw)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        potential_diseases: row.get(4)?,
        course_of_action: row.get(5)?,
        support_messages: row.get(6)?,
        recommended_practitioners: row.get(7)?,
        created_at: db::parse_timestamp(8, &created_raw)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
