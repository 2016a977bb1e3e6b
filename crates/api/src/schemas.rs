//! Request and response bodies for the REST boundary.

use chrono::{DateTime, Utc};
use fastaid_core::{Conversation, ConversationDetail, Message, Prediagnosis, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// patient, doctor or admin; defaults to patient.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    #[schema(value_type = Option<Object>)]
    pub medical_history: Option<serde_json::Value>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.as_str().to_string(),
            medical_history: user.medical_history,
        }
    }
}

// ============================================================================
// CONVERSATIONS
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConversationCreateRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            patient_id: conversation.patient_id,
            doctor_id: conversation.doctor_id,
            title: conversation.title,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationDetailResponse {
    pub id: Uuid,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<MessageResponse>,
    pub pre_diagnoses: Vec<PrediagnosisResponse>,
}

impl From<ConversationDetail> for ConversationDetailResponse {
    fn from(detail: ConversationDetail) -> Self {
        Self {
            id: detail.conversation.id,
            patient_id: detail.conversation.patient_id,
            doctor_id: detail.conversation.doctor_id,
            title: detail.conversation.title,
            created_at: detail.conversation.created_at,
            updated_at: detail.conversation.updated_at,
            messages: detail.messages.into_iter().map(Into::into).collect(),
            pre_diagnoses: detail.prediagnoses.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DoctorAssignmentRequest {
    pub doctor_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TitleUpdateRequest {
    pub title: String,
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageCreateRequest {
    pub content: String,
    /// user, assistant or system; defaults to user.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            role: message.role.as_str().to_string(),
            content: message.content,
            created_at: message.created_at,
        }
    }
}

// ============================================================================
// PREDIAGNOSIS
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct PrediagnosisCreateRequest {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrediagnosisResponse {
    pub id: i64,
    pub conversation_id: Uuid,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub potential_diseases: String,
    pub course_of_action: String,
    pub support_messages: String,
    pub recommended_practitioners: String,
    pub created_at: DateTime<Utc>,
}

impl From<Prediagnosis> for PrediagnosisResponse {
    fn from(prediagnosis: Prediagnosis) -> Self {
        Self {
            id: prediagnosis.id,
            conversation_id: prediagnosis.conversation_id,
            patient_id: prediagnosis.patient_id,
            doctor_id: prediagnosis.doctor_id,
            potential_diseases: prediagnosis.potential_diseases,
            course_of_action: prediagnosis.course_of_action,
            support_messages: prediagnosis.support_messages,
            recommended_practitioners: prediagnosis.recommended_practitioners,
            created_at: prediagnosis.created_at,
        }
    }
}

// ============================================================================
// MISC
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Optional `limit` query parameter shared by listing endpoints.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListParams {
    pub limit: Option<usize>,
}
