//! REST handlers.
//!
//! Handlers stay thin: decode the request, resolve the principal, call one
//! use-case method on the core, encode the result. All policy lives behind
//! the `TriageService` boundary.

use crate::auth::{self, AuthUser};
use crate::error::{ApiError, ErrorBody};
use crate::schemas::*;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use fastaid_core::{MessageRole, PrediagnosisRequest, TriageError, UserRole};
use fastaid_types::NonEmptyText;
use std::str::FromStr;
use uuid::Uuid;

fn parse_user_role(role: Option<&str>) -> Result<UserRole, ApiError> {
    match role {
        None => Ok(UserRole::Patient),
        Some(raw) => UserRole::from_str(raw)
            .map_err(|e| ApiError::Core(TriageError::InvalidInput(e.to_string()))),
    }
}

fn parse_message_role(role: Option<&str>) -> Result<MessageRole, ApiError> {
    match role {
        None => Ok(MessageRole::User),
        Some(raw) => MessageRole::from_str(raw)
            .map_err(|e| ApiError::Core(TriageError::InvalidInput(e.to_string()))),
    }
}

fn non_empty(text: &str, what: &str) -> Result<NonEmptyText, ApiError> {
    NonEmptyText::new(text)
        .map_err(|_| ApiError::Core(TriageError::InvalidInput(format!("{what} must not be empty"))))
}

// ============================================================================
// HEALTH
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Health check response", body = HealthResponse)
    )
)]
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "Fastaid API".to_string(),
    })
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered user", body = UserResponse),
        (status = 400, description = "Invalid registration data", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
/// Register a new user (patient, doctor or admin).
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role = parse_user_role(request.role.as_deref())?;
    let user = auth::register_user(
        &state.users,
        &request.name,
        &request.email,
        &request.password,
        role,
    )?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token and user", body = TokenResponse),
        (status = 401, description = "Incorrect email or password", body = ErrorBody)
    )
)]
/// Login and receive a bearer token for subsequent requests.
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (token, user) = state
        .sessions
        .login(&request.email, &request.password)?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorBody)
    )
)]
pub(crate) async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

// ============================================================================
// USERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User record", body = UserResponse),
        (status = 403, description = "Patients can only view their own profile", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub(crate) async fn user_get(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.triage.user_get(&auth_user.principal(), user_id)?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/medical-history",
    params(("user_id" = i64, Path, description = "User id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated user record", body = UserResponse),
        (status = 403, description = "Patients can only update their own history", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
/// Replace the user's medical-history document.
pub(crate) async fn medical_history_update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
    Json(medical_history): Json<serde_json::Value>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.triage.medical_history_update(
        &auth_user.principal(),
        user_id,
        medical_history,
    )?;
    Ok(Json(user.into()))
}

// ============================================================================
// CONVERSATIONS
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = ConversationCreateRequest,
    responses(
        (status = 200, description = "Created conversation", body = ConversationResponse),
        (status = 403, description = "Patient role required", body = ErrorBody)
    )
)]
/// Create a new conversation (patients only).
pub(crate) async fn conversation_create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ConversationCreateRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let title = request
        .title
        .as_deref()
        .map(|t| non_empty(t, "title"))
        .transpose()?;
    let conversation = state
        .triage
        .conversation_create(&auth_user.principal(), title)?;
    Ok(Json(conversation.into()))
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    params(ListParams),
    responses(
        (status = 200, description = "The principal's conversations, most recently updated first", body = [ConversationResponse])
    )
)]
pub(crate) async fn conversation_list(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let conversations = state
        .triage
        .conversation_list(&auth_user.principal(), params.limit)?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with messages and prediagnoses", body = ConversationDetailResponse),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
pub(crate) async fn conversation_get(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetailResponse>, ApiError> {
    let detail = state.triage.conversation_get(&auth_user.principal(), id)?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    put,
    path = "/api/conversations/{id}/assign-doctor",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = DoctorAssignmentRequest,
    responses(
        (status = 200, description = "Updated conversation", body = ConversationResponse),
        (status = 400, description = "Target is not a doctor", body = ErrorBody),
        (status = 403, description = "Only the owning patient or an admin may assign", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
/// Assign a doctor to a conversation (owning patient or admin).
pub(crate) async fn assign_doctor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<DoctorAssignmentRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation =
        state
            .triage
            .assign_doctor(&auth_user.principal(), id, request.doctor_id)?;
    Ok(Json(conversation.into()))
}

#[utoipa::path(
    delete,
    path = "/api/conversations/{id}/doctor",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Updated conversation", body = ConversationResponse),
        (status = 403, description = "Only the owning patient or an admin may unassign", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
pub(crate) async fn remove_doctor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation = state.triage.remove_doctor(&auth_user.principal(), id)?;
    Ok(Json(conversation.into()))
}

#[utoipa::path(
    put,
    path = "/api/conversations/{id}/title",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = TitleUpdateRequest,
    responses(
        (status = 200, description = "Updated conversation", body = ConversationResponse),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
pub(crate) async fn update_title(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TitleUpdateRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let title = non_empty(&request.title, "title")?;
    let conversation =
        state
            .triage
            .conversation_update_title(&auth_user.principal(), id, title)?;
    Ok(Json(conversation.into()))
}

// ============================================================================
// MESSAGES
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = MessageCreateRequest,
    responses(
        (status = 200, description = "Appended message", body = MessageResponse),
        (status = 400, description = "Empty content or unknown role", body = ErrorBody),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
/// Append a message to a conversation.
pub(crate) async fn message_create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<MessageCreateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let role = parse_message_role(request.role.as_deref())?;
    let content = non_empty(&request.content, "content")?;
    let message = state
        .triage
        .message_append(&auth_user.principal(), id, role, content)?;
    Ok(Json(message.into()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id"), ListParams),
    responses(
        (status = 200, description = "Messages in creation order", body = [MessageResponse]),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody)
    )
)]
pub(crate) async fn messages_list(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let messages = state
        .triage
        .messages_list(&auth_user.principal(), id, params.limit)?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

// ============================================================================
// PREDIAGNOSIS
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/prediagnosis",
    request_body = PrediagnosisCreateRequest,
    responses(
        (status = 200, description = "Generated prediagnosis", body = PrediagnosisResponse),
        (status = 400, description = "Empty symptom list", body = ErrorBody),
        (status = 403, description = "Patient role required, or conversation not owned", body = ErrorBody),
        (status = 404, description = "Conversation not found", body = ErrorBody),
        (status = 502, description = "Generation failed; retry with the same conversation id", body = ErrorBody)
    )
)]
/// Generate a prediagnosis with the reasoning service (patients only).
///
/// The remote call can take a while, so the orchestration runs on a
/// blocking worker rather than a runtime thread.
pub(crate) async fn prediagnosis_create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<PrediagnosisCreateRequest>,
) -> Result<Json<PrediagnosisResponse>, ApiError> {
    let principal = auth_user.principal();
    let symptoms = request
        .symptoms
        .iter()
        .map(|s| non_empty(s, "symptom"))
        .collect::<Result<Vec<_>, _>>()?;
    let core_request = PrediagnosisRequest {
        symptoms,
        duration: request.duration,
        age: request.age,
        conversation_id: request.conversation_id,
    };

    let triage = state.triage.clone();
    let prediagnosis =
        tokio::task::spawn_blocking(move || triage.prediagnosis_create(&principal, core_request))
            .await
            .map_err(|e| ApiError::Internal(format!("prediagnosis task failed: {e}")))??;
    Ok(Json(prediagnosis.into()))
}

#[utoipa::path(
    get,
    path = "/api/prediagnosis/my",
    params(ListParams),
    responses(
        (status = 200, description = "The patient's prediagnoses, newest first", body = [PrediagnosisResponse]),
        (status = 403, description = "Patient role required", body = ErrorBody)
    )
)]
pub(crate) async fn my_prediagnoses(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PrediagnosisResponse>>, ApiError> {
    let prediagnoses = state
        .triage
        .my_prediagnoses(&auth_user.principal(), params.limit)?;
    Ok(Json(prediagnoses.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}/prediagnosis",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "The most recent prediagnosis", body = PrediagnosisResponse),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 404, description = "Conversation or prediagnosis not found", body = ErrorBody)
    )
)]
pub(crate) async fn conversation_prediagnosis(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PrediagnosisResponse>, ApiError> {
    let prediagnosis = state
        .triage
        .prediagnosis_latest(&auth_user.principal(), id)?;
    Ok(Json(prediagnosis.into()))
}
