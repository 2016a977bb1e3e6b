//! # Fastaid API
//!
//! REST boundary for the Fastaid triage backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Credential resolution (session tokens) and password hashing
//! - OpenAPI/Swagger documentation
//! - Mapping the core failure taxonomy to HTTP statuses
//!
//! All triage semantics live in `fastaid-core`; handlers here only decode,
//! delegate and encode.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
mod handlers;
pub mod schemas;

use crate::auth::SessionService;
use axum::routing::{delete, get, post, put};
use axum::Router;
use fastaid_core::{CoreConfig, Database, ProposeGenerator, TriageService, UserStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub triage: TriageService,
    pub users: UserStore,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(
        cfg: Arc<CoreConfig>,
        db: Database,
        generator: Arc<dyn ProposeGenerator>,
    ) -> Self {
        Self {
            triage: TriageService::new(cfg, db.clone(), generator),
            users: UserStore::new(db.clone()),
            sessions: SessionService::new(db),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::register,
        handlers::login,
        handlers::me,
        handlers::user_get,
        handlers::medical_history_update,
        handlers::conversation_create,
        handlers::conversation_list,
        handlers::conversation_get,
        handlers::assign_doctor,
        handlers::remove_doctor,
        handlers::update_title,
        handlers::message_create,
        handlers::messages_list,
        handlers::prediagnosis_create,
        handlers::my_prediagnoses,
        handlers::conversation_prediagnosis,
    ),
    components(schemas(
        error::ErrorBody,
        schemas::RegisterRequest,
        schemas::LoginRequest,
        schemas::TokenResponse,
        schemas::UserResponse,
        schemas::ConversationCreateRequest,
        schemas::ConversationResponse,
        schemas::ConversationDetailResponse,
        schemas::DoctorAssignmentRequest,
        schemas::TitleUpdateRequest,
        schemas::MessageCreateRequest,
        schemas::MessageResponse,
        schemas::PrediagnosisCreateRequest,
        schemas::PrediagnosisResponse,
        schemas::HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Build the application router with all routes under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::me))
        .route("/users/:user_id", get(handlers::user_get))
        .route(
            "/users/:user_id/medical-history",
            put(handlers::medical_history_update),
        )
        .route(
            "/conversations",
            post(handlers::conversation_create).get(handlers::conversation_list),
        )
        .route("/conversations/:id", get(handlers::conversation_get))
        .route(
            "/conversations/:id/assign-doctor",
            put(handlers::assign_doctor),
        )
        .route("/conversations/:id/doctor", delete(handlers::remove_doctor))
        .route("/conversations/:id/title", put(handlers::update_title))
        .route(
            "/conversations/:id/messages",
            post(handlers::message_create).get(handlers::messages_list),
        )
        .route(
            "/conversations/:id/prediagnosis",
            get(handlers::conversation_prediagnosis),
        )
        .route("/prediagnosis", post(handlers::prediagnosis_create))
        .route("/prediagnosis/my", get(handlers::my_prediagnoses));

    Router::new()
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use fastaid_core::{GeneratorError, PatientData, PrediagnosisDraft};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    struct StubGenerator;

    impl ProposeGenerator for StubGenerator {
        fn propose(
            &self,
            _patient: &PatientData,
            _medical_history: Option<&Value>,
        ) -> Result<PrediagnosisDraft, GeneratorError> {
            Ok(PrediagnosisDraft {
                potential_diseases: "tension headache".to_string(),
                course_of_action: "hydrate and rest".to_string(),
                support_messages: "very treatable".to_string(),
                recommended_practitioners: "general physician".to_string(),
            })
        }
    }

    fn test_app() -> Router {
        let db = Database::open_in_memory().unwrap();
        let cfg = Arc::new(CoreConfig::new("unused.db".into()));
        router(AppState::new(cfg, db, Arc::new(StubGenerator)))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register_and_login(app: &Router, email: &str, role: &str) -> String {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": email,
                "email": email,
                "password": "secret1",
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn full_triage_flow_over_http() {
        let app = test_app();
        let token = register_and_login(&app, "u1@example.com", "patient").await;

        let (status, conversation) = send(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&token),
            Some(json!({"title": "Headache"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let conversation_id = conversation["id"].as_str().unwrap().to_string();

        let (status, prediagnosis) = send(
            &app,
            Method::POST,
            "/api/prediagnosis",
            Some(&token),
            Some(json!({
                "symptoms": ["headache", "dizziness"],
                "conversation_id": conversation_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prediagnosis["conversation_id"], json!(conversation_id));
        assert_eq!(prediagnosis["doctor_id"], Value::Null);

        let (status, latest) = send(
            &app,
            Method::GET,
            &format!("/api/conversations/{conversation_id}/prediagnosis"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["potential_diseases"], json!("tension headache"));

        let (status, listed) = send(&app, Method::GET, "/api/conversations", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_or_bad_credentials_are_unauthorized() {
        let app = test_app();

        let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cross_tenant_and_missing_resources_map_to_403_and_404() {
        let app = test_app();
        let owner = register_and_login(&app, "u1@example.com", "patient").await;
        let intruder = register_and_login(&app, "u2@example.com", "patient").await;

        let (_, conversation) = send(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&owner),
            Some(json!({})),
        )
        .await;
        let conversation_id = conversation["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/conversations/{conversation_id}/messages"),
            Some(&intruder),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/conversations/{}", uuid::Uuid::new_v4()),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = test_app();
        register_and_login(&app, "dup@example.com", "patient").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Dup",
                "email": "dup@example.com",
                "password": "secret1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
