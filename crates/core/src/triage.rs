//! Triage orchestration.
//!
//! `TriageService` is the principal-facing use-case layer: every operation
//! confirms the target exists, evaluates the access policy, and only then
//! touches the conversation store. It also implements the one multi-step,
//! partial-failure-prone use case in the system — generating a prediagnosis
//! and attaching it to a conversation.

use crate::config::CoreConfig;
use crate::constants::DERIVED_TITLE_SYMPTOM_COUNT;
use crate::conversations::{
    Conversation, ConversationId, ConversationStore, Message, MessageRole, Prediagnosis,
};
use crate::db::Database;
use crate::error::{TriageError, TriageResult};
use crate::generator::{PatientData, ProposeGenerator};
use crate::identity::{User, UserId, UserRole, UserStore};
use crate::policy::{self, Principal};
use fastaid_types::NonEmptyText;
use std::sync::Arc;

/// Title given to conversations created without an explicit one.
const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// A prediagnosis request as accepted from the boundary.
#[derive(Clone, Debug)]
pub struct PrediagnosisRequest {
    pub symptoms: Vec<NonEmptyText>,
    pub duration: Option<String>,
    pub age: Option<u32>,
    /// Attach to an existing conversation instead of creating one. Lets a
    /// caller retry generation without duplicating the conversation.
    pub conversation_id: Option<ConversationId>,
}

/// A conversation together with its dependents, as returned by
/// [`TriageService::conversation_get`].
#[derive(Clone, Debug)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub prediagnoses: Vec<Prediagnosis>,
}

/// Principal-gated triage operations.
#[derive(Clone)]
pub struct TriageService {
    cfg: Arc<CoreConfig>,
    users: UserStore,
    conversations: ConversationStore,
    generator: Arc<dyn ProposeGenerator>,
}

impl TriageService {
    pub fn new(cfg: Arc<CoreConfig>, db: Database, generator: Arc<dyn ProposeGenerator>) -> Self {
        Self {
            cfg,
            users: UserStore::new(db.clone()),
            conversations: ConversationStore::new(db),
            generator,
        }
    }

    // ========================================================================
    // CONVERSATIONS
    // ========================================================================

    /// Create a conversation owned by the requesting patient.
    pub fn conversation_create(
        &self,
        principal: &Principal,
        title: Option<NonEmptyText>,
    ) -> TriageResult<Conversation> {
        require_patient(principal)?;
        let title = match title {
            Some(title) => title,
            None => NonEmptyText::new(DEFAULT_CONVERSATION_TITLE)
                .map_err(|e| TriageError::InvalidInput(e.to_string()))?,
        };
        self.conversations.create(principal.id, title)
    }

    /// List the principal's conversations, most recently updated first.
    ///
    /// An unspecified limit is capped to avoid unbounded scans.
    pub fn conversation_list(
        &self,
        principal: &Principal,
        limit: Option<usize>,
    ) -> TriageResult<Vec<Conversation>> {
        let limit = limit.unwrap_or(self.cfg.conversation_list_cap());
        self.conversations.list_for_patient(principal.id, limit)
    }

    /// Fetch a conversation with its messages and prediagnoses.
    pub fn conversation_get(
        &self,
        principal: &Principal,
        id: ConversationId,
    ) -> TriageResult<ConversationDetail> {
        let conversation = self.authorised_conversation(principal, id)?;
        let messages = self.conversations.list_messages(id, None)?;
        let prediagnoses = self.conversations.list_prediagnoses(id)?;
        Ok(ConversationDetail {
            conversation,
            messages,
            prediagnoses,
        })
    }

    /// Replace a conversation's title.
    pub fn conversation_update_title(
        &self,
        principal: &Principal,
        id: ConversationId,
        title: NonEmptyText,
    ) -> TriageResult<Conversation> {
        self.authorised_conversation(principal, id)?;
        self.conversations.update_title(id, title)
    }

    // ========================================================================
    // DOCTOR ASSIGNMENT
    // ========================================================================

    /// Assign a doctor to a conversation.
    ///
    /// Allowed for the owning patient or an admin. The target must reference
    /// an existing user whose role is exactly doctor; otherwise the
    /// operation fails before any mutation.
    pub fn assign_doctor(
        &self,
        principal: &Principal,
        id: ConversationId,
        doctor_id: UserId,
    ) -> TriageResult<Conversation> {
        let conversation = self.conversations.get(id)?;
        if !policy::can_assign_doctor(principal, &conversation) {
            return Err(TriageError::AccessDenied);
        }

        let doctor = match self.users.get(doctor_id) {
            Ok(user) => user,
            Err(TriageError::NotFound(_)) => {
                return Err(TriageError::InvalidReference(format!(
                    "user {doctor_id} does not exist"
                )))
            }
            Err(other) => return Err(other),
        };
        if doctor.role != UserRole::Doctor {
            return Err(TriageError::InvalidReference(format!(
                "user {doctor_id} is not a doctor"
            )));
        }

        self.conversations.assign_doctor(id, doctor_id)
    }

    /// Remove the assigned doctor from a conversation.
    ///
    /// Gated like assignment: it mutates the same slot.
    pub fn remove_doctor(
        &self,
        principal: &Principal,
        id: ConversationId,
    ) -> TriageResult<Conversation> {
        let conversation = self.conversations.get(id)?;
        if !policy::can_assign_doctor(principal, &conversation) {
            return Err(TriageError::AccessDenied);
        }
        self.conversations.remove_doctor(id)
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Append a message to a conversation the principal can access.
    pub fn message_append(
        &self,
        principal: &Principal,
        id: ConversationId,
        role: MessageRole,
        content: NonEmptyText,
    ) -> TriageResult<Message> {
        self.authorised_conversation(principal, id)?;
        self.conversations
            .append_message(id, principal.id, role, content)
    }

    /// List a conversation's messages in creation order.
    pub fn messages_list(
        &self,
        principal: &Principal,
        id: ConversationId,
        limit: Option<usize>,
    ) -> TriageResult<Vec<Message>> {
        self.authorised_conversation(principal, id)?;
        self.conversations.list_messages(id, limit)
    }

    // ========================================================================
    // PREDIAGNOSIS
    // ========================================================================

    /// Generate a prediagnosis and attach it to a conversation.
    ///
    /// The conversation is resolved (or created) and committed before the
    /// generator is invoked, so a generation failure leaves a usable
    /// conversation behind and the caller can retry against its id. Nothing
    /// is persisted from a failed or incomplete draft.
    pub fn prediagnosis_create(
        &self,
        principal: &Principal,
        request: PrediagnosisRequest,
    ) -> TriageResult<Prediagnosis> {
        require_patient(principal)?;
        if request.symptoms.is_empty() {
            return Err(TriageError::InvalidInput(
                "at least one symptom is required".to_string(),
            ));
        }

        // Resolve the conversation first; this commit is independent of the
        // generation outcome.
        let conversation = match request.conversation_id {
            Some(id) => {
                let conversation = self.conversations.get(id)?;
                if conversation.patient_id != principal.id {
                    return Err(TriageError::AccessDenied);
                }
                conversation
            }
            None => {
                let title = derived_title(&request.symptoms)?;
                self.conversations.create(principal.id, title)?
            }
        };

        let patient = self.users.get(principal.id)?;
        let age = request
            .age
            .or_else(|| age_from_history(patient.medical_history.as_ref()));
        let data = PatientData {
            symptoms: request
                .symptoms
                .iter()
                .map(|s| s.as_str().to_owned())
                .collect(),
            duration: request.duration,
            age,
        };

        let draft = self
            .generator
            .propose(&data, patient.medical_history.as_ref())?;
        draft.validate()?;

        let prediagnosis = self.conversations.record_prediagnosis(
            conversation.id,
            principal.id,
            conversation.doctor_id,
            &draft,
        )?;
        self.conversations.touch(conversation.id)?;
        tracing::info!(conversation = %conversation.id, "prediagnosis recorded");
        Ok(prediagnosis)
    }

    /// The most recent prediagnosis for a conversation.
    pub fn prediagnosis_latest(
        &self,
        principal: &Principal,
        id: ConversationId,
    ) -> TriageResult<Prediagnosis> {
        self.authorised_conversation(principal, id)?;
        self.conversations.latest_prediagnosis(id)
    }

    /// All prediagnoses recorded for the requesting patient.
    pub fn my_prediagnoses(
        &self,
        principal: &Principal,
        limit: Option<usize>,
    ) -> TriageResult<Vec<Prediagnosis>> {
        require_patient(principal)?;
        let limit = limit.unwrap_or(self.cfg.prediagnosis_list_cap());
        self.conversations
            .list_prediagnoses_for_patient(principal.id, limit)
    }

    // ========================================================================
    // USERS
    // ========================================================================

    /// Fetch a user record; patients only ever reach their own.
    pub fn user_get(&self, principal: &Principal, user_id: UserId) -> TriageResult<User> {
        if principal.role == UserRole::Patient && principal.id != user_id {
            return Err(TriageError::AccessDenied);
        }
        self.users.get(user_id)
    }

    /// Replace a user's medical-history document; same visibility rule as
    /// [`TriageService::user_get`].
    pub fn medical_history_update(
        &self,
        principal: &Principal,
        user_id: UserId,
        medical_history: serde_json::Value,
    ) -> TriageResult<User> {
        if principal.role == UserRole::Patient && principal.id != user_id {
            return Err(TriageError::AccessDenied);
        }
        if !medical_history.is_object() {
            return Err(TriageError::InvalidInput(
                "medical history must be a JSON object".to_string(),
            ));
        }
        self.users.update_medical_history(user_id, medical_history)
    }

    /// Existence check, then policy check, in that order.
    fn authorised_conversation(
        &self,
        principal: &Principal,
        id: ConversationId,
    ) -> TriageResult<Conversation> {
        let conversation = self.conversations.get(id)?;
        if !policy::can_access(principal, &conversation) {
            return Err(TriageError::AccessDenied);
        }
        Ok(conversation)
    }
}

fn require_patient(principal: &Principal) -> TriageResult<()> {
    match principal.role {
        UserRole::Patient => Ok(()),
        UserRole::Doctor | UserRole::Admin => Err(TriageError::AccessDenied),
    }
}

/// Derive a conversation title from the first few symptom terms.
fn derived_title(symptoms: &[NonEmptyText]) -> TriageResult<NonEmptyText> {
    let leading: Vec<&str> = symptoms
        .iter()
        .take(DERIVED_TITLE_SYMPTOM_COUNT)
        .map(|s| s.as_str())
        .collect();
    NonEmptyText::new(format!("Symptoms: {}", leading.join(", ")))
        .map_err(|e| TriageError::InvalidInput(e.to_string()))
}

/// Pull an age out of the opaque medical-history document, if present.
fn age_from_history(history: Option<&serde_json::Value>) -> Option<u32> {
    history
        .and_then(|doc| doc.get("age"))
        .and_then(|age| age.as_u64())
        .map(|age| age as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorError, PrediagnosisDraft};
    use crate::identity::NewUser;
    use serde_json::json;
    use std::sync::Mutex;

    enum StubBehaviour {
        Complete,
        BlankField,
        Unreachable,
    }

    /// Deterministic generator stub; records the last input it saw.
    struct StubGenerator {
        behaviour: StubBehaviour,
        last_input: Mutex<Option<PatientData>>,
    }

    impl StubGenerator {
        fn new(behaviour: StubBehaviour) -> Self {
            Self {
                behaviour,
                last_input: Mutex::new(None),
            }
        }
    }

    impl ProposeGenerator for StubGenerator {
        fn propose(
            &self,
            patient: &PatientData,
            _medical_history: Option<&serde_json::Value>,
        ) -> Result<PrediagnosisDraft, GeneratorError> {
            if let Ok(mut guard) = self.last_input.lock() {
                *guard = Some(patient.clone());
            }
            match self.behaviour {
                StubBehaviour::Complete => Ok(PrediagnosisDraft {
                    potential_diseases: "tension headache".to_string(),
                    course_of_action: "hydrate and rest".to_string(),
                    support_messages: "very treatable".to_string(),
                    recommended_practitioners: "general physician".to_string(),
                }),
                StubBehaviour::BlankField => Ok(PrediagnosisDraft {
                    potential_diseases: "tension headache".to_string(),
                    course_of_action: "hydrate and rest".to_string(),
                    support_messages: "very treatable".to_string(),
                    recommended_practitioners: String::new(),
                }),
                StubBehaviour::Unreachable => {
                    Err(GeneratorError::Transport("connection refused".to_string()))
                }
            }
        }
    }

    struct Harness {
        service: TriageService,
        users: UserStore,
        conversations: ConversationStore,
    }

    fn setup(behaviour: StubBehaviour) -> (Harness, Arc<StubGenerator>) {
        let db = Database::open_in_memory().unwrap();
        let cfg = Arc::new(CoreConfig::new("unused.db".into()));
        let generator = Arc::new(StubGenerator::new(behaviour));
        let service = TriageService::new(cfg, db.clone(), generator.clone());
        (
            Harness {
                service,
                users: UserStore::new(db.clone()),
                conversations: ConversationStore::new(db),
            },
            generator,
        )
    }

    fn add_user(harness: &Harness, email: &str, role: UserRole) -> Principal {
        let user = harness
            .users
            .create(NewUser {
                name: email.to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role,
                medical_history: None,
            })
            .unwrap();
        Principal::new(user.id, user.role)
    }

    fn symptoms(terms: &[&str]) -> Vec<NonEmptyText> {
        terms.iter().map(|t| NonEmptyText::new(t).unwrap()).collect()
    }

    #[test]
    fn happy_path_attaches_prediagnosis_and_surfaces_conversation() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);

        let conversation = harness
            .service
            .conversation_create(&patient, Some(NonEmptyText::new("Headache").unwrap()))
            .unwrap();

        let prediagnosis = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache", "dizziness"]),
                    duration: None,
                    age: None,
                    conversation_id: Some(conversation.id),
                },
            )
            .unwrap();

        assert_eq!(prediagnosis.conversation_id, conversation.id);
        assert_eq!(prediagnosis.patient_id, patient.id);
        // No doctor assigned yet: the record is AI-attributed, pending review.
        assert_eq!(prediagnosis.doctor_id, None);

        let listed = harness.service.conversation_list(&patient, None).unwrap();
        assert_eq!(listed[0].id, conversation.id);
        assert!(listed[0].updated_at >= conversation.updated_at);
    }

    #[test]
    fn request_without_conversation_derives_a_title() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);

        let prediagnosis = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache", "dizziness", "nausea", "fever"]),
                    duration: Some("3 days".to_string()),
                    age: None,
                    conversation_id: None,
                },
            )
            .unwrap();

        let conversation = harness
            .conversations
            .get(prediagnosis.conversation_id)
            .unwrap();
        assert_eq!(conversation.title, "Symptoms: headache, dizziness, nausea");
        assert_eq!(conversation.patient_id, patient.id);
    }

    #[test]
    fn age_falls_back_to_the_medical_history_document() {
        let (harness, generator) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        harness
            .service
            .medical_history_update(&patient, patient.id, json!({"age": 42}))
            .unwrap();

        harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["cough"]),
                    duration: None,
                    age: None,
                    conversation_id: None,
                },
            )
            .unwrap();

        let seen = generator.last_input.lock().unwrap().clone().unwrap();
        assert_eq!(seen.age, Some(42));

        // An explicit age outranks the stored document.
        harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["cough"]),
                    duration: None,
                    age: Some(30),
                    conversation_id: None,
                },
            )
            .unwrap();
        let seen = generator.last_input.lock().unwrap().clone().unwrap();
        assert_eq!(seen.age, Some(30));
    }

    #[test]
    fn incomplete_draft_persists_nothing_and_leaves_conversation_retryable() {
        let (harness, _) = setup(StubBehaviour::BlankField);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();

        let err = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache"]),
                    duration: None,
                    age: None,
                    conversation_id: Some(conversation.id),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriageError::Generation(_)));

        // The conversation survives for a retry; no prediagnosis row exists.
        assert!(harness.conversations.get(conversation.id).is_ok());
        let err = harness
            .conversations
            .latest_prediagnosis(conversation.id)
            .unwrap_err();
        assert!(matches!(err, TriageError::NotFound("prediagnosis")));
    }

    #[test]
    fn generator_failure_is_reported_without_partial_state() {
        let (harness, _) = setup(StubBehaviour::Unreachable);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);

        let err = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache"]),
                    duration: None,
                    age: None,
                    conversation_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriageError::Generation(_)));

        // The implicitly created conversation is committed independently and
        // remains available for a retry.
        let listed = harness.service.conversation_list(&patient, None).unwrap();
        assert_eq!(listed.len(), 1);
        let err = harness
            .conversations
            .latest_prediagnosis(listed[0].id)
            .unwrap_err();
        assert!(matches!(err, TriageError::NotFound("prediagnosis")));
    }

    #[test]
    fn cross_tenant_access_is_denied() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let owner = add_user(&harness, "u1@example.com", UserRole::Patient);
        let intruder = add_user(&harness, "u2@example.com", UserRole::Patient);
        let conversation = harness
            .service
            .conversation_create(&owner, None)
            .unwrap();

        let err = harness
            .service
            .messages_list(&intruder, conversation.id, None)
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        let err = harness
            .service
            .prediagnosis_create(
                &intruder,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache"]),
                    duration: None,
                    age: None,
                    conversation_id: Some(conversation.id),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));
    }

    #[test]
    fn missing_conversation_is_reported_before_policy() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);

        let err = harness
            .service
            .conversation_get(&patient, uuid::Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, TriageError::NotFound("conversation")));
    }

    #[test]
    fn doctor_gains_access_once_assigned() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let doctor = add_user(&harness, "doc@example.com", UserRole::Doctor);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();

        let err = harness
            .service
            .conversation_get(&doctor, conversation.id)
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        harness
            .service
            .assign_doctor(&patient, conversation.id, doctor.id)
            .unwrap();

        let detail = harness
            .service
            .conversation_get(&doctor, conversation.id)
            .unwrap();
        assert_eq!(detail.conversation.doctor_id, Some(doctor.id));
    }

    #[test]
    fn assignment_by_non_owner_non_admin_is_denied_and_unchanged() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let outsider_doctor = add_user(&harness, "u3@example.com", UserRole::Doctor);
        let target_doctor = add_user(&harness, "u4@example.com", UserRole::Doctor);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();

        let err = harness
            .service
            .assign_doctor(&outsider_doctor, conversation.id, target_doctor.id)
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        let unchanged = harness.conversations.get(conversation.id).unwrap();
        assert_eq!(unchanged.doctor_id, None);
    }

    #[test]
    fn assigning_a_non_doctor_is_an_invalid_reference() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let other_patient = add_user(&harness, "u2@example.com", UserRole::Patient);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();

        let err = harness
            .service
            .assign_doctor(&patient, conversation.id, other_patient.id)
            .unwrap_err();
        assert!(matches!(err, TriageError::InvalidReference(_)));

        let err = harness
            .service
            .assign_doctor(&patient, conversation.id, 9999)
            .unwrap_err();
        assert!(matches!(err, TriageError::InvalidReference(_)));

        let unchanged = harness.conversations.get(conversation.id).unwrap();
        assert_eq!(unchanged.doctor_id, None);
    }

    #[test]
    fn admin_can_assign_but_not_read_content() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let doctor = add_user(&harness, "doc@example.com", UserRole::Doctor);
        let admin = add_user(&harness, "admin@example.com", UserRole::Admin);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();

        let assigned = harness
            .service
            .assign_doctor(&admin, conversation.id, doctor.id)
            .unwrap();
        assert_eq!(assigned.doctor_id, Some(doctor.id));

        let err = harness
            .service
            .conversation_get(&admin, conversation.id)
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        let removed = harness
            .service
            .remove_doctor(&admin, conversation.id)
            .unwrap();
        assert_eq!(removed.doctor_id, None);
    }

    #[test]
    fn prediagnosis_records_the_assigned_doctor() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let doctor = add_user(&harness, "doc@example.com", UserRole::Doctor);
        let conversation = harness
            .service
            .conversation_create(&patient, None)
            .unwrap();
        harness
            .service
            .assign_doctor(&patient, conversation.id, doctor.id)
            .unwrap();

        let prediagnosis = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache"]),
                    duration: None,
                    age: None,
                    conversation_id: Some(conversation.id),
                },
            )
            .unwrap();
        assert_eq!(prediagnosis.doctor_id, Some(doctor.id));
    }

    #[test]
    fn non_patient_roles_cannot_open_triage_flows() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let doctor = add_user(&harness, "doc@example.com", UserRole::Doctor);

        let err = harness
            .service
            .conversation_create(&doctor, None)
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        let err = harness
            .service
            .prediagnosis_create(
                &doctor,
                PrediagnosisRequest {
                    symptoms: symptoms(&["headache"]),
                    duration: None,
                    age: None,
                    conversation_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));
    }

    #[test]
    fn empty_symptom_list_is_rejected_before_any_mutation() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);

        let err = harness
            .service
            .prediagnosis_create(
                &patient,
                PrediagnosisRequest {
                    symptoms: vec![],
                    duration: None,
                    age: None,
                    conversation_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
        assert!(harness
            .service
            .conversation_list(&patient, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn patients_only_reach_their_own_user_record() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let patient = add_user(&harness, "u1@example.com", UserRole::Patient);
        let other = add_user(&harness, "u2@example.com", UserRole::Patient);
        let doctor = add_user(&harness, "doc@example.com", UserRole::Doctor);

        assert!(harness.service.user_get(&patient, patient.id).is_ok());
        let err = harness.service.user_get(&patient, other.id).unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        // Doctors and admins may look up any profile.
        assert!(harness.service.user_get(&doctor, patient.id).is_ok());

        let err = harness
            .service
            .medical_history_update(&patient, other.id, json!({"age": 1}))
            .unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));

        let err = harness
            .service
            .medical_history_update(&patient, patient.id, json!(["not", "an", "object"]))
            .unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
    }

    #[test]
    fn my_prediagnoses_requires_the_patient_role() {
        let (harness, _) = setup(StubBehaviour::Complete);
        let admin = add_user(&harness, "admin@example.com", UserRole::Admin);
        let err = harness.service.my_prediagnoses(&admin, None).unwrap_err();
        assert!(matches!(err, TriageError::AccessDenied));
    }
}
