//! External prediagnosis generator seam.
//!
//! The remote reasoning service is opaque to the core: a single `propose`
//! capability that either yields a complete draft or fails. Implementations
//! own their own transport, retry and timeout behaviour; the orchestrator
//! only decides whether a returned draft is complete enough to persist.

use serde::{Deserialize, Serialize};

/// Generation input assembled from the request and the patient's record.
#[derive(Clone, Debug, Serialize)]
pub struct PatientData {
    pub symptoms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

/// A proposed prediagnosis as returned by the generator.
///
/// All four fields are required; a draft missing any of them is a
/// generation failure, never a partial success.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrediagnosisDraft {
    pub potential_diseases: String,
    pub course_of_action: String,
    pub support_messages: String,
    pub recommended_practitioners: String,
}

impl PrediagnosisDraft {
    /// Reject drafts with an empty required field.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        let fields = [
            ("potential_diseases", &self.potential_diseases),
            ("course_of_action", &self.course_of_action),
            ("support_messages", &self.support_messages),
            ("recommended_practitioners", &self.recommended_practitioners),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(GeneratorError::MissingField(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request to reasoning service failed: {0}")]
    Transport(String),
    #[error("malformed generator response: {0}")]
    Malformed(String),
    #[error("generator draft missing required field: {0}")]
    MissingField(&'static str),
}

/// The single capability the core requires from the reasoning service.
///
/// A deterministic stub can replace the remote implementation in tests
/// without touching orchestration logic.
pub trait ProposeGenerator: Send + Sync {
    fn propose(
        &self,
        patient: &PatientData,
        medical_history: Option<&serde_json::Value>,
    ) -> Result<PrediagnosisDraft, GeneratorError>;
}
