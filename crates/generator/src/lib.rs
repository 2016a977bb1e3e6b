//! # Fastaid Generator
//!
//! HTTP client for the remote reasoning service that proposes prediagnoses.
//!
//! The triage core only knows the [`ProposeGenerator`] trait; this crate
//! supplies the production implementation, which calls an Anthropic-style
//! messages endpoint, extracts the JSON object from the model's text reply
//! and deserialises it into a [`PrediagnosisDraft`]. Transport, timeout and
//! response-shape concerns all stay on this side of the seam.

use fastaid_core::{GeneratorError, PatientData, PrediagnosisDraft, ProposeGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default messages endpoint of the reasoning service.
const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default model used for prediagnosis drafts.
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// API version header expected by the service.
const API_VERSION: &str = "2023-06-01";

/// Upper bound on a single generation call; beyond this the call is treated
/// as failed and nothing is persisted by the caller.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "\
You are a medical expert trying to prediagnose a patient and eventually send that data \
to a doctor for further investigation. Your job is to locate their potential diseases, \
recommend a light course of action while waiting for the doctor's response, offer some stress \
relief messages, and recommend which types of practitioners to see. Your recommended course of actions \
should not be exhaustive and create unnecessary stress.

Return your answer in a valid JSON structure strictly following these given keys, although the values may be longer or shorter.
Return ONLY the JSON object without any markdown formatting or additional text.
{
    \"potential_diseases\" : \"stroke, heart disease, lung cancer, etc.\",
    \"course_of_action\" : \"I recommend you to reduce the amount of sugar and carbohydrate intake. Additionally, you can move around your right arm for better blood circulation.\",
    \"support_messages\" : \"Your symptoms are highly treatable and your local physicians have great ratings!\",
    \"recommended_practitioners\" : \"general physician, orthopedic, ER\"
}";

/// Connection settings for the reasoning service.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeneratorConfig {
    /// Settings with the default endpoint, model and timeout.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Production [`ProposeGenerator`] backed by the remote reasoning service.
pub struct RemoteGenerator {
    cfg: GeneratorConfig,
    client: reqwest::blocking::Client,
}

impl RemoteGenerator {
    pub fn new(cfg: GeneratorConfig) -> Result<Self, GeneratorError> {
        if cfg.api_key.trim().is_empty() {
            tracing::warn!("reasoning service API key is empty; generation calls will fail");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| GeneratorError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }

    fn user_content(
        patient: &PatientData,
        medical_history: Option<&serde_json::Value>,
    ) -> Result<String, GeneratorError> {
        let data = serde_json::to_string(patient)
            .map_err(|e| GeneratorError::Malformed(e.to_string()))?;
        let mut content = format!("Generate a prediagnosis based on the following data: {data}");
        if let Some(history) = medical_history {
            content.push_str(&format!(
                "\nand on the given patient medical history: {history}"
            ));
        }
        Ok(content)
    }
}

impl ProposeGenerator for RemoteGenerator {
    fn propose(
        &self,
        patient: &PatientData,
        medical_history: Option<&serde_json::Value>,
    ) -> Result<PrediagnosisDraft, GeneratorError> {
        let body = MessagesRequest {
            model: &self.cfg.model,
            max_tokens: 2000,
            temperature: 0.1,
            system: SYSTEM_PROMPT,
            messages: vec![MessageBody {
                role: "user",
                content: Self::user_content(patient, medical_history)?,
            }],
        };

        let response = self
            .client
            .post(&self.cfg.endpoint)
            .header("x-api-key", &self.cfg.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| GeneratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            tracing::warn!(%status, "reasoning service returned an error");
            return Err(GeneratorError::Transport(format!(
                "service responded with {status}: {detail}"
            )));
        }

        let reply: MessagesResponse = response
            .json()
            .map_err(|e| GeneratorError::Malformed(e.to_string()))?;
        let text = reply
            .content
            .first()
            .map(|block| block.text.as_str())
            .ok_or_else(|| GeneratorError::Malformed("empty response content".to_string()))?;

        parse_draft(text)
    }
}

/// Deserialise a draft from model output that may wrap the JSON object in
/// markdown fences or surrounding prose.
fn parse_draft(text: &str) -> Result<PrediagnosisDraft, GeneratorError> {
    let json = extract_json_from_text(text);
    let draft: PrediagnosisDraft =
        serde_json::from_str(json).map_err(|e| GeneratorError::Malformed(e.to_string()))?;
    draft.validate()?;
    Ok(draft)
}

/// Extract the JSON payload from text that might contain markdown code
/// blocks or extra prose around the object.
fn extract_json_from_text(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return text[start..=end].trim();
        }
    }
    text.trim()
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<MessageBody<'a>>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}
