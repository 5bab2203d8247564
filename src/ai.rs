use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;

use crate::error::{AiError, StageError};
use crate::models::{CanonicalField, FieldAnswer, FieldKind, JobDetails};

/// AI completion backend. Production talks to OpenAI; tests stub this.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Run a completion constrained to the given JSON schema and return the
    /// raw JSON content.
    async fn complete(
        &self,
        system: &[String],
        user: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String>;

    #[allow(dead_code)]
    fn model_name(&self) -> &str;
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug)]
pub struct OpenAiProvider {
    api_key: String,
    model_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn from_env() -> Result<Self> {
        Self::new(DEFAULT_MODEL.to_string())
    }

    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        Ok(Self {
            api_key,
            model_id,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn complete(
        &self,
        system: &[String],
        user: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let mut messages: Vec<OpenAiMessage> = system
            .iter()
            .map(|content| OpenAiMessage {
                role: "system".to_string(),
                content: content.clone(),
            })
            .collect();
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        let request = OpenAiRequest {
            model: self.model_id.clone(),
            messages,
            response_format: json!({
                "type": "json_schema",
                "json_schema": { "name": schema_name, "schema": schema, "strict": true }
            }),
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(AiError::Refusal(refusal).into());
        }
        if choice.finish_reason.as_deref() == Some("length") {
            return Err(AiError::Truncated.into());
        }

        choice
            .message
            .content
            .ok_or_else(|| anyhow!("No content in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Structured extraction and answer drafting ---

fn job_details_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "technical_skills": { "type": "array", "items": { "type": "string" } },
            "soft_skills": { "type": "array", "items": { "type": "string" } },
            "company_name": { "type": "string" },
            "company_field": { "type": "string" },
            "location": { "type": "string" },
            "remote": { "type": "boolean" },
            "job_type": { "type": "string" },
            "seniority": { "type": "string" },
            "experience": { "type": "string" },
            "salary": { "type": "string" },
            "summary": { "type": "string" }
        },
        "required": [
            "technical_skills", "soft_skills", "company_name", "company_field",
            "location", "remote", "job_type", "seniority", "experience",
            "salary", "summary"
        ],
        "additionalProperties": false
    })
}

fn answers_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "answers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string" },
                        "question": { "type": "string" },
                        "answer": {
                            "anyOf": [
                                { "type": "string" },
                                { "type": "array", "items": { "type": "string" } }
                            ]
                        }
                    },
                    "required": ["key", "question", "answer"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["answers"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct AnswersResponse {
    answers: Vec<FieldAnswer>,
}

/// Extract structured detail from a scraped job description.
pub async fn extract_job_details(
    provider: &dyn AiProvider,
    description: &str,
) -> Result<JobDetails> {
    let system =
        ["Extract structured data from the job description based on this schema.".to_string()];
    let content = provider
        .complete(&system, description, "details_response", job_details_schema())
        .await?;
    serde_json::from_str(&content).context("AI job details did not match the expected schema")
}

/// Draft one answer per custom question from the knowledge base. With
/// `instructions` set this is a targeted regeneration of the given fields.
///
/// The response is treated as untrusted: it must cover every required field
/// and stay within each field's possible values before it is accepted.
pub async fn generate_answers(
    provider: &dyn AiProvider,
    fields: &[CanonicalField],
    knowledge_base: &str,
    details: Option<&JobDetails>,
    instructions: Option<&str>,
) -> Result<Vec<FieldAnswer>> {
    let mut system = vec![
        "Reply to the custom questions based on the following knowledge base, using third \
         person like 'The candidate is...' for 'textarea' questions. Be short and concise for \
         'text' questions. Map the `name` field to the `key` field in the response. When there \
         are multiple possible values, choose the most relevant one; for 'checkbox' questions \
         answer with the list of relevant possible values."
            .to_string(),
        format!("Knowledge base: {knowledge_base}"),
    ];
    if let Some(details) = details {
        system.push(format!(
            "Job context: {}",
            serde_json::to_string(details)?
        ));
    }
    if let Some(instructions) = instructions {
        system.push(format!("Regeneration instructions: {instructions}"));
    }

    let user = format!("Custom questions: {}", serde_json::to_string(fields)?);
    let content = provider
        .complete(&system, &user, "answers_response", answers_schema())
        .await?;
    let response: AnswersResponse =
        serde_json::from_str(&content).context("AI answers did not match the expected schema")?;

    validate_answers(fields, &response.answers)?;
    Ok(response.answers)
}

/// Check an answer set against its fields: required coverage, enumerated
/// answers drawn from the allowed values, single/multi cardinality.
pub fn validate_answers(fields: &[CanonicalField], answers: &[FieldAnswer]) -> Result<()> {
    for field in fields {
        let answer = answers.iter().find(|a| a.key == field.name);

        let Some(answer) = answer else {
            if field.required {
                return Err(StageError::AnswersIncomplete(format!(
                    "no answer for required field '{}'",
                    field.name
                ))
                .into());
            }
            continue;
        };

        if let Some(allowed) = &field.possible_values {
            for value in answer.answer.values() {
                if !allowed.iter().any(|option| option == value) {
                    return Err(StageError::AnswersIncomplete(format!(
                        "answer '{}' for '{}' is not one of the allowed values",
                        value, field.name
                    ))
                    .into());
                }
            }
        }

        match field.kind {
            k if k.is_enumerated() && answer.answer.values().is_empty() => {
                return Err(StageError::AnswersIncomplete(format!(
                    "empty answer for enumerated field '{}'",
                    field.name
                ))
                .into());
            }
            FieldKind::Radio | FieldKind::Select => {
                if answer.answer.values().len() != 1 {
                    return Err(StageError::AnswersIncomplete(format!(
                        "field '{}' needs exactly one value",
                        field.name
                    ))
                    .into());
                }
            }
            _ => {}
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::StubProvider;
    use super::*;
    use crate::models::AnswerValue;

    fn radio_field(name: &str, required: bool) -> CanonicalField {
        CanonicalField {
            kind: FieldKind::Radio,
            name: name.to_string(),
            label: "Visa sponsorship?".to_string(),
            possible_values: Some(vec!["Yes".to_string(), "No".to_string()]),
            required,
        }
    }

    fn text_field(name: &str) -> CanonicalField {
        CanonicalField {
            kind: FieldKind::Text,
            name: name.to_string(),
            label: "Years of experience?".to_string(),
            possible_values: None,
            required: true,
        }
    }

    #[tokio::test]
    async fn test_extract_job_details_parses_schema() {
        let body = r#"{
            "technical_skills": ["rust", "sql"],
            "soft_skills": ["communication"],
            "company_name": "Acme",
            "company_field": "aerospace",
            "location": "Berlin",
            "remote": true,
            "job_type": "full-time",
            "seniority": "senior",
            "experience": "5+ years",
            "salary": "not listed",
            "summary": "Senior backend role."
        }"#;
        let provider = StubProvider::new(vec![body]);
        let details = extract_job_details(&provider, "We build rockets.").await.unwrap();
        assert_eq!(details.technical_skills, vec!["rust", "sql"]);
        assert!(details.remote);
        assert_eq!(details.company_name, "Acme");
    }

    #[tokio::test]
    async fn test_generate_answers_accepts_valid_response() {
        let body = r#"{"answers": [
            {"key": "field0", "question": "Visa sponsorship?", "answer": "No"},
            {"key": "field1", "question": "Years of experience?", "answer": "Seven"}
        ]}"#;
        let provider = StubProvider::new(vec![body]);
        let fields = vec![radio_field("field0", true), text_field("field1")];

        let answers = generate_answers(&provider, &fields, "The candidate...", None, None)
            .await
            .unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].answer, AnswerValue::One("No".to_string()));
    }

    #[tokio::test]
    async fn test_generate_answers_rejects_missing_required_field() {
        let body = r#"{"answers": [
            {"key": "field1", "question": "Years of experience?", "answer": "Seven"}
        ]}"#;
        let provider = StubProvider::new(vec![body]);
        let fields = vec![radio_field("field0", true), text_field("field1")];

        let err = generate_answers(&provider, &fields, "kb", None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::AnswersIncomplete(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_answers_rejects_off_list_value() {
        let body = r#"{"answers": [
            {"key": "field0", "question": "Visa sponsorship?", "answer": "Maybe"}
        ]}"#;
        let provider = StubProvider::new(vec![body]);
        let fields = vec![radio_field("field0", true)];

        let err = generate_answers(&provider, &fields, "kb", None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::AnswersIncomplete(_))
        ));
    }

    #[test]
    fn test_validate_answers_checkbox_subset() {
        let field = CanonicalField {
            kind: FieldKind::Checkbox,
            name: "field0".to_string(),
            label: "Stacks?".to_string(),
            possible_values: Some(vec!["Rust".to_string(), "Go".to_string()]),
            required: true,
        };
        let good = vec![FieldAnswer {
            key: "field0".to_string(),
            question: "Stacks?".to_string(),
            answer: AnswerValue::Many(vec!["Rust".to_string(), "Go".to_string()]),
        }];
        assert!(validate_answers(std::slice::from_ref(&field), &good).is_ok());

        let bad = vec![FieldAnswer {
            key: "field0".to_string(),
            question: "Stacks?".to_string(),
            answer: AnswerValue::Many(vec!["Rust".to_string(), "COBOL".to_string()]),
        }];
        assert!(validate_answers(&[field], &bad).is_err());
    }

    #[test]
    fn test_validate_answers_optional_fields_may_be_missing() {
        let fields = vec![radio_field("field0", false)];
        assert!(validate_answers(&fields, &[]).is_ok());
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe {
            env::remove_var("OPENAI_API_KEY");
        }

        let result = OpenAiProvider::from_env();

        if let Some(val) = original {
            unsafe {
                env::set_var("OPENAI_API_KEY", val);
            }
        }

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }
}
