use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use thirtyfour::components::SelectElement;

use crate::browser::{BrowserSession, WaitUntil};
use crate::config::Profile;
use crate::error::BoardError;
use crate::models::{AnswerValue, CanonicalField, FieldKind, Job};

use super::{BoardAdapter, FillAction, RawFieldCard, fill_plan};

// Lever posting pages: https://jobs.lever.co/<company>/<posting-uuid>[/apply]
static POSTING_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://jobs\.lever\.co/[a-zA-Z0-9\-]+/[a-f0-9\-]{36}(/apply)?$")
        .expect("posting URL pattern is valid")
});

const DESCRIPTION: &str = ".posting-page";
const FIELDS_DATA: &str = r#"[data-qa="additional-cards"] input[type="hidden"]"#;
const RESUME_UPLOAD: &str = "#resume-upload-input";
const RESUME_UPLOAD_SUCCESS: &str = ".resume-upload-success";
const COVER: &str = r#"textarea[name="comments"]"#;
const SUBMIT_BUTTON: &str = "#btn-submit";
const SUCCESS_SUFFIX: &str = "/thanks";

/// The wrapper Lever stores in each hidden card input's value attribute.
#[derive(Debug, Default, Deserialize)]
struct CardValue {
    #[serde(default)]
    fields: Vec<super::RawField>,
}

pub struct LeverAdapter;

#[async_trait]
impl BoardAdapter for LeverAdapter {
    fn id(&self) -> &'static str {
        "lever"
    }

    fn search_domain(&self) -> &'static str {
        "jobs.lever.co"
    }

    fn matches_url(&self, url: &str) -> bool {
        let base = url.split('?').next().unwrap_or(url);
        POSTING_URL.is_match(base)
    }

    fn canonicalize(&self, url: &str) -> String {
        let base = url.split('?').next().unwrap_or(url);
        base.strip_suffix("/apply").unwrap_or(base).to_string()
    }

    fn normalize(&self, cards: &[RawFieldCard]) -> Vec<CanonicalField> {
        cards
            .iter()
            .flat_map(|card| {
                card.fields.iter().enumerate().map(|(index, field)| {
                    let possible_values: Vec<String> = field
                        .options
                        .iter()
                        .map(|option| option.text.clone())
                        .collect();
                    CanonicalField {
                        kind: map_field_kind(&field.kind),
                        // Lever posts answers under fieldN keys derived from
                        // the card's template name.
                        name: card.name.replace("baseTemplate", &format!("field{index}")),
                        label: field.text.clone(),
                        possible_values: (!possible_values.is_empty()).then_some(possible_values),
                        required: field.required,
                    }
                })
            })
            .collect()
    }

    async fn scrape_description(&self, session: &BrowserSession) -> Result<String> {
        session.wait_for(DESCRIPTION).await?;
        let source = session.source().await?;
        let document = Html::parse_document(&source);
        let selector = css(DESCRIPTION)?;

        let element = document
            .select(&selector)
            .next()
            .ok_or_else(|| BoardError::MissingElement(DESCRIPTION.to_string()))?;
        let text: Vec<&str> = element.text().map(str::trim).filter(|t| !t.is_empty()).collect();
        Ok(text.join("\n"))
    }

    async fn scrape_raw_fields(&self, session: &BrowserSession) -> Result<Vec<RawFieldCard>> {
        let source = session.source().await?;
        let document = Html::parse_document(&source);
        let selector = css(FIELDS_DATA)?;

        // Each hidden input holds one card: the posting key in `name`, the
        // question schema as JSON in `value`.
        let cards = document
            .select(&selector)
            .filter_map(|input| {
                let name = input.value().attr("name")?.to_string();
                let value = input.value().attr("value").unwrap_or("{}");
                let parsed: CardValue = serde_json::from_str(value).unwrap_or_default();
                Some(RawFieldCard {
                    name,
                    fields: parsed.fields,
                })
            })
            .collect();
        Ok(cards)
    }

    async fn navigate_to_application(&self, session: &BrowserSession, job: &Job) -> Result<()> {
        session
            .goto(&format!("{}/apply", job.link), WaitUntil::DomContentLoaded)
            .await
    }

    async fn upload_resume(&self, session: &BrowserSession, resume: &Path) -> Result<()> {
        let input = session
            .find(RESUME_UPLOAD)
            .await?
            .ok_or_else(|| BoardError::MissingElement(RESUME_UPLOAD.to_string()))?;
        input
            .send_keys(resume.to_string_lossy().as_ref())
            .await
            .context("Failed to attach resume file")?;

        // Lever parses the file server-side; the success badge is the signal
        // that the attachment registered.
        session
            .wait_for(RESUME_UPLOAD_SUCCESS)
            .await
            .context("Resume upload was not confirmed")?;
        Ok(())
    }

    async fn fill_personal_info(&self, session: &BrowserSession, profile: &Profile) -> Result<()> {
        let fields = [
            (r#"input[name="name"]"#, profile.full_name()),
            (r#"input[name="email"]"#, profile.email.clone()),
            (r#"input[name="phone"]"#, profile.phone.clone()),
            (r#"[data-qa="location-input"]"#, profile.location.clone()),
            (r#"input[name="org"]"#, profile.current_company.clone()),
            (r#"input[name="urls[LinkedIn]"]"#, profile.linkedin.clone()),
            (r#"input[name="urls[GitHub]"]"#, profile.github.clone()),
        ];

        // Lever forms vary by posting; absent inputs are simply skipped.
        for (selector, value) in fields {
            if value.trim().is_empty() {
                continue;
            }
            if let Some(input) = session.find(selector).await? {
                input.clear().await.ok();
                input
                    .send_keys(value.as_str())
                    .await
                    .with_context(|| format!("Failed to fill {selector}"))?;
            }
        }
        Ok(())
    }

    async fn fill_field(
        &self,
        session: &BrowserSession,
        field: &CanonicalField,
        answer: &AnswerValue,
    ) -> Result<()> {
        for action in fill_plan(field, answer)? {
            match action {
                FillAction::ClickOption { name, value } => {
                    let selector = format!(
                        "[name=\"{}\"][value=\"{}\"]",
                        attr_escape(&name),
                        attr_escape(&value)
                    );
                    let input = session
                        .find(&selector)
                        .await?
                        .ok_or_else(|| BoardError::FieldNotFound(name.clone()))?;
                    input
                        .click()
                        .await
                        .with_context(|| format!("Failed to click option for '{name}'"))?;
                }
                FillAction::SelectOption { name, value } => {
                    let selector = format!("select[name=\"{}\"]", attr_escape(&name));
                    let element = session
                        .find(&selector)
                        .await?
                        .ok_or_else(|| BoardError::FieldNotFound(name.clone()))?;
                    let select = SelectElement::new(&element)
                        .await
                        .with_context(|| format!("'{name}' is not a select element"))?;
                    select
                        .select_by_exact_text(&value)
                        .await
                        .with_context(|| format!("Option '{value}' not present in '{name}'"))?;
                }
                FillAction::TypeText { name, value } => {
                    let selector = format!("[name=\"{}\"]", attr_escape(&name));
                    let input = session
                        .find(&selector)
                        .await?
                        .ok_or_else(|| BoardError::FieldNotFound(name.clone()))?;
                    input.clear().await.ok();
                    input
                        .send_keys(value.as_str())
                        .await
                        .with_context(|| format!("Failed to type into '{name}'"))?;
                }
            }
        }
        Ok(())
    }

    async fn fill_cover(&self, session: &BrowserSession, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if let Some(textarea) = session.find(COVER).await? {
            textarea
                .send_keys(text)
                .await
                .context("Failed to fill cover text")?;
        }
        Ok(())
    }

    async fn submit(&self, session: &BrowserSession) -> Result<()> {
        let button = session
            .find(SUBMIT_BUTTON)
            .await?
            .ok_or_else(|| BoardError::MissingElement(SUBMIT_BUTTON.to_string()))?;
        button.click().await.context("Failed to click submit")?;

        let url = session
            .wait_for_url(|url| url.contains(SUCCESS_SUFFIX))
            .await?;
        if !url.contains(SUCCESS_SUFFIX) {
            return Err(BoardError::SubmissionUnconfirmed.into());
        }
        Ok(())
    }
}

fn map_field_kind(raw: &str) -> FieldKind {
    match raw {
        "multiple-choice" => FieldKind::Radio,
        "multiple-select" => FieldKind::Checkbox,
        "dropdown" => FieldKind::Select,
        "textarea" => FieldKind::Textarea,
        "text" => FieldKind::Text,
        // Anything Lever invents later degrades to a plain text box.
        _ => FieldKind::Text,
    }
}

fn css(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid selector '{selector}': {e}"))
}

fn attr_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::super::{RawField, RawOption};
    use super::*;

    const POSTING: &str = "https://jobs.lever.co/acme/2f4148ff-1207-4b0c-9658-95e496bf3417";

    #[test]
    fn test_matches_posting_urls_only() {
        let adapter = LeverAdapter;
        assert!(adapter.matches_url(POSTING));
        assert!(adapter.matches_url(&format!("{POSTING}/apply")));
        assert!(adapter.matches_url(&format!("{POSTING}?lever-origin=applied")));

        assert!(!adapter.matches_url("https://jobs.lever.co/acme"));
        assert!(!adapter.matches_url("https://jobs.lever.co/acme/not-a-uuid"));
        assert!(!adapter.matches_url("https://boards.greenhouse.io/acme/jobs/123"));
        assert!(!adapter.matches_url(&format!("{POSTING}/apply/extra")));
    }

    #[test]
    fn test_canonicalize_is_idempotent_and_order_independent() {
        let adapter = LeverAdapter;
        let variants = [
            POSTING.to_string(),
            format!("{POSTING}/apply"),
            format!("{POSTING}?lever-origin=applied"),
            format!("{POSTING}/apply?ref=search"),
        ];
        for variant in &variants {
            assert_eq!(adapter.canonicalize(variant), POSTING);
            // Canonicalizing a canonical link changes nothing.
            assert_eq!(adapter.canonicalize(&adapter.canonicalize(variant)), POSTING);
        }
    }

    fn sample_cards() -> Vec<RawFieldCard> {
        vec![RawFieldCard {
            name: "cards[abc123][baseTemplate]".to_string(),
            fields: vec![
                RawField {
                    kind: "multiple-choice".to_string(),
                    text: "Do you need visa sponsorship?".to_string(),
                    options: vec![
                        RawOption { text: "Yes".to_string() },
                        RawOption { text: "No".to_string() },
                    ],
                    required: true,
                },
                RawField {
                    kind: "multiple-select".to_string(),
                    text: "Which stacks have you shipped?".to_string(),
                    options: vec![
                        RawOption { text: "Rust".to_string() },
                        RawOption { text: "Go".to_string() },
                    ],
                    required: false,
                },
                RawField {
                    kind: "textarea".to_string(),
                    text: "Why this company?".to_string(),
                    options: vec![],
                    required: true,
                },
                RawField {
                    kind: "hologram".to_string(),
                    text: "Mystery question".to_string(),
                    options: vec![],
                    required: false,
                },
            ],
        }]
    }

    #[test]
    fn test_normalize_maps_lever_types_to_canonical_kinds() {
        let adapter = LeverAdapter;
        let fields = adapter.normalize(&sample_cards());

        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].kind, FieldKind::Radio);
        assert_eq!(fields[1].kind, FieldKind::Checkbox);
        assert_eq!(fields[2].kind, FieldKind::Textarea);
        // Unknown board types default to text.
        assert_eq!(fields[3].kind, FieldKind::Text);

        // Keys are derived from the card name, indexed per question.
        assert_eq!(fields[0].name, "cards[abc123][field0]");
        assert_eq!(fields[1].name, "cards[abc123][field1]");
        assert_eq!(fields[2].name, "cards[abc123][field2]");

        assert_eq!(
            fields[0].possible_values,
            Some(vec!["Yes".to_string(), "No".to_string()])
        );
        // Zero enumerated options means no possible_values at all.
        assert_eq!(fields[2].possible_values, None);
        assert!(fields[0].required);
        assert!(!fields[1].required);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let adapter = LeverAdapter;
        let cards = sample_cards();
        let first = adapter.normalize(&cards);
        let second = adapter.normalize(&cards);
        assert_eq!(first, second);
    }

    #[test]
    fn test_card_value_parses_lever_hidden_input_json() {
        let raw = r#"{"fields":[{"type":"dropdown","text":"Notice period?","options":[{"text":"1 month"}],"required":true}]}"#;
        let card: CardValue = serde_json::from_str(raw).unwrap();
        assert_eq!(card.fields.len(), 1);
        assert_eq!(card.fields[0].kind, "dropdown");
        assert_eq!(card.fields[0].options[0].text, "1 month");

        // Lever occasionally leaves the value empty; that is zero fields.
        let empty: CardValue = serde_json::from_str("{}").unwrap();
        assert!(empty.fields.is_empty());
    }

    #[test]
    fn test_attr_escape_handles_quotes() {
        assert_eq!(attr_escape(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(attr_escape("plain"), "plain");
    }
}
