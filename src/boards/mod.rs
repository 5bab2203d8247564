mod lever;

pub use lever::LeverAdapter;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::browser::BrowserSession;
use crate::config::Profile;
use crate::error::StageError;
use crate::models::{AnswerValue, CanonicalField, FieldKind, Job};

/// One board-native card of application questions, as scraped off the page.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFieldCard {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<RawOption>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    #[serde(default)]
    pub text: String,
}

/// Per-board capability set. Stage logic only ever talks to this trait; adding
/// a board means implementing it and registering the implementation in
/// `resolve`.
#[async_trait]
pub trait BoardAdapter: Send + Sync {
    fn id(&self) -> &'static str;

    /// Domain used for the site: restriction in search queries.
    fn search_domain(&self) -> &'static str;

    /// Does this URL point at a posting on this board?
    fn matches_url(&self, url: &str) -> bool;

    /// Strip the apply suffix and query string down to the dedup key.
    fn canonicalize(&self, url: &str) -> String;

    /// Deterministic mapping from the board-native schema to canonical fields.
    fn normalize(&self, cards: &[RawFieldCard]) -> Vec<CanonicalField>;

    async fn scrape_description(&self, session: &BrowserSession) -> Result<String>;

    async fn scrape_raw_fields(&self, session: &BrowserSession) -> Result<Vec<RawFieldCard>>;

    async fn navigate_to_application(&self, session: &BrowserSession, job: &Job) -> Result<()>;

    async fn upload_resume(&self, session: &BrowserSession, resume: &Path) -> Result<()>;

    async fn fill_personal_info(&self, session: &BrowserSession, profile: &Profile) -> Result<()>;

    async fn fill_field(
        &self,
        session: &BrowserSession,
        field: &CanonicalField,
        answer: &AnswerValue,
    ) -> Result<()>;

    async fn fill_cover(&self, session: &BrowserSession, text: &str) -> Result<()>;

    /// Click submit and verify the board's success signal. Raises
    /// `BoardError::SubmissionUnconfirmed` when the signal never shows.
    async fn submit(&self, session: &BrowserSession) -> Result<()>;
}

static LEVER: LeverAdapter = LeverAdapter;

/// Look up the adapter for a board identifier.
pub fn resolve(board: &str) -> Result<&'static dyn BoardAdapter> {
    match board {
        "lever" => Ok(&LEVER),
        other => Err(StageError::UnsupportedBoard(other.to_string()).into()),
    }
}

/// A single concrete form interaction, planned before touching the page.
#[derive(Debug, Clone, PartialEq)]
pub enum FillAction {
    /// Click the option input carrying this value (checkbox/radio).
    ClickOption { name: String, value: String },
    /// Pick one option from a select element.
    SelectOption { name: String, value: String },
    /// Clear the input and type the answer (text/textarea).
    TypeText { name: String, value: String },
}

/// Plan the interactions for one field. Pure dispatch on the canonical kind:
/// checkboxes click once per chosen value, radio/select pick exactly one,
/// text kinds type the answer.
pub fn fill_plan(field: &CanonicalField, answer: &AnswerValue) -> Result<Vec<FillAction>> {
    match field.kind {
        FieldKind::Checkbox => {
            let values = answer.values();
            if values.is_empty() {
                return Err(anyhow!("Empty answer for checkbox field '{}'", field.name));
            }
            Ok(values
                .into_iter()
                .map(|value| FillAction::ClickOption {
                    name: field.name.clone(),
                    value: value.to_string(),
                })
                .collect())
        }
        FieldKind::Radio => {
            let value = single_value(field, answer)?;
            Ok(vec![FillAction::ClickOption {
                name: field.name.clone(),
                value,
            }])
        }
        FieldKind::Select => {
            let value = single_value(field, answer)?;
            Ok(vec![FillAction::SelectOption {
                name: field.name.clone(),
                value,
            }])
        }
        FieldKind::Text | FieldKind::Textarea => {
            let value = match answer {
                AnswerValue::One(v) => v.clone(),
                AnswerValue::Many(vs) => vs.join(", "),
            };
            Ok(vec![FillAction::TypeText {
                name: field.name.clone(),
                value,
            }])
        }
    }
}

fn single_value(field: &CanonicalField, answer: &AnswerValue) -> Result<String> {
    match answer {
        AnswerValue::One(v) => Ok(v.clone()),
        AnswerValue::Many(vs) if vs.len() == 1 => Ok(vs[0].clone()),
        AnswerValue::Many(_) => Err(anyhow!(
            "Field '{}' takes exactly one value",
            field.name
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind) -> CanonicalField {
        CanonicalField {
            kind,
            name: "field0".to_string(),
            label: "Which tools have you used?".to_string(),
            possible_values: Some(vec!["A".to_string(), "B".to_string(), "C".to_string()]),
            required: true,
        }
    }

    #[test]
    fn test_resolve_known_board() {
        let adapter = resolve("lever").unwrap();
        assert_eq!(adapter.id(), "lever");
    }

    #[test]
    fn test_resolve_unknown_board_is_typed() {
        let err = resolve("workday").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::UnsupportedBoard(b)) if b == "workday"
        ));
    }

    #[test]
    fn test_checkbox_plan_clicks_once_per_value() {
        let answer = AnswerValue::Many(vec!["A".to_string(), "C".to_string()]);
        let plan = fill_plan(&field(FieldKind::Checkbox), &answer).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|a| matches!(a, FillAction::ClickOption { .. })));
    }

    #[test]
    fn test_radio_and_select_plan_exactly_one_selection() {
        let answer = AnswerValue::One("B".to_string());

        let plan = fill_plan(&field(FieldKind::Radio), &answer).unwrap();
        assert_eq!(
            plan,
            vec![FillAction::ClickOption {
                name: "field0".to_string(),
                value: "B".to_string()
            }]
        );

        let plan = fill_plan(&field(FieldKind::Select), &answer).unwrap();
        assert_eq!(
            plan,
            vec![FillAction::SelectOption {
                name: "field0".to_string(),
                value: "B".to_string()
            }]
        );

        let many = AnswerValue::Many(vec!["A".to_string(), "B".to_string()]);
        assert!(fill_plan(&field(FieldKind::Radio), &many).is_err());
    }

    #[test]
    fn test_text_plan_types_joined_answer() {
        let answer = AnswerValue::One("Five years".to_string());
        let plan = fill_plan(&field(FieldKind::Textarea), &answer).unwrap();
        assert_eq!(
            plan,
            vec![FillAction::TypeText {
                name: "field0".to_string(),
                value: "Five years".to_string()
            }]
        );
    }

    #[test]
    fn test_checkbox_plan_accepts_single_value() {
        // A lone string still means one click.
        let answer = AnswerValue::One("A".to_string());
        let plan = fill_plan(&field(FieldKind::Checkbox), &answer).unwrap();
        assert_eq!(plan.len(), 1);
    }
}
