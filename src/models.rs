use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a job. Persisted as the display string, spaces and all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Discovered,
    Scraped,
    Reviewed,
    Prepared,
    Applied,
    Rejected,
    Timeout,
    #[serde(rename = "Not Found")]
    NotFound,
    #[serde(rename = "Not Qualified")]
    NotQualified,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Not Ready")]
    NotReady,
    Ready,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Discovered => "Discovered",
            Status::Scraped => "Scraped",
            Status::Reviewed => "Reviewed",
            Status::Prepared => "Prepared",
            Status::Applied => "Applied",
            Status::Rejected => "Rejected",
            Status::Timeout => "Timeout",
            Status::NotFound => "Not Found",
            Status::NotQualified => "Not Qualified",
            Status::NotInterested => "Not Interested",
            Status::NotReady => "Not Ready",
            Status::Ready => "Ready",
        }
    }

    pub const ALL: [Status; 12] = [
        Status::Discovered,
        Status::Scraped,
        Status::Reviewed,
        Status::Prepared,
        Status::Applied,
        Status::Rejected,
        Status::Timeout,
        Status::NotFound,
        Status::NotQualified,
        Status::NotInterested,
        Status::NotReady,
        Status::Ready,
    ];

    /// Statuses a job never leaves on its own. Kept for audit and dedup.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::NotFound | Status::NotInterested | Status::NotQualified | Status::Rejected
        )
    }

    /// Legal forward edges of the lifecycle graph. Staying put is always
    /// allowed (re-running a stage refreshes data without moving the job).
    pub fn may_advance_to(&self, next: Status) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Status::Discovered => matches!(next, Status::Scraped | Status::NotFound),
            Status::Scraped => matches!(
                next,
                Status::Reviewed | Status::NotInterested | Status::Applied
            ),
            Status::Reviewed => matches!(
                next,
                Status::Prepared | Status::NotQualified | Status::NotInterested
            ),
            Status::Prepared => matches!(
                next,
                Status::Applied
                    | Status::Timeout
                    | Status::Ready
                    | Status::NotReady
                    | Status::NotQualified
                    | Status::NotInterested
            ),
            Status::Ready => matches!(next, Status::Applied),
            Status::NotReady => matches!(next, Status::Ready | Status::Applied),
            // Timeout means "submitted, outcome unknown" and is resolved by hand.
            Status::Timeout => matches!(next, Status::Applied | Status::Rejected),
            Status::Applied => matches!(next, Status::Rejected),
            _ => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown status '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub search_id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub details: Option<JobDetails>,
    pub board: String,
    pub resume: Option<String>,
    pub custom_fields: Vec<CanonicalField>,
    pub custom_fields_answers: Vec<FieldAnswer>,
    pub status: Status,
    pub timestamp: String,
}

impl Job {
    pub fn answer_for(&self, field_name: &str) -> Option<&FieldAnswer> {
        self.custom_fields_answers.iter().find(|a| a.key == field_name)
    }
}

/// A job as it comes out of search, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub search_id: i64,
    pub title: String,
    pub link: String,
    pub board: String,
    pub resume: Option<String>,
}

/// Structured detail extracted from the job description by the AI collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(default)]
    pub technical_skills: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_field: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub seniority: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Remote,
    OnSite,
    Hybrid,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Remote => "remote",
            LocationType::OnSite => "on-site",
            LocationType::Hybrid => "hybrid",
        }
    }
}

impl FromStr for LocationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(LocationType::Remote),
            "on-site" | "onsite" => Ok(LocationType::OnSite),
            "hybrid" => Ok(LocationType::Hybrid),
            other => Err(anyhow::anyhow!("Unknown location type '{}'", other)),
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tuple that identifies a resumable search session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    pub query: String,
    pub keywords: String,
    pub board: String,
    pub country: String,
    pub location_type: LocationType,
}

impl SearchKey {
    pub fn new(
        query: &str,
        keywords: &str,
        board: &str,
        country: &str,
        location_type: LocationType,
    ) -> Self {
        Self {
            query: query.to_lowercase(),
            keywords: keywords.to_lowercase(),
            board: board.to_string(),
            country: country.to_string(),
            location_type,
        }
    }
}

/// One executed search page. Appended per fetch, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: i64,
    pub query: String,
    pub keywords: String,
    pub board: String,
    pub country: String,
    pub location_type: LocationType,
    pub starts_at: u32,
    pub timestamp: String,
}

/// Semantic type of a board question after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
}

impl FieldKind {
    /// Only enumerated kinds carry possible_values.
    pub fn is_enumerated(&self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::Radio | FieldKind::Checkbox)
    }
}

/// Board-agnostic representation of one application question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_values: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

/// A single answer, or the selected subset for multi-select questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    One(String),
    Many(Vec<String>),
}

impl AnswerValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            AnswerValue::One(v) => vec![v.as_str()],
            AnswerValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            AnswerValue::One(v) => Some(v.as_str()),
            AnswerValue::Many(_) => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::One(v) => f.write_str(v),
            AnswerValue::Many(vs) => f.write_str(&vs.join(", ")),
        }
    }
}

/// AI- or human-supplied answer to one canonical field. The question text is
/// kept alongside for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnswer {
    pub key: String,
    pub question: String,
    pub answer: AnswerValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in Status::ALL {
            let parsed: Status = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!("Not Found".parse::<Status>().unwrap(), Status::NotFound);
        assert!("Unknown".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serde_uses_display_strings() {
        let json = serde_json::to_string(&Status::NotInterested).unwrap();
        assert_eq!(json, "\"Not Interested\"");
        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Status::NotInterested);
    }

    #[test]
    fn test_lifecycle_moves_forward_only() {
        assert!(Status::Discovered.may_advance_to(Status::Scraped));
        assert!(Status::Discovered.may_advance_to(Status::NotFound));
        assert!(Status::Scraped.may_advance_to(Status::Reviewed));
        assert!(Status::Scraped.may_advance_to(Status::Applied));
        assert!(Status::Reviewed.may_advance_to(Status::Prepared));
        assert!(Status::Prepared.may_advance_to(Status::Applied));
        assert!(Status::Prepared.may_advance_to(Status::Timeout));

        // No backward edges.
        assert!(!Status::Scraped.may_advance_to(Status::Discovered));
        assert!(!Status::Prepared.may_advance_to(Status::Reviewed));
        assert!(!Status::Applied.may_advance_to(Status::Prepared));

        // Terminal statuses only sit still.
        for terminal in [Status::NotFound, Status::NotInterested, Status::NotQualified] {
            for next in Status::ALL {
                if next != terminal {
                    assert!(!terminal.may_advance_to(next), "{terminal} -> {next}");
                }
            }
        }
    }

    #[test]
    fn test_answer_value_shapes() {
        let one = AnswerValue::One("Yes".into());
        assert_eq!(one.values(), vec!["Yes"]);
        assert_eq!(one.as_single(), Some("Yes"));

        let many = AnswerValue::Many(vec!["A".into(), "B".into()]);
        assert_eq!(many.values().len(), 2);
        assert_eq!(many.as_single(), None);

        // Untagged serde keeps plain strings plain.
        assert_eq!(serde_json::to_string(&one).unwrap(), "\"Yes\"");
        assert_eq!(serde_json::to_string(&many).unwrap(), "[\"A\",\"B\"]");
    }

    #[test]
    fn test_field_kind_enumeration() {
        assert!(FieldKind::Select.is_enumerated());
        assert!(FieldKind::Radio.is_enumerated());
        assert!(!FieldKind::Text.is_enumerated());
        assert!(!FieldKind::Textarea.is_enumerated());
    }
}
