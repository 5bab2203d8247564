use thiserror::Error;

/// Expected ends of a search session. Control flow, not failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchSignal {
    /// The engine refuses to page past the provider's offset ceiling.
    #[error("Maximum number of search pages reached")]
    MaxPagesReached,
    #[error("Search returned no results")]
    NoResults,
}

/// Failures raised by a board adapter against a live page.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("No matching input for custom field '{0}'")]
    FieldNotFound(String),
    #[error("Expected element '{0}' not found on page")]
    MissingElement(String),
    /// The board gave no deterministic success signal after submit. Only a
    /// human can decide whether the application actually went through.
    #[error("Submission could not be confirmed")]
    SubmissionUnconfirmed,
}

/// Outcomes of an AI completion that the caller may want to retry rather than
/// treat as a hard failure.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI refused to answer: {0}")]
    Refusal(String),
    #[error("AI response was cut off at the length limit")]
    Truncated,
}

/// Per-job failures during a pipeline stage. Fatal to the job, never to the
/// batch.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Unsupported board '{0}'")]
    UnsupportedBoard(String),
    #[error("Knowledge base not found at '{0}'")]
    KnowledgeBaseNotFound(String),
    #[error("No resumes found in '{0}'")]
    NoResumesFound(String),
    /// The AI response did not cover every required field, or an enumerated
    /// answer was off-list. Retryable.
    #[error("AI answers incomplete: {0}")]
    AnswersIncomplete(String),
    #[error("Required field '{0}' has no stored answer")]
    MissingAnswer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_survive_anyhow_downcast() {
        let err: anyhow::Error = SearchSignal::MaxPagesReached.into();
        assert!(matches!(
            err.downcast_ref::<SearchSignal>(),
            Some(SearchSignal::MaxPagesReached)
        ));

        let err: anyhow::Error = BoardError::SubmissionUnconfirmed.into();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::SubmissionUnconfirmed)
        ));

        let err: anyhow::Error = StageError::UnsupportedBoard("workday".into()).into();
        assert!(err.to_string().contains("workday"));
    }
}
