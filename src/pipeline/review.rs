use anyhow::Result;

use crate::config::Config;
use crate::db::Database;
use crate::files;
use crate::models::{Job, Status};
use crate::tui;
use crate::ui::{Prompter, ReviewDecision, print_job_details, review_prompt};

/// Move a job according to the human's decision. Swapping the resume keeps
/// the job on the happy path.
pub fn apply_decision(job: &mut Job, decision: ReviewDecision) {
    match decision {
        ReviewDecision::Proceed => job.status = Status::Reviewed,
        ReviewDecision::Skip => job.status = Status::NotInterested,
        ReviewDecision::Duplicate => job.status = Status::Applied,
        ReviewDecision::SwapResume(resume) => {
            job.resume = Some(resume);
            job.status = Status::Reviewed;
        }
    }
}

/// Inline review for live mode: show the details box, ask, apply.
pub fn review_job(config: &Config, prompter: &mut dyn Prompter, job: &mut Job) -> Result<()> {
    print_job_details(job);
    let resumes = files::list_resumes(&config.resumes_dir).unwrap_or_default();
    let decision = review_prompt(prompter, job, &resumes)?;
    apply_decision(job, decision);
    Ok(())
}

/// Bulk mode: full-screen browse over every Scraped job.
pub fn run_bulk(db: &Database, config: &Config) -> Result<()> {
    let jobs = db.list_jobs(Some(Status::Scraped))?;
    if jobs.is_empty() {
        println!("No jobs to review.");
        return Ok(());
    }
    let resumes = files::list_resumes(&config.resumes_dir).unwrap_or_default();
    tui::run_review(db, jobs, resumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Job;

    fn job() -> Job {
        Job {
            id: 1,
            search_id: 1,
            title: "Backend Engineer".to_string(),
            link: "https://jobs.lever.co/acme/x".to_string(),
            description: None,
            details: None,
            board: "lever".to_string(),
            resume: Some("default.pdf".to_string()),
            custom_fields: vec![],
            custom_fields_answers: vec![],
            status: Status::Scraped,
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_proceed_marks_reviewed() {
        let mut job = job();
        apply_decision(&mut job, ReviewDecision::Proceed);
        assert_eq!(job.status, Status::Reviewed);
    }

    #[test]
    fn test_skip_marks_not_interested() {
        let mut job = job();
        apply_decision(&mut job, ReviewDecision::Skip);
        assert_eq!(job.status, Status::NotInterested);
    }

    #[test]
    fn test_duplicate_short_circuits_to_applied() {
        let mut job = job();
        apply_decision(&mut job, ReviewDecision::Duplicate);
        assert_eq!(job.status, Status::Applied);
    }

    #[test]
    fn test_swap_updates_resume_and_proceeds() {
        let mut job = job();
        apply_decision(&mut job, ReviewDecision::SwapResume("ml.pdf".to_string()));
        assert_eq!(job.resume.as_deref(), Some("ml.pdf"));
        assert_eq!(job.status, Status::Reviewed);
    }

    #[test]
    fn test_every_decision_is_a_legal_transition() {
        for decision in [
            ReviewDecision::Proceed,
            ReviewDecision::Skip,
            ReviewDecision::Duplicate,
            ReviewDecision::SwapResume("a.pdf".to_string()),
        ] {
            let mut job = job();
            let before = job.status;
            apply_decision(&mut job, decision);
            assert!(before.may_advance_to(job.status));
        }
    }
}
