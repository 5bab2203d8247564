use anyhow::Result;

use crate::ai;
use crate::boards::{self, BoardAdapter};
use crate::browser::BrowserSession;
use crate::error::{BoardError, StageError};
use crate::files;
use crate::models::{Job, Status};
use crate::ui::Prompter;

use super::StageContext;

/// Every required field must have a stored, in-range answer before the form
/// is touched.
fn check_required_answers(job: &Job) -> Result<()> {
    for field in &job.custom_fields {
        if field.required && job.answer_for(&field.name).is_none() {
            return Err(StageError::MissingAnswer(field.name.clone()).into());
        }
    }
    ai::validate_answers(&job.custom_fields, &job.custom_fields_answers)
}

/// How to settle a submission the board would not confirm. Interactive runs
/// ask the human; bulk runs park the job as Timeout for manual review rather
/// than guessing.
pub fn unconfirmed_status(human_confirmation: Option<bool>) -> Result<Status> {
    match human_confirmation {
        Some(true) => Ok(Status::Applied),
        Some(false) => Err(BoardError::SubmissionUnconfirmed.into()),
        None => Ok(Status::Timeout),
    }
}

/// Fill and submit one prepared job. `prompter` being Some makes the run
/// interactive: the human gets the regeneration loop before submit and the
/// final say on an unconfirmed submission.
pub async fn apply_job(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    job: &mut Job,
    mut prompter: Option<&mut dyn Prompter>,
) -> Result<()> {
    let adapter = boards::resolve(&job.board)?;
    check_required_answers(job)?;

    let resume = job
        .resume
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Job #{} has no resume selected", job.id))?;
    let resume = files::resume_path(&ctx.config.resumes_dir, &resume)?;

    adapter.navigate_to_application(session, job).await?;
    adapter.upload_resume(session, &resume).await?;
    adapter.fill_personal_info(session, &ctx.config.profile).await?;

    for field in &job.custom_fields {
        if let Some(answer) = job.answer_for(&field.name) {
            let answer = answer.answer.clone();
            adapter.fill_field(session, field, &answer).await?;
        }
    }

    adapter.fill_cover(session, &ctx.config.default_cover).await?;

    if let Some(prompter) = prompter.as_deref_mut() {
        adjust_answers(ctx, session, adapter, prompter, job).await?;
    }

    match adapter.submit(session).await {
        Ok(()) => {
            job.status = Status::Applied;
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<BoardError>(), Some(BoardError::SubmissionUnconfirmed)) => {
            let confirmation = match prompter {
                Some(prompter) => Some(prompter.confirm(
                    "The board did not confirm the submission. Did it go through?",
                    false,
                )?),
                None => None,
            };
            job.status = unconfirmed_status(confirmation)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Let the human pick any answered question, give free-text instructions, and
/// have just that answer redrafted and re-filled, until they are satisfied.
async fn adjust_answers(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    adapter: &dyn BoardAdapter,
    prompter: &mut dyn Prompter,
    job: &mut Job,
) -> Result<()> {
    if job.custom_fields.is_empty() {
        return Ok(());
    }

    loop {
        let mut options = vec!["All good, proceed to submit".to_string()];
        options.extend(job.custom_fields.iter().map(|f| f.label.clone()));

        let pick = prompter.choose(
            "Pick a question to regenerate, or proceed to submit.",
            &options,
        )?;
        if pick == 0 {
            return Ok(());
        }

        let field = job.custom_fields[pick - 1].clone();
        let instructions = prompter.input(
            "Instructions for the AI to regenerate this answer",
            "Make it better, please.",
        )?;

        let knowledge_base = files::load_knowledge_base(&ctx.config.knowledge_base)?;
        let redrafted = ai::generate_answers(
            ctx.ai,
            std::slice::from_ref(&field),
            &knowledge_base,
            job.details.as_ref(),
            Some(&instructions),
        )
        .await?;

        let Some(new_answer) = redrafted.into_iter().find(|a| a.key == field.name) else {
            eprintln!("The AI did not return an answer for '{}'.", field.label);
            continue;
        };

        adapter.fill_field(session, &field, &new_answer.answer).await?;
        if let Some(existing) = job
            .custom_fields_answers
            .iter_mut()
            .find(|a| a.key == field.name)
        {
            *existing = new_answer;
        } else {
            job.custom_fields_answers.push(new_answer);
        }
        println!("Answer updated.");
    }
}

/// Bulk mode: apply up to `limit` Prepared jobs, persisting after each.
/// Submissions the board will not confirm are parked as Timeout.
pub async fn run_bulk(ctx: &StageContext<'_>, limit: usize) -> Result<()> {
    let jobs = ctx.db.get_jobs(Status::Prepared, limit)?;
    if jobs.is_empty() {
        println!("No jobs to apply to.");
        return Ok(());
    }

    let session = BrowserSession::connect(&ctx.config.webdriver_url, false).await?;
    let result = apply_batch(ctx, &session, jobs).await;
    session.close().await.ok();
    result
}

async fn apply_batch(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    jobs: Vec<Job>,
) -> Result<()> {
    for mut job in jobs {
        println!("{}", "-".repeat(72));
        println!("Applying: {}", job.title);

        match apply_job(ctx, session, &mut job, None).await {
            Ok(()) => {
                ctx.db.update_job(&job)?;
                match job.status {
                    Status::Timeout => {
                        println!("Submission unconfirmed; parked as Timeout for manual review.")
                    }
                    _ => println!("Applied."),
                }
            }
            Err(e) => {
                eprintln!("Failed to apply to job #{}: {e:#}", job.id);
            }
        }
    }
    Ok(())
}
