use anyhow::Result;

use crate::browser::BrowserSession;
use crate::models::{Job, Status};
use crate::ui::Prompter;

use super::{StageContext, apply, prepare, review, scrape};

/// Live mode: pull one Discovered job at a time and walk it through
/// scrape → review → prepare → apply in a single interactive session.
///
/// A terminal status from any stage aborts the rest of the chain for that job
/// only; the job is persisted in whatever status it reached and the loop
/// pulls the next one.
pub async fn run(ctx: &StageContext<'_>, prompter: &mut dyn Prompter) -> Result<()> {
    loop {
        let Some(mut job) = ctx.db.get_job(Status::Discovered)? else {
            println!("No jobs to process.");
            return Ok(());
        };

        println!("{}", "=".repeat(72));
        println!("Processing: {}", job.title);
        println!("{}", job.link);

        let session = BrowserSession::connect(&ctx.config.webdriver_url, false).await?;
        let outcome = process_job(ctx, &session, prompter, &mut job).await;
        session.close().await.ok();

        if let Err(e) = outcome {
            eprintln!("Error while handling job #{}: {e:#}", job.id);
        }
        // Whatever the chain reached is what gets recorded.
        ctx.db.update_job(&job)?;
        println!("Job #{} finished as {}.", job.id, job.status);

        if !prompter.confirm("Load the next job?", true)? {
            return Ok(());
        }
    }
}

async fn process_job(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    prompter: &mut dyn Prompter,
    job: &mut Job,
) -> Result<()> {
    scrape::scrape_job(ctx, session, job).await?;
    if job.status.is_terminal() {
        return Ok(());
    }

    review::review_job(ctx.config, prompter, job)?;
    if job.status != Status::Reviewed {
        return Ok(());
    }

    prepare::prepare_job(ctx, job).await?;
    if job.status != Status::Prepared {
        return Ok(());
    }

    apply::apply_job(ctx, session, job, Some(prompter)).await
}
