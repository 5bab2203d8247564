use anyhow::Result;

use crate::ai;
use crate::boards;
use crate::browser::{BrowserSession, WaitUntil};
use crate::models::{Job, Status};

use super::StageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Scraped,
    NotFound,
}

/// Scrape one job in place: description, AI-extracted details, and the
/// normalized custom-field schema from the application form.
///
/// Safe to re-run on an already-Scraped job; it only refreshes the scraped
/// data. A navigation or extraction error propagates without touching the
/// job's status, leaving it eligible for retry.
pub async fn scrape_job(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    job: &mut Job,
) -> Result<ScrapeOutcome> {
    let adapter = boards::resolve(&job.board)?;

    session.goto(&job.link, WaitUntil::DomContentLoaded).await?;

    let title = session.title().await?;
    if title.contains("404") {
        job.status = Status::NotFound;
        return Ok(ScrapeOutcome::NotFound);
    }

    let description = adapter.scrape_description(session).await?;
    job.details = Some(ai::extract_job_details(ctx.ai, &description).await?);
    job.description = Some(description);

    // The custom questions live on the application form. Prepare consumes
    // them from the store, without a browser.
    adapter.navigate_to_application(session, job).await?;
    let raw = adapter.scrape_raw_fields(session).await?;
    job.custom_fields = adapter.normalize(&raw);

    job.status = Status::Scraped;
    Ok(ScrapeOutcome::Scraped)
}

/// Bulk mode: scrape up to `limit` Discovered jobs, persisting after each.
pub async fn run_bulk(ctx: &StageContext<'_>, limit: usize) -> Result<()> {
    let jobs = ctx.db.get_jobs(Status::Discovered, limit)?;
    if jobs.is_empty() {
        println!("No jobs to scrape.");
        return Ok(());
    }

    println!("Bulk scraping {} job(s)", jobs.len());
    let session = BrowserSession::connect(&ctx.config.webdriver_url, true).await?;
    let result = scrape_batch(ctx, &session, jobs).await;
    session.close().await.ok();
    result
}

async fn scrape_batch(
    ctx: &StageContext<'_>,
    session: &BrowserSession,
    jobs: Vec<Job>,
) -> Result<()> {
    for mut job in jobs {
        println!("{}", "-".repeat(72));
        println!("Scraping: {}", job.title);
        println!("{}", job.link);

        match scrape_job(ctx, session, &mut job).await {
            Ok(ScrapeOutcome::Scraped) => {
                ctx.db.update_job(&job)?;
                println!("Scraped ({} custom field(s)).", job.custom_fields.len());
            }
            Ok(ScrapeOutcome::NotFound) => {
                ctx.db.update_job(&job)?;
                println!("Posting is gone; marked Not Found.");
            }
            Err(e) => {
                // Status untouched; the job stays Discovered for a retry.
                eprintln!("Failed to scrape job #{}: {e:#}", job.id);
            }
        }
    }
    Ok(())
}
