mod ai;
mod boards;
mod browser;
mod config;
mod db;
mod error;
mod files;
mod models;
mod pipeline;
mod search;
mod tui;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ai::OpenAiProvider;
use config::Config;
use db::Database;
use error::SearchSignal;
use models::{LocationType, Status};
use pipeline::StageContext;
use search::{GoogleSearchProvider, SearchEngine, SearchSpec, SessionEnd};
use ui::{Prompter, TerminalPrompter};

#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Job application automation - search postings, scrape them, and apply")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and config scaffolding
    Init,

    /// Search a job board and store newly discovered postings
    Search {
        /// Free-text search query
        query: String,

        /// Comma-separated keywords that must appear
        #[arg(short, long, default_value = "")]
        keywords: String,

        /// Job board to search
        #[arg(short, long, default_value = "lever")]
        board: String,

        /// Two-letter country code, or "global"
        #[arg(short, long, default_value = "global")]
        country: String,

        /// remote, on-site, or hybrid
        #[arg(short, long)]
        location_type: Option<LocationType>,

        /// Resume to attach to jobs found by this search
        #[arg(short, long)]
        resume: Option<String>,

        /// Fetch up to this many pages without asking between pages
        #[arg(short, long)]
        pages: Option<u32>,
    },

    /// Scrape discovered jobs: description, details, custom questions
    Scrape {
        /// Number of jobs to scrape
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Review scraped jobs interactively
    Review,

    /// Draft answers for reviewed jobs' custom questions
    Prepare {
        /// Number of jobs to prepare
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Fill and submit prepared applications
    Apply {
        /// Number of jobs to apply to
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Process one job end to end, interactively, until none are left
    Live,

    /// List jobs
    List {
        /// Filter by status (e.g. Discovered, Scraped, "Not Found")
        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());

            let config_path = Config::default_path();
            if config_path.exists() {
                println!("Config already present at {}", config_path.display());
            } else {
                Config::write_template(&config_path)?;
                println!("Config template written to {}", config_path.display());
                println!("Fill in your profile before running a live session.");
            }
        }

        Commands::Search {
            query,
            keywords,
            board,
            country,
            location_type,
            resume,
            pages,
        } => {
            db.ensure_initialized()?;
            // Search runs fine before the profile is filled in.
            let config = Config::load().unwrap_or_default();

            if let Some(name) = &resume {
                files::resume_path(&config.resumes_dir, name)
                    .with_context(|| format!("Resume '{name}' not found"))?;
            }

            let provider = GoogleSearchProvider::from_env()?;
            let engine = SearchEngine::new(&db, &provider);
            let spec = SearchSpec {
                query,
                keywords,
                board,
                country,
                location_type: location_type.unwrap_or(config.preferences.location_type),
                resume,
            };

            let mut prompter = TerminalPrompter;
            let result = engine
                .run_session(&spec, |summary| {
                    println!(
                        "Page {}: {} new, {} duplicate(s) so far.",
                        summary.pages, summary.stored, summary.duplicates
                    );
                    match pages {
                        Some(n) => summary.pages < n,
                        None => prompter
                            .confirm("Process more pages?", true)
                            .unwrap_or(false),
                    }
                })
                .await;

            match result {
                Ok(summary) => {
                    match summary.end {
                        SessionEnd::MaxPagesReached => println!("Reached the ten-page cap."),
                        SessionEnd::NoResults => println!("No further results."),
                        SessionEnd::Stopped => {}
                    }
                    println!(
                        "Stored {} new job(s) across {} page(s); {} duplicate(s) skipped.",
                        summary.stored, summary.pages, summary.duplicates
                    );
                }
                Err(e) if matches!(e.downcast_ref::<SearchSignal>(), Some(SearchSignal::NoResults)) => {
                    println!("No results found.");
                }
                Err(e) => return Err(e),
            }
        }

        Commands::Scrape { limit } => {
            db.ensure_initialized()?;
            let config = Config::load()?;
            let ai = OpenAiProvider::from_env()?;
            let ctx = StageContext {
                db: &db,
                config: &config,
                ai: &ai,
            };
            pipeline::scrape::run_bulk(&ctx, limit.unwrap_or(config.preferences.bulk_size)).await?;
        }

        Commands::Review => {
            db.ensure_initialized()?;
            let config = Config::load()?;
            pipeline::review::run_bulk(&db, &config)?;
        }

        Commands::Prepare { limit } => {
            db.ensure_initialized()?;
            let config = Config::load()?;
            let ai = OpenAiProvider::from_env()?;
            let ctx = StageContext {
                db: &db,
                config: &config,
                ai: &ai,
            };
            pipeline::prepare::run_bulk(&ctx, limit.unwrap_or(config.preferences.bulk_size)).await?;
        }

        Commands::Apply { limit } => {
            db.ensure_initialized()?;
            let config = Config::load()?;
            let ai = OpenAiProvider::from_env()?;
            let ctx = StageContext {
                db: &db,
                config: &config,
                ai: &ai,
            };
            pipeline::apply::run_bulk(&ctx, limit.unwrap_or(config.preferences.bulk_size)).await?;
        }

        Commands::Live => {
            db.ensure_initialized()?;
            let config = Config::load()?;
            let ai = OpenAiProvider::from_env()?;
            let ctx = StageContext {
                db: &db,
                config: &config,
                ai: &ai,
            };
            let mut prompter = TerminalPrompter;
            pipeline::live::run(&ctx, &mut prompter).await?;
        }

        Commands::List { status } => {
            db.ensure_initialized()?;
            let jobs = db.list_jobs(status)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<6} {:<15} {:<40} {:<8} {:<7} {:>5}",
                    "ID", "STATUS", "TITLE", "BOARD", "FIELDS", "AGE"
                );
                println!("{}", "-".repeat(86));
                for job in jobs {
                    println!(
                        "{:<6} {:<15} {:<40} {:<8} {:<7} {:>5}",
                        job.id,
                        job.status.as_str(),
                        truncate(&job.title, 38),
                        job.board,
                        job.custom_fields.len(),
                        format_age(&job.timestamp)
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_job_by_id(id)? {
                Some(job) => {
                    ui::print_job_details(&job);
                    println!("Status: {}", job.status);
                    if !job.custom_fields.is_empty() {
                        println!();
                        println!("Custom questions:");
                        for field in &job.custom_fields {
                            let required = if field.required { " (required)" } else { "" };
                            println!("  [{:?}] {}{}", field.kind, field.label, required);
                            if let Some(answer) = job.answer_for(&field.name) {
                                for line in textwrap::wrap(&answer.answer.to_string(), 66) {
                                    println!("      {line}");
                                }
                            }
                        }
                    }
                    if let Some(description) = &job.description {
                        println!();
                        println!("--- Description ---");
                        println!("{description}");
                    }
                }
                None => {
                    println!("Job #{id} not found.");
                }
            }
        }
    }

    Ok(())
}

/// Rough age of a `datetime('now')` timestamp, for the list view.
fn format_age(timestamp: &str) -> String {
    let Ok(then) = chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S") else {
        return "-".to_string();
    };
    let age = chrono::Utc::now().naive_utc() - then;
    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
