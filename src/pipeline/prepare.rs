use anyhow::Result;

use crate::ai;
use crate::files;
use crate::models::{Job, Status};

use super::StageContext;

/// Draft answers for a reviewed job's custom questions. A job with no custom
/// fields passes straight through without an AI call.
pub async fn prepare_job(ctx: &StageContext<'_>, job: &mut Job) -> Result<()> {
    if job.custom_fields.is_empty() {
        job.status = Status::Prepared;
        return Ok(());
    }

    let knowledge_base = files::load_knowledge_base(&ctx.config.knowledge_base)?;
    let answers = ai::generate_answers(
        ctx.ai,
        &job.custom_fields,
        &knowledge_base,
        job.details.as_ref(),
        None,
    )
    .await?;

    job.custom_fields_answers = answers;
    job.status = Status::Prepared;
    Ok(())
}

/// Bulk mode: prepare up to `limit` Reviewed jobs, persisting after each.
pub async fn run_bulk(ctx: &StageContext<'_>, limit: usize) -> Result<()> {
    let jobs = ctx.db.get_jobs(Status::Reviewed, limit)?;
    if jobs.is_empty() {
        println!("No jobs to prepare.");
        return Ok(());
    }

    for mut job in jobs {
        match prepare_job(ctx, &mut job).await {
            Ok(()) => {
                ctx.db.update_job(&job)?;
                println!(
                    "Prepared #{} ({} answer(s)).",
                    job.id,
                    job.custom_fields_answers.len()
                );
            }
            Err(e) => {
                eprintln!("Failed to prepare job #{}: {e:#}", job.id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::StubProvider;
    use crate::config::Config;
    use crate::db::Database;
    use crate::models::{CanonicalField, FieldKind, NewJob, SearchKey};

    fn test_config() -> Config {
        serde_json::from_str(
            r#"{"profile": {"first_name": "A", "last_name": "B",
                "email": "a@b.c", "phone": "1"}}"#,
        )
        .unwrap()
    }

    fn seeded_job(db: &Database) -> Job {
        let key = SearchKey::new(
            "q",
            "",
            "lever",
            "global",
            crate::models::LocationType::Remote,
        );
        db.store_search(&key, 1).unwrap();
        let outcome = db
            .store_jobs(&[NewJob {
                search_id: 1,
                title: "Engineer".to_string(),
                link: "https://jobs.lever.co/acme/x".to_string(),
                board: "lever".to_string(),
                resume: None,
            }])
            .unwrap();
        let mut job = outcome.accepted.into_iter().next().unwrap();
        job.status = Status::Reviewed;
        db.update_job(&job).unwrap();
        job
    }

    #[tokio::test]
    async fn test_no_custom_fields_skips_the_ai_entirely() {
        let db = Database::open_in_memory().unwrap();
        let config = test_config();
        // Any AI call makes the stub error and fails the test.
        let provider = StubProvider::unreachable();
        let ctx = StageContext {
            db: &db,
            config: &config,
            ai: &provider,
        };

        let mut job = seeded_job(&db);
        prepare_job(&ctx, &mut job).await.unwrap();

        assert_eq!(job.status, Status::Prepared);
        assert!(job.custom_fields_answers.is_empty());
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_drafts_and_stores_answers() {
        let db = Database::open_in_memory().unwrap();
        let mut config = test_config();

        // Knowledge base on disk, the way the stage loads it.
        let dir = std::env::temp_dir().join("autoapply-prepare-test");
        std::fs::create_dir_all(&dir).unwrap();
        let kb = dir.join("knowledge.txt");
        std::fs::write(&kb, "The candidate has shipped Rust for years.").unwrap();
        config.knowledge_base = kb;

        let provider = StubProvider::new(vec![
            r#"{"answers": [{"key": "field0", "question": "Visa?", "answer": "No"}]}"#,
        ]);
        let ctx = StageContext {
            db: &db,
            config: &config,
            ai: &provider,
        };

        let mut job = seeded_job(&db);
        job.custom_fields = vec![CanonicalField {
            kind: FieldKind::Radio,
            name: "field0".to_string(),
            label: "Visa?".to_string(),
            possible_values: Some(vec!["Yes".to_string(), "No".to_string()]),
            required: true,
        }];

        prepare_job(&ctx, &mut job).await.unwrap();
        assert_eq!(job.status, Status::Prepared);
        assert_eq!(job.custom_fields_answers.len(), 1);
        assert_eq!(job.custom_fields_answers[0].key, "field0");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_knowledge_base_leaves_job_reviewed() {
        let db = Database::open_in_memory().unwrap();
        let mut config = test_config();
        config.knowledge_base = std::path::PathBuf::from("/nonexistent/kb.txt");

        let provider = StubProvider::unreachable();
        let ctx = StageContext {
            db: &db,
            config: &config,
            ai: &provider,
        };

        let mut job = seeded_job(&db);
        job.custom_fields = vec![CanonicalField {
            kind: FieldKind::Text,
            name: "field0".to_string(),
            label: "Why?".to_string(),
            possible_values: None,
            required: true,
        }];

        assert!(prepare_job(&ctx, &mut job).await.is_err());
        assert_eq!(job.status, Status::Reviewed);
    }
}
