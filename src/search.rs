use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

use crate::boards;
use crate::db::Database;
use crate::error::SearchSignal;
use crate::models::{LocationType, NewJob, SearchKey};

/// Results come back ten at a time; the provider refuses offsets past 91,
/// which caps a session at ten pages.
pub const PAGE_SIZE: u32 = 10;
pub const MAX_START: u32 = 91;

#[derive(Debug, Clone)]
pub struct SearchItem {
    pub title: String,
    pub link: String,
}

/// External paginated search API. One production implementation; tests stub it.
#[async_trait]
pub trait SearchProvider {
    async fn fetch(&self, query: &str, starts_at: u32, country: &str) -> Result<Vec<SearchItem>>;
}

/// Caller-supplied filters for one search session. The page offset is
/// engine-managed, never caller-supplied.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub query: String,
    pub keywords: String,
    pub board: String,
    pub country: String,
    pub location_type: LocationType,
    pub resume: Option<String>,
}

impl SearchSpec {
    fn key(&self) -> SearchKey {
        SearchKey::new(
            &self.query,
            &self.keywords,
            &self.board,
            &self.country,
            self.location_type,
        )
    }
}

#[derive(Debug, Default)]
pub struct PageOutcome {
    pub stored: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    MaxPagesReached,
    NoResults,
    Stopped,
}

#[derive(Debug)]
pub struct SessionSummary {
    pub pages: u32,
    pub stored: usize,
    pub duplicates: usize,
    pub end: SessionEnd,
}

/// Turns a query plus filters into newly discovered jobs, without re-fetching
/// consumed pages and without storing links the store already knows.
pub struct SearchEngine<'a> {
    db: &'a Database,
    provider: &'a dyn SearchProvider,
}

impl<'a> SearchEngine<'a> {
    pub fn new(db: &'a Database, provider: &'a dyn SearchProvider) -> Self {
        Self { db, provider }
    }

    /// Fetch and store the next page for this spec's tuple.
    ///
    /// Raises `SearchSignal::MaxPagesReached` past the ten-page cap and
    /// `SearchSignal::NoResults` on an empty page; both are normal ends of a
    /// session, not failures.
    pub async fn run_page(&self, spec: &SearchSpec) -> Result<PageOutcome> {
        let adapter = boards::resolve(&spec.board)?;
        let key = spec.key();

        let starts_at = match self.db.get_last_search(&key)? {
            Some(entry) => entry.starts_at + PAGE_SIZE,
            None => 1,
        };
        if starts_at > MAX_START {
            return Err(SearchSignal::MaxPagesReached.into());
        }

        let query = build_query(spec, adapter.search_domain());
        let items = self.provider.fetch(&query, starts_at, &spec.country).await?;

        // The page is recorded before inspecting it, so a resumed session
        // never re-fetches an offset it has already paid for.
        let search_id = self.db.store_search(&key, starts_at)?;

        if items.is_empty() {
            return Err(SearchSignal::NoResults.into());
        }

        let mut seen = HashSet::new();
        let jobs: Vec<NewJob> = items
            .into_iter()
            .filter(|item| adapter.matches_url(&item.link))
            .filter_map(|item| {
                let link = adapter.canonicalize(&item.link);
                // First occurrence wins within a page.
                seen.insert(link.clone()).then_some(NewJob {
                    search_id,
                    title: item.title,
                    link,
                    board: spec.board.clone(),
                    resume: spec.resume.clone(),
                })
            })
            .collect();

        let outcome = self.db.store_jobs(&jobs)?;
        Ok(PageOutcome {
            stored: outcome.accepted.len(),
            duplicates: outcome.duplicates,
        })
    }

    /// Page through results, accumulating totals, until the cap, an empty
    /// page, or the caller's continuation predicate says stop.
    pub async fn run_session(
        &self,
        spec: &SearchSpec,
        mut proceed: impl FnMut(&SessionSummary) -> bool,
    ) -> Result<SessionSummary> {
        let mut summary = SessionSummary {
            pages: 0,
            stored: 0,
            duplicates: 0,
            end: SessionEnd::Stopped,
        };

        loop {
            match self.run_page(spec).await {
                Ok(page) => {
                    summary.pages += 1;
                    summary.stored += page.stored;
                    summary.duplicates += page.duplicates;
                }
                Err(err) => match err.downcast_ref::<SearchSignal>() {
                    Some(SearchSignal::MaxPagesReached) => {
                        summary.end = SessionEnd::MaxPagesReached;
                        return Ok(summary);
                    }
                    Some(SearchSignal::NoResults) => {
                        summary.end = SessionEnd::NoResults;
                        // An empty later page is a normal session end; an
                        // empty first page is worth telling the caller about.
                        if summary.stored == 0 && summary.duplicates == 0 && summary.pages == 0 {
                            return Err(err);
                        }
                        return Ok(summary);
                    }
                    None => return Err(err),
                },
            }

            if !proceed(&summary) {
                summary.end = SessionEnd::Stopped;
                return Ok(summary);
            }
        }
    }
}

/// Assemble the provider query: free text, quoted keywords, quoted location
/// type and country, and a site: restriction for the board.
fn build_query(spec: &SearchSpec, domain: &str) -> String {
    let mut parts = vec![spec.query.clone()];
    for keyword in spec
        .keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        parts.push(format!("\"{keyword}\""));
    }
    parts.push(format!("\"{}\"", spec.location_type));
    if spec.country != "global" && !spec.country.is_empty() {
        parts.push(format!("\"{}\"", spec.country));
    }
    parts.push(format!("site:{domain}"));
    parts.join(" ")
}

// --- Google Custom Search provider ---

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    items: Vec<GoogleSearchItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleSearchItem {
    #[serde(default)]
    title: String,
    link: Option<String>,
}

pub struct GoogleSearchProvider {
    api_key: String,
    cx: String,
    client: reqwest::Client,
}

impl GoogleSearchProvider {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GOOGLE_CSE_KEY")
            .context("GOOGLE_CSE_KEY environment variable not set. Set it with: export GOOGLE_CSE_KEY=your-key-here")?;
        let cx = env::var("GOOGLE_CSE_CX")
            .context("GOOGLE_CSE_CX environment variable not set. Set it with: export GOOGLE_CSE_CX=your-engine-id")?;
        Ok(Self {
            api_key,
            cx,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn fetch(&self, query: &str, starts_at: u32, country: &str) -> Result<Vec<SearchItem>> {
        let start = starts_at.to_string();
        let mut request = self.client.get(GOOGLE_SEARCH_URL).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
            ("q", query),
            ("start", start.as_str()),
        ]);
        if country != "global" && !country.is_empty() {
            request = request.query(&[("gl", country)]);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach the search API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Search API request failed with status {}: {}",
                status,
                body
            ));
        }

        let parsed: GoogleSearchResponse = response
            .json()
            .await
            .context("Failed to parse search API response")?;

        Ok(parsed
            .items
            .into_iter()
            .filter_map(|item| {
                item.link.map(|link| SearchItem {
                    title: item.title,
                    link,
                })
            })
            .collect())
    }
}
