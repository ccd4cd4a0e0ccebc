//! Collector: fetches rendered municode pages and feeds the parsing core.
//!
//! Pages come back pre-rendered from spider.cloud (municode is a JavaScript
//! SPA, raw HTTP returns an empty shell). Fetching is concurrent; assembly is
//! strictly in TOC order, because hierarchy tracking depends on it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::db::{self, FetchRow};
use crate::parser::{fragments, title, Assembler, Document, DEFAULT_HIERARCHY};
use crate::toc;

const CONCURRENCY: usize = 10;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

pub struct Collector {
    spider: Arc<Spider>,
    seen_headings: HashSet<String>,
}

impl Collector {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self {
            spider: Arc::new(spider),
            seen_headings: HashSet::new(),
        })
    }

    /// Scrape one section URL into a document.
    ///
    /// A leaf page becomes a document from its own fragments. A page with a
    /// sub-TOC has each child page fetched and assembled through one shared
    /// hierarchy, so ancestry carries across page boundaries.
    pub async fn scrape_section(
        &mut self,
        conn: &Connection,
        url: &str,
    ) -> Result<Option<Document>> {
        if !url.contains("?nodeId=") {
            anyhow::bail!("Not a valid section URL (missing nodeId): {}", url);
        }

        let page = self.fetch_recorded(conn, url).await?;
        let Some(html) = page.html else {
            anyhow::bail!(
                "Failed to load {}: {}",
                url,
                page.error.as_deref().unwrap_or("no content")
            );
        };

        let toc_entries = toc::section_toc_links(&html);
        let doc = if toc_entries.is_empty() {
            info!("Leaf page: {}", url);
            match self.assemble_leaf(&html, url) {
                Some(doc) => doc,
                None => return Ok(None),
            }
        } else {
            self.assemble_from_toc(conn, url, &toc_entries).await?
        };

        db::save_document(conn, &doc)?;
        Ok(Some(doc))
    }

    /// Scrape every document reachable from the codes navigation TOC.
    /// Per-entry failures are logged and skipped.
    pub async fn scrape_full(&mut self, conn: &Connection, url: &str) -> Result<Vec<Document>> {
        let page = self.fetch_recorded(conn, url).await?;
        let Some(html) = page.html else {
            anyhow::bail!("Failed to load TOC page at {}", url);
        };
        let entries = toc::full_toc_links(&html);
        if entries.is_empty() {
            anyhow::bail!("No table of contents found at {}", url);
        }
        info!("Full TOC: {} top-level entries", entries.len());

        let mut documents = Vec::new();
        for (entry_url, _) in entries {
            match self.scrape_section(conn, &entry_url).await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => warn!("Failed to scrape {}: {}", entry_url, e),
            }
        }
        Ok(documents)
    }

    fn assemble_leaf(&mut self, html: &str, url: &str) -> Option<Document> {
        if self.already_seen(html) {
            return None;
        }
        let frags = fragments::extract_fragments(html);
        if frags.is_empty() {
            warn!("No content fragments at {}", url);
            return None;
        }

        let doc_title = frags[0]
            .heading
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let mut assembler = Assembler::new(DEFAULT_HIERARCHY);
        let sections = frags
            .iter()
            .map(|f| assembler.assemble(f.heading.as_deref(), &f.nodes, url))
            .collect();

        Some(Document {
            title: doc_title,
            source_url: url.to_string(),
            sections,
        })
    }

    async fn assemble_from_toc(
        &mut self,
        conn: &Connection,
        url: &str,
        entries: &[(String, String)],
    ) -> Result<Document> {
        let doc_title = entries
            .first()
            .map(|(_, text)| text.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Chapter".to_string());
        info!("TOC page: {} sub-pages under {}", entries.len(), doc_title);

        let urls: Vec<String> = entries.iter().map(|(u, _)| u.clone()).collect();
        let pages = self.fetch_batch(&urls).await;
        for row in &pages {
            db::record_fetch(conn, row)?;
        }

        // Sub-pages start below the document's root heading; seed it.
        let seed = title::parse_heading(&doc_title).id;
        let mut assembler = Assembler::seeded(DEFAULT_HIERARCHY, &seed);
        let mut sections = Vec::new();
        for page in &pages {
            let Some(html) = &page.html else {
                warn!(
                    "Skipping failed sub-page {}: {}",
                    page.url,
                    page.error.as_deref().unwrap_or("no content")
                );
                continue;
            };
            if self.already_seen(html) {
                continue;
            }
            for fragment in fragments::extract_fragments(html) {
                sections.push(assembler.assemble(
                    fragment.heading.as_deref(),
                    &fragment.nodes,
                    &page.url,
                ));
            }
        }

        Ok(Document {
            title: doc_title,
            source_url: url.to_string(),
            sections,
        })
    }

    /// Advisory de-duplication on the page's first heading text.
    fn already_seen(&mut self, html: &str) -> bool {
        match fragments::first_heading(html) {
            Some(heading) => {
                if !self.seen_headings.insert(heading.clone()) {
                    info!("Already parsed: {}", heading);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    async fn fetch_recorded(&self, conn: &Connection, url: &str) -> Result<FetchRow> {
        let row = fetch_with_retry(&self.spider, url).await;
        db::record_fetch(conn, &row)?;
        Ok(row)
    }

    /// Fetch a batch concurrently, returning results in input order.
    async fn fetch_batch(&self, urls: &[String]) -> Vec<FetchRow> {
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .unwrap()
                .progress_chars("=> "),
        );

        let mut set = JoinSet::new();
        for (idx, url) in urls.iter().cloned().enumerate() {
            let spider = Arc::clone(&self.spider);
            let sem = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = sem.acquire().await.unwrap();
                (idx, fetch_with_retry(&spider, &url).await)
            });
        }

        let mut slots: Vec<Option<FetchRow>> =
            std::iter::repeat_with(|| None).take(urls.len()).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, row)) => {
                    slots[idx] = Some(row);
                    pb.inc(1);
                }
                Err(e) => warn!("Fetch task failed: {}", e),
            }
        }
        pb.finish_and_clear();

        slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| FetchRow {
                    url: url.clone(),
                    html: None,
                    status: None,
                    error: Some("fetch task failed".to_string()),
                    latency_ms: None,
                })
            })
            .collect()
    }
}

async fn fetch_with_retry(spider: &Spider, url: &str) -> FetchRow {
    for attempt in 0..=MAX_RETRIES {
        let row = fetch_one(spider, url).await;

        let should_retry = match &row.error {
            Some(e) if e.contains("429") || e.contains("rate") => true,
            Some(e) if e.contains("500") || e.contains("502") || e.contains("503") => true,
            _ => false,
        };

        if !should_retry || attempt == MAX_RETRIES {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Rate limited on {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch_one(spider, url).await
}

async fn fetch_one(spider: &Spider, url: &str) -> FetchRow {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
        ..Default::default()
    };

    let start = Instant::now();
    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await;
    let elapsed = start.elapsed().as_millis() as i64;

    match response {
        Ok(value) => {
            let parsed: serde_json::Value = match value.as_str() {
                Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
                None => value,
            };

            let first = parsed.as_array().and_then(|arr| arr.first());

            let html = first
                .and_then(|obj| obj.get("content"))
                .and_then(|c| c.as_str())
                .map(str::to_string);

            let status = first
                .and_then(|obj| obj.get("status"))
                .and_then(|s| s.as_i64())
                .map(|s| s as i32);

            FetchRow {
                url: url.to_string(),
                html,
                status,
                error: None,
                latency_ms: Some(elapsed),
            }
        }
        Err(e) => FetchRow {
            url: url.to_string(),
            html: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}
