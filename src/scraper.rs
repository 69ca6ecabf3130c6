use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use rusqlite::Connection;
use tracing::{info, warn};
use url::Url;

use crate::db::{self, FetchRow};
use crate::page;
use crate::parser;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scrape stats returned after completion.
pub struct ScrapeStats {
    pub total: usize,
    pub saved: usize,
    pub empty: usize,
    pub errors: usize,
}

/// One GET per page: browser-like headers, no cookie store, no retries.
pub fn build_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

pub struct FetchedPage {
    pub url: String,
    pub status: Option<u16>,
    pub html: Option<String>,
    pub error: Option<String>,
    pub latency_ms: i64,
}

/// Fetch a page once. Transport errors and non-2xx statuses are reported in
/// `error` rather than returned, so the caller can log every attempt.
pub async fn fetch_page(client: &Client, url: &str) -> FetchedPage {
    let start = Instant::now();
    let result = fetch_html(client, url).await;
    let latency_ms = start.elapsed().as_millis() as i64;

    match result {
        Ok((status, html)) => FetchedPage {
            url: url.to_string(),
            status: Some(status),
            html: Some(html),
            error: None,
            latency_ms,
        },
        Err((status, e)) => FetchedPage {
            url: url.to_string(),
            status,
            html: None,
            error: Some(format!("{:#}", e)),
            latency_ms,
        },
    }
}

async fn fetch_html(
    client: &Client,
    url: &str,
) -> std::result::Result<(u16, String), (Option<u16>, anyhow::Error)> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| (None, anyhow::Error::new(e).context("Request failed")))?;

    let status = response.status().as_u16();
    let response = response
        .error_for_status()
        .map_err(|e| (Some(status), anyhow::Error::new(e)))?;

    let html = response
        .text()
        .await
        .map_err(|e| (Some(status), anyhow::Error::new(e).context("Failed to read body")))?;
    Ok((status, html))
}

/// Fetch, extract and parse each URL in turn, saving articles as they come.
pub async fn scrape_articles(
    conn: &Connection,
    client: &Client,
    urls: &[String],
    image_base: &Url,
) -> Result<ScrapeStats> {
    let total = urls.len();
    let pb = if total > 1 {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut saved = 0usize;
    let mut empty = 0usize;
    let mut errors = 0usize;

    for url in urls {
        info!("Fetching {}", url);
        let page = fetch_page(client, url).await;

        let outcome = match &page.html {
            Some(html) => process_html(conn, url, html, image_base),
            None => Err(anyhow::anyhow!(page.error.clone().unwrap_or_default())),
        };

        let error = match outcome {
            Ok(true) => {
                saved += 1;
                None
            }
            Ok(false) => {
                empty += 1;
                warn!("No article data in {}", url);
                None
            }
            Err(e) => {
                errors += 1;
                warn!("Failed {}: {:#}", url, e);
                Some(format!("{:#}", e))
            }
        };

        db::record_fetch(
            conn,
            &FetchRow {
                url: page.url,
                status: page.status,
                error,
                latency_ms: Some(page.latency_ms),
            },
        )?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Scraped {} pages ({} saved, {} without article, {} errors)",
        total, saved, empty, errors
    );

    Ok(ScrapeStats {
        total,
        saved,
        empty,
        errors,
    })
}

/// `Ok(false)` when the page carries no article.
fn process_html(conn: &Connection, url: &str, html: &str, image_base: &Url) -> Result<bool> {
    let graph = page::extract_article_json(html)?;
    let Some(article) = parser::parse_article(&graph, image_base) else {
        return Ok(false);
    };
    info!(
        "Parsed {} ({} sections): {}",
        article.id,
        article.sections.len(),
        article.title.as_deref().unwrap_or("<untitled>")
    );
    db::save_article(conn, url, &article)?;
    Ok(true)
}
