use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::parser::sections::Section;
use crate::parser::Article;

pub const DEFAULT_DB_PATH: &str = "data/medium.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fetches (
            id         INTEGER PRIMARY KEY,
            url        TEXT NOT NULL,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_fetches_url ON fetches(url);

        CREATE TABLE IF NOT EXISTS articles (
            id            TEXT PRIMARY KEY,
            url           TEXT NOT NULL,
            title         TEXT,
            subtitle      TEXT,
            publish_date  TEXT,
            clap_count    INTEGER,
            section_count INTEGER NOT NULL DEFAULT 0,
            scraped_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per section; list columns hold JSON arrays
        CREATE TABLE IF NOT EXISTS article_sections (
            id             INTEGER PRIMARY KEY,
            article_id     TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            position       INTEGER NOT NULL,
            topic          TEXT,
            header_type    TEXT,
            body           TEXT NOT NULL,
            image_urls     TEXT NOT NULL,
            image_captions TEXT NOT NULL,
            UNIQUE(article_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_article ON article_sections(article_id);
        ",
    )?;
    Ok(())
}

// ── Fetch log ──

pub struct FetchRow {
    pub url: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn record_fetch(conn: &Connection, row: &FetchRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO fetches (url, status, error, latency_ms) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![row.url, row.status, row.error, row.latency_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Articles ──

/// Insert or replace an article together with all of its sections.
pub fn save_article(conn: &Connection, url: &str, article: &Article) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "INSERT INTO articles (id, url, title, subtitle, publish_date, clap_count, section_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                subtitle = excluded.subtitle,
                publish_date = excluded.publish_date,
                clap_count = excluded.clap_count,
                section_count = excluded.section_count,
                scraped_at = datetime('now')",
            rusqlite::params![
                article.id,
                url,
                article.title,
                article.subtitle,
                article.publish_date,
                article.engagement_count,
                article.sections.len() as i64,
            ],
        )?;

        tx.execute(
            "DELETE FROM article_sections WHERE article_id = ?1",
            rusqlite::params![article.id],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO article_sections
             (article_id, position, topic, header_type, body, image_urls, image_captions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (position, s) in article.sections.iter().enumerate() {
            stmt.execute(rusqlite::params![
                article.id,
                position as i64,
                s.topic,
                s.header_kind,
                serde_json::to_string(&s.body_lines)?,
                serde_json::to_string(&s.image_urls)?,
                serde_json::to_string(&s.image_captions)?,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct ArticleRow {
    pub id: String,
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub publish_date: String,
    pub clap_count: Option<i64>,
    pub section_count: i64,
}

const ARTICLE_COLUMNS: &str = "id, url, COALESCE(title,''), COALESCE(subtitle,''),
     COALESCE(publish_date,''), clap_count, section_count";

fn article_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        subtitle: row.get(3)?,
        publish_date: row.get(4)?,
        clap_count: row.get(5)?,
        section_count: row.get(6)?,
    })
}

/// Most recently published first.
pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<ArticleRow>> {
    let sql = format!(
        "SELECT {} FROM articles ORDER BY publish_date DESC, id LIMIT {}",
        ARTICLE_COLUMNS, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], article_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_article(conn: &Connection, id: &str) -> Result<Option<ArticleRow>> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
    let row = conn
        .query_row(&sql, rusqlite::params![id], article_row)
        .optional()?;
    Ok(row)
}

/// Sections of one article in reading order.
pub fn fetch_sections(conn: &Connection, article_id: &str) -> Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT topic, header_type, body, image_urls, image_captions
         FROM article_sections
         WHERE article_id = ?1
         ORDER BY position",
    )?;
    let raw = stmt
        .query_map(rusqlite::params![article_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(topic, header_kind, body, urls, captions)| {
            Ok(Section {
                topic,
                header_kind,
                body_lines: serde_json::from_str(&body).context("Corrupt section body")?,
                image_urls: serde_json::from_str(&urls).context("Corrupt image urls")?,
                image_captions: serde_json::from_str(&captions)
                    .context("Corrupt image captions")?,
            })
        })
        .collect()
}

// ── Stats ──

pub struct Stats {
    pub fetches: usize,
    pub errors: usize,
    pub articles: usize,
    pub sections: usize,
    pub images: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let fetches: usize = conn.query_row("SELECT COUNT(*) FROM fetches", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM fetches WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let articles: usize = conn.query_row("SELECT COUNT(*) FROM articles", [], |r| r.get(0))?;
    let sections: usize =
        conn.query_row("SELECT COUNT(*) FROM article_sections", [], |r| r.get(0))?;
    let images: usize = conn.query_row(
        "SELECT COALESCE(SUM(json_array_length(image_urls)), 0) FROM article_sections",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        fetches,
        errors,
        articles,
        sections,
        images,
    })
}
