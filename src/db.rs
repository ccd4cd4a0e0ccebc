use anyhow::Result;
use rusqlite::Connection;

use crate::parser::Document;
use crate::toc;

const DB_PATH: &str = "data/municode.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            node_id    TEXT,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_page ON page_data(page_id);

        CREATE TABLE IF NOT EXISTS documents (
            id            INTEGER PRIMARY KEY,
            title         TEXT NOT NULL,
            source_url    TEXT NOT NULL,
            section_count INTEGER NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sections (
            id          INTEGER PRIMARY KEY,
            document_id INTEGER NOT NULL REFERENCES documents(id),
            position    INTEGER NOT NULL,
            section_id  TEXT NOT NULL,
            label       TEXT NOT NULL,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            path        TEXT NOT NULL,
            url         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sections_document ON sections(document_id);
        CREATE INDEX IF NOT EXISTS idx_sections_section_id ON sections(section_id);
        ",
    )?;
    Ok(())
}

// ── Page cache ──

/// One fetch attempt against a section URL, successful or not.
pub struct FetchRow {
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Record a fetch: upsert the page into the queue, store the raw result,
/// mark the page visited.
pub fn record_fetch(conn: &Connection, row: &FetchRow) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "INSERT OR IGNORE INTO pages (url, node_id) VALUES (?1, ?2)",
            rusqlite::params![row.url, toc::node_id(&row.url)],
        )?;
        let page_id: i64 = tx.query_row(
            "SELECT id FROM pages WHERE url = ?1",
            rusqlite::params![row.url],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO page_data (page_id, url, html, status, error, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                page_id, row.url, row.html, row.status, row.error, row.latency_ms,
            ],
        )?;
        tx.execute(
            "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
            rusqlite::params![page_id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

// ── Assembled documents ──

pub fn save_document(conn: &Connection, doc: &Document) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let document_id;
    {
        tx.execute(
            "INSERT INTO documents (title, source_url, section_count) VALUES (?1, ?2, ?3)",
            rusqlite::params![doc.title, doc.source_url, doc.sections.len() as i64],
        )?;
        document_id = tx.last_insert_rowid();

        let mut stmt = tx.prepare(
            "INSERT INTO sections
             (document_id, position, section_id, label, title, content, path, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (position, section) in doc.sections.iter().enumerate() {
            stmt.execute(rusqlite::params![
                document_id,
                position as i64,
                section.id,
                section.label,
                section.title,
                section.content,
                serde_json::to_string(&section.path)?,
                section.url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(document_id)
}

// ── Stats ──

pub struct Stats {
    pub pages: usize,
    pub visited: usize,
    pub fetched: usize,
    pub errors: usize,
    pub documents: usize,
    pub sections: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM pages WHERE visited = 1", [], |r| r.get(0))?;
    let fetched: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let sections: usize = conn.query_row("SELECT COUNT(*) FROM sections", [], |r| r.get(0))?;
    Ok(Stats {
        pages,
        visited,
        fetched,
        errors,
        documents,
        sections,
    })
}
