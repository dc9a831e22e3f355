//! SQLite-backed corpus index.
//!
//! Chunks carry their embedding as a little-endian `f32` BLOB for semantic
//! ranking; an external-content FTS5 table over the same rows provides BM25
//! lexical ranking.

use crate::types::{CorpusChunk, CorpusHit, CorpusSource};
use comply_core::{AppError, AppResult};
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::LazyLock;

static QUERY_TERM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").ok());

/// Initialize the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Corpus(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Corpus(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            path TEXT,
            url TEXT,
            content_type TEXT NOT NULL,
            learned_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT,
            FOREIGN KEY (source_id) REFERENCES sources(id)
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
            text,
            content='chunks',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS chunks_fts_insert AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, text) VALUES (new.rowid, new.text);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_fts_delete BEFORE DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_fts_update AFTER UPDATE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
            INSERT INTO chunks_fts(rowid, text) VALUES (new.rowid, new.text);
        END;
        "#,
    )
    .map_err(|e| AppError::Corpus(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert a source into the index.
pub fn insert_source(conn: &Connection, source: &CorpusSource) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sources (id, path, url, content_type, learned_at, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source.id,
            source
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            source.url,
            source.content_type,
            source.learned_at.to_rfc3339(),
            source.size_bytes as i64,
        ],
    )
    .map_err(|e| AppError::Corpus(format!("Failed to insert source: {}", e)))?;

    Ok(())
}

/// Insert a chunk with embedding into the index.
pub fn insert_chunk(conn: &Connection, chunk: &CorpusChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(
        chunk
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Corpus("Chunk missing embedding".to_string()))?,
    );

    let metadata_json = serde_json::to_string(&chunk.metadata)?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, position, text, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.position as i64,
            chunk.text,
            embedding_bytes,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Corpus(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Query the index for the top-k chunks by cosine similarity.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<CorpusHit>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.source_id, c.text, c.embedding, c.metadata, s.path, s.url
             FROM chunks c LEFT JOIN sources s ON s.id = c.source_id",
        )
        .map_err(|e| AppError::Corpus(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(3)?;
            let score = bytes_to_embedding(&embedding_bytes)
                .map(|embedding| cosine_similarity(query_embedding, &embedding))
                .unwrap_or(0.0);

            Ok(CorpusHit {
                chunk_id: row.get(0)?,
                source_id: source_label(row.get(1)?, row.get(5)?, row.get(6)?),
                content: row.get(2)?,
                score,
                published_year: metadata_year(row.get(4)?),
            })
        })
        .map_err(|e| AppError::Corpus(format!("Failed to query chunks: {}", e)))?;

    let mut results: Vec<CorpusHit> = rows.filter_map(|r| r.ok()).collect();

    // Sort by score descending, id as tie-break
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(top_k);

    tracing::debug!(
        "Semantic search returned {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Query the FTS5 table for the top-k chunks by BM25.
///
/// SQLite reports BM25 as a negative number (lower is better); hits carry
/// the negated value so that higher is better, like the semantic scores.
pub fn query_lexical(conn: &Connection, query: &str, top_k: usize) -> AppResult<Vec<CorpusHit>> {
    let Some(match_expr) = fts_match_expression(query) else {
        return Ok(Vec::new());
    };
    if top_k == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.source_id, c.text, c.metadata, s.path, s.url, bm25(chunks_fts) AS bm25_score
             FROM chunks_fts
             JOIN chunks c ON c.rowid = chunks_fts.rowid
             LEFT JOIN sources s ON s.id = c.source_id
             WHERE chunks_fts MATCH ?1
             ORDER BY bm25_score, c.id
             LIMIT ?2",
        )
        .map_err(|e| AppError::Corpus(format!("Failed to prepare lexical query: {}", e)))?;

    let rows = stmt
        .query_map(params![match_expr, top_k as i64], |row| {
            let rank: f64 = row.get(6)?;
            Ok(CorpusHit {
                chunk_id: row.get(0)?,
                source_id: source_label(row.get(1)?, row.get(4)?, row.get(5)?),
                content: row.get(2)?,
                score: (-rank).max(0.0) as f32,
                published_year: metadata_year(row.get(3)?),
            })
        })
        .map_err(|e| AppError::Corpus(format!("Failed to run lexical query: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| AppError::Corpus(format!("Failed to read row: {}", e)))?);
    }

    tracing::debug!(
        "Lexical search returned {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Get statistics for the index.
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let sources_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM sources", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Corpus(format!("Failed to count sources: {}", e)))?;

    let chunks_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Corpus(format!("Failed to count chunks: {}", e)))?;

    Ok((sources_count, chunks_count))
}

/// Quote every term so user text can never be read as FTS5 syntax.
/// Terms are OR-ed; BM25 rewards chunks matching more of them.
fn fts_match_expression(query: &str) -> Option<String> {
    let re = QUERY_TERM.as_ref()?;
    let mut terms: Vec<String> = Vec::new();
    for m in re.find_iter(query) {
        let term = m.as_str().to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn source_label(source_id: String, path: Option<String>, url: Option<String>) -> String {
    if let Some(url) = url {
        return url;
    }
    if let Some(name) = path
        .as_deref()
        .and_then(|p| Path::new(p).file_name())
        .and_then(|n| n.to_str())
    {
        return name.to_string();
    }
    source_id
}

fn metadata_year(metadata: Option<String>) -> Option<i32> {
    let value: serde_json::Value = serde_json::from_str(metadata.as_deref()?).ok()?;
    value
        .get("publishedYear")
        .and_then(|y| y.as_i64())
        .and_then(|y| i32::try_from(y).ok())
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Corpus(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
