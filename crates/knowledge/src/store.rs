//! [`CorpusIndex`] backed by the SQLite index file.

use crate::corpus::CorpusIndex;
use crate::embeddings::EmbeddingProvider;
use crate::index;
use crate::types::{CorpusHit, CorpusStats};
use comply_core::{AppError, AppResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The pre-built corpus, opened for querying.
///
/// Searches run on the blocking pool against one shared connection; the
/// lock is never held across an await.
pub struct SqliteCorpus {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteCorpus {
    /// Open an existing index.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Corpus(format!(
                "No corpus index at {:?}. Build it with the ingestion job first.",
                path
            )));
        }

        let conn = index::init_index(path)?;
        tracing::debug!(
            path = ?path,
            embedder = embedder.provider_name(),
            "Opened corpus index"
        );

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    /// Counts and on-disk size of the index.
    pub fn stats(&self) -> AppResult<CorpusStats> {
        let (sources_count, chunks_count) = self.with_conn(index::get_stats)?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(CorpusStats {
            sources_count,
            chunks_count,
            db_size_bytes,
            embedder: format!(
                "{} ({}, {} dims)",
                self.embedder.provider_name(),
                self.embedder.model_name(),
                self.embedder.dimensions()
            ),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        lock_and_run(&self.conn, f)
    }

    /// Run a scan on the blocking pool so it never stalls a runtime worker.
    async fn query<T>(
        &self,
        f: impl FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    ) -> AppResult<T>
    where
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || lock_and_run(&conn, f))
            .await
            .map_err(|e| AppError::Corpus(format!("Corpus query task failed: {}", e)))?
    }
}

fn lock_and_run<T>(
    conn: &Mutex<Connection>,
    f: impl FnOnce(&Connection) -> AppResult<T>,
) -> AppResult<T> {
    let conn = conn
        .lock()
        .map_err(|_| AppError::Corpus("Corpus connection lock poisoned".to_string()))?;
    f(&conn)
}

#[async_trait::async_trait]
impl CorpusIndex for SqliteCorpus {
    async fn search_semantic(&self, query: &str, k: usize) -> AppResult<Vec<CorpusHit>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        self.query(move |conn| index::query_chunks(conn, &embedding, k))
            .await
    }

    async fn search_lexical(&self, query: &str, k: usize) -> AppResult<Vec<CorpusHit>> {
        let query = query.to_string();
        self.query(move |conn| index::query_lexical(conn, &query, k))
            .await
    }
}
