//! SQLite-backed [`IndexStore`].
//!
//! ## Database Schema
//!
//! ```sql
//! -- One row describing how the stored index was built
//! CREATE TABLE index_metadata (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     provider TEXT, model_name TEXT, dimension INTEGER, normalized INTEGER,
//!     chunk_size INTEGER, overlap INTEGER, title_rule TEXT,
//!     chunk_count INTEGER, document_count INTEGER,
//!     created_at TEXT, builder_version TEXT
//! );
//!
//! -- One row per chunk, keyed by its position in the index
//! CREATE TABLE chunks (
//!     position INTEGER PRIMARY KEY,
//!     source_document_id TEXT, section_index INTEGER, section_title TEXT,
//!     chunk_index_in_section INTEGER,
//!     pmid TEXT, journal TEXT, year TEXT, authors TEXT, doi TEXT,
//!     text TEXT,
//!     embedding BLOB               -- f32 vector in native byte order
//! );
//! ```

use super::{IndexStore, StoredChunk, store_path};
use crate::error::{Result, RetrieverError};
use crate::retrieval::corpus_index::{
    ChunkMetadata, CorpusIndex, EmbeddingModelMetadata, IndexMetadata,
};
use crate::retrieval::flat_index::FlatIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paper_rag_context::{ChunkingConfig, SectionTitleRule};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct SqliteIndexStore {
    location: PathBuf,
    pool: SqlitePool,
}

impl SqliteIndexStore {
    /// Open `<base>/.paper-rag.db`, creating the directory and database if needed.
    pub async fn open(base: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base).await?;
        let db_path = store_path(base);

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await?;
        Self::new_with_pool(db_path, pool).await
    }

    /// Open an existing database without creating one.
    pub async fn open_existing(base: &Path) -> Result<Self> {
        let db_path = store_path(base);
        if !tokio::fs::try_exists(&db_path).await? {
            return Err(RetrieverError::IndexNotFound { path: db_path });
        }
        Self::open(base).await
    }

    /// In-memory database for tests.
    pub async fn open_memory() -> Result<Self> {
        // Every connection to :memory: is a separate database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(PathBuf::from(":memory:"), pool).await
    }

    async fn new_with_pool(location: PathBuf, pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { location, pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                provider TEXT NOT NULL,
                model_name TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                normalized INTEGER NOT NULL,
                chunk_size INTEGER NOT NULL,
                overlap INTEGER NOT NULL,
                title_rule TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                document_count INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                builder_version TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                position INTEGER PRIMARY KEY,
                source_document_id TEXT NOT NULL,
                section_index INTEGER NOT NULL,
                section_title TEXT NOT NULL,
                chunk_index_in_section INTEGER NOT NULL,
                pmid TEXT NOT NULL,
                journal TEXT NOT NULL,
                year TEXT NOT NULL,
                authors TEXT NOT NULL,
                doi TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(source_document_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file, or `:memory:`
    pub fn location(&self) -> &Path {
        &self.location
    }

    fn read_metadata(row: &SqliteRow) -> Result<IndexMetadata> {
        let title_rule: String = row.try_get("title_rule")?;
        let title_rule = title_rule
            .parse::<SectionTitleRule>()
            .map_err(RetrieverError::corrupt)?;
        let chunking = ChunkingConfig {
            chunk_size: to_usize(row.try_get("chunk_size")?, "chunk_size")?,
            overlap: to_usize(row.try_get("overlap")?, "overlap")?,
            title_rule,
        };
        chunking.validate().map_err(|e| {
            RetrieverError::corrupt(format!("stored chunking configuration is invalid: {e}"))
        })?;

        Ok(IndexMetadata {
            embedding: EmbeddingModelMetadata {
                provider: row.try_get("provider")?,
                model_name: row.try_get("model_name")?,
                dimension: to_usize(row.try_get("dimension")?, "dimension")?,
                normalized: row.try_get("normalized")?,
            },
            chunking,
            chunk_count: to_usize(row.try_get("chunk_count")?, "chunk_count")?,
            document_count: to_usize(row.try_get("document_count")?, "document_count")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            builder_version: row.try_get("builder_version")?,
        })
    }

    fn read_chunk(row: &SqliteRow) -> Result<(usize, String, ChunkMetadata)> {
        let position = to_usize(row.try_get("position")?, "position")?;
        let metadata = ChunkMetadata {
            source_document_id: row.try_get("source_document_id")?,
            section_index: to_usize(row.try_get("section_index")?, "section_index")?,
            section_title: row.try_get("section_title")?,
            chunk_index_in_section: to_usize(
                row.try_get("chunk_index_in_section")?,
                "chunk_index_in_section",
            )?,
            pmid: row.try_get("pmid")?,
            journal: row.try_get("journal")?,
            year: row.try_get("year")?,
            authors: row.try_get("authors")?,
            doi: row.try_get("doi")?,
        };
        Ok((position, row.try_get("text")?, metadata))
    }
}

fn to_usize(value: i64, column: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RetrieverError::corrupt(format!("negative value {value} in column {column}")))
}

fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        RetrieverError::invalid_argument(format!("{value} does not fit in an SQLite integer"))
    })
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn save(&self, index: &CorpusIndex) -> Result<()> {
        let info = index.info();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_metadata")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO index_metadata (
                id, provider, model_name, dimension, normalized,
                chunk_size, overlap, title_rule,
                chunk_count, document_count, created_at, builder_version
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&info.embedding.provider)
        .bind(&info.embedding.model_name)
        .bind(to_i64(info.embedding.dimension)?)
        .bind(info.embedding.normalized)
        .bind(to_i64(info.chunking.chunk_size)?)
        .bind(to_i64(info.chunking.overlap)?)
        .bind(info.chunking.title_rule.to_string())
        .bind(to_i64(info.chunk_count)?)
        .bind(to_i64(info.document_count)?)
        .bind(info.created_at)
        .bind(&info.builder_version)
        .execute(&mut *tx)
        .await?;

        for chunk in index.chunks() {
            let md = chunk.metadata;
            sqlx::query(
                r#"
                INSERT INTO chunks (
                    position, source_document_id, section_index, section_title,
                    chunk_index_in_section, pmid, journal, year, authors, doi,
                    text, embedding
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(to_i64(chunk.position)?)
            .bind(&md.source_document_id)
            .bind(to_i64(md.section_index)?)
            .bind(&md.section_title)
            .bind(to_i64(md.chunk_index_in_section)?)
            .bind(&md.pmid)
            .bind(&md.journal)
            .bind(&md.year)
            .bind(&md.authors)
            .bind(&md.doi)
            .bind(chunk.text)
            .bind(bytemuck::cast_slice::<f32, u8>(chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Saved {} chunks from {} documents to {}",
            index.len(),
            info.document_count,
            self.location.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<CorpusIndex> {
        let Some(meta_row) = sqlx::query("SELECT * FROM index_metadata WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?
        else {
            return Err(RetrieverError::IndexNotFound {
                path: self.location.clone(),
            });
        };
        let info = Self::read_metadata(&meta_row)?;
        let dimension = info.embedding.dimension;

        let rows = sqlx::query("SELECT * FROM chunks ORDER BY position")
            .fetch_all(&self.pool)
            .await?;
        if rows.len() != info.chunk_count {
            return Err(RetrieverError::corrupt(format!(
                "index records {} chunks but {} are stored",
                info.chunk_count,
                rows.len()
            )));
        }

        let mut index = FlatIndex::new(dimension);
        let mut texts = Vec::with_capacity(rows.len());
        let mut metadata = Vec::with_capacity(rows.len());
        for (expected, row) in rows.iter().enumerate() {
            let (position, text, md) = Self::read_chunk(row)?;
            if position != expected {
                return Err(RetrieverError::corrupt(format!(
                    "expected chunk at position {expected}, found {position}"
                )));
            }

            let bytes: Vec<u8> = row.try_get("embedding")?;
            if bytes.len() != dimension * std::mem::size_of::<f32>() {
                return Err(RetrieverError::corrupt(format!(
                    "chunk {position} has a {}-byte embedding, expected {dimension} f32 values",
                    bytes.len()
                )));
            }
            let vector: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
            index.add(&vector)?;
            texts.push(text);
            metadata.push(md);
        }

        debug!(
            "Loaded {} chunks ({}) from {}",
            texts.len(),
            info.embedding.model_id(),
            self.location.display()
        );
        CorpusIndex::new(index, texts, metadata, info)
    }

    async fn info(&self) -> Result<Option<IndexMetadata>> {
        let row = sqlx::query("SELECT * FROM index_metadata WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Self::read_metadata(&row)).transpose()
    }

    async fn list_chunks(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT position, source_document_id, section_index, section_title,
                   chunk_index_in_section, pmid, journal, year, authors, doi, text
            FROM chunks
            ORDER BY position
            LIMIT ?
            "#,
        )
        .bind(to_i64(limit)?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let (position, text, metadata) = Self::read_chunk(row)?;
                Ok(StoredChunk {
                    position,
                    text,
                    metadata,
                })
            })
            .collect()
    }
}
