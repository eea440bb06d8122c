//! `SQLite` store for interest-graph entities.

// Allow cast truncation/sign loss for SQLite i64 to u32/usize conversions.
// SQLite returns i64, but counts are inherently non-negative and small.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Allow cast_possible_wrap - usize to i64 casts for SQLite parameters won't wrap.
#![allow(clippy::cast_possible_wrap)]

use crate::models::{
    Evidence, EvidenceId, HierarchyEdge, Interest, InterestEmbedding, InterestId, Recommendation,
    SignalScores, SimilarityPair, SourceId, SourceType, cosine_similarity,
};
use crate::storage::InterestStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire the connection lock with poison recovery.
fn acquire_lock(mutex: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Interest store mutex was poisoned, recovering");
            metrics::counter!("interest_store_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

fn op_err(operation: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

fn conversion_err(cause: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        cause.into(),
    )
}

/// `SQLite`-backed [`InterestStore`].
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and
/// `busy_timeout` handle concurrent access gracefully.
///
/// # Schema
///
/// Six tables: `interests`, `evidence`, `hierarchy_edges`,
/// `similarity_pairs`, `recommendations`, `embeddings`. Embedding vectors are
/// stored as JSON arrays; similarity search is a full scan with cosine
/// computed in process, which is more than adequate for a single user's
/// interest set.
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (and initializes) a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_interest_store".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_interest_store_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // Enable WAL mode for better concurrent read performance
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS interests (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                confidence REAL NOT NULL,
                source_type TEXT NOT NULL,
                evidence_count INTEGER NOT NULL DEFAULT 0,
                last_seen INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                merged_into TEXT,
                synonyms TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_interests_topic
                ON interests(topic COLLATE NOCASE);
            CREATE INDEX IF NOT EXISTS idx_interests_active
                ON interests(is_active, confidence DESC);

            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                interest_id TEXT NOT NULL,
                source_type TEXT NOT NULL,
                source_id TEXT NOT NULL,
                relevance REAL NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (interest_id) REFERENCES interests(id)
            );
            CREATE INDEX IF NOT EXISTS idx_evidence_interest
                ON evidence(interest_id);

            CREATE TABLE IF NOT EXISTS hierarchy_edges (
                parent_id TEXT NOT NULL,
                child_id TEXT NOT NULL,
                edge_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                detected_at INTEGER NOT NULL,
                PRIMARY KEY (parent_id, child_id)
            );
            CREATE INDEX IF NOT EXISTS idx_hierarchy_child
                ON hierarchy_edges(child_id);

            CREATE TABLE IF NOT EXISTS similarity_pairs (
                id_a TEXT NOT NULL,
                id_b TEXT NOT NULL,
                similarity REAL NOT NULL,
                computed_at INTEGER NOT NULL,
                PRIMARY KEY (id_a, id_b)
            );

            CREATE TABLE IF NOT EXISTS recommendations (
                source_id TEXT NOT NULL,
                recommended_topic TEXT NOT NULL,
                score REAL NOT NULL,
                reasoning TEXT NOT NULL,
                co_occurrence REAL NOT NULL,
                semantic REAL NOT NULL,
                hierarchy REAL NOT NULL,
                temporal REAL NOT NULL,
                computed_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (source_id, recommended_topic COLLATE NOCASE)
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                interest_id TEXT PRIMARY KEY,
                vector TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )
        .map_err(op_err("initialize_interest_store"))?;

        Ok(())
    }

    /// Parses an interest from a database row.
    fn parse_interest_row(row: &Row<'_>) -> rusqlite::Result<Interest> {
        let id: String = row.get("id")?;
        let topic: String = row.get("topic")?;
        let confidence: f32 = row.get("confidence")?;
        let source_type_str: String = row.get("source_type")?;
        let evidence_count: i64 = row.get("evidence_count")?;
        let last_seen: i64 = row.get("last_seen")?;
        let is_active: bool = row.get("is_active")?;
        let merged_into: Option<String> = row.get("merged_into")?;
        let synonyms_json: String = row.get("synonyms")?;
        let created_at: i64 = row.get("created_at")?;

        let source_type = SourceType::parse(&source_type_str)
            .ok_or_else(|| conversion_err(format!("unknown source type: {source_type_str}")))?;
        let synonyms: Vec<String> = serde_json::from_str(&synonyms_json)
            .map_err(|e| conversion_err(format!("invalid synonyms JSON: {e}")))?;

        Ok(Interest {
            id: InterestId::new(id),
            topic,
            confidence,
            source_type,
            evidence_count: evidence_count as u32,
            last_seen: from_ts(last_seen),
            is_active,
            merged_into: merged_into.map(InterestId::new),
            synonyms,
            created_at: from_ts(created_at),
        })
    }

    /// Parses an evidence row.
    fn parse_evidence_row(row: &Row<'_>) -> rusqlite::Result<Evidence> {
        let id: String = row.get("id")?;
        let interest_id: String = row.get("interest_id")?;
        let source_type_str: String = row.get("source_type")?;
        let source_id: String = row.get("source_id")?;
        let relevance: f32 = row.get("relevance")?;
        let created_at: i64 = row.get("created_at")?;

        let source_type = SourceType::parse(&source_type_str)
            .ok_or_else(|| conversion_err(format!("unknown source type: {source_type_str}")))?;

        Ok(Evidence {
            id: EvidenceId::new(id),
            interest_id: InterestId::new(interest_id),
            source_type,
            source_id: SourceId::new(source_id),
            relevance,
            created_at: from_ts(created_at),
        })
    }

    /// Parses a hierarchy edge row.
    fn parse_edge_row(row: &Row<'_>) -> rusqlite::Result<HierarchyEdge> {
        let parent_id: String = row.get("parent_id")?;
        let child_id: String = row.get("child_id")?;
        let edge_type: String = row.get("edge_type")?;
        let confidence: f32 = row.get("confidence")?;
        let detected_at: i64 = row.get("detected_at")?;

        Ok(HierarchyEdge {
            parent_id: InterestId::new(parent_id),
            child_id: InterestId::new(child_id),
            edge_type,
            confidence,
            detected_at: from_ts(detected_at),
        })
    }

    /// Parses a recommendation row.
    fn parse_recommendation_row(row: &Row<'_>) -> rusqlite::Result<Recommendation> {
        let source_id: String = row.get("source_id")?;
        let recommended_topic: String = row.get("recommended_topic")?;
        let score: f32 = row.get("score")?;
        let reasoning: String = row.get("reasoning")?;
        let co_occurrence: f32 = row.get("co_occurrence")?;
        let semantic: f32 = row.get("semantic")?;
        let hierarchy: f32 = row.get("hierarchy")?;
        let temporal: f32 = row.get("temporal")?;
        let computed_at: i64 = row.get("computed_at")?;
        let expires_at: i64 = row.get("expires_at")?;

        Ok(Recommendation {
            source_id: InterestId::new(source_id),
            recommended_topic,
            score,
            reasoning,
            signals: SignalScores {
                co_occurrence,
                semantic,
                hierarchy,
                temporal,
            },
            computed_at: from_ts(computed_at),
            expires_at: from_ts(expires_at),
        })
    }

    fn write_interest(&self, interest: &Interest, operation: &str) -> Result<()> {
        let synonyms = serde_json::to_string(&interest.synonyms).map_err(|e| {
            Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("synonyms serialization: {e}"),
            }
        })?;

        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO interests
                (id, topic, confidence, source_type, evidence_count, last_seen,
                 is_active, merged_into, synonyms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                topic = excluded.topic,
                confidence = excluded.confidence,
                source_type = excluded.source_type,
                evidence_count = excluded.evidence_count,
                last_seen = excluded.last_seen,
                is_active = excluded.is_active,
                merged_into = excluded.merged_into,
                synonyms = excluded.synonyms",
            params![
                interest.id.as_str(),
                interest.topic,
                interest.confidence,
                interest.source_type.as_str(),
                i64::from(interest.evidence_count),
                to_ts(interest.last_seen),
                interest.is_active,
                interest.merged_into.as_ref().map(InterestId::as_str),
                synonyms,
                to_ts(interest.created_at),
            ],
        )
        .map_err(op_err(operation))?;
        Ok(())
    }
}

impl InterestStore for SqliteStore {
    fn insert_interest(&self, interest: &Interest) -> Result<()> {
        self.write_interest(interest, "insert_interest")
    }

    fn get_interest(&self, id: &InterestId) -> Result<Option<Interest>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT * FROM interests WHERE id = ?1",
            params![id.as_str()],
            Self::parse_interest_row,
        )
        .optional()
        .map_err(op_err("get_interest"))
    }

    fn get_active_by_topic(&self, topic: &str) -> Result<Option<Interest>> {
        let conn = acquire_lock(&self.conn);
        let exact = conn
            .query_row(
                "SELECT * FROM interests
                 WHERE is_active = 1 AND LOWER(topic) = LOWER(?1)
                 LIMIT 1",
                params![topic],
                Self::parse_interest_row,
            )
            .optional()
            .map_err(op_err("get_active_by_topic"))?;
        if exact.is_some() {
            return Ok(exact);
        }

        // Synonym match requires inspecting the JSON list; the active set of
        // rows with synonyms is small, so scan it.
        let mut stmt = conn
            .prepare(
                "SELECT * FROM interests
                 WHERE is_active = 1 AND synonyms != '[]'",
            )
            .map_err(op_err("get_active_by_topic"))?;
        let rows = stmt
            .query_map([], Self::parse_interest_row)
            .map_err(op_err("get_active_by_topic"))?;

        for row in rows {
            let interest = row.map_err(op_err("get_active_by_topic"))?;
            if interest.matches_topic(topic) {
                return Ok(Some(interest));
            }
        }
        Ok(None)
    }

    fn update_interest(&self, interest: &Interest) -> Result<()> {
        if self.get_interest(&interest.id)?.is_none() {
            return Err(Error::NotFound {
                kind: "interest",
                id: interest.id.to_string(),
            });
        }
        self.write_interest(interest, "update_interest")
    }

    fn list_active_interests(&self) -> Result<Vec<Interest>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM interests WHERE is_active = 1
                 ORDER BY created_at, id",
            )
            .map_err(op_err("list_active_interests"))?;
        let rows = stmt
            .query_map([], Self::parse_interest_row)
            .map_err(op_err("list_active_interests"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("list_active_interests"))
    }

    fn list_interests_above(&self, min_confidence: f32) -> Result<Vec<Interest>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM interests
                 WHERE is_active = 1 AND confidence >= ?1
                 ORDER BY confidence DESC",
            )
            .map_err(op_err("list_interests_above"))?;
        let rows = stmt
            .query_map(params![min_confidence], Self::parse_interest_row)
            .map_err(op_err("list_interests_above"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("list_interests_above"))
    }

    fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO evidence
                (id, interest_id, source_type, source_id, relevance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                evidence.id.as_str(),
                evidence.interest_id.as_str(),
                evidence.source_type.as_str(),
                evidence.source_id.as_str(),
                evidence.relevance,
                to_ts(evidence.created_at),
            ],
        )
        .map_err(op_err("insert_evidence"))?;
        Ok(())
    }

    fn list_evidence_for(&self, interest_id: &InterestId) -> Result<Vec<Evidence>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM evidence WHERE interest_id = ?1 ORDER BY created_at")
            .map_err(op_err("list_evidence_for"))?;
        let rows = stmt
            .query_map(params![interest_id.as_str()], Self::parse_evidence_row)
            .map_err(op_err("list_evidence_for"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("list_evidence_for"))
    }

    fn reassign_evidence(&self, from: &InterestId, to: &InterestId) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE evidence SET interest_id = ?2 WHERE interest_id = ?1",
            params![from.as_str(), to.as_str()],
        )
        .map_err(op_err("reassign_evidence"))
    }

    fn upsert_edge(&self, edge: &HierarchyEdge) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO hierarchy_edges
                (parent_id, child_id, edge_type, confidence, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(parent_id, child_id) DO UPDATE SET
                edge_type = excluded.edge_type,
                confidence = excluded.confidence,
                detected_at = excluded.detected_at",
            params![
                edge.parent_id.as_str(),
                edge.child_id.as_str(),
                edge.edge_type,
                edge.confidence,
                to_ts(edge.detected_at),
            ],
        )
        .map_err(op_err("upsert_edge"))?;
        Ok(())
    }

    fn list_edges(&self) -> Result<Vec<HierarchyEdge>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM hierarchy_edges ORDER BY parent_id, child_id")
            .map_err(op_err("list_edges"))?;
        let rows = stmt
            .query_map([], Self::parse_edge_row)
            .map_err(op_err("list_edges"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("list_edges"))
    }

    fn edges_from(&self, parent_id: &InterestId) -> Result<Vec<HierarchyEdge>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM hierarchy_edges WHERE parent_id = ?1 ORDER BY child_id")
            .map_err(op_err("edges_from"))?;
        let rows = stmt
            .query_map(params![parent_id.as_str()], Self::parse_edge_row)
            .map_err(op_err("edges_from"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("edges_from"))
    }

    fn edges_to(&self, child_id: &InterestId) -> Result<Vec<HierarchyEdge>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM hierarchy_edges WHERE child_id = ?1 ORDER BY parent_id")
            .map_err(op_err("edges_to"))?;
        let rows = stmt
            .query_map(params![child_id.as_str()], Self::parse_edge_row)
            .map_err(op_err("edges_to"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("edges_to"))
    }

    fn delete_edges_for(&self, id: &InterestId) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "DELETE FROM hierarchy_edges WHERE parent_id = ?1 OR child_id = ?1",
            params![id.as_str()],
        )
        .map_err(op_err("delete_edges_for"))
    }

    fn upsert_similarity(&self, pair: &SimilarityPair) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO similarity_pairs (id_a, id_b, similarity, computed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id_a, id_b) DO UPDATE SET
                similarity = excluded.similarity,
                computed_at = excluded.computed_at",
            params![
                pair.id_a.as_str(),
                pair.id_b.as_str(),
                pair.similarity,
                to_ts(pair.computed_at),
            ],
        )
        .map_err(op_err("upsert_similarity"))?;
        Ok(())
    }

    fn get_similarity(&self, a: &InterestId, b: &InterestId) -> Result<Option<SimilarityPair>> {
        let (id_a, id_b) = SimilarityPair::canonical(a.clone(), b.clone());
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT id_a, id_b, similarity, computed_at
             FROM similarity_pairs WHERE id_a = ?1 AND id_b = ?2",
            params![id_a.as_str(), id_b.as_str()],
            |row| {
                let id_a: String = row.get("id_a")?;
                let id_b: String = row.get("id_b")?;
                let similarity: f32 = row.get("similarity")?;
                let computed_at: i64 = row.get("computed_at")?;
                Ok(SimilarityPair {
                    id_a: InterestId::new(id_a),
                    id_b: InterestId::new(id_b),
                    similarity,
                    computed_at: from_ts(computed_at),
                })
            },
        )
        .optional()
        .map_err(op_err("get_similarity"))
    }

    fn upsert_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO recommendations
                (source_id, recommended_topic, score, reasoning,
                 co_occurrence, semantic, hierarchy, temporal,
                 computed_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(source_id, recommended_topic) DO UPDATE SET
                score = excluded.score,
                reasoning = excluded.reasoning,
                co_occurrence = excluded.co_occurrence,
                semantic = excluded.semantic,
                hierarchy = excluded.hierarchy,
                temporal = excluded.temporal,
                computed_at = excluded.computed_at,
                expires_at = excluded.expires_at",
            params![
                recommendation.source_id.as_str(),
                recommendation.recommended_topic,
                recommendation.score,
                recommendation.reasoning,
                recommendation.signals.co_occurrence,
                recommendation.signals.semantic,
                recommendation.signals.hierarchy,
                recommendation.signals.temporal,
                to_ts(recommendation.computed_at),
                to_ts(recommendation.expires_at),
            ],
        )
        .map_err(op_err("upsert_recommendation"))?;
        Ok(())
    }

    fn list_recommendations(
        &self,
        source_id: &InterestId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM recommendations
                 WHERE source_id = ?1 AND expires_at > ?2
                 ORDER BY score DESC",
            )
            .map_err(op_err("list_recommendations"))?;
        let rows = stmt
            .query_map(
                params![source_id.as_str(), to_ts(now)],
                Self::parse_recommendation_row,
            )
            .map_err(op_err("list_recommendations"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_err("list_recommendations"))
    }

    fn put_embedding(&self, embedding: &InterestEmbedding) -> Result<()> {
        let vector = serde_json::to_string(&embedding.vector).map_err(|e| {
            Error::OperationFailed {
                operation: "put_embedding".to_string(),
                cause: format!("vector serialization: {e}"),
            }
        })?;

        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO embeddings (interest_id, vector, model, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(interest_id) DO UPDATE SET
                vector = excluded.vector,
                model = excluded.model,
                created_at = excluded.created_at",
            params![
                embedding.interest_id.as_str(),
                vector,
                embedding.model,
                to_ts(embedding.created_at),
            ],
        )
        .map_err(op_err("put_embedding"))?;
        Ok(())
    }

    fn get_embedding(&self, id: &InterestId) -> Result<Option<InterestEmbedding>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT interest_id, vector, model, created_at
             FROM embeddings WHERE interest_id = ?1",
            params![id.as_str()],
            |row| {
                let interest_id: String = row.get("interest_id")?;
                let vector_json: String = row.get("vector")?;
                let model: String = row.get("model")?;
                let created_at: i64 = row.get("created_at")?;
                let vector: Vec<f32> = serde_json::from_str(&vector_json)
                    .map_err(|e| conversion_err(format!("invalid vector JSON: {e}")))?;
                Ok(InterestEmbedding {
                    interest_id: InterestId::new(interest_id),
                    vector,
                    model,
                    created_at: from_ts(created_at),
                })
            },
        )
        .optional()
        .map_err(op_err("get_embedding"))
    }

    fn search_similar(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(InterestId, f32)>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT interest_id, vector FROM embeddings")
            .map_err(op_err("search_similar"))?;
        let rows = stmt
            .query_map([], |row| {
                let interest_id: String = row.get("interest_id")?;
                let vector_json: String = row.get("vector")?;
                Ok((interest_id, vector_json))
            })
            .map_err(op_err("search_similar"))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, vector_json) = row.map_err(op_err("search_similar"))?;
            let vector: Vec<f32> =
                serde_json::from_str(&vector_json).map_err(|e| Error::OperationFailed {
                    operation: "search_similar".to_string(),
                    cause: format!("invalid vector JSON: {e}"),
                })?;
            let sim = cosine_similarity(query, &vector);
            if sim >= threshold {
                hits.push((InterestId::new(id), sim));
            }
        }
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
