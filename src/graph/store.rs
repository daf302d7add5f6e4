//! SQLite-backed knowledge graph store.
//!
//! One store handle owns one backing file (or in-memory database) and the
//! three tables that live in it: entities, triples, co-occurrences. All
//! operations are synchronous; the batch exchange write is the single unit
//! of atomicity.

use crate::error::{Error, Result};
use crate::graph::schema::initialize_schema;
use crate::graph::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// SQLite-backed store for one agent's knowledge graph.
#[derive(Debug)]
pub struct GraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl GraphStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Internal(format!("store lock poisoned: {}", e)))
    }

    // ==================== Entity Registry ====================

    /// Insert an entity or, if it already exists, increment its mention
    /// count and refresh `last_seen`. Returns the normalized id.
    pub fn upsert_entity(&self, name: &str, entity_type: &str, agent_id: &str) -> Result<String> {
        let conn = self.lock()?;
        upsert_entity_in(&conn, name, entity_type, agent_id)
    }

    /// Upsert an entity and report whether it existed before this call.
    ///
    /// Existence is checked before the upsert side effect, so `is_new`
    /// reflects the pre-call state.
    pub fn resolve_entity(
        &self,
        name: &str,
        entity_type: &str,
        agent_id: &str,
    ) -> Result<ResolvedEntity> {
        let conn = self.lock()?;
        let id = normalize_entity_id(name);
        if id.is_empty() {
            return Err(Error::missing_param("name"));
        }

        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM entities WHERE id = ?1 AND agent_id = ?2",
                params![id, agent_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        let id = upsert_entity_in(&conn, name, entity_type, agent_id)?;
        Ok(ResolvedEntity {
            id,
            is_new: !existed,
        })
    }

    /// Get an entity by its normalized id.
    pub fn get_entity(&self, id: &str, agent_id: &str) -> Result<Option<Entity>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM entities WHERE id = ?1 AND agent_id = ?2", ENTITY_COLS),
            params![id, agent_id],
            row_to_entity,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get an entity by raw name (normalized before lookup).
    pub fn get_entity_by_name(&self, name: &str, agent_id: &str) -> Result<Option<Entity>> {
        self.get_entity(&normalize_entity_id(name), agent_id)
    }

    /// Case-sensitive prefix search over stored canonical names.
    pub fn find_entities_by_prefix(
        &self,
        prefix: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entities
             WHERE agent_id = ?1 AND substr(canonical_name, 1, length(?2)) = ?2
             ORDER BY mention_count DESC, canonical_name ASC
             LIMIT ?3",
            ENTITY_COLS
        ))?;

        let entities = stmt
            .query_map(params![agent_id, prefix, limit as i64], row_to_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entities)
    }

    // ==================== Triple Store ====================

    /// Add a triple, deduplicating on (subject, predicate, object, agent).
    ///
    /// On conflict the existing row's confidence is raised to
    /// `max(existing, incoming)` (never lowered), `updated_at` refreshes,
    /// and the existing id is returned. No entity rows are touched either way.
    pub fn add_triple(&self, input: &TripleInput) -> Result<String> {
        let conn = self.lock()?;
        add_triple_in(&conn, input)
    }

    /// Write one exchange's extraction output as a single transaction:
    /// entity upserts first, then triples (each deduplicated), then
    /// co-occurrence pairs (each normalized and sorted). All-or-nothing;
    /// partial state is never visible. Returns triple ids in input order.
    pub fn write_exchange(&self, batch: &ExchangeWrite) -> Result<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let result = write_exchange_in(&tx, batch);
        match result {
            Ok(ids) => {
                tx.commit()?;
                debug!(
                    exchange = %batch.source_exchange_id,
                    entities = batch.entities.len(),
                    triples = ids.len(),
                    pairs = batch.cooccurrences.len(),
                    "committed exchange write"
                );
                Ok(ids)
            }
            // Dropping the transaction rolls it back
            Err(e) => Err(e),
        }
    }

    /// All triples where the entity (by raw name) is subject or object.
    ///
    /// Each of the two scans is independently capped at `limit` before the
    /// union, so the deduplicated result can exceed `limit`. Ordered
    /// most-recently-updated first.
    pub fn get_triples_for(
        &self,
        entity_name: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Triple>> {
        self.get_triples_for_id(&normalize_entity_id(entity_name), agent_id, limit)
    }

    /// Same as [`get_triples_for`](Self::get_triples_for) but takes an
    /// already-normalized entity id.
    pub fn get_triples_for_id(
        &self,
        entity_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<Triple>> {
        let conn = self.lock()?;

        let mut merged: Vec<Triple> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for side in ["subject", "object"] {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM triples
                 WHERE {} = ?1 AND agent_id = ?2
                 ORDER BY updated_at DESC
                 LIMIT ?3",
                TRIPLE_COLS, side
            ))?;
            let rows = stmt
                .query_map(params![entity_id, agent_id, limit as i64], row_to_triple)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for triple in rows {
                if seen.insert(triple.id.clone()) {
                    merged.push(triple);
                }
            }
        }

        merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(merged)
    }

    /// Conjunctive filter over triples. Only the filters present in the
    /// query contribute predicates; results are ordered
    /// most-recently-updated first.
    pub fn query_triples(&self, filter: &TripleFilter) -> Result<Vec<Triple>> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM triples WHERE 1=1", TRIPLE_COLS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref subject) = filter.subject {
            sql.push_str(" AND subject = ?");
            params_vec.push(Box::new(normalize_entity_id(subject)));
        }
        if let Some(ref predicate) = filter.predicate {
            sql.push_str(" AND predicate = ?");
            params_vec.push(Box::new(predicate.clone()));
        }
        if let Some(ref object) = filter.object {
            sql.push_str(" AND object = ?");
            params_vec.push(Box::new(normalize_entity_id(object)));
        }
        if let Some(ref agent_id) = filter.agent_id {
            sql.push_str(" AND agent_id = ?");
            params_vec.push(Box::new(agent_id.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC");
        sql.push_str(&format!(
            " LIMIT {}",
            filter.limit.unwrap_or(DEFAULT_TRIPLE_LIMIT)
        ));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let triples = stmt
            .query_map(params_refs.as_slice(), row_to_triple)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(triples)
    }

    /// Remove all triples attributed to an exchange (used when the exchange
    /// is re-extracted). Entities and co-occurrence counts are untouched.
    pub fn delete_triples_by_exchange(&self, exchange_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM triples WHERE source_exchange_id = ?1",
            params![exchange_id],
        )?;
        Ok(rows)
    }

    // ==================== Co-occurrence Cache ====================

    /// Increment the count for a pair of normalized entity ids.
    ///
    /// The caller MUST supply the pair already sorted (`a < b`); the store
    /// does not reorder. An unsorted pair creates a duplicate logical edge
    /// under the reverse key.
    pub fn upsert_cooccurrence(&self, entity_a: &str, entity_b: &str) -> Result<()> {
        let conn = self.lock()?;
        upsert_cooccurrence_in(&conn, entity_a, entity_b)
    }

    /// Co-occurrence rows where the entity (by raw name) is either side,
    /// resolved to the other side, ordered by count descending.
    pub fn get_cooccurrences(
        &self,
        entity_name: &str,
        limit: usize,
    ) -> Result<Vec<CooccurrentEntity>> {
        let conn = self.lock()?;
        let id = normalize_entity_id(entity_name);

        let mut stmt = conn.prepare(
            "SELECT CASE WHEN entity_a = ?1 THEN entity_b ELSE entity_a END AS other_id,
                    count, last_seen
             FROM cooccurrences
             WHERE entity_a = ?1 OR entity_b = ?1
             ORDER BY count DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![id, limit as i64], |row| {
                Ok(CooccurrentEntity {
                    entity_id: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    last_seen: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // ==================== Stats ====================

    /// Aggregate counts scoped to the agent. `top_cooccurrences` is the one
    /// unscoped field: the pair table carries no agent column.
    pub fn get_stats(&self, agent_id: &str) -> Result<GraphStats> {
        let conn = self.lock()?;

        let entity_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        let triple_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM triples WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entities WHERE agent_id = ?1 ORDER BY last_seen DESC LIMIT 10",
            ENTITY_COLS
        ))?;
        let recent_entities = stmt
            .query_map(params![agent_id], row_to_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT entity_a, entity_b, count, last_seen
             FROM cooccurrences ORDER BY count DESC LIMIT 10",
        )?;
        let top_cooccurrences = stmt
            .query_map([], |row| {
                Ok(Cooccurrence {
                    entity_a: row.get(0)?,
                    entity_b: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                    last_seen: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(GraphStats {
            entity_count: entity_count as u64,
            triple_count: triple_count as u64,
            recent_entities,
            top_cooccurrences,
        })
    }
}

// ==================== Shared statement bodies ====================
//
// Free functions over a borrowed connection so the same logic runs inside
// and outside the exchange transaction.

const ENTITY_COLS: &str =
    "id, canonical_name, entity_type, first_seen, last_seen, mention_count, aliases, metadata, agent_id";

const TRIPLE_COLS: &str =
    "id, subject, predicate, object, confidence, source_exchange_id, source_date, created_at, updated_at, agent_id, pending_resolution";

fn upsert_entity_in(
    conn: &Connection,
    name: &str,
    entity_type: &str,
    agent_id: &str,
) -> Result<String> {
    let id = normalize_entity_id(name);
    if id.is_empty() {
        return Err(Error::missing_param("name"));
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO entities (id, agent_id, canonical_name, entity_type, first_seen, last_seen, mention_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)
         ON CONFLICT(id, agent_id) DO UPDATE SET
            mention_count = mention_count + 1,
            last_seen = excluded.last_seen",
        params![id, agent_id, name.trim(), entity_type, now],
    )?;

    Ok(id)
}

fn add_triple_in(conn: &Connection, input: &TripleInput) -> Result<String> {
    let subject = normalize_entity_id(&input.subject);
    let object = normalize_entity_id(&input.object);
    if subject.is_empty() {
        return Err(Error::missing_param("subject"));
    }
    if object.is_empty() {
        return Err(Error::missing_param("object"));
    }
    if input.predicate.trim().is_empty() {
        return Err(Error::missing_param("predicate"));
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM triples
             WHERE subject = ?1 AND predicate = ?2 AND object = ?3 AND agent_id = ?4",
            params![subject, input.predicate, object, input.agent_id],
            |row| row.get(0),
        )
        .optional()?;

    let now = Utc::now().to_rfc3339();
    if let Some(id) = existing {
        conn.execute(
            "UPDATE triples SET confidence = MAX(confidence, ?2), updated_at = ?3 WHERE id = ?1",
            params![id, input.confidence, now],
        )?;
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    let source_date = input
        .source_date
        .clone()
        .unwrap_or_else(crate::graph::types::today_utc);
    conn.execute(
        "INSERT INTO triples (id, agent_id, subject, predicate, object, confidence,
                              source_exchange_id, source_date, created_at, updated_at,
                              pending_resolution)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)",
        params![
            id,
            input.agent_id,
            subject,
            input.predicate,
            object,
            input.confidence,
            input.source_exchange_id,
            source_date,
            now,
            input.pending_resolution,
        ],
    )?;

    Ok(id)
}

fn upsert_cooccurrence_in(conn: &Connection, entity_a: &str, entity_b: &str) -> Result<()> {
    if entity_a.is_empty() || entity_b.is_empty() {
        return Err(Error::missing_param("cooccurrence pair"));
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cooccurrences (entity_a, entity_b, count, last_seen)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(entity_a, entity_b) DO UPDATE SET
            count = count + 1,
            last_seen = excluded.last_seen",
        params![entity_a, entity_b, now],
    )?;

    Ok(())
}

fn write_exchange_in(conn: &Connection, batch: &ExchangeWrite) -> Result<Vec<String>> {
    for entity in &batch.entities {
        upsert_entity_in(conn, &entity.name, &entity.entity_type, &batch.agent_id)?;
    }

    let mut triple_ids = Vec::with_capacity(batch.triples.len());
    for mention in &batch.triples {
        let mut input = TripleInput::new(&mention.subject, &mention.predicate, &mention.object)
            .with_confidence(mention.confidence.unwrap_or(1.0))
            .with_agent(&batch.agent_id)
            .with_exchange(&batch.source_exchange_id);
        if let Some(ref date) = batch.source_date {
            input = input.with_date(date);
        }
        triple_ids.push(add_triple_in(conn, &input)?);
    }

    for (a, b) in &batch.cooccurrences {
        let mut first = normalize_entity_id(a);
        let mut second = normalize_entity_id(b);
        if first > second {
            std::mem::swap(&mut first, &mut second);
        }
        upsert_cooccurrence_in(conn, &first, &second)?;
    }

    Ok(triple_ids)
}

// ==================== Row mappers ====================

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    let aliases: Vec<String> = row
        .get::<_, Option<String>>(6)?
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    let metadata: Option<HashMap<String, Value>> = row
        .get::<_, Option<String>>(7)?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(Entity {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        entity_type: row.get(2)?,
        first_seen: parse_datetime(row.get::<_, String>(3)?),
        last_seen: parse_datetime(row.get::<_, String>(4)?),
        mention_count: row.get::<_, i64>(5)? as u64,
        aliases,
        metadata,
        agent_id: row.get(8)?,
    })
}

fn row_to_triple(row: &rusqlite::Row) -> rusqlite::Result<Triple> {
    Ok(Triple {
        id: row.get(0)?,
        subject: row.get(1)?,
        predicate: row.get(2)?,
        object: row.get(3)?,
        confidence: row.get(4)?,
        source_exchange_id: row.get(5)?,
        source_date: row.get(6)?,
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
        agent_id: row.get(9)?,
        pending_resolution: row.get(10)?,
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> GraphStore {
        GraphStore::in_memory().unwrap()
    }

    fn exchange(id: &str) -> ExchangeWrite {
        ExchangeWrite {
            entities: vec![
                EntityMention::new("Alice", "PERSON"),
                EntityMention::new("Paris", "PLACE"),
            ],
            triples: vec![TripleMention::new("Alice", "visited", "Paris").with_confidence(0.8)],
            cooccurrences: vec![("Alice".to_string(), "Paris".to_string())],
            agent_id: "main".to_string(),
            source_exchange_id: id.to_string(),
            source_date: Some("2026-08-01".to_string()),
        }
    }

    #[test]
    fn test_upsert_entity_increments_mentions() {
        let store = store();
        let id = store.upsert_entity("Alice", "PERSON", "main").unwrap();
        assert_eq!(id, "alice");

        store.upsert_entity("  ALICE ", "PERSON", "main").unwrap();

        let entity = store.get_entity("alice", "main").unwrap().unwrap();
        assert_eq!(entity.mention_count, 2);
        assert_eq!(entity.canonical_name, "Alice");
    }

    #[test]
    fn test_entities_scoped_by_agent() {
        let store = store();
        store.upsert_entity("Alice", "PERSON", "main").unwrap();
        store.upsert_entity("Alice", "PERSON", "aux").unwrap();

        let main = store.get_entity("alice", "main").unwrap().unwrap();
        let aux = store.get_entity("alice", "aux").unwrap().unwrap();
        assert_eq!(main.mention_count, 1);
        assert_eq!(aux.mention_count, 1);
        assert!(store.get_entity("alice", "other").unwrap().is_none());
    }

    #[test]
    fn test_upsert_entity_rejects_empty_name() {
        let store = store();
        let err = store.upsert_entity("   ", "PERSON", "main").unwrap_err();
        assert!(matches!(err, Error::MissingParam { .. }));
    }

    #[test]
    fn test_resolve_entity_reports_prior_existence() {
        let store = store();
        let first = store.resolve_entity("Alice", "PERSON", "main").unwrap();
        assert!(first.is_new);
        assert_eq!(first.id, "alice");

        let second = store.resolve_entity("alice", "PERSON", "main").unwrap();
        assert!(!second.is_new);

        // Both calls counted as mentions
        let entity = store.get_entity("alice", "main").unwrap().unwrap();
        assert_eq!(entity.mention_count, 2);
    }

    #[test]
    fn test_find_entities_by_prefix_is_case_sensitive() {
        let store = store();
        store.upsert_entity("Paris", "PLACE", "main").unwrap();
        store.upsert_entity("parser", "CONCEPT", "main").unwrap();

        let upper = store.find_entities_by_prefix("Par", "main", 10).unwrap();
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].canonical_name, "Paris");

        let lower = store.find_entities_by_prefix("par", "main", 10).unwrap();
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].canonical_name, "parser");
    }

    #[test]
    fn test_find_entities_by_prefix_caps_results() {
        let store = store();
        for i in 0..5 {
            store
                .upsert_entity(&format!("node{}", i), "CONCEPT", "main")
                .unwrap();
        }
        let found = store.find_entities_by_prefix("node", "main", 3).unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_add_triple_dedup_keeps_max_confidence() {
        let store = store();
        let input = TripleInput::new("Alice", "visited", "Paris");

        let id1 = store
            .add_triple(&input.clone().with_confidence(0.6))
            .unwrap();
        let id2 = store
            .add_triple(&input.clone().with_confidence(0.9))
            .unwrap();
        assert_eq!(id1, id2);

        let triples = store
            .query_triples(&TripleFilter::new().agent("main"))
            .unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].confidence, 0.9);

        // Lower confidence later never wins
        store.add_triple(&input.with_confidence(0.5)).unwrap();
        let triples = store
            .query_triples(&TripleFilter::new().agent("main"))
            .unwrap();
        assert_eq!(triples[0].confidence, 0.9);
    }

    #[test]
    fn test_add_triple_dedup_is_order_independent() {
        let store = store();
        let input = TripleInput::new("Alice", "visited", "Paris");

        store.add_triple(&input.clone().with_confidence(0.9)).unwrap();
        store.add_triple(&input.with_confidence(0.6)).unwrap();

        let triples = store.query_triples(&TripleFilter::new()).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].confidence, 0.9);
    }

    #[test]
    fn test_add_triple_normalizes_endpoints() {
        let store = store();
        store
            .add_triple(&TripleInput::new(" ALICE ", "knows", "Bob  Smith"))
            .unwrap();

        let triples = store.query_triples(&TripleFilter::new()).unwrap();
        assert_eq!(triples[0].subject, "alice");
        assert_eq!(triples[0].object, "bob_smith");
    }

    #[test]
    fn test_add_triple_defaults_source_date() {
        let store = store();
        store
            .add_triple(&TripleInput::new("a", "b", "c"))
            .unwrap();

        let triples = store.query_triples(&TripleFilter::new()).unwrap();
        assert_eq!(triples[0].source_date, crate::graph::types::today_utc());
    }

    #[test]
    fn test_write_exchange_returns_ids_in_input_order() {
        let store = store();
        let mut batch = exchange("ex-1");
        batch
            .triples
            .push(TripleMention::new("Paris", "located_in", "France"));

        let ids = store.write_exchange(&batch).unwrap();
        assert_eq!(ids.len(), 2);

        let first = store
            .query_triples(&TripleFilter::new().predicate("visited"))
            .unwrap();
        assert_eq!(first[0].id, ids[0]);
    }

    #[test]
    fn test_write_exchange_dedups_against_existing_triples() {
        let store = store();
        store.write_exchange(&exchange("ex-1")).unwrap();
        let ids = store.write_exchange(&exchange("ex-1")).unwrap();

        let triples = store.query_triples(&TripleFilter::new()).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].id, ids[0]);

        // Entities counted a mention per batch
        let alice = store.get_entity("alice", "main").unwrap().unwrap();
        assert_eq!(alice.mention_count, 2);
    }

    #[test]
    fn test_write_exchange_atomic_on_cooccurrence_failure() {
        let store = store();
        let mut batch = exchange("ex-1");
        // An empty side fails validation after entities and triples were staged
        batch.cooccurrences.push(("".to_string(), "Paris".to_string()));

        let err = store.write_exchange(&batch).unwrap_err();
        assert!(matches!(err, Error::MissingParam { .. }));

        // Nothing from the batch is visible
        assert!(store.get_entity("alice", "main").unwrap().is_none());
        assert!(store.query_triples(&TripleFilter::new()).unwrap().is_empty());
        assert!(store.get_cooccurrences("Alice", 10).unwrap().is_empty());
    }

    #[test]
    fn test_write_exchange_atomic_on_triple_failure() {
        let store = store();
        let mut batch = exchange("ex-1");
        batch.triples.push(TripleMention::new("", "broken", "x"));

        store.write_exchange(&batch).unwrap_err();
        assert_eq!(store.get_stats("main").unwrap().entity_count, 0);
        assert_eq!(store.get_stats("main").unwrap().triple_count, 0);
    }

    #[test]
    fn test_cooccurrence_symmetry() {
        let store = store();
        store.write_exchange(&exchange("ex-1")).unwrap();

        // Queried from either side, the other side resolves
        let from_paris = store.get_cooccurrences("Paris", 10).unwrap();
        assert_eq!(from_paris.len(), 1);
        assert_eq!(from_paris[0].entity_id, "alice");
        assert_eq!(from_paris[0].count, 1);

        let from_alice = store.get_cooccurrences("alice", 10).unwrap();
        assert_eq!(from_alice[0].entity_id, "paris");
    }

    #[test]
    fn test_cooccurrence_counts_accumulate() {
        let store = store();
        store.upsert_cooccurrence("alice", "paris").unwrap();
        store.upsert_cooccurrence("alice", "paris").unwrap();
        store.upsert_cooccurrence("alice", "bob").unwrap();

        let rows = store.get_cooccurrences("alice", 10).unwrap();
        assert_eq!(rows.len(), 2);
        // Ordered by count descending
        assert_eq!(rows[0].entity_id, "paris");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].entity_id, "bob");
    }

    #[test]
    fn test_get_triples_for_unions_both_sides() {
        let store = store();
        store
            .add_triple(&TripleInput::new("Alice", "visited", "Paris"))
            .unwrap();
        store
            .add_triple(&TripleInput::new("Bob", "likes", "Alice"))
            .unwrap();
        store
            .add_triple(&TripleInput::new("Bob", "visited", "Rome"))
            .unwrap();

        let triples = store.get_triples_for("Alice", "main", 50).unwrap();
        assert_eq!(triples.len(), 2);
    }

    #[test]
    fn test_get_triples_for_dedups_self_referential() {
        let store = store();
        store
            .add_triple(&TripleInput::new("Ouroboros", "eats", "Ouroboros"))
            .unwrap();

        let triples = store.get_triples_for("Ouroboros", "main", 50).unwrap();
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_query_triples_conjunctive_filters() {
        let store = store();
        store
            .add_triple(&TripleInput::new("Alice", "visited", "Paris"))
            .unwrap();
        store
            .add_triple(&TripleInput::new("Alice", "visited", "Rome"))
            .unwrap();
        store
            .add_triple(&TripleInput::new("Alice", "likes", "Rome"))
            .unwrap();

        let visited_rome = store
            .query_triples(&TripleFilter::new().subject("Alice").predicate("visited").object("rome"))
            .unwrap();
        assert_eq!(visited_rome.len(), 1);

        let all_alice = store
            .query_triples(&TripleFilter::new().subject("alice"))
            .unwrap();
        assert_eq!(all_alice.len(), 3);

        let limited = store
            .query_triples(&TripleFilter::new().subject("alice").limit(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_delete_triples_by_exchange_preserves_entities() {
        let store = store();
        store.write_exchange(&exchange("ex-1")).unwrap();
        store.write_exchange(&exchange("ex-1")).unwrap();

        let removed = store.delete_triples_by_exchange("ex-1").unwrap();
        assert_eq!(removed, 1);

        assert!(store.query_triples(&TripleFilter::new()).unwrap().is_empty());

        // Entities keep their accumulated mention counts
        let alice = store.get_entity_by_name("Alice", "main").unwrap().unwrap();
        assert_eq!(alice.mention_count, 2);
        // Co-occurrence counts are not rolled back
        assert_eq!(store.get_cooccurrences("Alice", 10).unwrap()[0].count, 2);
    }

    #[test]
    fn test_get_stats() {
        let store = store();
        store.write_exchange(&exchange("ex-1")).unwrap();
        store.upsert_entity("Bob", "PERSON", "aux").unwrap();

        let stats = store.get_stats("main").unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.triple_count, 1);
        assert_eq!(stats.recent_entities.len(), 2);
        assert_eq!(stats.top_cooccurrences.len(), 1);
        assert_eq!(stats.top_cooccurrences[0].entity_a, "alice");

        // The aux agent sees its own entities only
        let aux = store.get_stats("aux").unwrap();
        assert_eq!(aux.entity_count, 1);
        assert_eq!(aux.triple_count, 0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");

        {
            let store = GraphStore::open(&path).unwrap();
            store.write_exchange(&exchange("ex-1")).unwrap();
        }

        let reopened = GraphStore::open(&path).unwrap();
        let stats = reopened.get_stats("main").unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.triple_count, 1);
    }
}
