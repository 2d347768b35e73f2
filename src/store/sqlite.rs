use std::{collections::BTreeMap, path::Path};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    errors::GraphImportError,
    identity::{Index, Key},
    value::{Properties, PropertyValue},
};

use super::{
    GraphStore, NodeHandle, RelationshipHandle, SchemaKind, SchemaOutcome, schema::ensure_schema,
};

const WRITE_SAVEPOINT: &str = "graph_write";

/// SQLite tuning applied when a store is opened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Prepared statement cache capacity.
    #[serde(default)]
    pub cache_size: Option<usize>,
    /// Extra `PRAGMA name = value` settings, e.g. `journal_mode = "WAL"`.
    #[serde(default)]
    pub pragmas: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredRelationship {
    pub id: RelationshipHandle,
    pub start: NodeHandle,
    pub end: NodeHandle,
    pub rel_type: String,
    pub properties: Properties,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GraphImportError> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: &StoreConfig,
    ) -> Result<Self, GraphImportError> {
        let conn =
            Connection::open(path).map_err(|e| GraphImportError::connection(e.to_string()))?;
        apply_config(&conn, config)?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, GraphImportError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GraphImportError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an existing store without creating or migrating anything.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, GraphImportError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| GraphImportError::connection(e.to_string()))?;
        let store = Self { conn };
        if !store.table_exists("graph_nodes")? {
            return Err(GraphImportError::connection(format!(
                "{} is not a graph store",
                path.display()
            )));
        }
        Ok(store)
    }

    pub fn node_count(&self) -> Result<i64, GraphImportError> {
        self.count("SELECT COUNT(*) FROM graph_nodes")
    }

    pub fn relationship_count(&self) -> Result<i64, GraphImportError> {
        self.count("SELECT COUNT(*) FROM graph_edges")
    }

    pub fn node_labels(&self, node: NodeHandle) -> Result<Vec<String>, GraphImportError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label FROM graph_labels WHERE node_id=?1 ORDER BY label")
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![node.0], |row| row.get(0))
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let mut labels = Vec::new();
        for row in rows {
            labels.push(row.map_err(|e| GraphImportError::query(e.to_string()))?);
        }
        Ok(labels)
    }

    pub fn node_properties(&self, node: NodeHandle) -> Result<Properties, GraphImportError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM graph_properties WHERE node_id=?1")
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![node.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let mut properties = Properties::new();
        for row in rows {
            let (key, text) = row.map_err(|e| GraphImportError::query(e.to_string()))?;
            properties.insert(key, PropertyValue::from_json_text(&text)?);
        }
        Ok(properties)
    }

    pub fn node_property(
        &self,
        node: NodeHandle,
        name: &str,
    ) -> Result<Option<PropertyValue>, GraphImportError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM graph_properties WHERE node_id=?1 AND key=?2",
                params![node.0, name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        text.map(|t| PropertyValue::from_json_text(&t)).transpose()
    }

    pub fn relationship(
        &self,
        id: RelationshipHandle,
    ) -> Result<StoredRelationship, GraphImportError> {
        self.conn
            .query_row(
                "SELECT id, from_id, to_id, edge_type, data FROM graph_edges WHERE id=?1",
                params![id.0],
                row_to_relationship,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphImportError::not_found(format!("relationship {}", id.0))
                }
                other => GraphImportError::query(other.to_string()),
            })
    }

    /// Every stored relationship, optionally restricted to one type, ordered by id.
    pub fn relationships(
        &self,
        rel_type: Option<&str>,
    ) -> Result<Vec<StoredRelationship>, GraphImportError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, from_id, to_id, edge_type, data FROM graph_edges \
                 WHERE ?1 IS NULL OR edge_type=?1 ORDER BY id",
            )
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![rel_type], row_to_relationship)
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let mut relationships = Vec::new();
        for row in rows {
            relationships.push(row.map_err(|e| GraphImportError::query(e.to_string()))?);
        }
        Ok(relationships)
    }

    pub fn schema_entries(&self) -> Result<Vec<(Index, SchemaKind)>, GraphImportError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label, property, kind FROM graph_schema ORDER BY label, property")
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let mut entries = Vec::new();
        for row in rows {
            let (label, property, kind) =
                row.map_err(|e| GraphImportError::query(e.to_string()))?;
            entries.push((Index::with_property(label, property), SchemaKind::parse(&kind)?));
        }
        Ok(entries)
    }

    /// Distinct edges, in either direction, between a node labeled `first` and
    /// a node labeled `second`.
    pub fn count_label_connections(
        &self,
        first: &str,
        second: &str,
    ) -> Result<i64, GraphImportError> {
        self.conn
            .query_row(
                "SELECT COUNT(DISTINCT e.id) FROM graph_edges e \
                 JOIN graph_labels a ON a.node_id = e.from_id \
                 JOIN graph_labels b ON b.node_id = e.to_id \
                 WHERE (a.label = ?1 AND b.label = ?2) OR (a.label = ?2 AND b.label = ?1)",
                params![first, second],
                |row| row.get(0),
            )
            .map_err(|e| GraphImportError::query(e.to_string()))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn count(&self, sql: &str) -> Result<i64, GraphImportError> {
        self.conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| GraphImportError::query(e.to_string()))
    }

    fn table_exists(&self, name: &str) -> Result<bool, GraphImportError> {
        self.conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
            .and_then(|mut stmt| stmt.exists([name]))
            .map_err(|e| GraphImportError::query(e.to_string()))
    }

    fn node_exists(&self, node: NodeHandle) -> Result<bool, GraphImportError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM graph_nodes WHERE id=?1",
                params![node.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        Ok(exists.is_some())
    }

    fn require_node(&self, node: NodeHandle) -> Result<(), GraphImportError> {
        if self.node_exists(node)? {
            Ok(())
        } else {
            Err(GraphImportError::not_found(format!("node {}", node.0)))
        }
    }

    fn schema_kind(&self, index: &Index) -> Result<Option<SchemaKind>, GraphImportError> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM graph_schema WHERE label=?1 AND property=?2",
                params![index.label, index.property],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        kind.map(|k| SchemaKind::parse(&k)).transpose()
    }

    /// Runs a single node write and rejects it if the node now collides with
    /// another node under any uniqueness constraint.
    fn unique_write<F>(&self, node: NodeHandle, write: F) -> Result<(), GraphImportError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        self.savepoint(WRITE_SAVEPOINT)?;
        let outcome = write(&self.conn)
            .map_err(|e| GraphImportError::query(e.to_string()))
            .and_then(|_| self.check_unique(node));
        match outcome {
            Ok(()) => self.release_savepoint(WRITE_SAVEPOINT),
            Err(err) => {
                self.rollback_to_savepoint(WRITE_SAVEPOINT)?;
                Err(err)
            }
        }
    }

    fn check_unique(&self, node: NodeHandle) -> Result<(), GraphImportError> {
        let conflict: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT s.label, s.property, mp.value FROM graph_schema s \
                 JOIN graph_labels ml ON ml.node_id = ?1 AND ml.label = s.label \
                 JOIN graph_properties mp ON mp.node_id = ?1 AND mp.key = s.property \
                 JOIN graph_properties op ON op.key = s.property AND op.value = mp.value \
                      AND op.node_id != ?1 \
                 JOIN graph_labels ol ON ol.node_id = op.node_id AND ol.label = s.label \
                 WHERE s.kind = 'unique' LIMIT 1",
                params![node.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        match conflict {
            Some((label, property, value)) => Err(GraphImportError::constraint(format!(
                "node {} duplicates {label}.{property} = {value}",
                node.0
            ))),
            None => Ok(()),
        }
    }

    fn duplicate_values(&self, index: &Index) -> Result<i64, GraphImportError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM ( \
                     SELECT p.value FROM graph_properties p \
                     JOIN graph_labels l ON l.node_id = p.node_id AND l.label = ?1 \
                     WHERE p.key = ?2 GROUP BY p.value HAVING COUNT(*) > 1 \
                 )",
                params![index.label, index.property],
                |row| row.get(0),
            )
            .map_err(|e| GraphImportError::query(e.to_string()))
    }
}

impl GraphStore for SqliteStore {
    fn begin(&self) -> Result<(), GraphImportError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn commit(&self) -> Result<(), GraphImportError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn rollback(&self) -> Result<(), GraphImportError> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        validate_savepoint(name)?;
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn release_savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        validate_savepoint(name)?;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {name}"))
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn rollback_to_savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        validate_savepoint(name)?;
        self.conn
            .execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
            ))
            .map_err(|e| GraphImportError::transaction(e.to_string()))
    }

    fn create_node(&self) -> Result<NodeHandle, GraphImportError> {
        self.conn
            .execute("INSERT INTO graph_nodes DEFAULT VALUES", [])
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        Ok(NodeHandle(self.conn.last_insert_rowid()))
    }

    fn add_label(&self, node: NodeHandle, label: &str) -> Result<(), GraphImportError> {
        if label.trim().is_empty() {
            return Err(GraphImportError::invalid_input("label must be set"));
        }
        self.require_node(node)?;
        self.unique_write(node, |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO graph_labels(node_id, label) VALUES(?1, ?2)",
                params![node.0, label],
            )
        })
    }

    fn set_node_property(
        &self,
        node: NodeHandle,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), GraphImportError> {
        if name.trim().is_empty() {
            return Err(GraphImportError::invalid_input("property name must be set"));
        }
        let text = value.to_json_text()?;
        self.require_node(node)?;
        self.unique_write(node, |conn| {
            conn.execute(
                "INSERT INTO graph_properties(node_id, key, value) VALUES(?1, ?2, ?3) \
                 ON CONFLICT(node_id, key) DO UPDATE SET value = excluded.value",
                params![node.0, name, text],
            )
        })
    }

    fn find_nodes(&self, key: &Key) -> Result<Vec<NodeHandle>, GraphImportError> {
        let value = PropertyValue::from(&key.value).to_json_text()?;
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT p.node_id FROM graph_properties p \
                 JOIN graph_labels l ON l.node_id = p.node_id AND l.label = ?1 \
                 WHERE p.key = ?2 AND p.value = ?3 ORDER BY p.node_id",
            )
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![key.label(), key.property(), value], |row| {
                row.get(0).map(NodeHandle)
            })
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row.map_err(|e| GraphImportError::query(e.to_string()))?);
        }
        Ok(nodes)
    }

    fn find_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<Option<RelationshipHandle>, GraphImportError> {
        self.conn
            .query_row(
                "SELECT id FROM graph_edges WHERE from_id=?1 AND to_id=?2 AND edge_type=?3 \
                 ORDER BY id LIMIT 1",
                params![start.0, end.0, rel_type],
                |row| row.get(0).map(RelationshipHandle),
            )
            .optional()
            .map_err(|e| GraphImportError::query(e.to_string()))
    }

    fn create_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<RelationshipHandle, GraphImportError> {
        if rel_type.trim().is_empty() {
            return Err(GraphImportError::invalid_input("relationship type must be set"));
        }
        if !self.node_exists(start)? || !self.node_exists(end)? {
            return Err(GraphImportError::invalid_input(
                "relationship endpoints must reference existing nodes",
            ));
        }
        self.conn
            .execute(
                "INSERT INTO graph_edges(from_id, to_id, edge_type, data) VALUES(?1, ?2, ?3, '{}')",
                params![start.0, end.0, rel_type],
            )
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        Ok(RelationshipHandle(self.conn.last_insert_rowid()))
    }

    fn merge_relationship_properties(
        &self,
        relationship: RelationshipHandle,
        properties: &Properties,
    ) -> Result<(), GraphImportError> {
        if properties.is_empty() {
            return Ok(());
        }
        let current = self.relationship(relationship)?;
        let mut data = Map::new();
        for (name, value) in current.properties.iter().chain(properties.iter()) {
            value.validate()?;
            let encoded = serde_json::to_value(value)
                .map_err(|e| GraphImportError::invalid_input(e.to_string()))?;
            data.insert(name.clone(), encoded);
        }
        let text = serde_json::to_string(&Value::Object(data))
            .map_err(|e| GraphImportError::invalid_input(e.to_string()))?;
        self.conn
            .execute(
                "UPDATE graph_edges SET data=?1 WHERE id=?2",
                params![text, relationship.0],
            )
            .map_err(|e| GraphImportError::query(e.to_string()))?;
        Ok(())
    }

    fn ensure_index(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError> {
        validate_index(index)?;
        if self.schema_kind(index)?.is_some() {
            return Ok(SchemaOutcome::Existing);
        }
        self.conn
            .execute(
                "INSERT INTO graph_schema(label, property, kind) VALUES(?1, ?2, 'index')",
                params![index.label, index.property],
            )
            .map_err(|e| GraphImportError::schema(e.to_string()))?;
        Ok(SchemaOutcome::Created)
    }

    fn ensure_unique_constraint(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError> {
        validate_index(index)?;
        let existing = self.schema_kind(index)?;
        if existing == Some(SchemaKind::Unique) {
            return Ok(SchemaOutcome::Existing);
        }
        let duplicates = self.duplicate_values(index)?;
        if duplicates > 0 {
            return Err(GraphImportError::constraint(format!(
                "cannot create unique constraint on {index}: {duplicates} duplicated values"
            )));
        }
        self.conn
            .execute(
                "INSERT INTO graph_schema(label, property, kind) VALUES(?1, ?2, 'unique') \
                 ON CONFLICT(label, property) DO UPDATE SET kind = 'unique'",
                params![index.label, index.property],
            )
            .map_err(|e| GraphImportError::schema(e.to_string()))?;
        Ok(match existing {
            Some(_) => SchemaOutcome::Upgraded,
            None => SchemaOutcome::Created,
        })
    }
}

fn apply_config(conn: &Connection, config: &StoreConfig) -> Result<(), GraphImportError> {
    if let Some(capacity) = config.cache_size {
        conn.set_prepared_statement_cache_capacity(capacity);
    }
    for (name, value) in &config.pragmas {
        let value_ok = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !is_identifier(name) || !value_ok {
            return Err(GraphImportError::invalid_input(format!(
                "invalid pragma {name} = {value}"
            )));
        }
        // Some pragmas echo their new value as a row, others return nothing.
        let mut stmt = conn
            .prepare(&format!("PRAGMA {name} = {value}"))
            .map_err(|e| GraphImportError::connection(e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| GraphImportError::connection(e.to_string()))?;
        while rows
            .next()
            .map_err(|e| GraphImportError::connection(e.to_string()))?
            .is_some()
        {}
    }
    Ok(())
}

fn row_to_relationship(row: &rusqlite::Row<'_>) -> Result<StoredRelationship, rusqlite::Error> {
    let data: String = row.get(4)?;
    let properties: Properties = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            data.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(StoredRelationship {
        id: RelationshipHandle(row.get(0)?),
        start: NodeHandle(row.get(1)?),
        end: NodeHandle(row.get(2)?),
        rel_type: row.get(3)?,
        properties,
    })
}

fn validate_index(index: &Index) -> Result<(), GraphImportError> {
    if index.label.trim().is_empty() {
        return Err(GraphImportError::invalid_input("index label must be set"));
    }
    if index.property.trim().is_empty() {
        return Err(GraphImportError::invalid_input("index property must be set"));
    }
    Ok(())
}

fn validate_savepoint(name: &str) -> Result<(), GraphImportError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(GraphImportError::invalid_input(format!(
            "invalid savepoint name {name}"
        )))
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
