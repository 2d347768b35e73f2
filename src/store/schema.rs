use rusqlite::Connection;

use crate::errors::GraphImportError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphImportError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT
        );
        CREATE TABLE IF NOT EXISTS graph_labels (
            node_id INTEGER NOT NULL,
            label   TEXT NOT NULL,
            PRIMARY KEY (node_id, label)
        );
        CREATE TABLE IF NOT EXISTS graph_properties (
            node_id INTEGER NOT NULL,
            key     TEXT NOT NULL,
            value   TEXT NOT NULL,
            PRIMARY KEY (node_id, key)
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            from_id   INTEGER NOT NULL,
            to_id     INTEGER NOT NULL,
            edge_type TEXT NOT NULL,
            data      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_schema (
            label    TEXT NOT NULL,
            property TEXT NOT NULL,
            kind     TEXT NOT NULL CHECK (kind IN ('index', 'unique')),
            PRIMARY KEY (label, property)
        );
        CREATE INDEX IF NOT EXISTS idx_labels_label_node ON graph_labels(label, node_id);
        CREATE INDEX IF NOT EXISTS idx_props_key_value_node ON graph_properties(key, value, node_id);
        CREATE INDEX IF NOT EXISTS idx_edges_from_to_type ON graph_edges(from_id, to_id, edge_type);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        "#,
    )
    .map_err(|e| GraphImportError::schema(e.to_string()))?;
    Ok(())
}
