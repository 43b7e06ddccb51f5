//! Relational layout.
//!
//! Every tag and information row owns a `property_holders` row; deleting that
//! row cascades to the entity, its identifiers, properties and edges.

use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS property_holders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    holder_kind TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id         INTEGER PRIMARY KEY REFERENCES property_holders(id) ON DELETE CASCADE,
    name       TEXT,
    type       INTEGER NOT NULL,
    ewkt       TEXT,
    start_time INTEGER,
    duration   INTEGER,
    hidden     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_tags_type ON tags(type);

CREATE TABLE IF NOT EXISTS subject_identifiers (
    si       TEXT PRIMARY KEY,
    tag_id   INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_si_tag ON subject_identifiers(tag_id);

CREATE TABLE IF NOT EXISTS properties (
    owner_id INTEGER NOT NULL REFERENCES property_holders(id) ON DELETE CASCADE,
    key      TEXT NOT NULL,
    value    TEXT NOT NULL,
    PRIMARY KEY (owner_id, key)
);

CREATE TABLE IF NOT EXISTS taxonomy_edges (
    child_id  INTEGER PRIMARY KEY REFERENCES tags(id) ON DELETE CASCADE,
    parent_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_taxonomy_parent ON taxonomy_edges(parent_id);

CREATE TABLE IF NOT EXISTS net_edges (
    source_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    predicate TEXT NOT NULL,
    target_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (source_id, predicate, target_id)
);
CREATE INDEX IF NOT EXISTS idx_net_target ON net_edges(target_id, predicate);

CREATE TABLE IF NOT EXISTS context_points (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id      INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    originator_id INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    peer_id       INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    location_id   INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    time_id       INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    direction     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS information (
    id      INTEGER PRIMARY KEY REFERENCES property_holders(id) ON DELETE CASCADE,
    cp_id   INTEGER NOT NULL REFERENCES context_points(id) ON DELETE CASCADE,
    content BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_information_cp ON information(cp_id);
";

/// Tables in an order that satisfies foreign keys when dropping.
const TABLES: [&str; 8] = [
    "information",
    "context_points",
    "net_edges",
    "taxonomy_edges",
    "properties",
    "subject_identifiers",
    "tags",
    "property_holders",
];

pub(crate) const HOLDER_TAG: &str = "tag";
pub(crate) const HOLDER_INFORMATION: &str = "information";

pub(crate) fn bootstrap(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

pub(crate) fn drop_all(conn: &Connection) -> rusqlite::Result<()> {
    for table in TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        bootstrap(&conn).unwrap();
        assert_eq!(table_count(&conn), TABLES.len() as i64);
    }

    #[test]
    fn test_drop_all() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        bootstrap(&conn).unwrap();
        drop_all(&conn).unwrap();
        assert_eq!(table_count(&conn), 0);
    }

    #[test]
    fn test_holder_delete_cascades() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        bootstrap(&conn).unwrap();

        conn.execute("INSERT INTO property_holders(holder_kind) VALUES ('tag')", [])
            .unwrap();
        let id = conn.last_insert_rowid();
        conn.execute("INSERT INTO tags(id, type) VALUES (?1, 0)", [id]).unwrap();
        conn.execute(
            "INSERT INTO subject_identifiers(si, tag_id, position) VALUES ('urn:a', ?1, 0)",
            [id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO properties(owner_id, key, value) VALUES (?1, 'p1', 'v1')",
            [id],
        )
        .unwrap();

        conn.execute("DELETE FROM property_holders WHERE id = ?1", [id]).unwrap();

        let left: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM tags) + (SELECT COUNT(*) FROM subject_identifiers)
                      + (SELECT COUNT(*) FROM properties)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(left, 0);
    }
}
