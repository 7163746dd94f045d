use rusqlite::Connection;

use crate::error::StoreError;

/// SQL expression for "now", in the same floating format as task dates
pub(crate) const NOW: &str = "strftime('%Y%m%dT%H%M%S', 'now')";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS lists (
    uid     TEXT PRIMARY KEY NOT NULL CHECK(length(uid) > 0),
    name    TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    synced  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tasks (
    list_uid         TEXT NOT NULL,
    uid              TEXT NOT NULL CHECK(length(uid) > 0),
    parent           TEXT NOT NULL DEFAULT '',
    text             TEXT NOT NULL DEFAULT '',
    notes            TEXT NOT NULL DEFAULT '',
    tags             TEXT NOT NULL DEFAULT '',
    color            TEXT NOT NULL DEFAULT '',
    priority         INTEGER NOT NULL DEFAULT 0 CHECK(priority BETWEEN 0 AND 9),
    percent_complete INTEGER NOT NULL DEFAULT 0 CHECK(percent_complete BETWEEN 0 AND 100),
    start_date       TEXT NOT NULL DEFAULT '',
    end_date         TEXT NOT NULL DEFAULT '',
    completed        INTEGER NOT NULL DEFAULT 0,
    deleted          INTEGER NOT NULL DEFAULT 0,
    trash            INTEGER NOT NULL DEFAULT 0,
    synced           INTEGER NOT NULL DEFAULT 0,
    expanded         INTEGER NOT NULL DEFAULT 0,
    toolbar_shown    INTEGER NOT NULL DEFAULT 0,
    position         INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y%m%dT%H%M%S', 'now')),
    changed_at       TEXT NOT NULL DEFAULT (strftime('%Y%m%dT%H%M%S', 'now')),
    PRIMARY KEY (list_uid, uid)
);

CREATE INDEX IF NOT EXISTS tasks_by_position ON tasks(list_uid, position);
CREATE INDEX IF NOT EXISTS tasks_by_parent ON tasks(list_uid, parent);
";

fn set_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

pub(crate) fn open(path: &std::path::Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}

pub(crate) fn open_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
