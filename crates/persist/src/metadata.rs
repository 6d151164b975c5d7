use std::time::Instant;

use dirt_core::path::normalize;
use dirt_core::prelude::*;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::{internal, observe, MetadataStore, SqliteStore};

impl MetadataStore for SqliteStore {
    fn set(&self, path: &str, value: &str) -> DirtResult<MetadataEntry> {
        let started = Instant::now();
        let entry = MetadataEntry { path: normalize(path), value: value.to_string(), updated_at: dirt_core::now() };
        let db = self.conn()?;
        db.execute(
            "INSERT INTO metadata (path, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![entry.path, entry.value, entry.updated_at],
        )
        .map_err(|e| internal("set metadata", e))?;
        observe("metadata_set", started);
        Ok(entry)
    }

    fn get(&self, path: &str) -> DirtResult<MetadataEntry> {
        let started = Instant::now();
        let canonical = normalize(path);
        let db = self.conn()?;
        let found = db
            .query_row(
                "SELECT path, value, updated_at FROM metadata WHERE path = ?1",
                [&canonical],
                |row| Ok(MetadataEntry { path: row.get(0)?, value: row.get(1)?, updated_at: row.get(2)? }),
            )
            .optional()
            .map_err(|e| internal("get metadata", e))?;
        observe("metadata_get", started);
        found.ok_or_else(|| DirtError::not_found("metadata", &canonical))
    }

    fn list(&self, prefix: Option<&str>) -> DirtResult<Vec<String>> {
        let started = Instant::now();
        let db = self.conn()?;
        let paths = match prefix.filter(|p| !p.is_empty()) {
            None => {
                let mut stmt =
                    db.prepare("SELECT path FROM metadata ORDER BY path").map_err(|e| internal("list metadata", e))?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .and_then(|it| it.collect::<rusqlite::Result<Vec<_>>>());
                rows
            }
            Some(p) => {
                // Literal prefix: LIKE would treat `_`/`%` as wildcards and fold ASCII case.
                let canonical = normalize(p);
                debug!(prefix = %canonical, "persist: metadata prefix scan");
                let mut stmt = db
                    .prepare(
                        "SELECT path FROM metadata
                         WHERE path >= ?1 AND substr(path, 1, length(?1)) = ?1
                         ORDER BY path",
                    )
                    .map_err(|e| internal("list metadata", e))?;
                let rows = stmt
                    .query_map([&canonical], |row| row.get::<_, String>(0))
                    .and_then(|it| it.collect::<rusqlite::Result<Vec<_>>>());
                rows
            }
        }
        .map_err(|e| internal("list metadata", e))?;
        observe("metadata_list", started);
        Ok(paths)
    }

    fn delete(&self, path: &str) -> DirtResult<()> {
        let started = Instant::now();
        let canonical = normalize(path);
        let db = self.conn()?;
        let changed = db
            .execute("DELETE FROM metadata WHERE path = ?1", [&canonical])
            .map_err(|e| internal("delete metadata", e))?;
        observe("metadata_delete", started);
        if changed == 0 {
            return Err(DirtError::not_found("metadata", &canonical));
        }
        Ok(())
    }
}
