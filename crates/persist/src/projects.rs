use std::time::Instant;

use dirt_core::prelude::*;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::{internal, is_unique_violation, observe, ProjectStore, SqliteStore};

const COLUMNS: &str = "id, name, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project { id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)?, updated_at: row.get(3)? })
}

impl ProjectStore for SqliteStore {
    fn create(&self, project: &Project) -> DirtResult<()> {
        let started = Instant::now();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO projects (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![project.id, project.name, project.created_at, project.updated_at],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DirtError::already_exists("project", "name", &project.name)
            } else {
                internal("create project", e)
            }
        })?;
        observe("project_create", started);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> DirtResult<Project> {
        let started = Instant::now();
        let db = self.conn()?;
        let found = db
            .query_row(&format!("SELECT {} FROM projects WHERE id = ?1", COLUMNS), [id], from_row)
            .optional()
            .map_err(|e| internal("get project", e))?;
        observe("project_get", started);
        found.ok_or_else(|| DirtError::not_found("project", id))
    }

    fn get_by_name(&self, name: &str) -> DirtResult<Project> {
        let started = Instant::now();
        let db = self.conn()?;
        let found = db
            .query_row(&format!("SELECT {} FROM projects WHERE name = ?1", COLUMNS), [name], from_row)
            .optional()
            .map_err(|e| internal("get project", e))?;
        observe("project_get", started);
        found.ok_or_else(|| DirtError::not_found("project", name))
    }

    fn list(&self, filter: &ProjectFilter) -> DirtResult<Vec<Project>> {
        let started = Instant::now();
        let mut sql = format!("SELECT {} FROM projects", COLUMNS);
        let mut args: Vec<&str> = Vec::new();
        if let Some(name) = filter.name.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(" WHERE name = ?1");
            args.push(name);
        }
        sql.push_str(" ORDER BY created_at, id");
        let db = self.conn()?;
        let mut stmt = db.prepare(&sql).map_err(|e| internal("list projects", e))?;
        let rows = stmt
            .query_map(params_from_iter(args), from_row)
            .and_then(|it| it.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| internal("list projects", e))?;
        observe("project_list", started);
        Ok(rows)
    }

    fn update(&self, id: &str, req: &UpdateProjectRequest) -> DirtResult<Project> {
        let started = Instant::now();
        let db = self.conn()?;
        let changed = db
            .execute(
                "UPDATE projects SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![req.name, dirt_core::now(), id],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DirtError::already_exists("project", "name", &req.name)
                } else {
                    internal("update project", e)
                }
            })?;
        if changed == 0 {
            return Err(DirtError::not_found("project", id));
        }
        let project = db
            .query_row(&format!("SELECT {} FROM projects WHERE id = ?1", COLUMNS), [id], from_row)
            .map_err(|e| internal("reload project", e))?;
        observe("project_update", started);
        Ok(project)
    }

    fn delete(&self, id: &str) -> DirtResult<()> {
        let started = Instant::now();
        let db = self.conn()?;
        let changed = db
            .execute("DELETE FROM projects WHERE id = ?1", [id])
            .map_err(|e| internal("delete project", e))?;
        observe("project_delete", started);
        if changed == 0 {
            return Err(DirtError::not_found("project", id));
        }
        Ok(())
    }
}
