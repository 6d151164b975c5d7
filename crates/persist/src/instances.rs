use std::time::Instant;

use dirt_core::prelude::*;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::{internal, is_unique_violation, observe, InstanceStore, SqliteStore};

const COLUMNS: &str = "id, project_id, name, cpu, memory_mb, image, status, created_at, updated_at";

/// Raw row; `status` is parsed after the driver hands it back.
struct InstanceRow {
    inst: Instance,
    status: String,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<InstanceRow> {
    Ok(InstanceRow {
        inst: Instance {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            cpu: row.get(3)?,
            memory_mb: row.get(4)?,
            image: row.get(5)?,
            status: InstanceStatus::default(),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        },
        status: row.get(6)?,
    })
}

impl TryFrom<InstanceRow> for Instance {
    type Error = DirtError;

    fn try_from(r: InstanceRow) -> DirtResult<Instance> {
        let status = r
            .status
            .parse::<InstanceStatus>()
            .map_err(|e| DirtError::internal(format!("corrupt instance row {}: {}", r.inst.id, e)))?;
        Ok(Instance { status, ..r.inst })
    }
}

fn load(db: &Connection, id: &str) -> DirtResult<Instance> {
    db.query_row(&format!("SELECT {} FROM instances WHERE id = ?1", COLUMNS), [id], from_row)
        .optional()
        .map_err(|e| internal("get instance", e))?
        .ok_or_else(|| DirtError::not_found("instance", id))?
        .try_into()
}

fn write_err(action: &str, name: &str, e: rusqlite::Error) -> DirtError {
    if is_unique_violation(&e) {
        DirtError::already_exists("instance", "name", name)
    } else {
        internal(action, e)
    }
}

impl InstanceStore for SqliteStore {
    fn create(&self, i: &Instance) -> DirtResult<()> {
        let started = Instant::now();
        let db = self.conn()?;
        db.execute(
            &format!("INSERT INTO instances ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", COLUMNS),
            params![
                i.id,
                i.project_id,
                i.name,
                i.cpu,
                i.memory_mb,
                i.image,
                i.status.as_str(),
                i.created_at,
                i.updated_at
            ],
        )
        .map_err(|e| write_err("create instance", &i.name, e))?;
        observe("instance_create", started);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> DirtResult<Instance> {
        let started = Instant::now();
        let db = self.conn()?;
        let inst = load(&db, id)?;
        observe("instance_get", started);
        Ok(inst)
    }

    fn list(&self, filter: &InstanceFilter) -> DirtResult<Vec<Instance>> {
        let started = Instant::now();
        let mut conds: Vec<String> = Vec::new();
        let mut args: Vec<&str> = Vec::new();
        let fields = [
            ("project_id", filter.project_id.as_deref()),
            ("name", filter.name.as_deref()),
            ("status", filter.status.as_deref()),
        ];
        for (col, val) in fields {
            if let Some(v) = val.filter(|s| !s.is_empty()) {
                args.push(v);
                conds.push(format!("{} = ?{}", col, args.len()));
            }
        }
        let mut sql = format!("SELECT {} FROM instances", COLUMNS);
        if !conds.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conds.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, id");

        let db = self.conn()?;
        let mut stmt = db.prepare(&sql).map_err(|e| internal("list instances", e))?;
        let rows = stmt
            .query_map(params_from_iter(args), from_row)
            .and_then(|it| it.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| internal("list instances", e))?;
        let out = rows.into_iter().map(Instance::try_from).collect::<DirtResult<Vec<_>>>()?;
        observe("instance_list", started);
        Ok(out)
    }

    fn update(&self, id: &str, patch: &InstancePatch) -> DirtResult<Instance> {
        let started = Instant::now();
        let mut db = self.conn()?;
        let tx = db.transaction().map_err(|e| internal("begin instance update", e))?;
        let mut inst = load(&tx, id)?;
        patch.apply_to(&mut inst);
        inst.updated_at = dirt_core::now();
        tx.execute(
            "UPDATE instances SET name = ?1, cpu = ?2, memory_mb = ?3, image = ?4, status = ?5, updated_at = ?6
             WHERE id = ?7",
            params![inst.name, inst.cpu, inst.memory_mb, inst.image, inst.status.as_str(), inst.updated_at, id],
        )
        .map_err(|e| write_err("update instance", &inst.name, e))?;
        tx.commit().map_err(|e| internal("commit instance update", e))?;
        observe("instance_update", started);
        Ok(inst)
    }

    fn delete(&self, id: &str) -> DirtResult<()> {
        let started = Instant::now();
        let db = self.conn()?;
        let changed = db
            .execute("DELETE FROM instances WHERE id = ?1", [id])
            .map_err(|e| internal("delete instance", e))?;
        observe("instance_delete", started);
        if changed == 0 {
            return Err(DirtError::not_found("instance", id));
        }
        Ok(())
    }
}
