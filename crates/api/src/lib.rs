//! DirtCloud resource lifecycle service.
//!
//! The single place where business rules are enforced independent of
//! transport: validation, referential integrity on instance creation, merged
//! validation on partial instance updates, and the non-empty path rule for
//! metadata. It holds no state beyond the injected stores; every call
//! round-trips through persistence.

#![forbid(unsafe_code)]

use std::sync::Arc;

use dirt_core::prelude::*;
use dirt_core::validate;
use dirt_persist::{InstanceStore, MetadataStore, ProjectStore};
use tracing::{debug, info};

pub use dirt_persist::SqliteStore;

#[derive(Clone)]
pub struct Service {
    projects: Arc<dyn ProjectStore>,
    instances: Arc<dyn InstanceStore>,
    metadata: Arc<dyn MetadataStore>,
}

fn require_path(path: &str) -> DirtResult<()> {
    if path.is_empty() {
        return Err(DirtError::invalid_input("metadata path cannot be empty").with_detail("field", "path"));
    }
    Ok(())
}

impl Service {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        instances: Arc<dyn InstanceStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self { projects, instances, metadata }
    }

    /// Wire all three capabilities to one backing store.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: ProjectStore + InstanceStore + MetadataStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    // ---- projects ----

    pub fn create_project(&self, req: CreateProjectRequest) -> DirtResult<Project> {
        validate::validate_project_name(&req.name)?;
        let ts = dirt_core::now();
        let project = Project { id: dirt_core::new_id(), name: req.name, created_at: ts, updated_at: ts };
        self.projects.create(&project)?;
        info!(id = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> DirtResult<Project> {
        debug!(id = %id, "get project");
        self.projects.get_by_id(id)
    }

    pub fn list_projects(&self, filter: &ProjectFilter) -> DirtResult<Vec<Project>> {
        self.projects.list(filter)
    }

    pub fn update_project(&self, id: &str, req: UpdateProjectRequest) -> DirtResult<Project> {
        validate::validate_project_name(&req.name)?;
        let project = self.projects.update(id, &req)?;
        info!(id = %id, name = %project.name, "project updated");
        Ok(project)
    }

    /// Instances that reference the project are left in place.
    pub fn delete_project(&self, id: &str) -> DirtResult<()> {
        self.projects.delete(id)?;
        info!(id = %id, "project deleted");
        Ok(())
    }

    // ---- instances ----

    pub fn create_instance(&self, req: CreateInstanceRequest) -> DirtResult<Instance> {
        validate::validate_instance_name(&req.name)?;
        validate::validate_instance_spec(req.cpu, req.memory_mb, &req.image)?;
        let status = match req.status.as_deref() {
            None | Some("") => InstanceStatus::Running,
            Some(s) => validate::validate_status(s)?,
        };

        // A missing owner is a referential-integrity failure for this call,
        // not a not-found on the instance.
        if let Err(e) = self.projects.get_by_id(&req.project_id) {
            if e.is_not_found() {
                return Err(DirtError::foreign_key_violation("project", "id", &req.project_id));
            }
            return Err(e);
        }

        let ts = dirt_core::now();
        let instance = Instance {
            id: dirt_core::new_id(),
            project_id: req.project_id,
            name: req.name,
            cpu: req.cpu,
            memory_mb: req.memory_mb,
            image: req.image,
            status,
            created_at: ts,
            updated_at: ts,
        };
        self.instances.create(&instance)?;
        info!(id = %instance.id, project_id = %instance.project_id, name = %instance.name, "instance created");
        Ok(instance)
    }

    pub fn get_instance(&self, id: &str) -> DirtResult<Instance> {
        debug!(id = %id, "get instance");
        self.instances.get_by_id(id)
    }

    pub fn list_instances(&self, filter: &InstanceFilter) -> DirtResult<Vec<Instance>> {
        self.instances.list(filter)
    }

    /// Partial update. When any of cpu/memory/image is present the merged
    /// view (current values overlaid with incoming ones) must pass full resource
    /// validation. Nothing is written if any check fails.
    pub fn update_instance(&self, id: &str, req: UpdateInstanceRequest) -> DirtResult<Instance> {
        if let Some(name) = &req.name {
            validate::validate_instance_name(name)?;
        }

        if req.cpu.is_some() || req.memory_mb.is_some() || req.image.is_some() {
            let current = self.instances.get_by_id(id)?;
            let cpu = req.cpu.unwrap_or(current.cpu);
            let memory_mb = req.memory_mb.unwrap_or(current.memory_mb);
            let image = req.image.as_deref().unwrap_or(&current.image);
            validate::validate_instance_spec(cpu, memory_mb, image)?;
        }

        let status = req.status.as_deref().map(validate::validate_status).transpose()?;

        let patch = InstancePatch {
            name: req.name,
            cpu: req.cpu,
            memory_mb: req.memory_mb,
            image: req.image,
            status,
        };
        let instance = self.instances.update(id, &patch)?;
        info!(id = %id, "instance updated");
        Ok(instance)
    }

    pub fn delete_instance(&self, id: &str) -> DirtResult<()> {
        self.instances.delete(id)?;
        info!(id = %id, "instance deleted");
        Ok(())
    }

    // ---- metadata ----
    // The empty string is rejected here even though the store would map it to `/`.

    pub fn set_metadata(&self, path: &str, value: &str) -> DirtResult<MetadataEntry> {
        require_path(path)?;
        let entry = self.metadata.set(path, value)?;
        info!(path = %entry.path, bytes = value.len(), "metadata set");
        Ok(entry)
    }

    pub fn get_metadata(&self, path: &str) -> DirtResult<MetadataEntry> {
        require_path(path)?;
        self.metadata.get(path)
    }

    pub fn get_metadata_value(&self, path: &str) -> DirtResult<String> {
        self.get_metadata(path).map(|e| e.value)
    }

    pub fn list_metadata(&self, prefix: Option<&str>) -> DirtResult<Vec<String>> {
        self.metadata.list(prefix)
    }

    pub fn delete_metadata(&self, path: &str) -> DirtResult<()> {
        require_path(path)?;
        self.metadata.delete(path)?;
        info!(path = %path, "metadata deleted");
        Ok(())
    }
}
