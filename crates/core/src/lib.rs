//! DirtCloud core types: resources, request shapes, errors, paths, validation.

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod path;
pub mod validate;

pub use error::{Details, DirtError, DirtResult, ErrorKind};

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Running,
    Stopped,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(InstanceStatus::Running),
            "stopped" => Ok(InstanceStatus::Stopped),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub cpu: i64,
    pub memory_mb: i64,
    pub image: String,
    pub status: InstanceStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One entry of the metadata namespace, keyed by canonical path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataEntry {
    pub path: String,
    pub value: String,
    pub updated_at: Timestamp,
}

// ---- request shapes ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
}

/// `status` stays a raw string so an unknown value reaches validation
/// instead of failing at decode time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub project_id: String,
    pub name: String,
    pub cpu: i64,
    pub memory_mb: i64,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInstanceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Validated partial update handed to the instance store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePatch {
    pub name: Option<String>,
    pub cpu: Option<i64>,
    pub memory_mb: Option<i64>,
    pub image: Option<String>,
    pub status: Option<InstanceStatus>,
}

impl InstancePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.cpu.is_none()
            && self.memory_mb.is_none()
            && self.image.is_none()
            && self.status.is_none()
    }

    /// Apply onto an existing instance. Timestamps are left to the caller.
    pub fn apply_to(&self, inst: &mut Instance) {
        if let Some(v) = &self.name { inst.name = v.clone(); }
        if let Some(v) = self.cpu { inst.cpu = v; }
        if let Some(v) = self.memory_mb { inst.memory_mb = v; }
        if let Some(v) = &self.image { inst.image = v.clone(); }
        if let Some(v) = self.status { inst.status = v; }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetMetadataRequest {
    pub path: String,
    #[serde(default)]
    pub value: String,
}

// ---- list filters (exact match, conjunctive) ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFilter {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFilter {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// New opaque resource identifier: 128 random bits as 32 lowercase hex chars.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn now() -> Timestamp {
    Utc::now()
}

pub mod prelude {
    pub use super::{
        CreateInstanceRequest, CreateProjectRequest, DirtError, DirtResult, ErrorKind, Instance, InstanceFilter,
        InstancePatch, InstanceStatus, MetadataEntry, Project, ProjectFilter, SetMetadataRequest,
        UpdateInstanceRequest, UpdateProjectRequest,
    };
}
