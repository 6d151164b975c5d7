//! Field-level validation for projects and instances.
//!
//! Every check is pure and returns at most one `InvalidInput` error whose
//! details name the field, the violated constraint and, for numeric bounds,
//! both the limit and the actual value.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DirtError, DirtResult};
use crate::InstanceStatus;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_IMAGE_LEN: usize = 255;
pub const MIN_CPU: i64 = 1;
pub const MAX_CPU: i64 = 64;
pub const MIN_MEMORY_MB: i64 = 1;
/// 512 GiB.
pub const MAX_MEMORY_MB: i64 = 512 * 1024;

pub const NAME_PATTERN: &str = "^[A-Za-z0-9_-]+$";

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(NAME_PATTERN).expect("static name pattern"));

fn invalid(field: &str, constraint: &str, message: String) -> DirtError {
    DirtError::invalid_input(message)
        .with_detail("field", field)
        .with_detail("constraint", constraint)
}

/// `kind` is the resource label used in messages ("project", "instance").
pub fn validate_name(kind: &str, name: &str) -> DirtResult<()> {
    if name.is_empty() {
        return Err(invalid("name", "non_empty", format!("{} name cannot be empty", kind)));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(invalid("name", "max_length", format!("{} name too long", kind))
            .with_detail("max_length", MAX_NAME_LEN)
            .with_detail("actual", len));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid(
            "name",
            "pattern",
            format!("{} name can only contain alphanumeric characters, dashes, and underscores", kind),
        )
        .with_detail("pattern", NAME_PATTERN));
    }
    Ok(())
}

pub fn validate_project_name(name: &str) -> DirtResult<()> {
    validate_name("project", name)
}

pub fn validate_instance_name(name: &str) -> DirtResult<()> {
    validate_name("instance", name)
}

/// cpu, memory and image describe one resource shape and are checked together.
pub fn validate_instance_spec(cpu: i64, memory_mb: i64, image: &str) -> DirtResult<()> {
    if cpu < MIN_CPU {
        return Err(invalid("cpu", "min", "CPU must be positive".into())
            .with_detail("min_cpu", MIN_CPU)
            .with_detail("actual", cpu));
    }
    if cpu > MAX_CPU {
        return Err(invalid("cpu", "max", "CPU too high".into())
            .with_detail("max_cpu", MAX_CPU)
            .with_detail("actual", cpu));
    }
    if memory_mb < MIN_MEMORY_MB {
        return Err(invalid("memory_mb", "min", "memory must be positive".into())
            .with_detail("min_memory_mb", MIN_MEMORY_MB)
            .with_detail("actual", memory_mb));
    }
    if memory_mb > MAX_MEMORY_MB {
        return Err(invalid("memory_mb", "max", "memory too high".into())
            .with_detail("max_memory_mb", MAX_MEMORY_MB)
            .with_detail("actual", memory_mb));
    }
    if image.is_empty() {
        return Err(invalid("image", "non_empty", "image cannot be empty".into()));
    }
    let len = image.chars().count();
    if len > MAX_IMAGE_LEN {
        return Err(invalid("image", "max_length", "image name too long".into())
            .with_detail("max_length", MAX_IMAGE_LEN)
            .with_detail("actual", len));
    }
    Ok(())
}

/// Parse a status string; only `running` and `stopped` are accepted.
pub fn validate_status(status: &str) -> DirtResult<InstanceStatus> {
    status.parse::<InstanceStatus>().map_err(|_| {
        invalid("status", "one_of", "invalid status".into())
            .with_detail("valid_statuses", vec!["running", "stopped"])
            .with_detail("actual", status)
    })
}
