#![forbid(unsafe_code)]

use std::sync::Arc;

use dirt_api::{Service, SqliteStore};
use dirt_core::path::normalize;
use dirt_core::prelude::*;
use serde_json::json;

fn service() -> Service {
    Service::with_store(Arc::new(SqliteStore::open_in_memory().unwrap()))
}

fn new_instance(project_id: &str, name: &str, cpu: i64) -> CreateInstanceRequest {
    CreateInstanceRequest {
        project_id: project_id.to_string(),
        name: name.to_string(),
        cpu,
        memory_mb: 1024,
        image: "x".to_string(),
        status: None,
    }
}

#[test]
fn project_lifecycle() {
    let svc = service();
    let p = svc.create_project(CreateProjectRequest { name: "alpha".into() }).unwrap();
    assert_eq!(p.id.len(), 32);
    assert_eq!(svc.get_project(&p.id).unwrap().name, "alpha");

    let e = svc.create_project(CreateProjectRequest { name: "alpha".into() }).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::AlreadyExists);

    let e = svc.create_project(CreateProjectRequest { name: "no spaces".into() }).unwrap_err();
    assert!(e.is_invalid_input());

    let p2 = svc.update_project(&p.id, UpdateProjectRequest { name: "alpha-2".into() }).unwrap();
    assert_eq!(p2.name, "alpha-2");
    assert!(svc.update_project(&p.id, UpdateProjectRequest { name: String::new() }).unwrap_err().is_invalid_input());

    let listed = svc.list_projects(&ProjectFilter { name: Some("alpha-2".into()) }).unwrap();
    assert_eq!(listed.len(), 1);

    svc.delete_project(&p.id).unwrap();
    assert!(svc.get_project(&p.id).unwrap_err().is_not_found());
}

#[test]
fn create_instance_requires_existing_project() {
    let svc = service();
    let e = svc.create_instance(new_instance("does-not-exist", "web", 2)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ForeignKeyViolation);
    assert_eq!(e.details["resource"], "project");
    assert_eq!(e.details["value"], "does-not-exist");
    assert!(svc.list_instances(&InstanceFilter::default()).unwrap().is_empty());
}

#[test]
fn create_instance_defaults_and_validates_status() {
    let svc = service();
    let p = svc.create_project(CreateProjectRequest { name: "p".into() }).unwrap();

    let i = svc.create_instance(new_instance(&p.id, "web", 2)).unwrap();
    assert_eq!(i.status, InstanceStatus::Running);
    assert_eq!(i.project_id, p.id);

    let mut req = new_instance(&p.id, "db", 2);
    req.status = Some("stopped".into());
    assert_eq!(svc.create_instance(req).unwrap().status, InstanceStatus::Stopped);

    let mut req = new_instance(&p.id, "cache", 2);
    req.status = Some("sleeping".into());
    let e = svc.create_instance(req).unwrap_err();
    assert!(e.is_invalid_input());
    assert_eq!(e.details["field"], "status");
}

#[test]
fn validation_runs_before_project_lookup() {
    let svc = service();
    // Bad resources against a missing project report the resources, not the reference.
    let e = svc.create_instance(new_instance("missing", "web", 0)).unwrap_err();
    assert!(e.is_invalid_input());
}

#[test]
fn cpu_boundary() {
    let svc = service();
    let p = svc.create_project(CreateProjectRequest { name: "p".into() }).unwrap();
    assert_eq!(svc.create_instance(new_instance(&p.id, "max", 64)).unwrap().cpu, 64);

    let e = svc.create_instance(new_instance(&p.id, "over", 65)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidInput);
    assert_eq!(e.details["max_cpu"], json!(64));
    assert_eq!(e.details["actual"], json!(65));
}

#[test]
fn partial_update_validates_merged_view() {
    let svc = service();
    let p = svc.create_project(CreateProjectRequest { name: "p".into() }).unwrap();
    let i = svc.create_instance(new_instance(&p.id, "web", 4)).unwrap();

    let e = svc
        .update_instance(&i.id, UpdateInstanceRequest { memory_mb: Some(99_999_999), ..Default::default() })
        .unwrap_err();
    assert!(e.is_invalid_input());
    assert_eq!(e.details["field"], "memory_mb");
    assert_eq!(e.details["max_memory_mb"], json!(524288));
    assert_eq!(svc.get_instance(&i.id).unwrap().memory_mb, 1024);

    let u = svc
        .update_instance(&i.id, UpdateInstanceRequest { cpu: Some(16), ..Default::default() })
        .unwrap();
    assert_eq!((u.cpu, u.memory_mb, u.image.as_str()), (16, 1024, "x"));

    let u = svc
        .update_instance(
            &i.id,
            UpdateInstanceRequest { name: Some("web-2".into()), status: Some("stopped".into()), ..Default::default() },
        )
        .unwrap();
    assert_eq!(u.name, "web-2");
    assert_eq!(u.status, InstanceStatus::Stopped);
    assert_eq!(u.cpu, 16);

    let e = svc
        .update_instance("missing", UpdateInstanceRequest { cpu: Some(2), ..Default::default() })
        .unwrap_err();
    assert!(e.is_not_found());
}

#[test]
fn instance_list_filters() {
    let svc = service();
    let a = svc.create_project(CreateProjectRequest { name: "a".into() }).unwrap();
    let b = svc.create_project(CreateProjectRequest { name: "b".into() }).unwrap();
    svc.create_instance(new_instance(&a.id, "web", 1)).unwrap();
    let mut stopped = new_instance(&a.id, "db", 1);
    stopped.status = Some("stopped".into());
    svc.create_instance(stopped).unwrap();
    svc.create_instance(new_instance(&b.id, "web", 1)).unwrap();

    let in_a = svc.list_instances(&InstanceFilter { project_id: Some(a.id.clone()), ..Default::default() }).unwrap();
    assert_eq!(in_a.len(), 2);
    let running = svc.list_instances(&InstanceFilter { status: Some("running".into()), ..Default::default() }).unwrap();
    assert_eq!(running.len(), 2);
    let web_in_b = svc
        .list_instances(&InstanceFilter { project_id: Some(b.id.clone()), name: Some("web".into()), status: None })
        .unwrap();
    assert_eq!(web_in_b.len(), 1);
}

/// Deleting a project neither cascades to nor is blocked by its instances.
#[test]
fn project_delete_leaves_dangling_instances() {
    let svc = service();
    let p = svc.create_project(CreateProjectRequest { name: "owner".into() }).unwrap();
    let i = svc.create_instance(new_instance(&p.id, "web", 1)).unwrap();

    svc.delete_project(&p.id).unwrap();

    let orphan = svc.get_instance(&i.id).unwrap();
    assert_eq!(orphan.project_id, p.id);
    let e = svc.create_instance(new_instance(&p.id, "web-2", 1)).unwrap_err();
    assert!(e.is_foreign_key_violation());
    svc.delete_instance(&i.id).unwrap();
    assert!(svc.delete_instance(&i.id).unwrap_err().is_not_found());
}

#[test]
fn metadata_round_trip_through_equivalent_paths() {
    let svc = service();
    let set = svc.set_metadata("config//app/../settings", "v").unwrap();
    assert_eq!(set.path, "/config/settings");
    for p in ["/config/settings", "config/./settings", "config/settings/"] {
        assert_eq!(normalize(p), set.path);
        assert_eq!(svc.get_metadata_value(p).unwrap(), "v");
    }
}

#[test]
fn metadata_upsert_and_listing() {
    let svc = service();
    svc.set_metadata("/a/b", "1").unwrap();
    svc.set_metadata("a//b", "2").unwrap();
    assert_eq!(svc.list_metadata(Some("")).unwrap(), vec!["/a/b"]);
    assert_eq!(svc.get_metadata_value("/a/b").unwrap(), "2");

    for p in ["/config/app.yaml", "/config/auth/ldap.yaml", "/data/users.json"] {
        svc.set_metadata(p, "x").unwrap();
    }
    assert_eq!(svc.list_metadata(Some("/config")).unwrap(), vec!["/config/app.yaml", "/config/auth/ldap.yaml"]);
    assert!(svc.list_metadata(Some("/nonexistent")).unwrap().is_empty());
    assert_eq!(svc.list_metadata(None).unwrap().len(), 4);

    svc.delete_metadata("/a/b").unwrap();
    assert!(svc.delete_metadata("a/b").unwrap_err().is_not_found());
    assert!(svc.get_metadata("").unwrap_err().is_invalid_input());
}
