//! End-to-end scenarios against a live PostgreSQL instance.
//!
//! These tests bind to the server named by `ORCHID_TEST_DB` (a connection
//! string such as `host=127.0.0.1 user=postgres password=postgres`) and
//! create one scratch database per scenario. Without the variable set, every
//! test is skipped.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use orchid::config::DatabaseConfig;
use orchid::db::OrchidDb;
use orchid::repository::{parse_label_selector, GroupVersionKind, Repository};
use orchid::validator::StructuralValidator;

fn scratch_database(scenario: &str) -> String {
    format!("orchid_test_{}_{}", scenario, std::process::id())
}

async fn repository(scenario: &str) -> Option<Repository> {
    let Ok(connection_string) = std::env::var("ORCHID_TEST_DB") else {
        eprintln!("ORCHID_TEST_DB is not set; skipping");
        return None;
    };
    let config = DatabaseConfig {
        db_connection_string: connection_string,
        db_name: scratch_database(scenario),
        db_schema: "orchid".to_string(),
        db_pool_size: 4,
    };
    let db = OrchidDb::connect(&config).expect("pool builds");
    let repository = Repository::new(db, Box::new(StructuralValidator));
    repository.bootstrap().await.expect("bootstrap succeeds");
    Some(repository)
}

fn definition(group: &str, kind: &str, plural: &str, openapi: Value) -> Value {
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {
            "name": format!("{plural}.{group}"),
            "namespace": ""
        },
        "spec": {
            "group": group,
            "names": {"kind": kind, "plural": plural},
            "versions": [{
                "name": "v1",
                "schema": {"openAPIV3Schema": openapi}
            }]
        }
    })
}

fn resource(group: &str, kind: &str, namespace: &str, name: &str, spec: Value) -> Value {
    json!({
        "apiVersion": format!("{group}/v1"),
        "kind": kind,
        "metadata": {"namespace": namespace, "name": name},
        "spec": spec
    })
}

#[tokio::test]
async fn scalar_round_trip() {
    let Some(repository) = repository("s1").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Simple",
            "simples",
            json!({
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {"simple": {"type": "string"}}
                    }
                }
            }),
        ))
        .await
        .expect("definition stores");

    let stored = resource(group, "Simple", "ns", "a", json!({"simple": "11"}));
    repository.create(&stored).await.expect("resource stores");

    let gvk = GroupVersionKind::new(group, "v1", "Simple");
    let read = repository.read(&gvk, "ns", "a").await.expect("resource reads");

    assert_eq!(read["spec"]["simple"], json!("11"));
    assert_eq!(read["metadata"]["namespace"], json!("ns"));
    assert_eq!(read["metadata"]["name"], json!("a"));
    assert_eq!(read["apiVersion"], json!("stable.example.com/v1"));
    assert_eq!(read["kind"], json!("Simple"));
}

#[tokio::test]
async fn nested_one_to_one() {
    let Some(repository) = repository("s2").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Nested",
            "nesteds",
            json!({
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "complex": {
                                "type": "object",
                                "properties": {"attribute": {"type": "string"}}
                            }
                        }
                    }
                }
            }),
        ))
        .await
        .expect("definition stores");

    let stored = resource(group, "Nested", "ns", "b", json!({"complex": {"attribute": "x"}}));
    repository.create(&stored).await.expect("resource stores");

    let gvk = GroupVersionKind::new(group, "v1", "Nested");
    let read = repository.read(&gvk, "ns", "b").await.expect("resource reads");
    assert_eq!(read["spec"]["complex"], json!({"attribute": "x"}));
}

#[tokio::test]
async fn additional_properties_map() {
    let Some(repository) = repository("s3").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Mapped",
            "mappeds",
            json!({
                "type": "object",
                "properties": {
                    "spec": {"type": "object", "properties": {"touched": {"type": "boolean"}}}
                }
            }),
        ))
        .await
        .expect("definition stores");

    let mut stored = resource(group, "Mapped", "ns", "c", json!({"touched": true}));
    stored["metadata"]["labels"] = json!({"a": "1", "b": "2"});
    repository.create(&stored).await.expect("resource stores");

    let gvk = GroupVersionKind::new(group, "v1", "Mapped");
    let read = repository.read(&gvk, "ns", "c").await.expect("resource reads");
    assert_eq!(read["metadata"]["labels"], json!({"a": "1", "b": "2"}));
}

#[tokio::test]
async fn array_of_objects() {
    let Some(repository) = repository("s4").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Ported",
            "porteds",
            json!({
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "ports": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "name": {"type": "string"},
                                        "port": {"type": "integer", "format": "int32"}
                                    }
                                }
                            }
                        }
                    }
                }
            }),
        ))
        .await
        .expect("definition stores");

    let ports = json!([
        {"name": "http", "port": 80},
        {"name": "https", "port": 443},
        {"name": "metrics", "port": 9100}
    ]);
    let stored = resource(group, "Ported", "ns", "d", json!({"ports": ports.clone()}));
    repository.create(&stored).await.expect("resource stores");

    let gvk = GroupVersionKind::new(group, "v1", "Ported");
    let read = repository.read(&gvk, "ns", "d").await.expect("resource reads");
    assert_eq!(read["spec"]["ports"], ports);
}

#[tokio::test]
async fn embedded_resource_fidelity() {
    let Some(repository) = repository("s5").await else {
        return;
    };
    let group = "stable.example.com";
    let stored = definition(
        group,
        "Backup",
        "backups",
        json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {"schedule": {"type": "string"}}
                }
            }
        }),
    );
    repository.create(&stored).await.expect("definition stores");

    let read = repository
        .read(
            &GroupVersionKind::definition(),
            "",
            &format!("backups.{group}"),
        )
        .await
        .expect("definition reads");

    // the data column holds the raw document; the read unmarshals it
    assert_eq!(read, stored);
}

#[tokio::test]
async fn label_filtered_list() {
    let Some(repository) = repository("s6").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Labeled",
            "labeleds",
            json!({
                "type": "object",
                "properties": {
                    "spec": {"type": "object", "properties": {"v": {"type": "string"}}}
                }
            }),
        ))
        .await
        .expect("definition stores");

    for (name, app) in [("one", "x"), ("two", "x"), ("three", "y")] {
        let mut stored = resource(group, "Labeled", "ns", name, json!({"v": name}));
        stored["metadata"]["labels"] = json!({"app": app});
        repository.create(&stored).await.expect("resource stores");
    }

    let gvk = GroupVersionKind::new(group, "v1", "Labeled");
    let labels = parse_label_selector("app=x").expect("selector parses");
    let listed = repository.list(&gvk, &labels).await.expect("list succeeds");

    let mut names: Vec<&str> = listed
        .iter()
        .filter_map(|d| d["metadata"]["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["one", "two"]);

    let everything = repository
        .list(&gvk, &BTreeMap::new())
        .await
        .expect("unfiltered list succeeds");
    assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn creation_is_atomic() {
    let Some(repository) = repository("atomic").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Strict",
            "stricts",
            json!({
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "ports": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {"name": {"type": "string"}},
                                    "x-kubernetes-list-map-keys": ["name"]
                                }
                            }
                        }
                    }
                }
            }),
        ))
        .await
        .expect("definition stores");

    // the duplicate key violates the synthesized unique constraint after the
    // root row is already inserted; the transaction must roll it back
    let gvk = GroupVersionKind::new(group, "v1", "Strict");
    let broken = resource(
        group,
        "Strict",
        "ns",
        "e",
        json!({"ports": [{"name": "dup"}, {"name": "dup"}]}),
    );
    assert!(repository.create(&broken).await.is_err());

    let result = repository.read(&gvk, "ns", "e").await;
    assert!(result.expect_err("nothing stored").is_not_found());
}

#[tokio::test]
async fn metadata_identity_is_enforced() {
    let Some(repository) = repository("identity").await else {
        return;
    };
    let group = "stable.example.com";
    repository
        .create(&definition(
            group,
            "Ident",
            "idents",
            json!({
                "type": "object",
                "properties": {
                    "spec": {"type": "object", "properties": {"v": {"type": "string"}}}
                }
            }),
        ))
        .await
        .expect("definition stores");

    let first = resource(group, "Ident", "ns", "f", json!({"v": "first"}));
    repository.create(&first).await.expect("first create stores");

    // same namespace and name: the metadata unique constraint rejects it
    let second = resource(group, "Ident", "ns", "f", json!({"v": "second"}));
    assert!(repository.create(&second).await.is_err());

    let gvk = GroupVersionKind::new(group, "v1", "Ident");
    let read = repository.read(&gvk, "ns", "f").await.expect("resource reads");
    assert_eq!(read["spec"]["v"], json!("first"));
}
