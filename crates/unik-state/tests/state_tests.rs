//! Integration tests for the public state store API.
//!
//! Covers concurrent access through `Arc<MemoryState>`, whole-store
//! persistence and the on-disk document format.

use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use unik_state::{
    DeviceMapping, Image, Infrastructure, Instance, InstanceState, MemoryState, SnapshotConsistency,
    State, StateError, StateOptions, Volume,
};

fn image(id: &str, name: &str, size_mb: i64) -> Image {
    Image {
        id: id.to_string(),
        name: name.to_string(),
        device_mappings: vec![DeviceMapping {
            mount_point: "/data".to_string(),
            device_name: "/dev/sdb".to_string(),
        }],
        size_mb,
        infrastructure: Infrastructure::Virtualbox,
        created: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
    }
}

fn instance(id: &str, image_id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        image_id: image_id.to_string(),
        infrastructure: Infrastructure::Virtualbox,
        name: format!("{}-name", id),
        state: InstanceState::Running,
        created: Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
    }
}

fn volume(id: &str, attachment: &str) -> Volume {
    Volume {
        id: id.to_string(),
        name: format!("{}-data", id),
        size_mb: 128,
        attachment: attachment.to_string(),
        infrastructure: Infrastructure::Virtualbox,
        created: Utc.with_ymd_and_hms(2024, 5, 3, 10, 15, 0).unwrap(),
    }
}

/// Insert-if-absent, written against the trait the way orchestration code uses it.
fn register_instance<S: State>(state: &S, entry: Instance) -> Result<(), StateError> {
    state.modify_instances(|instances| {
        if instances.contains_key(&entry.id) {
            return Err(StateError::AlreadyExists {
                kind: "instance",
                id: entry.id.clone(),
            });
        }
        instances.insert(entry.id.clone(), entry);
        Ok(())
    })
}

fn populated_state(temp_dir: &TempDir) -> MemoryState {
    let state = MemoryState::new(temp_dir.path().join("state.json"));
    state
        .modify_images(|images| {
            images.insert("img1".to_string(), image("img1", "alpine", 5));
            images.insert("img2".to_string(), image("img2", "nginx", 24));
            Ok::<_, StateError>(())
        })
        .unwrap();
    register_instance(&state, instance("i-1", "img1")).unwrap();
    register_instance(&state, instance("i-2", "img-unknown")).unwrap();
    state
        .modify_volumes(|volumes| {
            volumes.insert("vol1".to_string(), volume("vol1", "i-1"));
            volumes.insert("vol2".to_string(), volume("vol2", ""));
            Ok::<_, StateError>(())
        })
        .unwrap();
    state
}

#[test]
fn test_round_trip_all_collections() {
    let temp_dir = TempDir::new().unwrap();
    let state = populated_state(&temp_dir);
    state.save().unwrap();

    let restored = MemoryState::open(StateOptions::new(temp_dir.path().join("state.json"))).unwrap();
    assert_eq!(restored.images().unwrap(), state.images().unwrap());
    assert_eq!(restored.instances().unwrap(), state.instances().unwrap());
    assert_eq!(restored.volumes().unwrap(), state.volumes().unwrap());
}

#[test]
fn test_register_duplicate_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let state = populated_state(&temp_dir);

    let err = register_instance(&state, instance("i-1", "img2")).unwrap_err();
    assert!(matches!(err, StateError::AlreadyExists { ref id, .. } if id == "i-1"));
    assert_eq!(state.instance("i-1").unwrap().unwrap().image_id, "img1");
}

#[test]
fn test_cross_collection_references_not_validated() {
    let temp_dir = TempDir::new().unwrap();
    let state = populated_state(&temp_dir);

    let orphan = state.instance("i-2").unwrap().unwrap();
    assert!(state.image(&orphan.image_id).unwrap().is_none());
}

#[test]
fn test_persisted_document_shape() {
    let temp_dir = TempDir::new().unwrap();
    let state = populated_state(&temp_dir);
    state.save().unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join("state.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let top: HashSet<_> = value.as_object().unwrap().keys().cloned().collect();
    let expected: HashSet<_> = ["Images", "Instances", "Volumes"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(top, expected);

    assert_eq!(value["Images"]["img1"]["Name"], "alpine");
    assert_eq!(value["Images"]["img1"]["SizeMb"], 5);
    assert_eq!(value["Instances"]["i-1"]["ImageId"], "img1");
    assert_eq!(value["Instances"]["i-1"]["State"], "running");
    assert_eq!(value["Volumes"]["vol1"]["Attachment"], "i-1");
}

#[test]
fn test_load_hand_written_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{
            "Images": {
                "img1": {
                    "Id": "img1",
                    "Name": "alpine",
                    "DeviceMappings": [],
                    "SizeMb": 5,
                    "Infrastructure": "QEMU",
                    "Created": "2024-01-01T00:00:00Z"
                }
            },
            "Instances": {},
            "Volumes": {}
        }"#,
    )
    .unwrap();

    let state = MemoryState::open(StateOptions::new(&path)).unwrap();
    let images = state.images().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images["img1"].name, "alpine");
    assert_eq!(images["img1"].size_mb, 5);
    assert_eq!(images["img1"].infrastructure, Infrastructure::Qemu);
}

#[test]
fn test_load_document_with_null_mappings_and_unknown_tag() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{"Images":{"img1":{"Id":"img1","Name":"alpine","DeviceMappings":null,"SizeMb":5,"Infrastructure":"QEMU","Created":"2024-01-01T00:00:00Z"}},"Instances":{},"Volumes":{"vol1":{"Id":"vol1","Name":"data","SizeMb":64,"Attachment":"","Infrastructure":"MAINFRAME","Created":"2024-01-01T00:00:00Z"}}}"#,
    )
    .unwrap();

    let state = MemoryState::open(StateOptions::new(&path)).unwrap();
    assert!(state.images().unwrap()["img1"].device_mappings.is_empty());
    assert_eq!(
        state.volumes().unwrap()["vol1"].infrastructure,
        Infrastructure::Other("MAINFRAME".to_string())
    );

    state.save().unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["Images"]["img1"]["DeviceMappings"], serde_json::json!([]));
    assert_eq!(value["Volumes"]["vol1"]["Infrastructure"], "MAINFRAME");
}

#[test]
fn test_load_corrupt_file_keeps_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut state = populated_state(&temp_dir);
    std::fs::write(temp_dir.path().join("state.json"), "not json at all").unwrap();

    let err = state.load().unwrap_err();
    assert!(matches!(err, StateError::Deserialize { .. }));
    assert!(err.to_string().contains("state.json"));
    assert_eq!(state.images().unwrap().len(), 2);
    assert_eq!(state.instances().unwrap().len(), 2);
    assert_eq!(state.volumes().unwrap().len(), 2);
}

#[test]
fn test_load_wrong_shape_keeps_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut state = populated_state(&temp_dir);
    std::fs::write(temp_dir.path().join("state.json"), r#"{"Images": [], "Instances": {}, "Volumes": {}}"#).unwrap();

    assert!(matches!(state.load(), Err(StateError::Deserialize { .. })));
    assert_eq!(state.images().unwrap().len(), 2);
}

#[test]
fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".unik").join("nested").join("state.json");
    let state = MemoryState::new(&path);

    state.save().unwrap();
    assert!(path.exists());

    let reopened = MemoryState::open(StateOptions::new(&path)).unwrap();
    assert!(reopened.images().unwrap().is_empty());
}

#[test]
fn test_modify_excludes_concurrent_readers() {
    let temp_dir = TempDir::new().unwrap();
    let state = Arc::new(MemoryState::new(temp_dir.path().join("state.json")));
    let writers = 4;
    let rounds = 200;
    let barrier = Arc::new(Barrier::new(writers + 2));

    let mut handles = Vec::new();
    for w in 0..writers {
        let state = Arc::clone(&state);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for r in 0..rounds {
                // Two inserts that must always be seen together
                state
                    .modify_volumes(|volumes| {
                        let key = format!("{}-{}", w, r);
                        volumes.insert(format!("a-{}", key), volume(&format!("a-{}", key), ""));
                        volumes.insert(format!("b-{}", key), volume(&format!("b-{}", key), ""));
                        Ok::<_, StateError>(())
                    })
                    .unwrap();
            }
        }));
    }

    for _ in 0..2 {
        let state = Arc::clone(&state);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..rounds {
                let snapshot = state.volumes().unwrap();
                assert_eq!(snapshot.len() % 2, 0);
                for id in snapshot.keys().filter(|id| id.starts_with("a-")) {
                    let pair = format!("b-{}", &id[2..]);
                    assert!(snapshot.contains_key(&pair), "saw {} without {}", id, pair);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(state.volumes().unwrap().len(), writers * rounds * 2);
}

#[test]
fn test_concurrent_modify_loses_no_updates() {
    let temp_dir = TempDir::new().unwrap();
    let state = Arc::new(MemoryState::new(temp_dir.path().join("state.json")));
    state
        .modify_images(|images| {
            images.insert("img1".to_string(), image("img1", "counter", 0));
            Ok::<_, StateError>(())
        })
        .unwrap();

    let threads = 8;
    let increments = 250;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for _ in 0..increments {
                    state
                        .modify_images(|images| {
                            let entry = images.get_mut("img1").ok_or(StateError::NotFound {
                                kind: "image",
                                id: "img1".to_string(),
                            })?;
                            entry.size_mb += 1;
                            Ok::<_, StateError>(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(state.image("img1").unwrap().unwrap().size_mb, (threads * increments) as i64);
}

#[test]
fn test_collections_do_not_block_each_other() {
    let temp_dir = TempDir::new().unwrap();
    let state = populated_state(&temp_dir);

    // While the images write lock is held, other collections stay readable
    // and writable from another thread.
    let (instances, volumes) = state
        .modify_images(|_images| {
            let result = thread::scope(|scope| {
                scope
                    .spawn(|| {
                        state
                            .modify_volumes(|volumes| {
                                volumes.insert("vol3".to_string(), volume("vol3", ""));
                                Ok::<_, StateError>(())
                            })
                            .unwrap();
                        (state.instances().unwrap().len(), state.volumes().unwrap().len())
                    })
                    .join()
                    .unwrap()
            });
            Ok::<_, StateError>(result)
        })
        .unwrap();

    assert_eq!(instances, 2);
    assert_eq!(volumes, 3);
}

#[test]
fn test_concurrent_saves_produce_valid_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let state = Arc::new(populated_state(&temp_dir));

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for r in 0..20 {
                    state
                        .modify_instances(|instances| {
                            let id = format!("i-{}-{}", t, r);
                            instances.insert(id.clone(), instance(&id, "img1"));
                            Ok::<_, StateError>(())
                        })
                        .unwrap();
                    state.save().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    state.save().unwrap();
    let restored = MemoryState::open(StateOptions::new(&path)).unwrap();
    assert_eq!(restored.instances().unwrap().len(), 2 + 6 * 20);
    assert_eq!(restored.images().unwrap(), state.images().unwrap());
}

#[test]
fn test_global_snapshot_with_atomic_writes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let options = StateOptions::new(&path)
        .consistency(SnapshotConsistency::Global)
        .atomic(true);
    let state = Arc::new(MemoryState::with_options(options.clone()));

    let writer = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            for r in 0..50 {
                state
                    .modify_images(|images| {
                        let id = format!("img-{}", r);
                        images.insert(id.clone(), image(&id, "busy", r));
                        Ok::<_, StateError>(())
                    })
                    .unwrap();
            }
        })
    };
    for _ in 0..10 {
        state.save().unwrap();
    }
    writer.join().unwrap();
    state.save().unwrap();

    let restored = MemoryState::open(options).unwrap();
    assert_eq!(restored.images().unwrap().len(), 50);
    assert!(unik_state::StateConfig::backup_path(&path).exists());
}
