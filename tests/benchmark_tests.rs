//! Performance benchmarks for the replication hot paths

use mirror_shared::components::{Sprite2D, Transform2D};
use mirror_shared::sync::{ComponentSync, GameObjectSync, SceneSync};
use mirror_shared::{encode_packet, CapabilityRegistry, Component, GameObject, Packet, Scene};
use std::time::Instant;

fn populated_scene(count: u32) -> Scene {
    let mut scene = Scene::new("bench").with_server_id(1);
    for i in 0..count {
        scene.add_game_object(
            GameObject::new()
                .with_server_id(1_000 + i)
                .with_component(Component::from_capability(Transform2D::default()).with_server_id(100_000 + i))
                .with_component(Component::from_capability(Sprite2D::default())),
        );
    }
    scene.drain_events();
    scene
}

fn moving_sync(count: u32, step: f32) -> SceneSync {
    SceneSync {
        id: Some(1),
        game_objects: (0..count)
            .map(|i| {
                Some(GameObjectSync {
                    id: Some(1_000 + i),
                    components: vec![Some(ComponentSync {
                        id: Some(100_000 + i),
                        kind: "Transform2D".to_string(),
                        fields: vec![step, i as f32, 0.0, 1.0, 1.0],
                    })],
                })
            })
            .collect(),
    }
}

/// Benchmarks lookups by server id on a large scene
#[test]
fn benchmark_find_by_server_id() {
    let scene = populated_scene(1_000);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = 1_000 + (i % 1_000) as u32;
        assert!(scene.find_by_server_id(id).is_some());
    }

    let duration = start.elapsed();
    println!(
        "Server id lookup: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks applying per-tick deltas to every object of a scene
#[test]
fn benchmark_scene_sync_apply() {
    let registry = CapabilityRegistry::with_defaults();
    let mut scene = populated_scene(500);
    let syncs: Vec<SceneSync> = (0..60).map(|tick| moving_sync(500, tick as f32)).collect();

    let start = Instant::now();

    for sync in &syncs {
        scene.apply_sync(&registry, sync);
    }

    let duration = start.elapsed();
    println!(
        "Scene sync: {} ticks of 500 objects in {:?} ({:.2} μs/tick)",
        syncs.len(),
        duration,
        duration.as_micros() as f64 / syncs.len() as f64
    );

    let last = scene.find_by_server_id(1_000).unwrap().get::<Transform2D>().unwrap();
    assert_eq!(last.position[0], 59.0);
    assert_eq!(scene.len(), 500);

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the full snapshot encode and decode of a scene
#[test]
fn benchmark_snapshot_roundtrip() {
    let registry = CapabilityRegistry::with_defaults();
    let scene = populated_scene(200);

    let iterations = 50;
    let start = Instant::now();

    for _ in 0..iterations {
        let json = scene.to_json().unwrap();
        let copy = Scene::from_json(&registry, &json);
        assert_eq!(copy.len(), 200);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot roundtrip: {} iterations in {:?} ({:.2} ms/iter)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks packet encoding of a per-tick delta
#[test]
fn benchmark_sync_packet_encoding() {
    let packet = Packet::SceneSync(moving_sync(100, 1.0));

    let iterations = 1_000;
    let start = Instant::now();
    let mut total = 0;

    for _ in 0..iterations {
        total += encode_packet(&packet).unwrap().len();
    }

    let duration = start.elapsed();
    println!(
        "Sync packet encoding: {} iterations in {:?} ({} bytes each)",
        iterations,
        duration,
        total / iterations
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
