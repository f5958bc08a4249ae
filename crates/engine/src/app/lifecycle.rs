//! Model availability, play-once playback, and GPU resource disposal for scene nodes.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::animation::LoopMode;
use super::resources::{GpuResourceCounts, GpuResources, ModelAsset};
use super::scene::{ListenerId, NodeId, SceneWorld};

/// Added after the clip's real-time length before a playback counts as settled.
pub const PLAYBACK_SETTLE_MARGIN: Duration = Duration::from_millis(50);

/// Single-resolution signal for "this node has a model".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelWait {
    Ready,
    Pending { node: NodeId, listener: ListenerId },
}

impl ModelWait {
    /// Returns `true` once resolved; stays resolved afterwards.
    pub fn poll(&mut self, world: &mut SceneWorld) -> bool {
        match *self {
            ModelWait::Ready => true,
            ModelWait::Pending { node, listener } => {
                if world.take_load_fired(listener) {
                    debug!(node = node.0, "model_wait_resolved");
                    *self = ModelWait::Ready;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelWait::Ready)
    }
}

/// Resolves immediately for a loaded or absent node; otherwise subscribes once
/// to the node's next load. A node that never loads keeps the wait pending.
pub fn wait_for_model(world: &mut SceneWorld, node: Option<NodeId>) -> ModelWait {
    let Some(id) = node else {
        return ModelWait::Ready;
    };
    if world.has_model(id) {
        return ModelWait::Ready;
    }
    ModelWait::Pending {
        node: id,
        listener: world.add_load_listener(id),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    reported_ms: f64,
    settles_at: Duration,
}

impl Playback {
    /// Real-time clip length in milliseconds, `0.0` when nothing played.
    pub fn reported_ms(&self) -> f64 {
        self.reported_ms
    }

    pub fn settles_at(&self) -> Duration {
        self.settles_at
    }

    pub fn is_settled(&self, world: &SceneWorld) -> bool {
        world.now() >= self.settles_at
    }
}

/// Plays the node's first clip once at `speed`, clamped on its final frame.
pub fn play_once_freeze(world: &mut SceneWorld, node: Option<NodeId>, speed: f64) -> Playback {
    let now = world.now();
    let immediate = Playback {
        reported_ms: 0.0,
        settles_at: now,
    };
    let Some(node) = node.and_then(|id| world.find_node_mut(id)) else {
        return immediate;
    };
    let Some(clip) = node
        .model()
        .and_then(|model| model.animations.first())
        .cloned()
    else {
        debug!(node = node.id.0, "play_once_no_clips");
        return immediate;
    };
    let node_id = node.id;
    let Some(mixer) = node.mixer_mut() else {
        debug!(node = node_id.0, "play_once_no_mixer");
        return immediate;
    };

    let speed = if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        warn!(node = node_id.0, speed, "invalid_playback_speed");
        1.0
    };
    mixer
        .clip_action(&clip)
        .reset()
        .set_loop(LoopMode::Once)
        .set_clamp_when_finished(true)
        .set_effective_time_scale(speed)
        .play();

    let reported_ms = (clip.duration_seconds.max(0.0) / speed) * 1000.0;
    // Lengths past what a Duration can hold never settle.
    let length = Duration::try_from_secs_f64(reported_ms / 1000.0).unwrap_or(Duration::MAX);
    let settles_at = now
        .saturating_add(length)
        .saturating_add(PLAYBACK_SETTLE_MARGIN);
    info!(
        node = node_id.0,
        clip = clip.name.as_str(),
        speed,
        reported_ms,
        "play_once_started"
    );
    Playback {
        reported_ms,
        settles_at,
    }
}

/// Releases every GPU handle the model owns: geometry, each material in the
/// slot, and each texture the material lists.
pub fn dispose_object3d(gpu: &mut GpuResources, asset: &ModelAsset) -> GpuResourceCounts {
    let mut released = GpuResourceCounts::default();
    asset.root.traverse(&mut |tree| {
        let Some(mesh) = &tree.mesh else {
            return;
        };
        if let Some(geometry) = mesh.geometry {
            if gpu.release(geometry) {
                released.geometries += 1;
            }
        }
        for material in mesh.materials.iter() {
            for (_, texture) in &material.textures {
                if gpu.release(*texture) {
                    released.textures += 1;
                }
            }
            if gpu.release(material.handle) {
                released.materials += 1;
            }
        }
    });
    released
}

/// Stops the node's animation, disposes its subtree's resources, detaches it
/// from its parent and despawns it. The slot is cleared; an empty slot or a
/// node that is already gone is a no-op.
pub fn remove_and_dispose(world: &mut SceneWorld, slot: &mut Option<NodeId>) -> bool {
    let Some(root) = slot.take() else {
        return false;
    };
    if !world.contains_node(root) {
        debug!(node = root.0, "dispose_missing_node");
        return false;
    }

    let mut subtree = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        subtree.push(id);
        if let Some(node) = world.find_node(id) {
            stack.extend(node.children().iter().copied());
        }
    }

    let mut released = GpuResourceCounts::default();
    for id in &subtree {
        let Some(node) = world.find_node_mut(*id) else {
            continue;
        };
        if let Some(mixer) = node.mixer_mut() {
            mixer.stop_all_action();
        }
        node.visible = false;
        node.take_children();
        if let Some(model) = node.take_model() {
            let counts = dispose_object3d(world.gpu_mut(), &model);
            released.geometries += counts.geometries;
            released.materials += counts.materials;
            released.textures += counts.textures;
        }
    }

    world.detach(root);
    for id in &subtree {
        world.despawn(*id);
    }
    info!(
        node = root.0,
        subtree_nodes = subtree.len(),
        geometries = released.geometries,
        materials = released.materials,
        textures = released.textures,
        "node_disposed"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::animation::AnimationClip;
    use crate::app::resources::{
        GpuResourceKind, Material, MaterialSlots, Mesh, MeshTree, TextureSlot,
    };
    use crate::app::scene::{Node, NodeDesc, Vec3};

    fn spawn(world: &mut SceneWorld, name: &str, animated: bool) -> NodeId {
        let id = world.spawn(NodeDesc {
            name: name.to_string(),
            position: Vec3::default(),
            visible: true,
            animated,
        });
        world.apply_pending();
        id
    }

    fn model(world: &mut SceneWorld, clip_seconds: &[f64]) -> ModelAsset {
        let gpu = world.gpu_mut();
        let material = Material {
            name: "hi_vis".to_string(),
            handle: gpu.allocate(GpuResourceKind::Material, "hi_vis"),
            textures: vec![
                (TextureSlot::Map, gpu.allocate(GpuResourceKind::Texture, "albedo")),
                (TextureSlot::NormalMap, gpu.allocate(GpuResourceKind::Texture, "normal")),
            ],
        };
        let geometry = gpu.allocate(GpuResourceKind::Geometry, "body");
        ModelAsset {
            source: "worker.json".to_string(),
            animations: clip_seconds
                .iter()
                .enumerate()
                .map(|(index, seconds)| AnimationClip {
                    name: format!("clip{index}"),
                    duration_seconds: *seconds,
                })
                .collect(),
            root: MeshTree {
                name: "root".to_string(),
                mesh: Some(Mesh {
                    name: "body".to_string(),
                    geometry: Some(geometry),
                    materials: MaterialSlots::Single(material),
                }),
                children: Vec::new(),
            },
        }
    }

    #[test]
    fn wait_on_loaded_node_registers_no_listener() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerTripping", true);
        let asset = model(&mut world, &[2.0]);
        world.attach_model(id, asset);

        let mut wait = wait_for_model(&mut world, Some(id));
        assert_eq!(wait, ModelWait::Ready);
        assert_eq!(world.load_listener_count(id), 0);
        assert!(wait.poll(&mut world));
    }

    #[test]
    fn wait_resolves_once_on_next_load() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerSlipping", true);
        let mut wait = wait_for_model(&mut world, Some(id));
        assert_eq!(world.load_listener_count(id), 1);
        assert!(!wait.poll(&mut world));

        let asset = model(&mut world, &[1.0]);
        world.attach_model(id, asset);
        assert!(wait.poll(&mut world));
        assert!(wait.is_ready());
        assert_eq!(world.load_listener_count(id), 0);
        assert!(wait.poll(&mut world));
    }

    #[test]
    fn wait_on_absent_node_is_ready() {
        let mut world = SceneWorld::default();
        assert!(wait_for_model(&mut world, None).is_ready());
    }

    #[test]
    fn wait_on_never_loaded_node_stays_pending() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerSafeSign", true);
        let mut wait = wait_for_model(&mut world, Some(id));
        for _ in 0..100 {
            world.advance(Duration::from_millis(100));
            assert!(!wait.poll(&mut world));
        }
    }

    #[test]
    fn play_once_reports_scaled_duration_and_settles_after_margin() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerWalkingSafe", true);
        let asset = model(&mut world, &[2.0, 9.0]);
        world.attach_model(id, asset);

        let playback = play_once_freeze(&mut world, Some(id), 0.5);
        assert!((playback.reported_ms() - 4000.0).abs() < 1e-9);
        assert_eq!(playback.settles_at(), Duration::from_millis(4050));

        world.advance(Duration::from_millis(4000));
        assert!(!playback.is_settled(&world));
        let action = &world.find_node(id).expect("node").mixer().expect("mixer").actions()[0];
        assert_eq!(action.clip().name, "clip0");
        assert!(action.is_frozen_on_last_frame());

        world.advance(Duration::from_millis(50));
        assert!(playback.is_settled(&world));
    }

    #[test]
    fn play_once_with_oversized_clip_saturates_instead_of_settling() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerSlipping2", true);
        let asset = model(&mut world, &[1e300]);
        world.attach_model(id, asset);

        let playback = play_once_freeze(&mut world, Some(id), 0.5);
        assert!(playback.reported_ms() > 1e300);
        assert_eq!(playback.settles_at(), Duration::MAX);

        world.advance(Duration::from_secs(3600));
        assert!(!playback.is_settled(&world));
    }

    #[test]
    fn play_once_with_tiny_speed_saturates() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerSafeSign", true);
        let asset = model(&mut world, &[2.0]);
        world.attach_model(id, asset);

        let playback = play_once_freeze(&mut world, Some(id), 1e-300);
        assert_eq!(playback.settles_at(), Duration::MAX);
    }

    #[test]
    fn play_once_without_clips_is_immediate_zero() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "palletModel", true);
        let asset = model(&mut world, &[]);
        world.attach_model(id, asset);

        let playback = play_once_freeze(&mut world, Some(id), 0.5);
        assert_eq!(playback.reported_ms(), 0.0);
        assert!(playback.is_settled(&world));
    }

    #[test]
    fn play_once_without_mixer_is_immediate_zero() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerSafe", false);
        let asset = model(&mut world, &[3.0]);
        world.attach_model(id, asset);

        let playback = play_once_freeze(&mut world, Some(id), 1.0);
        assert_eq!(playback.reported_ms(), 0.0);
        assert!(playback.is_settled(&world));
    }

    #[test]
    fn play_once_on_unloaded_node_is_immediate_zero() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerTripping", true);
        let playback = play_once_freeze(&mut world, Some(id), 0.5);
        assert_eq!(playback.reported_ms(), 0.0);
    }

    #[test]
    fn remove_and_dispose_releases_everything_and_clears_slot() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "workerTripping", true);
        let asset = model(&mut world, &[2.0]);
        world.attach_model(id, asset);
        play_once_freeze(&mut world, Some(id), 0.5);
        assert_eq!(world.gpu().live_count(), 4);

        let mut slot = Some(id);
        assert!(remove_and_dispose(&mut world, &mut slot));
        assert_eq!(slot, None);
        assert_eq!(world.gpu().live_count(), 0);
        assert!(!world.contains_node(id));
        world.apply_pending();
        assert_eq!(world.node_count(), 0);
    }

    #[test]
    fn remove_and_dispose_twice_is_noop() {
        let mut world = SceneWorld::default();
        let id = spawn(&mut world, "pallet", true);
        let mut slot = Some(id);
        assert!(remove_and_dispose(&mut world, &mut slot));
        world.apply_pending();
        let released = world.gpu().released_total();

        assert!(!remove_and_dispose(&mut world, &mut slot));
        let mut stale = Some(id);
        assert!(!remove_and_dispose(&mut world, &mut stale));
        assert_eq!(stale, None);
        assert_eq!(world.gpu().released_total(), released);
    }

    #[test]
    fn remove_and_dispose_walks_child_nodes_and_detaches_from_parent() {
        let mut world = SceneWorld::default();
        let scene_root = spawn(&mut world, "scene", false);
        let worker = spawn(&mut world, "workerSafe", true);
        let sign = spawn(&mut world, "sign", false);
        assert!(world.set_parent(worker, scene_root));
        assert!(world.set_parent(sign, worker));
        let worker_model = model(&mut world, &[1.0]);
        let sign_model = model(&mut world, &[]);
        world.attach_model(worker, worker_model);
        world.attach_model(sign, sign_model);
        assert_eq!(world.gpu().live_count(), 8);

        let mut slot = Some(worker);
        assert!(remove_and_dispose(&mut world, &mut slot));
        world.apply_pending();

        assert_eq!(world.gpu().live_count(), 0);
        assert!(!world.contains_node(sign));
        let root: &Node = world.find_node(scene_root).expect("scene root");
        assert!(root.children().is_empty());
    }
}
