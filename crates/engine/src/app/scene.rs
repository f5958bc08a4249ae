use std::time::Duration;

use tracing::{debug, warn};

use super::animation::AnimationMixer;
use super::input::Tap;
use super::resources::{GpuResources, ModelAsset};
use super::ui::UiLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Exit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    tap: Option<Tap>,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        tap: Option<Tap>,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            tap,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn with_tap(mut self, tap: Option<Tap>) -> Self {
        self.tap = tap;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn tap(&self) -> Option<Tap> {
        self.tap
    }

    /// The tap of this tick in normalized viewport units.
    pub fn tap_normalized(&self) -> Option<Vec2> {
        self.tap
            .and_then(|tap| tap.normalized(self.window_size()))
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub name: String,
    pub position: Vec3,
    pub visible: bool,
    /// Attach an animation driver to the node.
    pub animated: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub position: Vec3,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    model: Option<ModelAsset>,
    mixer: Option<AnimationMixer>,
    applied_spawn_order: u64,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn model(&self) -> Option<&ModelAsset> {
        self.model.as_ref()
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn mixer_mut(&mut self) -> Option<&mut AnimationMixer> {
        self.mixer.as_mut()
    }

    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }

    pub(crate) fn take_model(&mut self) -> Option<ModelAsset> {
        self.model.take()
    }

    pub(crate) fn take_children(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.children)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub node: NodeId,
    pub source: String,
}

#[derive(Debug, Clone, Copy)]
struct LoadListener {
    id: ListenerId,
    node: NodeId,
    fired: bool,
}

#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: NodeIdAllocator,
    nodes: Vec<Node>,
    pending_spawns: Vec<Node>,
    pending_despawns: Vec<NodeId>,
    next_applied_spawn_order: u64,
    load_listeners: Vec<LoadListener>,
    next_listener_id: u64,
    model_requests: Vec<ModelRequest>,
    gpu: GpuResources,
    ui: UiLayer,
    clock: Duration,
}

impl SceneWorld {
    pub fn spawn(&mut self, desc: NodeDesc) -> NodeId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Node {
            id,
            name: desc.name,
            position: desc.position,
            visible: desc.visible,
            parent: None,
            children: Vec::new(),
            model: None,
            mixer: desc.animated.then(AnimationMixer::new),
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: NodeId) -> bool {
        let exists_now = self.nodes.iter().any(|node| node.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|node| node.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut node in self.pending_spawns.drain(..) {
                node.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.nodes.push(node);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.nodes
                .retain(|node| pending.binary_search(&node.id).is_err());
            self.load_listeners
                .retain(|listener| pending.binary_search(&listener.node).is_err());
            self.pending_despawns.clear();
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Live node, excluding nodes already queued for despawn.
    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        if self.pending_despawns.contains(&id) {
            return None;
        }
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.pending_despawns.contains(&id) {
            return None;
        }
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .chain(self.pending_spawns.iter())
            .find(|node| node.name == name && !self.pending_despawns.contains(&node.id))
            .map(|node| node.id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.find_node(id).is_some()
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.find_node(id).is_some_and(|node| node.visible)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.find_node_mut(id) {
            node.visible = visible;
        }
    }

    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> bool {
        if child == parent || !self.contains_node(child) || !self.contains_node(parent) {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.find_node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.find_node_mut(child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Removes `id` from its parent's child list. No-op for roots.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.find_node(id).and_then(Node::parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.iter_mut().find(|node| node.id == parent) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.find_node_mut(id) {
            node.parent = None;
        }
    }

    pub fn has_model(&self, id: NodeId) -> bool {
        self.find_node(id).is_some_and(|node| node.model.is_some())
    }

    /// Installs a loaded model and fires the node's pending load listeners.
    pub fn attach_model(&mut self, id: NodeId, asset: ModelAsset) -> bool {
        let Some(node) = self
            .nodes
            .iter_mut()
            .find(|node| node.id == id && !self.pending_despawns.contains(&node.id))
        else {
            warn!(node = id.0, source = asset.source.as_str(), "model_for_missing_node");
            for (_, handle) in asset.owned_handles() {
                self.gpu.release(handle);
            }
            return false;
        };
        let replaced = node.model.replace(asset);
        if let Some(old) = replaced {
            warn!(node = id.0, source = old.source.as_str(), "model_replaced");
            for (_, handle) in old.owned_handles() {
                self.gpu.release(handle);
            }
        }
        let mut fired = 0usize;
        for listener in &mut self.load_listeners {
            if listener.node == id && !listener.fired {
                listener.fired = true;
                fired += 1;
            }
        }
        debug!(node = id.0, listeners = fired, "model_loaded");
        true
    }

    pub fn add_load_listener(&mut self, id: NodeId) -> ListenerId {
        let listener = ListenerId(self.next_listener_id);
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.load_listeners.push(LoadListener {
            id: listener,
            node: id,
            fired: false,
        });
        listener
    }

    /// Consumes a fired listener. Returns `false` while it is still waiting.
    pub fn take_load_fired(&mut self, listener: ListenerId) -> bool {
        let Some(index) = self
            .load_listeners
            .iter()
            .position(|entry| entry.id == listener)
        else {
            return false;
        };
        if !self.load_listeners[index].fired {
            return false;
        }
        self.load_listeners.swap_remove(index);
        true
    }

    pub fn load_listener_count(&self, id: NodeId) -> usize {
        self.load_listeners
            .iter()
            .filter(|listener| listener.node == id)
            .count()
    }

    pub fn request_model(&mut self, id: NodeId, source: impl Into<String>) {
        self.model_requests.push(ModelRequest {
            node: id,
            source: source.into(),
        });
    }

    pub fn take_model_requests(&mut self) -> Vec<ModelRequest> {
        std::mem::take(&mut self.model_requests)
    }

    pub fn gpu(&self) -> &GpuResources {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut GpuResources {
        &mut self.gpu
    }

    pub fn ui(&self) -> &UiLayer {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiLayer {
        &mut self.ui
    }

    pub fn now(&self) -> Duration {
        self.clock
    }

    /// Advances the world clock and every animation driver.
    pub fn advance(&mut self, dt: Duration) {
        self.clock = self.clock.saturating_add(dt);
        let dt_seconds = dt.as_secs_f64();
        for node in &mut self.nodes {
            if let Some(mixer) = node.mixer.as_mut() {
                mixer.update(dt_seconds);
            }
        }
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

/// Owns the single active scene and its world.
pub struct SceneRunner {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRunner {
    pub fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    pub fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.world.apply_pending();
        self.is_loaded = true;
    }

    pub fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        self.world.advance(fixed_dt);
        let command = self
            .scene
            .update(fixed_dt.as_secs_f32(), input, &mut self.world);
        self.world.apply_pending();
        command
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    pub fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.world);
        self.world.apply_pending();
        self.is_loaded = false;
    }
}
