use std::collections::HashMap;

use tracing::debug;

use super::animation::AnimationClip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResourceKind {
    Geometry,
    Material,
    Texture,
}

/// Texture slots a material may own. Disposal walks exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSlot {
    Map,
    NormalMap,
    RoughnessMap,
    MetalnessMap,
    EmissiveMap,
    AoMap,
    AlphaMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub handle: GpuHandle,
    pub textures: Vec<(TextureSlot, GpuHandle)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSlots {
    Single(Material),
    Array(Vec<Material>),
}

impl MaterialSlots {
    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        let slice: &[Material] = match self {
            MaterialSlots::Single(material) => std::slice::from_ref(material),
            MaterialSlots::Array(materials) => materials,
        };
        slice.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub geometry: Option<GpuHandle>,
    pub materials: MaterialSlots,
}

/// A node of a loaded model's hierarchy. Groups carry no mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTree {
    pub name: String,
    pub mesh: Option<Mesh>,
    pub children: Vec<MeshTree>,
}

impl MeshTree {
    pub fn traverse(&self, visit: &mut impl FnMut(&MeshTree)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |tree| {
            if tree.mesh.is_some() {
                count += 1;
            }
        });
        count
    }
}

/// Loaded content attached to a scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub source: String,
    pub animations: Vec<AnimationClip>,
    pub root: MeshTree,
}

impl ModelAsset {
    /// Every GPU handle the model owns, in traversal order.
    pub fn owned_handles(&self) -> Vec<(GpuResourceKind, GpuHandle)> {
        let mut handles = Vec::new();
        self.root.traverse(&mut |tree| {
            let Some(mesh) = &tree.mesh else {
                return;
            };
            if let Some(geometry) = mesh.geometry {
                handles.push((GpuResourceKind::Geometry, geometry));
            }
            for material in mesh.materials.iter() {
                for (_, texture) in &material.textures {
                    handles.push((GpuResourceKind::Texture, *texture));
                }
                handles.push((GpuResourceKind::Material, material.handle));
            }
        });
        handles
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuResourceCounts {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

impl GpuResourceCounts {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures
    }
}

/// Tracks live GPU-side allocations so disposal can be verified.
#[derive(Debug, Default)]
pub struct GpuResources {
    next: u64,
    live: HashMap<GpuHandle, (GpuResourceKind, String)>,
    released_total: u64,
}

impl GpuResources {
    pub fn allocate(&mut self, kind: GpuResourceKind, label: impl Into<String>) -> GpuHandle {
        let handle = GpuHandle(self.next);
        self.next = self.next.saturating_add(1);
        self.live.insert(handle, (kind, label.into()));
        handle
    }

    /// Returns `false` for unknown or already released handles.
    pub fn release(&mut self, handle: GpuHandle) -> bool {
        match self.live.remove(&handle) {
            Some((kind, label)) => {
                self.released_total = self.released_total.saturating_add(1);
                debug!(handle = handle.0, ?kind, label = label.as_str(), "gpu_released");
                true
            }
            None => {
                debug!(handle = handle.0, "gpu_release_ignored");
                false
            }
        }
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }

    pub fn counts(&self) -> GpuResourceCounts {
        let mut counts = GpuResourceCounts::default();
        for (kind, _) in self.live.values() {
            match kind {
                GpuResourceKind::Geometry => counts.geometries += 1,
                GpuResourceKind::Material => counts.materials += 1,
                GpuResourceKind::Texture => counts.textures += 1,
            }
        }
        counts
    }
}
