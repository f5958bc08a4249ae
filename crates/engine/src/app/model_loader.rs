use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::animation::AnimationClip;
use super::resources::{
    GpuResourceKind, GpuResources, Material, MaterialSlots, Mesh, MeshTree, ModelAsset,
    TextureSlot,
};
use super::scene::{ModelRequest, NodeId, SceneWorld};

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("model descriptor {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("clip '{clip}' in {path} has invalid duration {duration_seconds}")]
    InvalidClip {
        path: PathBuf,
        clip: String,
        duration_seconds: f64,
    },
    #[error("failed to start model loader thread: {0}")]
    SpawnWorker(#[source] io::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClipDescriptor {
    pub name: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialDescriptor {
    pub name: String,
    #[serde(default)]
    pub textures: Vec<TextureSlot>,
}

/// A mesh's material slot: one object or an array of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MaterialSlotsDescriptor {
    Single(MaterialDescriptor),
    Array(Vec<MaterialDescriptor>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshDescriptor {
    pub name: String,
    #[serde(default = "default_true")]
    pub geometry: bool,
    pub materials: MaterialSlotsDescriptor,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshTreeDescriptor {
    pub name: String,
    #[serde(default)]
    pub mesh: Option<MeshDescriptor>,
    #[serde(default)]
    pub children: Vec<MeshTreeDescriptor>,
}

/// On-disk description of a model: its clips and mesh hierarchy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescriptor {
    #[serde(default)]
    pub animations: Vec<ClipDescriptor>,
    pub root: MeshTreeDescriptor,
}

fn default_true() -> bool {
    true
}

impl ModelDescriptor {
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ModelLoadError> {
        let descriptor: ModelDescriptor =
            serde_json::from_str(raw).map_err(|source| ModelLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for clip in &descriptor.animations {
            if !clip.duration_seconds.is_finite() || clip.duration_seconds < 0.0 {
                return Err(ModelLoadError::InvalidClip {
                    path: path.to_path_buf(),
                    clip: clip.name.clone(),
                    duration_seconds: clip.duration_seconds,
                });
            }
        }
        Ok(descriptor)
    }

    pub fn read(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    /// Allocates GPU handles for every geometry, material and texture.
    pub fn instantiate(&self, source: &str, gpu: &mut GpuResources) -> ModelAsset {
        ModelAsset {
            source: source.to_string(),
            animations: self
                .animations
                .iter()
                .map(|clip| AnimationClip {
                    name: clip.name.clone(),
                    duration_seconds: clip.duration_seconds,
                })
                .collect(),
            root: instantiate_tree(&self.root, gpu),
        }
    }
}

fn instantiate_tree(desc: &MeshTreeDescriptor, gpu: &mut GpuResources) -> MeshTree {
    MeshTree {
        name: desc.name.clone(),
        mesh: desc.mesh.as_ref().map(|mesh| instantiate_mesh(mesh, gpu)),
        children: desc
            .children
            .iter()
            .map(|child| instantiate_tree(child, gpu))
            .collect(),
    }
}

fn instantiate_mesh(desc: &MeshDescriptor, gpu: &mut GpuResources) -> Mesh {
    let geometry = desc
        .geometry
        .then(|| gpu.allocate(GpuResourceKind::Geometry, desc.name.as_str()));
    let materials = match &desc.materials {
        MaterialSlotsDescriptor::Single(material) => {
            MaterialSlots::Single(instantiate_material(material, gpu))
        }
        MaterialSlotsDescriptor::Array(materials) => MaterialSlots::Array(
            materials
                .iter()
                .map(|material| instantiate_material(material, gpu))
                .collect(),
        ),
    };
    Mesh {
        name: desc.name.clone(),
        geometry,
        materials,
    }
}

fn instantiate_material(desc: &MaterialDescriptor, gpu: &mut GpuResources) -> Material {
    let textures = desc
        .textures
        .iter()
        .map(|slot| {
            let label = format!("{}.{slot:?}", desc.name);
            (*slot, gpu.allocate(GpuResourceKind::Texture, label))
        })
        .collect();
    Material {
        name: desc.name.clone(),
        handle: gpu.allocate(GpuResourceKind::Material, desc.name.as_str()),
        textures,
    }
}

#[derive(Debug)]
pub struct LoadedModel {
    pub node: NodeId,
    pub source: String,
    pub result: Result<ModelDescriptor, ModelLoadError>,
}

/// Reads descriptors off the main thread. GPU handles are allocated when the
/// result is applied to the world.
pub struct ModelLoader {
    requests: Option<Sender<ModelRequest>>,
    completed: Receiver<LoadedModel>,
    worker: Option<JoinHandle<()>>,
    in_flight: usize,
}

impl ModelLoader {
    pub fn spawn(asset_root: PathBuf) -> Result<Self, ModelLoadError> {
        let (request_tx, request_rx) = mpsc::channel::<ModelRequest>();
        let (completed_tx, completed_rx) = mpsc::channel::<LoadedModel>();
        let worker = thread::Builder::new()
            .name("model_loader".to_string())
            .spawn(move || {
                for request in request_rx {
                    let path = asset_root.join(&request.source);
                    let result = ModelDescriptor::read(&path);
                    let loaded = LoadedModel {
                        node: request.node,
                        source: request.source,
                        result,
                    };
                    if completed_tx.send(loaded).is_err() {
                        break;
                    }
                }
            })
            .map_err(ModelLoadError::SpawnWorker)?;

        Ok(Self {
            requests: Some(request_tx),
            completed: completed_rx,
            worker: Some(worker),
            in_flight: 0,
        })
    }

    pub fn request(&mut self, request: ModelRequest) {
        let Some(sender) = self.requests.as_ref() else {
            return;
        };
        debug!(node = request.node.0, source = request.source.as_str(), "model_requested");
        match sender.send(request) {
            Ok(()) => self.in_flight += 1,
            Err(mpsc::SendError(request)) => warn!(
                node = request.node.0,
                source = request.source.as_str(),
                "model_loader_unavailable"
            ),
        }
    }

    pub fn poll_completed(&mut self) -> Vec<LoadedModel> {
        let completed: Vec<LoadedModel> = self.completed.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(completed.len());
        completed
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for ModelLoader {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("model_loader_panicked");
            }
        }
    }
}

/// Installs a finished load on its node. Failures leave the node unloaded.
pub fn apply_loaded(world: &mut SceneWorld, loaded: LoadedModel) -> bool {
    match loaded.result {
        Ok(descriptor) => {
            let asset = descriptor.instantiate(&loaded.source, world.gpu_mut());
            let handles = asset.owned_handles().len();
            let attached = world.attach_model(loaded.node, asset);
            if attached {
                info!(
                    node = loaded.node.0,
                    source = loaded.source.as_str(),
                    gpu_handles = handles,
                    "model_attached"
                );
            }
            attached
        }
        Err(load_error) => {
            error!(
                node = loaded.node.0,
                source = loaded.source.as_str(),
                error = %load_error,
                "model_load_failed"
            );
            false
        }
    }
}
