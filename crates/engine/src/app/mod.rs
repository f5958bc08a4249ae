pub mod animation;
pub mod camera;
pub mod host;
mod input;
pub mod lifecycle;
mod loop_runner;
mod metrics;
pub mod model_loader;
mod rendering;
pub mod resources;
mod scene;
pub mod ui;
pub mod visibility;

pub use animation::{AnimationAction, AnimationClip, AnimationMixer, LoopMode};
pub use camera::{CameraBridge, CameraStart, CaptureError, MediaDevices, StillFrameDevices};
pub use host::{exit_app, ExitOutcome, HostError, HostPage, WindowHost};
pub use input::{Tap, TapSource};
pub use lifecycle::{
    play_once_freeze, remove_and_dispose, wait_for_model, ModelWait, Playback,
    PLAYBACK_SETTLE_MARGIN,
};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use model_loader::{ModelDescriptor, ModelLoadError, ModelLoader};
pub use rendering::{world_to_screen, Renderer, Viewport, NEAR_PLANE};
pub use resources::{GpuResources, ModelAsset};
pub use scene::{
    InputSnapshot, ListenerId, ModelRequest, Node, NodeDesc, NodeId, NodeIdAllocator, Scene,
    SceneCommand, SceneRunner, SceneWorld, Vec2, Vec3,
};
pub use ui::{Display, ElementId, ElementKind, UiLayer, UiRect, VideoFrame};
