use std::path::PathBuf;

use engine::{resolve_app_paths, LoopConfig, Scene, StartupError, StillFrameDevices, WindowHost};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{resolve_scenario_path, ConfigError, ScenarioConfig};
use super::walkthrough::WalkthroughScene;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) asset_root: PathBuf,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Safety Walkthrough Startup ===");

    let paths = resolve_app_paths()?;
    let scenario_path = resolve_scenario_path(&paths.assets_dir);
    let scenario = ScenarioConfig::load(&scenario_path)?;
    let camera_dir = paths.assets_dir.join(&scenario.camera_dir);
    info!(
        root = %paths.root.display(),
        scenario = %scenario_path.display(),
        camera_dir = %camera_dir.display(),
        allow_window_close = scenario.allow_window_close,
        "scenario_loaded"
    );

    let config = LoopConfig {
        window_title: scenario.window_title.clone(),
        ..LoopConfig::default()
    };
    let devices = Box::new(StillFrameDevices::new(camera_dir));
    let host = Box::new(WindowHost::new(scenario.allow_window_close));
    let scene = WalkthroughScene::new(scenario, devices, host);

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
        asset_root: paths.assets_dir,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
