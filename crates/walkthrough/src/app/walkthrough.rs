use engine::{
    CameraBridge, HostPage, InputSnapshot, MediaDevices, NodeDesc, Scene, SceneCommand,
    SceneWorld, Vec2,
};
use tracing::{debug, info, warn};

use super::config::ScenarioConfig;
use super::sequencer::{Sequencer, Timing, UiTarget, UiTargets, Worker, WorkerSlots};

/// The walkthrough as an engine scene: spawns the worker nodes and overlays
/// from the scenario, then hands every tap to the sequencer.
pub(crate) struct WalkthroughScene {
    config: ScenarioConfig,
    devices: Option<Box<dyn MediaDevices>>,
    host: Option<Box<dyn HostPage>>,
    sequencer: Option<Sequencer>,
}

impl WalkthroughScene {
    pub(crate) fn new(
        config: ScenarioConfig,
        devices: Box<dyn MediaDevices>,
        host: Box<dyn HostPage>,
    ) -> Self {
        Self {
            config,
            devices: Some(devices),
            host: Some(host),
            sequencer: None,
        }
    }

    fn spawn_workers(&self, world: &mut SceneWorld) -> WorkerSlots {
        let mut workers = WorkerSlots::default();
        for worker in Worker::ALL {
            let worker_config = self.config.worker(worker);
            let id = world.spawn(NodeDesc {
                name: worker_config.node.clone(),
                position: worker_config.position(),
                visible: false,
                animated: true,
            });
            world.request_model(id, worker_config.model.clone());
            workers = workers.with(worker, Some(id));
        }
        workers
    }

    fn build_overlays(&self, world: &mut SceneWorld) -> UiTargets {
        for target in UiTarget::ALL {
            let element = self.config.element(target);
            world.ui_mut().add_element(
                target.dom_id(),
                target.kind(),
                element.rect.into(),
                element.text.clone(),
            );
        }
        UiTargets::resolve(world.ui())
    }
}

impl Scene for WalkthroughScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let (Some(devices), Some(host)) = (self.devices.take(), self.host.take()) else {
            warn!("walkthrough_already_loaded");
            return;
        };
        let workers = self.spawn_workers(world);
        let ui = self.build_overlays(world);
        let mut sequencer = Sequencer::new(
            workers,
            ui,
            CameraBridge::new(devices),
            host,
            Timing::from_config(&self.config),
        );
        sequencer.prime(world);
        info!(
            workers = Worker::ALL.len(),
            overlays = UiTarget::ALL.len(),
            "walkthrough_loaded"
        );
        self.sequencer = Some(sequencer);
    }

    fn update(
        &mut self,
        _fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let Some(sequencer) = self.sequencer.as_mut() else {
            return SceneCommand::None;
        };
        if input.quit_requested() {
            return SceneCommand::Exit;
        }
        if let Some(point) = input.tap_normalized() {
            route_tap(sequencer, point, world);
        }
        sequencer.update(world);

        match sequencer.exit() {
            Some(exit) if exit.outcome.left_page() => SceneCommand::Exit,
            _ => SceneCommand::None,
        }
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if let Some(mut sequencer) = self.sequencer.take() {
            sequencer.shutdown(world);
        }
        info!("walkthrough_unloaded");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let sequencer = self.sequencer.as_ref()?;
        Some(format!(
            "{} | {:?}",
            self.config.window_title,
            sequencer.stage()
        ))
    }
}

/// An open alert is modal: the tap only dismisses it.
fn route_tap(sequencer: &mut Sequencer, point: Vec2, world: &mut SceneWorld) {
    if world.ui().alert().is_some() {
        sequencer.dismiss_alert(world);
        return;
    }
    let target = world
        .ui()
        .hit_test(point)
        .and_then(|element| sequencer.ui_targets().target_of(element));
    match target {
        Some(target) => {
            sequencer.tap(target, world);
        }
        None => debug!(x = point.x, y = point.y, "tap_missed"),
    }
}
