//! The walkthrough's single controller: a forward-only stage machine whose
//! transitions are scripts of steps, parked on waits and resumed by ticks or
//! taps.

mod steps;
mod types;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use engine::app::visibility::{hide_entity, hide_ui, show_block, show_entity, show_flex};
use engine::{
    exit_app, play_once_freeze, remove_and_dispose, wait_for_model, CameraBridge, ExitOutcome,
    HostPage, SceneWorld,
};
use tracing::{debug, info, warn};

use self::steps::{script_for, Step, Wait};
pub(crate) use self::types::{Gate, Stage, UiTarget, UiTargets, Worker, WorkerSlots};
use super::config::ScenarioConfig;

/// Guard flags as the overlays see them. Derived from the phase, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GateFlags {
    pub(crate) busy: bool,
    pub(crate) question_open: bool,
    pub(crate) scene2_await_tap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TapOutcome {
    Started(Gate),
    /// Resumed a transition parked on this tap.
    Resumed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExitRecord {
    pub(crate) outcome: ExitOutcome,
    pub(crate) at: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Timing {
    speeds: HashMap<Worker, f64>,
    exit_delay: Duration,
}

impl Timing {
    pub(crate) fn from_config(config: &ScenarioConfig) -> Self {
        Self {
            speeds: Worker::ALL
                .into_iter()
                .map(|worker| (worker, config.speed_for(worker)))
                .collect(),
            exit_delay: config.exit_delay(),
        }
    }

    fn speed(&self, worker: Worker) -> f64 {
        self.speeds.get(&worker).copied().unwrap_or(1.0)
    }
}

#[derive(Debug)]
struct Transition {
    origin: Gate,
    steps: VecDeque<Step>,
    waiting: Option<Wait>,
    /// Instant the last wait resolved; delays count from here.
    cursor: Duration,
}

#[derive(Debug)]
enum Phase {
    Accepting(Gate),
    Running(Transition),
    Finished,
}

enum Flow {
    Continue,
    Park(Wait),
    Accept(Gate),
    Finish,
}

pub(crate) struct Sequencer {
    stage: Stage,
    phase: Phase,
    workers: WorkerSlots,
    ui: UiTargets,
    camera: CameraBridge,
    host: Box<dyn HostPage>,
    timing: Timing,
    exit: Option<ExitRecord>,
}

impl Sequencer {
    pub(crate) fn new(
        workers: WorkerSlots,
        ui: UiTargets,
        camera: CameraBridge,
        host: Box<dyn HostPage>,
        timing: Timing,
    ) -> Self {
        Self {
            stage: Stage::Start,
            phase: Phase::Accepting(Gate::StartOverlay),
            workers,
            ui,
            camera,
            host,
            timing,
            exit: None,
        }
    }

    /// Puts the document in its opening state: only the start overlay shown.
    pub(crate) fn prime(&mut self, world: &mut SceneWorld) {
        let hidden: Vec<UiTarget> = UiTarget::ALL
            .into_iter()
            .filter(|target| *target != UiTarget::Overlay)
            .collect();
        hide_ui(world.ui_mut(), &self.ui.elements(&hidden));
        show_flex(world.ui_mut(), &[self.ui.get(UiTarget::Overlay)]);
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn accepting(&self) -> Option<Gate> {
        match self.phase {
            Phase::Accepting(gate) => Some(gate),
            Phase::Running(_) | Phase::Finished => None,
        }
    }

    pub(crate) fn flags(&self) -> GateFlags {
        GateFlags {
            busy: self.accepting().is_none(),
            question_open: self.accepting() == Some(Gate::Question),
            scene2_await_tap: self.accepting() == Some(Gate::Overlay2),
        }
    }

    pub(crate) fn exit(&self) -> Option<ExitRecord> {
        self.exit
    }

    pub(crate) fn ui_targets(&self) -> &UiTargets {
        &self.ui
    }

    #[cfg(test)]
    pub(crate) fn camera(&self) -> &CameraBridge {
        &self.camera
    }

    /// Checks the guard and claims the transition in one call. A tap the
    /// current phase does not expect changes nothing.
    pub(crate) fn tap(&mut self, target: UiTarget, world: &mut SceneWorld) -> TapOutcome {
        match &mut self.phase {
            Phase::Accepting(gate) if gate.target() == target => {
                let gate = *gate;
                info!(gate = ?gate, stage = ?self.stage, "tap_accepted");
                self.phase = Phase::Running(Transition {
                    origin: gate,
                    steps: script_for(gate, self.timing.exit_delay),
                    waiting: None,
                    cursor: world.now(),
                });
                self.advance(world);
                TapOutcome::Started(gate)
            }
            Phase::Running(transition)
                if matches!(transition.waiting, Some(Wait::Tap(awaited)) if awaited == target) =>
            {
                transition.waiting = None;
                transition.cursor = world.now();
                debug!(target = ?target, "awaited_tap_received");
                self.advance(world);
                TapOutcome::Resumed
            }
            _ => {
                let flags = self.flags();
                debug!(
                    target = ?target,
                    stage = ?self.stage,
                    busy = flags.busy,
                    question_open = flags.question_open,
                    scene2_await_tap = flags.scene2_await_tap,
                    "tap_rejected"
                );
                TapOutcome::Rejected
            }
        }
    }

    /// Closes the camera alert and lets a transition parked on it continue.
    pub(crate) fn dismiss_alert(&mut self, world: &mut SceneWorld) -> bool {
        if !world.ui_mut().dismiss_alert() {
            return false;
        }
        info!("camera_alert_dismissed");
        self.advance(world);
        true
    }

    pub(crate) fn update(&mut self, world: &mut SceneWorld) {
        self.advance(world);
    }

    /// Releases the camera when the scene goes away mid-walkthrough.
    pub(crate) fn shutdown(&mut self, world: &mut SceneWorld) {
        let stopped = self.camera.stop(world.ui_mut());
        debug!(tracks_stopped = stopped, stage = ?self.stage, "sequencer_shutdown");
    }

    fn advance(&mut self, world: &mut SceneWorld) {
        let mut transition = match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Running(transition) => transition,
            other => {
                self.phase = other;
                return;
            }
        };

        self.phase = loop {
            if let Some(wait) = transition.waiting.as_mut() {
                if !wait.poll(world, &mut transition.cursor) {
                    break Phase::Running(transition);
                }
                transition.waiting = None;
            }
            let Some(step) = transition.steps.pop_front() else {
                warn!(gate = ?transition.origin, "transition_ran_out_of_steps");
                break Phase::Finished;
            };
            match self.execute(step, world, transition.cursor) {
                Flow::Continue => {}
                Flow::Park(wait) => transition.waiting = Some(wait),
                Flow::Accept(gate) => {
                    self.enter_stage(gate.stage());
                    break Phase::Accepting(gate);
                }
                Flow::Finish => break Phase::Finished,
            }
        };
    }

    fn execute(&mut self, step: Step, world: &mut SceneWorld, cursor: Duration) -> Flow {
        match step {
            Step::HideUi(targets) => hide_ui(world.ui_mut(), &self.ui.elements(&targets)),
            Step::ShowFlex(target) => show_flex(world.ui_mut(), &[self.ui.get(target)]),
            Step::ShowBlock(target) => show_block(world.ui_mut(), &[self.ui.get(target)]),
            Step::ShowEntity(workers) => show_entity(world, &self.workers.nodes(&workers)),
            Step::HideEntity(workers) => hide_entity(world, &self.workers.nodes(&workers)),
            Step::StartCamera => {
                let started = self.camera.start(world.ui_mut());
                debug!(result = ?started, "camera_start_finished");
            }
            Step::AwaitAlert => return Flow::Park(Wait::Alert),
            Step::Dispose(worker) => {
                let disposed = remove_and_dispose(world, self.workers.slot_mut(worker));
                debug!(worker = ?worker, disposed, "worker_disposed");
            }
            Step::WaitForModel(worker) => {
                return Flow::Park(Wait::Model(wait_for_model(world, self.workers.get(worker))));
            }
            Step::PlayOnceFreeze(worker) => {
                let playback =
                    play_once_freeze(world, self.workers.get(worker), self.timing.speed(worker));
                return Flow::Park(Wait::Playback(playback));
            }
            Step::Delay(delay) => return Flow::Park(Wait::Until(cursor.saturating_add(delay))),
            Step::AwaitTap(target) => return Flow::Park(Wait::Tap(target)),
            Step::EnterStage(stage) => self.enter_stage(stage),
            Step::Accept(gate) => return Flow::Accept(gate),
            Step::Exit => {
                self.enter_stage(Stage::Exit);
                let outcome = exit_app(&mut self.camera, self.host.as_mut(), world.ui_mut());
                info!(outcome = ?outcome, "walkthrough_finished");
                self.exit = Some(ExitRecord {
                    outcome,
                    at: world.now(),
                });
                return Flow::Finish;
            }
        }
        Flow::Continue
    }

    fn enter_stage(&mut self, next: Stage) {
        if next <= self.stage {
            warn!(current = ?self.stage, requested = ?next, "stage_regression_ignored");
            return;
        }
        info!(from = ?self.stage, to = ?next, "stage_entered");
        self.stage = next;
    }
}

#[cfg(test)]
mod tests;
