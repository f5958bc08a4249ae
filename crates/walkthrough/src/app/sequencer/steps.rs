use std::collections::VecDeque;
use std::time::Duration;

use engine::{ModelWait, Playback, SceneWorld};

use super::types::{Gate, Stage, UiTarget, Worker};

/// One instruction of a transition script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    HideUi(Vec<UiTarget>),
    ShowFlex(UiTarget),
    ShowBlock(UiTarget),
    ShowEntity(Vec<Worker>),
    HideEntity(Vec<Worker>),
    StartCamera,
    /// Holds while the camera alert is on screen.
    AwaitAlert,
    Dispose(Worker),
    WaitForModel(Worker),
    PlayOnceFreeze(Worker),
    /// Measured from when the previous wait resolved.
    Delay(Duration),
    AwaitTap(UiTarget),
    EnterStage(Stage),
    /// Ends the transition; the sequencer then accepts only this gate.
    Accept(Gate),
    /// Ends the transition and the walkthrough.
    Exit,
}

/// A suspension the running transition is parked on.
#[derive(Debug)]
pub(crate) enum Wait {
    Model(ModelWait),
    Playback(Playback),
    Until(Duration),
    Tap(UiTarget),
    Alert,
}

impl Wait {
    /// Polls the wait against the world clock. On resolution `cursor` moves to
    /// the instant the wait actually completed.
    pub(crate) fn poll(&mut self, world: &mut SceneWorld, cursor: &mut Duration) -> bool {
        let resolved_at = match self {
            Wait::Model(wait) => wait.poll(world).then(|| world.now()),
            Wait::Playback(playback) => playback
                .is_settled(world)
                .then(|| playback.settles_at()),
            Wait::Until(deadline) => (world.now() >= *deadline).then_some(*deadline),
            Wait::Tap(_) => None,
            Wait::Alert => world.ui().alert().is_none().then(|| world.now()),
        };
        match resolved_at {
            Some(at) => {
                *cursor = at;
                true
            }
            None => false,
        }
    }
}

/// The script a gate's tap starts.
pub(crate) fn script_for(gate: Gate, exit_delay: Duration) -> VecDeque<Step> {
    let steps = match gate {
        Gate::StartOverlay => vec![
            Step::HideUi(vec![UiTarget::Overlay]),
            Step::StartCamera,
            Step::AwaitAlert,
            Step::HideEntity(vec![
                Worker::Safe,
                Worker::WalkingSafe,
                Worker::Slipping,
                Worker::Slipping2,
                Worker::SafeSign,
                Worker::Pallet,
            ]),
            Step::WaitForModel(Worker::Tripping),
            Step::ShowEntity(vec![Worker::Tripping]),
            Step::EnterStage(Stage::Tripping),
            Step::PlayOnceFreeze(Worker::Tripping),
            Step::ShowFlex(UiTarget::Question),
            Step::Accept(Gate::Question),
        ],
        Gate::Question => vec![
            Step::HideUi(vec![UiTarget::Question]),
            Step::Dispose(Worker::Tripping),
            Step::ShowEntity(vec![Worker::Pallet, Worker::Safe]),
            Step::ShowBlock(UiTarget::ClearButton),
            Step::Accept(Gate::ClearPath1),
        ],
        Gate::ClearPath1 => vec![
            Step::HideUi(vec![UiTarget::ClearButton]),
            Step::Dispose(Worker::Pallet),
            Step::Dispose(Worker::Safe),
            Step::WaitForModel(Worker::WalkingSafe),
            Step::ShowEntity(vec![Worker::WalkingSafe]),
            Step::EnterStage(Stage::WalkingSafe),
            Step::PlayOnceFreeze(Worker::WalkingSafe),
            Step::ShowFlex(UiTarget::Overlay2),
            Step::Accept(Gate::Overlay2),
        ],
        Gate::Overlay2 => vec![
            Step::HideUi(vec![UiTarget::Overlay2]),
            Step::Dispose(Worker::WalkingSafe),
            Step::WaitForModel(Worker::Slipping),
            Step::ShowEntity(vec![Worker::Slipping]),
            Step::EnterStage(Stage::Slipping),
            Step::PlayOnceFreeze(Worker::Slipping),
            Step::ShowBlock(UiTarget::ClearButton2),
            Step::Accept(Gate::ClearPath2),
        ],
        Gate::ClearPath2 => vec![
            Step::HideUi(vec![UiTarget::ClearButton2]),
            Step::Dispose(Worker::Slipping),
            Step::WaitForModel(Worker::Slipping2),
            Step::ShowEntity(vec![Worker::Slipping2]),
            Step::EnterStage(Stage::Slipping2),
            Step::PlayOnceFreeze(Worker::Slipping2),
            Step::ShowFlex(UiTarget::NoteWetFloor),
            Step::EnterStage(Stage::Note),
            Step::AwaitTap(UiTarget::NoteWetFloor),
            Step::HideUi(vec![UiTarget::NoteWetFloor]),
            Step::ShowBlock(UiTarget::AddSignButton),
            Step::Accept(Gate::AddSign),
        ],
        Gate::AddSign => vec![
            Step::HideUi(vec![UiTarget::AddSignButton]),
            Step::Dispose(Worker::Slipping2),
            Step::WaitForModel(Worker::SafeSign),
            Step::ShowEntity(vec![Worker::SafeSign]),
            Step::EnterStage(Stage::SafeSign),
            Step::PlayOnceFreeze(Worker::SafeSign),
            Step::Delay(exit_delay),
            Step::Exit,
        ],
    };
    steps.into()
}
