use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use engine::app::camera::{CaptureError, MediaConstraints, MediaDevices, MediaStream, MediaTrack};
use engine::app::host::EXIT_FALLBACK_MESSAGE;
use engine::app::resources::{GpuResourceKind, Material, MaterialSlots, Mesh, MeshTree};
use engine::{
    AnimationClip, CameraBridge, Display, ExitOutcome, HostError, HostPage, ModelAsset, NodeDesc,
    NodeId, SceneWorld, VideoFrame,
};

use super::*;

const TICK: Duration = Duration::from_millis(10);
const CLIP_SECONDS: f64 = 2.0;

type EventLog = Rc<RefCell<Vec<&'static str>>>;

struct RecordingTrack {
    log: EventLog,
    live: bool,
}

impl MediaTrack for RecordingTrack {
    fn label(&self) -> &str {
        "rear camera"
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.log.borrow_mut().push("camera_stop");
        }
    }
}

struct FakeDevices {
    granted: bool,
    log: EventLog,
}

impl MediaDevices for FakeDevices {
    fn get_user_media(
        &mut self,
        _constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.log.borrow_mut().push("camera_request");
        if !self.granted {
            return Err(CaptureError::PermissionDenied);
        }
        let track = RecordingTrack {
            log: Rc::clone(&self.log),
            live: true,
        };
        Ok(MediaStream::new(
            vec![Box::new(track)],
            Some(VideoFrame {
                width: 1,
                height: 1,
                rgba: vec![40, 40, 40, 255],
            }),
        ))
    }
}

struct RecordingHost {
    close_ok: bool,
    log: EventLog,
}

impl HostPage for RecordingHost {
    fn close_window(&mut self) -> Result<(), HostError> {
        self.log.borrow_mut().push("close");
        if self.close_ok {
            Ok(())
        } else {
            Err(HostError::CloseRefused)
        }
    }

    fn reopen_self_and_close(&mut self) -> Result<(), HostError> {
        self.log.borrow_mut().push("reopen");
        Err(HostError::CloseRefused)
    }

    fn navigate_blank(&mut self) -> Result<(), HostError> {
        self.log.borrow_mut().push("blank");
        Err(HostError::NavigationBlocked("kiosk".to_string()))
    }
}

struct Fixture {
    world: SceneWorld,
    sequencer: Sequencer,
    nodes: WorkerSlots,
    log: EventLog,
}

impl Fixture {
    fn new(camera_granted: bool, close_ok: bool) -> Self {
        let config = ScenarioConfig::default();
        let mut world = SceneWorld::default();
        let mut nodes = WorkerSlots::default();
        for worker in Worker::ALL {
            let worker_config = config.worker(worker);
            let id = world.spawn(NodeDesc {
                name: worker_config.node.clone(),
                position: worker_config.position(),
                visible: false,
                animated: true,
            });
            nodes = nodes.with(worker, Some(id));
        }
        world.apply_pending();
        for target in UiTarget::ALL {
            let element = config.element(target);
            world.ui_mut().add_element(
                target.dom_id(),
                target.kind(),
                element.rect.into(),
                element.text.clone(),
            );
        }

        let log: EventLog = Rc::default();
        let camera = CameraBridge::new(Box::new(FakeDevices {
            granted: camera_granted,
            log: Rc::clone(&log),
        }));
        let host = RecordingHost {
            close_ok,
            log: Rc::clone(&log),
        };
        let mut sequencer = Sequencer::new(
            nodes.clone(),
            UiTargets::resolve(world.ui()),
            camera,
            Box::new(host),
            Timing::from_config(&config),
        );
        sequencer.prime(&mut world);
        Self {
            world,
            sequencer,
            nodes,
            log,
        }
    }

    fn node(&self, worker: Worker) -> NodeId {
        self.nodes.get(worker).expect("worker node")
    }

    fn load(&mut self, worker: Worker) {
        let clips: &[f64] = if worker == Worker::Pallet {
            &[]
        } else {
            &[CLIP_SECONDS]
        };
        let model = model(&mut self.world, clips);
        assert!(self.world.attach_model(self.node(worker), model));
    }

    fn load_all(&mut self) {
        for worker in Worker::ALL {
            self.load(worker);
        }
    }

    fn tap(&mut self, target: UiTarget) -> TapOutcome {
        let outcome = self.sequencer.tap(target, &mut self.world);
        self.world.apply_pending();
        self.assert_single_worker_visible();
        outcome
    }

    fn tick(&mut self) {
        self.world.advance(TICK);
        self.sequencer.update(&mut self.world);
        self.world.apply_pending();
        self.assert_single_worker_visible();
    }

    fn run_for(&mut self, duration: Duration) {
        let ticks = duration.as_millis() / TICK.as_millis();
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn run_until(&mut self, done: impl Fn(&Fixture) -> bool) {
        for _ in 0..3_000 {
            if done(self) {
                return;
            }
            self.tick();
        }
        panic!("condition not reached, stage {:?}", self.sequencer.stage());
    }

    fn is_visible(&self, worker: Worker) -> bool {
        self.world
            .find_node(self.node(worker))
            .is_some_and(|node| node.visible)
    }

    fn display(&self, target: UiTarget) -> Display {
        let element = self.sequencer.ui_targets().get(target).expect("element");
        self.world.ui().display(element).expect("display")
    }

    fn assert_single_worker_visible(&self) {
        let visible: Vec<Worker> = Worker::ALL
            .into_iter()
            .filter(|worker| self.is_visible(*worker))
            .collect();
        let pallet_and_safe = visible.len() == 2
            && visible.contains(&Worker::Pallet)
            && visible.contains(&Worker::Safe);
        assert!(
            visible.len() <= 1 || pallet_and_safe,
            "visible together: {visible:?}"
        );
    }

    fn advance_to_add_sign(&mut self) {
        assert_eq!(self.tap(UiTarget::Overlay), TapOutcome::Started(Gate::StartOverlay));
        self.run_until(|f| f.sequencer.flags().question_open);
        assert_eq!(self.tap(UiTarget::Question), TapOutcome::Started(Gate::Question));
        assert_eq!(self.tap(UiTarget::ClearButton), TapOutcome::Started(Gate::ClearPath1));
        self.run_until(|f| f.sequencer.flags().scene2_await_tap);
        assert_eq!(self.tap(UiTarget::Overlay2), TapOutcome::Started(Gate::Overlay2));
        self.run_until(|f| f.sequencer.accepting() == Some(Gate::ClearPath2));
        assert_eq!(self.tap(UiTarget::ClearButton2), TapOutcome::Started(Gate::ClearPath2));
        self.run_until(|f| f.sequencer.stage() == Stage::Note);
        assert_eq!(self.tap(UiTarget::NoteWetFloor), TapOutcome::Resumed);
        assert_eq!(self.sequencer.accepting(), Some(Gate::AddSign));
    }
}

fn model(world: &mut SceneWorld, clip_seconds: &[f64]) -> ModelAsset {
    let gpu = world.gpu_mut();
    let material = Material {
        name: "hi_vis".to_string(),
        handle: gpu.allocate(GpuResourceKind::Material, "hi_vis"),
        textures: Vec::new(),
    };
    ModelAsset {
        source: "models/worker.json".to_string(),
        animations: clip_seconds
            .iter()
            .map(|seconds| AnimationClip {
                name: "action".to_string(),
                duration_seconds: *seconds,
            })
            .collect(),
        root: MeshTree {
            name: "root".to_string(),
            mesh: Some(Mesh {
                name: "body".to_string(),
                geometry: Some(gpu.allocate(GpuResourceKind::Geometry, "body")),
                materials: MaterialSlots::Single(material),
            }),
            children: Vec::new(),
        },
    }
}

#[test]
fn prime_shows_only_the_start_overlay() {
    let fixture = Fixture::new(true, true);
    for target in UiTarget::ALL {
        let expected = if target == UiTarget::Overlay {
            Display::Flex
        } else {
            Display::None
        };
        assert_eq!(fixture.display(target), expected, "{target:?}");
    }
    assert_eq!(fixture.sequencer.stage(), Stage::Start);
    assert!(!fixture.sequencer.flags().busy);
}

#[test]
fn tap_while_busy_changes_nothing() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    fixture.run_for(Duration::from_millis(1000));
    assert!(fixture.sequencer.flags().busy);

    let mutations = fixture.world.ui().mutation_count();
    let stage = fixture.sequencer.stage();
    for target in UiTarget::ALL {
        assert_eq!(fixture.tap(target), TapOutcome::Rejected, "{target:?}");
    }
    assert_eq!(fixture.world.ui().mutation_count(), mutations);
    assert_eq!(fixture.sequencer.stage(), stage);
    assert!(fixture.is_visible(Worker::Tripping));
}

#[test]
fn start_overlay_is_one_shot() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    assert_eq!(
        fixture.tap(UiTarget::Overlay),
        TapOutcome::Started(Gate::StartOverlay)
    );
    fixture.run_until(|f| f.sequencer.flags().question_open);
    assert_eq!(fixture.tap(UiTarget::Overlay), TapOutcome::Rejected);
    assert_eq!(fixture.log.borrow().as_slice(), ["camera_request"]);
}

#[test]
fn question_overlay_appears_at_the_playback_settle_point() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    assert_eq!(fixture.sequencer.stage(), Stage::Tripping);
    assert!(fixture.is_visible(Worker::Tripping));
    assert_eq!(fixture.display(UiTarget::Overlay), Display::None);

    // 2 s clip at half speed, plus the settle margin.
    fixture.run_for(Duration::from_millis(4040));
    assert_eq!(fixture.display(UiTarget::Question), Display::None);
    assert!(!fixture.sequencer.flags().question_open);

    fixture.tick();
    assert_eq!(fixture.display(UiTarget::Question), Display::Flex);
    assert!(fixture.sequencer.flags().question_open);
    assert_eq!(fixture.sequencer.stage(), Stage::Question);

    let tripping = fixture.world.find_node(fixture.node(Worker::Tripping)).expect("node");
    let action = tripping
        .mixer()
        .and_then(|mixer| mixer.active_action())
        .expect("action");
    assert!(action.is_frozen_on_last_frame());
}

#[test]
fn question_tap_completes_synchronously() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    fixture.run_until(|f| f.sequencer.flags().question_open);
    let live_before = fixture.world.gpu().live_count();

    assert_eq!(
        fixture.tap(UiTarget::Question),
        TapOutcome::Started(Gate::Question)
    );
    assert_eq!(fixture.sequencer.accepting(), Some(Gate::ClearPath1));
    assert_eq!(fixture.sequencer.stage(), Stage::ClearPath1);
    assert!(!fixture.world.contains_node(fixture.node(Worker::Tripping)));
    assert_eq!(fixture.world.gpu().live_count(), live_before - 2);
    assert!(fixture.is_visible(Worker::Pallet));
    assert!(fixture.is_visible(Worker::Safe));
    assert_eq!(fixture.display(UiTarget::Question), Display::None);
    assert_eq!(fixture.display(UiTarget::ClearButton), Display::Block);
}

#[test]
fn clearing_the_path_disposes_pallet_and_safe_and_freezes_walking_safe() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    fixture.run_until(|f| f.sequencer.flags().question_open);
    fixture.tap(UiTarget::Question);

    assert_eq!(
        fixture.tap(UiTarget::ClearButton),
        TapOutcome::Started(Gate::ClearPath1)
    );
    assert!(!fixture.world.contains_node(fixture.node(Worker::Pallet)));
    assert!(!fixture.world.contains_node(fixture.node(Worker::Safe)));
    assert!(fixture.is_visible(Worker::WalkingSafe));
    assert_eq!(fixture.display(UiTarget::ClearButton), Display::None);

    fixture.run_until(|f| f.sequencer.flags().scene2_await_tap);
    assert_eq!(fixture.display(UiTarget::Overlay2), Display::Flex);
    let walking = fixture
        .world
        .find_node(fixture.node(Worker::WalkingSafe))
        .expect("node");
    assert!(walking.visible);
    let action = walking
        .mixer()
        .and_then(|mixer| mixer.active_action())
        .expect("action");
    assert!(action.is_frozen_on_last_frame());
    assert!((action.time_seconds() - CLIP_SECONDS).abs() < 1e-9);
}

#[test]
fn transition_holds_until_the_model_arrives() {
    let mut fixture = Fixture::new(true, true);
    for worker in Worker::ALL {
        if worker != Worker::WalkingSafe {
            fixture.load(worker);
        }
    }
    fixture.tap(UiTarget::Overlay);
    fixture.run_until(|f| f.sequencer.flags().question_open);
    fixture.tap(UiTarget::Question);
    fixture.tap(UiTarget::ClearButton);

    fixture.run_for(Duration::from_secs(10));
    assert_eq!(fixture.sequencer.stage(), Stage::ClearPath1);
    assert!(fixture.sequencer.flags().busy);
    assert!(!fixture.is_visible(Worker::WalkingSafe));

    fixture.load(Worker::WalkingSafe);
    fixture.tick();
    assert_eq!(fixture.sequencer.stage(), Stage::WalkingSafe);
    assert!(fixture.is_visible(Worker::WalkingSafe));
}

#[test]
fn note_tap_releases_busy_and_reveals_add_sign() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    fixture.run_until(|f| f.sequencer.flags().question_open);
    fixture.tap(UiTarget::Question);
    fixture.tap(UiTarget::ClearButton);
    fixture.run_until(|f| f.sequencer.flags().scene2_await_tap);
    fixture.tap(UiTarget::Overlay2);
    fixture.run_until(|f| f.sequencer.accepting() == Some(Gate::ClearPath2));
    fixture.tap(UiTarget::ClearButton2);
    fixture.run_until(|f| f.sequencer.stage() == Stage::Note);

    assert!(fixture.sequencer.flags().busy);
    assert_eq!(fixture.display(UiTarget::NoteWetFloor), Display::Flex);
    fixture.run_for(Duration::from_secs(30));
    assert_eq!(fixture.sequencer.stage(), Stage::Note);
    assert_eq!(fixture.tap(UiTarget::AddSignButton), TapOutcome::Rejected);

    assert_eq!(fixture.tap(UiTarget::NoteWetFloor), TapOutcome::Resumed);
    assert!(!fixture.sequencer.flags().busy);
    assert_eq!(fixture.display(UiTarget::NoteWetFloor), Display::None);
    assert_eq!(fixture.display(UiTarget::AddSignButton), Display::Block);
    assert_eq!(fixture.tap(UiTarget::NoteWetFloor), TapOutcome::Rejected);
}

#[test]
fn exit_fires_exactly_after_the_delay_with_camera_stopped_first() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.advance_to_add_sign();
    assert!(fixture.sequencer.camera().is_streaming());

    let tapped_at = fixture.world.now();
    assert_eq!(
        fixture.tap(UiTarget::AddSignButton),
        TapOutcome::Started(Gate::AddSign)
    );
    assert_eq!(fixture.sequencer.stage(), Stage::SafeSign);
    assert!(fixture.is_visible(Worker::SafeSign));

    // SafeSign plays its 2 s clip at full speed, then settles 50 ms later.
    let settled_at = tapped_at + Duration::from_millis(2050);
    fixture.run_for(Duration::from_millis(2050 + 1990));
    assert!(fixture.sequencer.exit().is_none());
    assert!(fixture.sequencer.camera().is_streaming());

    fixture.tick();
    let exit = fixture.sequencer.exit().expect("exit");
    assert_eq!(exit.at, settled_at + Duration::from_millis(2000));
    assert_eq!(exit.outcome, ExitOutcome::Closed);
    assert_eq!(fixture.sequencer.stage(), Stage::Exit);
    assert!(fixture.sequencer.flags().busy);
    assert!(!fixture.sequencer.camera().is_streaming());

    let log = fixture.log.borrow();
    let stop = log.iter().position(|event| *event == "camera_stop").expect("stop");
    let close = log.iter().position(|event| *event == "close").expect("close");
    assert!(stop < close);
}

#[test]
fn refused_close_falls_back_to_the_closing_message() {
    let mut fixture = Fixture::new(true, false);
    fixture.load_all();
    fixture.advance_to_add_sign();
    fixture.tap(UiTarget::AddSignButton);
    fixture.run_until(|f| f.sequencer.exit().is_some());

    let exit = fixture.sequencer.exit().expect("exit");
    assert_eq!(exit.outcome, ExitOutcome::MessageShown);
    assert!(!exit.outcome.left_page());
    assert_eq!(
        fixture.world.ui().replaced_document(),
        Some(EXIT_FALLBACK_MESSAGE)
    );
    let log = fixture.log.borrow();
    assert_eq!(
        &log[log.len() - 4..],
        ["camera_stop", "close", "reopen", "blank"]
    );
}

#[test]
fn denied_camera_blocks_until_the_alert_is_dismissed() {
    let mut fixture = Fixture::new(false, true);
    fixture.load_all();
    fixture.tap(UiTarget::Overlay);
    assert!(fixture.world.ui().alert().is_some());
    assert!(fixture.world.ui().video_background().is_none());

    fixture.run_for(Duration::from_secs(5));
    assert_eq!(fixture.sequencer.stage(), Stage::Start);
    assert!(fixture.sequencer.flags().busy);
    assert!(!fixture.is_visible(Worker::Tripping));

    assert!(fixture.sequencer.dismiss_alert(&mut fixture.world));
    assert_eq!(fixture.sequencer.stage(), Stage::Tripping);
    assert!(fixture.is_visible(Worker::Tripping));
    assert!(!fixture.sequencer.dismiss_alert(&mut fixture.world));
}

#[test]
fn full_run_keeps_workers_apart_and_disposes_everything() {
    let mut fixture = Fixture::new(true, true);
    fixture.load_all();
    fixture.advance_to_add_sign();
    fixture.tap(UiTarget::AddSignButton);
    fixture.run_until(|f| f.sequencer.exit().is_some());

    for worker in Worker::ALL {
        let still_there = fixture.world.contains_node(fixture.node(worker));
        assert_eq!(still_there, worker == Worker::SafeSign, "{worker:?}");
    }
    // Only SafeSign's material and geometry remain live.
    assert_eq!(fixture.world.gpu().live_count(), 2);
}
