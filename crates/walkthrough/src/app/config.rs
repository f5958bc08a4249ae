use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{UiRect, Vec3};
use serde::Deserialize;
use thiserror::Error;

use super::sequencer::{UiTarget, Worker};

pub(crate) const SCENARIO_ENV_VAR: &str = "WALKTHROUGH_SCENARIO";
pub(crate) const DEFAULT_SCENARIO_FILE: &str = "scenario.json";

const DEFAULT_WORKER_SPEED: f64 = 0.5;
const SAFE_SIGN_SPEED: f64 = 1.0;
const DEFAULT_EXIT_DELAY_MS: u64 = 2000;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("invalid scenario file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Everything that varies between deployments of the walkthrough: which
/// models play in which slot, how fast, how long the goodbye lasts, and what
/// the overlays say.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ScenarioConfig {
    pub(crate) window_title: String,
    /// Directory of still camera frames, relative to `assets/`.
    pub(crate) camera_dir: PathBuf,
    /// Kiosk deployments set this to `false` so the exit falls through to the
    /// closing message.
    pub(crate) allow_window_close: bool,
    pub(crate) default_speed: f64,
    pub(crate) exit_delay_ms: u64,
    pub(crate) workers: WorkersConfig,
    pub(crate) ui: UiConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            window_title: "Safety Walkthrough".to_string(),
            camera_dir: PathBuf::from("camera"),
            allow_window_close: true,
            default_speed: DEFAULT_WORKER_SPEED,
            exit_delay_ms: DEFAULT_EXIT_DELAY_MS,
            workers: WorkersConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WorkersConfig {
    pub(crate) tripping: WorkerConfig,
    pub(crate) safe: WorkerConfig,
    pub(crate) walking_safe: WorkerConfig,
    pub(crate) slipping: WorkerConfig,
    pub(crate) slipping2: WorkerConfig,
    pub(crate) safe_sign: WorkerConfig,
    pub(crate) pallet: WorkerConfig,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            tripping: WorkerConfig::new(
                "workerTripping",
                "models/worker_tripping.json",
                [0.0, 0.0, -3.0],
            ),
            safe: WorkerConfig::new("workerSafe", "models/worker_safe.json", [0.6, 0.0, -3.2]),
            walking_safe: WorkerConfig::new(
                "workerWalkingSafe",
                "models/worker_walking_safe.json",
                [0.0, 0.0, -3.0],
            ),
            slipping: WorkerConfig::new(
                "workerSlipping",
                "models/worker_slipping.json",
                [0.0, 0.0, -3.0],
            ),
            slipping2: WorkerConfig::new(
                "workerSlipping2",
                "models/worker_slipping2.json",
                [0.0, 0.0, -3.0],
            ),
            safe_sign: WorkerConfig::new(
                "workerSafeSign",
                "models/worker_safe_sign.json",
                [0.0, 0.0, -3.0],
            ),
            pallet: WorkerConfig::new("palletModel", "models/pallet.json", [-0.7, 0.0, -3.4]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WorkerConfig {
    pub(crate) node: String,
    /// Model descriptor path, relative to `assets/`.
    pub(crate) model: String,
    #[serde(default)]
    pub(crate) position: [f32; 3],
    #[serde(default)]
    pub(crate) speed: Option<f64>,
}

impl WorkerConfig {
    fn new(node: &str, model: &str, position: [f32; 3]) -> Self {
        Self {
            node: node.to_string(),
            model: model.to_string(),
            position,
            speed: None,
        }
    }

    pub(crate) fn position(&self) -> Vec3 {
        let [x, y, z] = self.position;
        Vec3 { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct UiConfig {
    pub(crate) overlay: ElementConfig,
    pub(crate) question: ElementConfig,
    pub(crate) overlay2: ElementConfig,
    pub(crate) note_wetfloor: ElementConfig,
    pub(crate) clear_button: ElementConfig,
    pub(crate) clear_button_2: ElementConfig,
    pub(crate) add_sign_button: ElementConfig,
}

impl Default for UiConfig {
    fn default() -> Self {
        let panel = RectConfig {
            x: 0.1,
            y: 0.62,
            width: 0.8,
            height: 0.3,
        };
        let button = RectConfig {
            x: 0.3,
            y: 0.84,
            width: 0.4,
            height: 0.1,
        };
        Self {
            overlay: ElementConfig::new(
                RectConfig::full(),
                &["Safety walkthrough", "Tap anywhere to begin"],
            ),
            question: ElementConfig::new(panel, &["What caused this fall?", "Tap to continue"]),
            overlay2: ElementConfig::new(
                panel,
                &["A clear path keeps everyone safe", "Tap to continue"],
            ),
            note_wetfloor: ElementConfig::new(
                panel,
                &["Wet floors need a warning sign", "Tap to continue"],
            ),
            clear_button: ElementConfig::new(button, &["Clear the path"]),
            clear_button_2: ElementConfig::new(button, &["Clean the spill"]),
            add_sign_button: ElementConfig::new(button, &["Add wet floor sign"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ElementConfig {
    pub(crate) rect: RectConfig,
    #[serde(default)]
    pub(crate) text: Vec<String>,
}

impl ElementConfig {
    fn new(rect: RectConfig, text: &[&str]) -> Self {
        Self {
            rect,
            text: text.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Normalized viewport rect, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RectConfig {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

impl RectConfig {
    fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    fn is_valid(&self) -> bool {
        let in_unit = |value: f32| (0.0..=1.0).contains(&value);
        in_unit(self.x)
            && in_unit(self.y)
            && self.width > 0.0
            && self.height > 0.0
            && in_unit(self.x + self.width)
            && in_unit(self.y + self.height)
    }
}

impl From<RectConfig> for UiRect {
    fn from(rect: RectConfig) -> Self {
        UiRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

impl ScenarioConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    pub(crate) fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let config: ScenarioConfig =
            serde_path_to_error::deserialize(deserializer).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    pub(crate) fn worker(&self, worker: Worker) -> &WorkerConfig {
        let workers = &self.workers;
        match worker {
            Worker::Tripping => &workers.tripping,
            Worker::Safe => &workers.safe,
            Worker::WalkingSafe => &workers.walking_safe,
            Worker::Slipping => &workers.slipping,
            Worker::Slipping2 => &workers.slipping2,
            Worker::SafeSign => &workers.safe_sign,
            Worker::Pallet => &workers.pallet,
        }
    }

    pub(crate) fn element(&self, target: UiTarget) -> &ElementConfig {
        let ui = &self.ui;
        match target {
            UiTarget::Overlay => &ui.overlay,
            UiTarget::Question => &ui.question,
            UiTarget::Overlay2 => &ui.overlay2,
            UiTarget::NoteWetFloor => &ui.note_wetfloor,
            UiTarget::ClearButton => &ui.clear_button,
            UiTarget::ClearButton2 => &ui.clear_button_2,
            UiTarget::AddSignButton => &ui.add_sign_button,
        }
    }

    /// Playback speed for a worker's clip. SafeSign plays at full speed unless
    /// overridden; everyone else at `default_speed`.
    pub(crate) fn speed_for(&self, worker: Worker) -> f64 {
        self.worker(worker).speed.unwrap_or(match worker {
            Worker::SafeSign => SAFE_SIGN_SPEED,
            _ => self.default_speed,
        })
    }

    pub(crate) fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }

    fn validate(&self) -> Result<(), String> {
        if !is_valid_speed(self.default_speed) {
            return Err(format!("default_speed must be positive, got {}", self.default_speed));
        }
        let mut seen = HashSet::new();
        for worker in Worker::ALL {
            let config = self.worker(worker);
            if config.node.trim().is_empty() {
                return Err(format!("{worker:?} has an empty node name"));
            }
            if !seen.insert(config.node.as_str()) {
                return Err(format!("node name {:?} is used twice", config.node));
            }
            if config.model.trim().is_empty() {
                return Err(format!("{worker:?} has an empty model path"));
            }
            if !config.position.iter().all(|axis| axis.is_finite()) {
                return Err(format!(
                    "{worker:?} position must be finite, got {:?}",
                    config.position
                ));
            }
            if let Some(speed) = config.speed {
                if !is_valid_speed(speed) {
                    return Err(format!("{worker:?} speed must be positive, got {speed}"));
                }
            }
        }
        for target in UiTarget::ALL {
            let rect = self.element(target).rect;
            if !rect.is_valid() {
                return Err(format!(
                    "{} rect must lie inside the unit square, got {rect:?}",
                    target.dom_id()
                ));
            }
        }
        Ok(())
    }
}

fn is_valid_speed(speed: f64) -> bool {
    speed.is_finite() && speed > 0.0
}

/// `WALKTHROUGH_SCENARIO` when set, else `assets/scenario.json`.
pub(crate) fn resolve_scenario_path(assets_dir: &Path) -> PathBuf {
    match std::env::var_os(SCENARIO_ENV_VAR) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => assets_dir.join(DEFAULT_SCENARIO_FILE),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn parse(raw: &str) -> Result<ScenarioConfig, ConfigError> {
        ScenarioConfig::from_json(raw, Path::new("scenario.json"))
    }

    #[test]
    fn empty_object_is_the_default_scenario() {
        let config = parse("{}").expect("config");
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.exit_delay(), Duration::from_millis(2000));
        assert_eq!(config.worker(Worker::Pallet).node, "palletModel");
    }

    #[test]
    fn safe_sign_defaults_to_full_speed() {
        let config = parse(r#"{ "default_speed": 0.25 }"#).expect("config");
        assert_eq!(config.speed_for(Worker::Tripping), 0.25);
        assert_eq!(config.speed_for(Worker::Slipping2), 0.25);
        assert_eq!(config.speed_for(Worker::SafeSign), 1.0);
    }

    #[test]
    fn per_worker_speed_overrides_default() {
        let config = parse(
            r#"{ "workers": { "safe_sign": {
                "node": "workerSafeSign", "model": "models/s.json", "speed": 2.0 } } }"#,
        )
        .expect("config");
        assert_eq!(config.speed_for(Worker::SafeSign), 2.0);
        assert_eq!(config.worker(Worker::SafeSign).position(), Vec3::default());
        assert_eq!(config.worker(Worker::Tripping).node, "workerTripping");
    }

    #[test]
    fn parse_error_reports_field_path() {
        let err = parse(r#"{ "workers": { "slipping": { "node": 7, "model": "m.json" } } }"#)
            .expect_err("type error");
        match &err {
            ConfigError::Parse { source, .. } => {
                assert_eq!(source.path().to_string(), "workers.slipping.node");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("workers.slipping.node"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse(r#"{ "exit_delay": 5 }"#).expect_err("typo");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn duplicate_node_names_are_invalid() {
        let err = parse(
            r#"{ "workers": { "safe": { "node": "workerTripping", "model": "m.json" } } }"#,
        )
        .expect_err("duplicate");
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn non_positive_speed_is_invalid() {
        assert!(matches!(
            parse(r#"{ "default_speed": 0.0 }"#),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn overflowing_position_is_rejected() {
        let err = parse(
            r#"{ "workers": { "tripping": { "node": "workerTripping", "model": "m.json", "position": [1e300, 0.0, -3.0] } } }"#,
        )
        .expect_err("position");
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn rect_outside_viewport_is_invalid() {
        let err = parse(
            r#"{ "ui": { "question": { "rect": { "x": 0.5, "y": 0.5, "width": 0.8, "height": 0.2 } } } }"#,
        )
        .expect_err("rect");
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn load_reads_from_disk() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join(DEFAULT_SCENARIO_FILE);
        fs::write(&path, r#"{ "exit_delay_ms": 500, "allow_window_close": false }"#)
            .expect("write");

        let config = ScenarioConfig::load(&path).expect("load");
        assert_eq!(config.exit_delay(), Duration::from_millis(500));
        assert!(!config.allow_window_close);
    }

    #[test]
    fn missing_file_is_io_error() {
        let temp = TempDir::new().expect("temp");
        let err = ScenarioConfig::load(&temp.path().join("nope.json")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
