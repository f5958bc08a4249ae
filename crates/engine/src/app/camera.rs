use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::ui::{UiLayer, VideoFrame};

pub const CAMERA_ACCESS_ALERT: &str = "Please allow camera access.";
const ENVIRONMENT_FRAME_FILE: &str = "environment.png";
const USER_FRAME_FILE: &str = "user.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacingMode {
    Environment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoConstraint {
    Any,
    /// Soft preference; devices may satisfy it with whatever they have.
    Facing { ideal: FacingMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: VideoConstraint,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn environment_preferred() -> Self {
        Self {
            video: VideoConstraint::Facing {
                ideal: FacingMode::Environment,
            },
            audio: false,
        }
    }

    pub fn any_video() -> Self {
        Self {
            video: VideoConstraint::Any,
            audio: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera satisfies {0:?}")]
    NotFound(VideoConstraint),
    #[error("failed to list camera source directory {path}: {source}")]
    ListSources {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode camera frame {path}: {source}")]
    DecodeFrame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("stream has no live video track")]
    NoLiveTrack,
}

pub trait MediaTrack {
    fn label(&self) -> &str;
    fn is_live(&self) -> bool;
    fn stop(&mut self);
}

pub struct MediaStream {
    tracks: Vec<Box<dyn MediaTrack>>,
    frame: Option<VideoFrame>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>, frame: Option<VideoFrame>) -> Self {
        Self { tracks, frame }
    }

    pub fn tracks(&self) -> &[Box<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn frame(&self) -> Option<&VideoFrame> {
        self.frame.as_ref()
    }

    /// Starts playback; fails when no track is live.
    pub fn play(&self) -> Result<(), CaptureError> {
        if self.tracks.iter().any(|track| track.is_live()) {
            Ok(())
        } else {
            Err(CaptureError::NoLiveTrack)
        }
    }

    /// Stops every live track, returning how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for track in &mut self.tracks {
            if track.is_live() {
                track.stop();
                stopped += 1;
            }
        }
        stopped
    }
}

pub trait MediaDevices {
    fn get_user_media(&mut self, constraints: &MediaConstraints)
        -> Result<MediaStream, CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStart {
    Preferred,
    Fallback,
    Unavailable,
}

/// Attaches a camera stream as the UI background, degrading from the
/// environment-facing camera to any camera to a blocking alert.
pub struct CameraBridge {
    devices: Box<dyn MediaDevices>,
    attached: Option<MediaStream>,
}

impl CameraBridge {
    pub fn new(devices: Box<dyn MediaDevices>) -> Self {
        Self {
            devices,
            attached: None,
        }
    }

    pub fn start(&mut self, ui: &mut UiLayer) -> CameraStart {
        if self.attached.is_some() {
            debug!("camera_restart_releases_previous_stream");
            self.stop(ui);
        }

        match self.acquire(&MediaConstraints::environment_preferred()) {
            Ok(stream) => {
                self.attach(stream, ui);
                info!(mode = "environment", "camera_started");
                return CameraStart::Preferred;
            }
            Err(first) => warn!(error = %first, "camera_environment_failed_falling_back"),
        }

        match self.acquire(&MediaConstraints::any_video()) {
            Ok(stream) => {
                self.attach(stream, ui);
                info!(mode = "any", "camera_started");
                CameraStart::Fallback
            }
            Err(second) => {
                error!(error = %second, "camera_unavailable");
                ui.show_alert(CAMERA_ACCESS_ALERT);
                CameraStart::Unavailable
            }
        }
    }

    /// Stops all tracks of the attached stream, if any, and clears the background.
    pub fn stop(&mut self, ui: &mut UiLayer) -> usize {
        let Some(mut stream) = self.attached.take() else {
            return 0;
        };
        let stopped = stream.stop_all();
        ui.set_video_background(None);
        info!(tracks_stopped = stopped, "camera_stopped");
        stopped
    }

    pub fn is_streaming(&self) -> bool {
        self.attached
            .as_ref()
            .is_some_and(|stream| stream.tracks().iter().any(|track| track.is_live()))
    }

    fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError> {
        let mut stream = self.devices.get_user_media(constraints)?;
        if let Err(error) = stream.play() {
            stream.stop_all();
            return Err(error);
        }
        Ok(stream)
    }

    fn attach(&mut self, stream: MediaStream, ui: &mut UiLayer) {
        ui.set_video_background(stream.frame().cloned());
        self.attached = Some(stream);
    }
}

struct StillFrameTrack {
    label: String,
    live: bool,
}

impl MediaTrack for StillFrameTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) {
        self.live = false;
    }
}

/// Desktop stand-in for camera hardware: serves still frames from a directory.
/// `environment.png` / `user.png` answer facing requests; an unconstrained
/// request takes the first `*.png` by name.
#[derive(Debug, Clone)]
pub struct StillFrameDevices {
    source_dir: PathBuf,
}

impl StillFrameDevices {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    fn resolve_source(&self, video: VideoConstraint) -> Result<PathBuf, CaptureError> {
        match video {
            VideoConstraint::Facing { ideal } => {
                let file = match ideal {
                    FacingMode::Environment => ENVIRONMENT_FRAME_FILE,
                    FacingMode::User => USER_FRAME_FILE,
                };
                let path = self.source_dir.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(CaptureError::NotFound(video))
                }
            }
            VideoConstraint::Any => first_png_in(&self.source_dir)?
                .ok_or(CaptureError::NotFound(video)),
        }
    }
}

impl MediaDevices for StillFrameDevices {
    fn get_user_media(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if !self.source_dir.is_dir() {
            return Err(CaptureError::PermissionDenied);
        }
        let path = self.resolve_source(constraints.video)?;
        let image = image::open(&path)
            .map_err(|source| CaptureError::DecodeFrame {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        let frame = VideoFrame {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        };
        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("still-frame")
            .to_string();
        Ok(MediaStream::new(
            vec![Box::new(StillFrameTrack { label, live: true })],
            Some(frame),
        ))
    }
}

fn first_png_in(dir: &Path) -> Result<Option<PathBuf>, CaptureError> {
    let entries = fs::read_dir(dir).map_err(|source| CaptureError::ListSources {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}
