use thiserror::Error;
use tracing::{info, warn};

use super::camera::CameraBridge;
use super::ui::UiLayer;

pub const EXIT_FALLBACK_MESSAGE: &str = "You can now close this tab.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host refused to close the window")]
    CloseRefused,
    #[error("navigation blocked: {0}")]
    NavigationBlocked(String),
}

/// Host-side controls for leaving the experience.
pub trait HostPage {
    fn close_window(&mut self) -> Result<(), HostError>;
    fn reopen_self_and_close(&mut self) -> Result<(), HostError>;
    fn navigate_blank(&mut self) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Closed,
    ReopenedAndClosed,
    NavigatedBlank,
    MessageShown,
}

impl ExitOutcome {
    /// Whether the host left the experience, as opposed to showing the message.
    pub fn left_page(self) -> bool {
        !matches!(self, ExitOutcome::MessageShown)
    }
}

/// Stops the camera, then tries each host exit in turn; if all fail the
/// document is replaced by an inert full-screen message.
pub fn exit_app(camera: &mut CameraBridge, host: &mut dyn HostPage, ui: &mut UiLayer) -> ExitOutcome {
    camera.stop(ui);

    let attempts: [(ExitOutcome, fn(&mut dyn HostPage) -> Result<(), HostError>); 3] = [
        (ExitOutcome::Closed, |host| host.close_window()),
        (ExitOutcome::ReopenedAndClosed, |host| host.reopen_self_and_close()),
        (ExitOutcome::NavigatedBlank, |host| host.navigate_blank()),
    ];
    for (outcome, attempt) in attempts {
        match attempt(host) {
            Ok(()) => {
                info!(?outcome, "exit_completed");
                return outcome;
            }
            Err(error) => warn!(?outcome, error = %error, "exit_attempt_failed"),
        }
    }

    ui.replace_document(EXIT_FALLBACK_MESSAGE);
    info!("exit_fallback_message_shown");
    ExitOutcome::MessageShown
}

/// Desktop host: closing the window ends the loop. Kiosk setups disable that
/// and fall through to the inert message.
#[derive(Debug, Clone, Default)]
pub struct WindowHost {
    allow_close: bool,
    close_requested: bool,
}

impl WindowHost {
    pub fn new(allow_close: bool) -> Self {
        Self {
            allow_close,
            close_requested: false,
        }
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

impl HostPage for WindowHost {
    fn close_window(&mut self) -> Result<(), HostError> {
        if !self.allow_close {
            return Err(HostError::CloseRefused);
        }
        self.close_requested = true;
        Ok(())
    }

    fn reopen_self_and_close(&mut self) -> Result<(), HostError> {
        self.close_window()
    }

    fn navigate_blank(&mut self) -> Result<(), HostError> {
        Err(HostError::NavigationBlocked(
            "desktop host has no blank page".to_string(),
        ))
    }
}
