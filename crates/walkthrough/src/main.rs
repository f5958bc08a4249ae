mod app;

use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    let app = match app::bootstrap::build_app() {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "bootstrap_failed");
            return ExitCode::FAILURE;
        }
    };
    app::loop_runner::run(app)
}
