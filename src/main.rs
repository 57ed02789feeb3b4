use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;

use markly::app::App;
use markly::ui::dialog::HeadlessDialogs;

/// Headless entry point: restores the previous session, pumps one tick and
/// flushes. The windowing shell links the library crate and drives
/// `App::handle_command` itself.
fn main() -> markly::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut app = App::new(HeadlessDialogs)?;
    app.restore();
    app.tick(Instant::now());

    match app.session().path() {
        Some(path) => info!(path = %path.display(), "session restored"),
        None => info!("no previous session to restore"),
    }

    app.shutdown();
    Ok(())
}
