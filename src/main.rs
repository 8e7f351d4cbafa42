use color_eyre::{eyre::eyre, Result};
use playshell::config::ShellConfig;
use playshell::controller::GilrsDevice;
use playshell::coordinator::SessionCoordinator;
use playshell::frame::LogSurface;
use playshell::session::{LoopbackSession, SessionEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::instrument::WithSubscriber;
use tracing::{info, warn, Level, Subscriber};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // Config loading logs through a provisional subscriber until the
    // configured level is known.
    let (config, level) = load_config()
        .with_subscriber(subscriber(Level::INFO))
        .await?;
    setup_logging_env(level);

    info!(
        "Starting playshell for {} at {}x{} up to {} fps",
        config.session.host, config.frame.width, config.frame.height, config.frame.max_fps
    );

    let session = Arc::new(LoopbackSession::new(
        config.session.clone(),
        config.frame.width,
        config.frame.height,
    ));
    let device = Box::new(GilrsDevice::new(&config.controller));
    let surface = Arc::new(LogSurface::default());

    let coordinator = Arc::new(SessionCoordinator::new(session, device, surface, &config));
    let events = coordinator.subscribe();

    coordinator
        .run()
        .await
        .map_err(|e| eyre!("Failed to start session: {}", e))?;

    wait_for_exit(events).await;

    coordinator
        .shutdown()
        .await
        .map_err(|e| eyre!("Shutdown did not complete cleanly: {}", e))?;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn subscriber(level: Level) -> impl Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .finish()
}

fn setup_logging_env(level: Level) {
    subscriber(level).init();
}

// First CLI argument, else the per-user default which is created on first run
async fn load_config() -> Result<(ShellConfig, Level)> {
    let path = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            let path = ShellConfig::default_path();
            ShellConfig::ensure_default_config(&path).await?;
            path
        }
    };
    let config = ShellConfig::load(&path).await?;
    info!("Loaded configuration from {}", path.display());
    let level = config.logging.max_level();
    Ok((config, level))
}

async fn wait_for_exit(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Interrupt received"),
                    Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
                }
                return;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::SessionQuit { reason }) => {
                    info!("Session ended by remote side: {}", reason);
                    return;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}
