//! Voting Terminal
//!
//! Client side of a polling-station kiosk: an authority unlocks the
//! terminal, registers one citizen, enables a single anonymous vote, and
//! the terminal locks itself again once the vote is accepted.

pub mod api;
pub mod config;
pub mod errors;
pub mod render;
pub mod session;
pub mod statistics;
pub mod terminal;
pub mod types;

// Re-export commonly used types
pub use api::{ApiGateway, HttpApiGateway, MockApiGateway};
pub use config::{Config, LoggingConfig, TerminalSettings};
pub use errors::{Error, ErrorKind, Result};
pub use render::{Screen, render};
pub use session::{Effect, Event, Session, SessionState, SessionStateMachine, Ticket};
pub use terminal::Terminal;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from `RUST_LOG`, defaulting to `voting_terminal=info`
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voting_terminal=info".into()),
        )
        .try_init()
        .map_err(|e| Error::config(format!("Logging already initialized: {e}")))?;

    tracing::info!("🗳️  Voting terminal v{} initialized", VERSION);
    Ok(())
}

/// Initialize logging from a [`LoggingConfig`]
pub fn init_with(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(format!(
        "voting_terminal={}",
        logging.level
    ))
    .map_err(|e| Error::config(format!("Invalid LOG_LEVEL {}: {e}", logging.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        "pretty" => builder.pretty().try_init(),
        other => {
            return Err(Error::config(format!(
                "LOG_FORMAT must be pretty or compact, got {other}"
            )));
        }
    };
    installed.map_err(|e| Error::config(format!("Logging already initialized: {e}")))?;

    tracing::info!(
        level = %logging.level,
        format = %logging.format,
        "🗳️  Voting terminal v{} initialized",
        VERSION
    );
    Ok(())
}
