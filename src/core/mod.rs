//! Core application primitives (sessions, screeners, runtime, HTTP)

pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod session;

pub use http::{create_router, start_server, AppState};
pub use runtime::{CommandLoop, RuntimeConfig, ScreenerRuntime};
pub use scheduler::{Scheduler, ScreenerConfig, StartOutcome, StopOutcome};
pub use session::{Session, SessionSettings, SessionStore};
