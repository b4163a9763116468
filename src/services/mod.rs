//! External service integrations

pub mod logging;
pub mod stash;

pub use logging::{create_progress_log, init_tracing};
pub use stash::{HttpTransport, StashClient};
