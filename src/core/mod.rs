//! Core types shared across the codebase.

mod headers;
mod mode;
mod state;

pub use headers::ISOLATION_HEADERS;
pub use mode::BuildMode;
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
