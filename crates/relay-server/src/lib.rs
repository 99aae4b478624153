//! Backup relay HTTP server
//!
//! This crate exposes a single JSON action endpoint that lets a backend
//! manage backup folders and files on a remote drive.

pub mod config;
pub mod handler;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod validation;

pub use config::{DriveConfig, ProxyConfig, Secret};
pub use handler::{ActionHandler, LIVENESS_MESSAGE};
pub use logging::{LogLevel, LogSink, MemorySink, SafeLogger, TracingSink};
pub use resolver::{resolve_folder, select_child, ResolutionError, ResolutionMode, Resolved};
pub use server::{run_server, serve, ProxyState};
