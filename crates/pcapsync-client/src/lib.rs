//! Mirrored state, dispatcher, connection lifecycle and CLI
//!
//! This crate keeps a local mirror of a capture server's state in sync
//! over the live event channel, and provides the `pcapsync` command-line
//! interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod state;

pub use cli::Cli;
pub use connection::{
    Bootstrapper, BoxFuture, Connection, ConnectionCommand, ConnectionConfig, ConnectionHandle,
    ConnectionState, EmptyBootstrap, ReconnectPolicy,
};
pub use dispatch::{Dispatcher, FrameStats, SharedState, StateReader};
pub use error::{ClientError, ClientResult};
pub use state::{MirroredState, Snapshot};
