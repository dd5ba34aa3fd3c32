//! Watch command: mirror live state until Ctrl-C.

use serde::Serialize;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, EmptyBootstrap};
use crate::dispatch::{Dispatcher, FrameStats};
use crate::error::{ClientError, ClientResult};
use crate::state::MirroredState;

#[derive(Serialize)]
struct WatchSummary {
    connection: ConnectionState,
    frames: FrameStats,
    state: MirroredState,
}

/// Runs the connection in the foreground.
///
/// Returns an error if the connection gives up before being interrupted.
pub async fn run(config: &ClientConfig, dump: bool) -> ClientResult<()> {
    let connection = Connection::new(config.connection_config()?, EmptyBootstrap);
    let handle = connection.handle();
    let reader = connection.reader();

    info!(url = %config.server.url, "watching");
    let mut task = tokio::spawn(connection.run());

    let (state, dispatcher) = tokio::select! {
        joined = &mut task => {
            // Only ends on its own when the failure limit is hit.
            joined_result(joined)?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("interrupted, stopping");
            // Snapshot before stopping: stop clears the mirror.
            let state = reader.snapshot().await;
            handle.stop().await?;
            (state, joined_result(task.await)?)
        }
    };

    let frames = dispatcher.stats();
    info!(
        accepted = frames.accepted,
        dropped = frames.total_dropped(),
        "watch finished"
    );

    if dump {
        let summary = WatchSummary {
            connection: handle.state().await,
            frames,
            state,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

fn joined_result(
    joined: Result<ClientResult<Dispatcher>, JoinError>,
) -> ClientResult<Dispatcher> {
    joined.map_err(|e| ClientError::Connection(format!("connection task failed: {e}")))?
}
