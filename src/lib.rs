//! Instant Replay - keep the last minute of video, save it on demand.
//!
//! A capture loop records fixed-length segments into a rolling window on
//! disk. Saving a replay stitches the current window into one file without
//! interrupting recording.

pub mod buffer;
pub mod capture;
pub mod commands;
pub mod recorder;
pub mod replay;
pub mod utils;

use buffer::{BufferConfig, ReplayBuffer};
use commands::CommandOutcome;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instant_replay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the replay console until `quit`, end of input or Ctrl-C
pub async fn run(config: BufferConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Instant Replay v{}", env!("CARGO_PKG_VERSION"));

    let buffer = ReplayBuffer::with_ffmpeg(config)?;
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    let result = serve(&buffer, BufReader::new(tokio::io::stdin()), interrupt).await;
    buffer.shutdown().await;
    result
}

/// Start the buffer and answer console commands read from `input`.
///
/// Returns on `quit`, end of input or when `interrupt` resolves, whichever
/// comes first, including while the buffer is still warming up. The caller
/// owns the buffer and shuts it down.
pub async fn serve<R, I>(buffer: &ReplayBuffer, input: R, interrupt: I) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        result = console(buffer, input) => result,
        _ = interrupt => {
            tracing::info!("Interrupted");
            Ok(())
        }
    }
}

async fn console<R: AsyncBufRead + Unpin>(buffer: &ReplayBuffer, input: R) -> anyhow::Result<()> {
    buffer.start().await?;
    tracing::info!(
        "Recording; {}s available. Type 'help' for commands",
        buffer.available_duration()
    );

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match commands::handle_line(buffer, &line).await {
            CommandOutcome::Continue(response) => {
                println!("{}", serde_json::to_string(&response)?)
            }
            CommandOutcome::Exit => return Ok(()),
        }
    }

    tracing::debug!("Console input closed");
    Ok(())
}
