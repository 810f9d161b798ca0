//! room-frames binary
//!
//! Builds the frame batch for one saved room history and streams it to an
//! in-process device over the acknowledgment-gated channel, the same way a
//! real device link is driven.
//!
//! ## Configuration (flags or env)
//!
//! | Key                             | Default   | Description                       |
//! |---------------------------------|-----------|-----------------------------------|
//! | `ROOM_FRAMES_TERRAIN`           | required  | File with the 2500-digit terrain  |
//! | `ROOM_FRAMES_HISTORY`           | required  | Room history JSON document        |
//! | `ROOM_FRAMES_PALETTE`           | *(none)*  | TOML palette overrides            |
//! | `ROOM_FRAMES_ROOM`              | from file | Room name shown on the device     |
//! | `ROOM_FRAMES_TIMEOUT_SECS`      | `30`      | Give up on the whole delivery     |

use anyhow::{bail, Context, Result};
use clap::Parser;
use room_frames::{
    delivery::{self, Envelope},
    protocol::{truncate_room_name, OutboundMessage},
    DeliveryReport, FrameBatch, FrameService, FrameServiceConfig, HistoryDocument, Palette,
    CELL_COUNT,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "room-frames", about = "Room history frame streamer", version)]
struct Args {
    /// Terrain file (one digit per cell)
    #[arg(long, env = "ROOM_FRAMES_TERRAIN")]
    terrain: PathBuf,

    /// Room history JSON
    #[arg(long, env = "ROOM_FRAMES_HISTORY")]
    history: PathBuf,

    /// Palette overrides (TOML)
    #[arg(long, env = "ROOM_FRAMES_PALETTE")]
    palette: Option<PathBuf>,

    /// Room name sent to the device
    #[arg(long, env = "ROOM_FRAMES_ROOM")]
    room: Option<String>,

    /// Delivery timeout in seconds
    #[arg(long, env = "ROOM_FRAMES_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("room_frames=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let palette = match &args.palette {
        Some(path) => Palette::load(path)
            .with_context(|| format!("Failed to load palette {}", path.display()))?,
        None => Palette::default(),
    };
    let config = FrameServiceConfig {
        palette,
        ..Default::default()
    };
    let name_limit = config.room_name_limit;
    let mut service = FrameService::new(config);

    let raw_terrain = tokio::fs::read_to_string(&args.terrain)
        .await
        .with_context(|| format!("Failed to read terrain {}", args.terrain.display()))?;
    let raw_history = tokio::fs::read_to_string(&args.history)
        .await
        .with_context(|| format!("Failed to read history {}", args.history.display()))?;
    let history = HistoryDocument::from_json(&raw_history).context("Failed to parse history")?;

    let room = args
        .room
        .clone()
        .or_else(|| history.room.clone())
        .unwrap_or_else(|| "room".to_string());

    // Terrain files usually end with a newline; the decoder wants exactly
    // one digit per cell.
    let raw_terrain = raw_terrain.trim_end_matches(['\r', '\n']);
    let batch = service
        .build_from_raw(raw_terrain, &history)
        .context("Failed to build frames")?;
    tracing::info!(
        room = %room,
        base = history.base,
        frames = batch.diffs.len(),
        changed_cells = batch.changed_cells(),
        "Frame batch ready"
    );

    // Device side of the channel
    let (mut transport, inbox) = delivery::channel();
    let device = tokio::spawn(run_device(inbox));

    // Ctrl-C stops further sends; an in-flight send still completes.
    let (cancel_tx, cancel) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, finishing the in-flight message");
            let _ = cancel_tx.send(true);
        }
    });

    let name = truncate_room_name(&room, name_limit);
    delivery::send_room_header(&mut transport, name, 1)
        .await
        .context("Device rejected the room header")?;

    let timeout = Duration::from_secs(args.timeout_secs);
    let report: DeliveryReport = match tokio::time::timeout(
        timeout,
        delivery::deliver_until(&batch, &mut transport, &cancel),
    )
    .await
    {
        Ok(result) => result.context("Delivery aborted")?,
        Err(_) => bail!("Delivery timed out after {:?}", timeout),
    };

    // Close the channel and compare what the device ended up showing.
    drop(transport);
    let shown = device.await.context("Device task panicked")?;
    let expected = final_frame(&batch);
    if shown.as_deref() == Some(expected.as_slice()) {
        log::info!(
            "Device shows the final frame after {} acknowledged message(s)",
            report.acknowledged
        );
    } else {
        log::warn!("Device image differs from the final frame");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Simulated device
// ---------------------------------------------------------------------------

/// Apply messages like the device does: the baseline replaces the image and
/// each frame patches it.  Messages that fail to encode are rejected.
async fn run_device(mut inbox: mpsc::Receiver<Envelope>) -> Option<Vec<u8>> {
    let mut image: Option<Vec<u8>> = None;

    while let Some(envelope) = inbox.recv().await {
        let payload = match envelope.message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                envelope.reject(e.to_string());
                continue;
            }
        };
        log::debug!(
            "device <- {} ({} byte(s))",
            envelope.message.key(),
            payload.len()
        );

        match &envelope.message {
            OutboundMessage::Baseline(_) if payload.len() == CELL_COUNT => {
                image = Some(payload);
            }
            OutboundMessage::Frame(record) => {
                if let Some(image) = image.as_mut() {
                    record.apply_to(image);
                }
            }
            _ => {}
        }
        envelope.accept(None);
    }

    image
}

fn final_frame(batch: &FrameBatch) -> Vec<u8> {
    let mut image = batch.baseline.as_slice().to_vec();
    for record in &batch.diffs {
        record.apply_to(&mut image);
    }
    image
}
