//! RoomFeed – drives the device: room selection, fetch, build, deliver.
//!
//! ## Sequence per room
//!
//! | Step | Message / call                          | On failure           |
//! |------|-----------------------------------------|----------------------|
//! | 1    | `ROOMNAME` (truncated to device limit)  | abort room           |
//! | 2    | `ROOMCOUNT`                             | abort room           |
//! | 3    | `TerrainSource::terrain`                | abort room           |
//! | 4    | `HistorySource::game_time` + `history`  | abort room           |
//! | 5    | `FrameService::build`                   | abort room           |
//! | 6    | `TERRAIN` baseline, then each `FRAME`   | stop remaining sends |
//!
//! Every step is strictly sequential on the one transport.  Inbound
//! `SWITCH` messages restart the sequence for the requested room.

use crate::delivery::{deliver_until, send_room_header, DeliveryReport, Transport};
use crate::error::{BoxError, FeedError};
use crate::protocol::{truncate_room_name, InboundMessage};
use crate::service::FrameService;
use crate::terrain::TerrainSource;
use crate::types::{FrameStats, HistoryDocument, Tick};
use log::{info, warn};
use std::future::Future;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Upstream clock and history archive.
pub trait HistorySource {
    /// The live game time.
    fn game_time(&self) -> impl Future<Output = Result<Tick, BoxError>> + Send;

    /// The history window starting at `start` for `room`.
    fn history(
        &self,
        room: &str,
        start: Tick,
    ) -> impl Future<Output = Result<HistoryDocument, BoxError>> + Send;
}

/// Pick the room at `index`, wrapping back to the first room when the index
/// runs past the end of the list.
pub fn select_room(rooms: &[String], index: usize) -> Result<(usize, &str), FeedError> {
    let index = if index < rooms.len() { index } else { 0 };
    rooms
        .get(index)
        .map(|room| (index, room.as_str()))
        .ok_or(FeedError::NoRooms)
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeedReport {
    pub room: String,
    pub index: usize,
    pub delivery: DeliveryReport,
    pub stats: FrameStats,
}

pub struct RoomFeed<S, T> {
    service: FrameService,
    source: S,
    transport: T,
    rooms: Vec<String>,
    cancel: watch::Receiver<bool>,
}

impl<S, T> RoomFeed<S, T>
where
    S: TerrainSource + HistorySource,
    T: Transport,
{
    pub fn new(
        service: FrameService,
        source: S,
        transport: T,
        rooms: Vec<String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            source,
            transport,
            rooms,
            cancel,
        }
    }

    pub fn service(&self) -> &FrameService {
        &self.service
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the full sequence for the room at `index`.
    pub async fn show_room(&mut self, index: usize) -> Result<FeedReport, FeedError> {
        let (index, room) = select_room(&self.rooms, index)?;
        let room = room.to_owned();
        info!("Showing room {} ({}/{})", room, index + 1, self.rooms.len());

        let limit = self.service.config().room_name_limit;
        let name = truncate_room_name(&room, limit);
        send_room_header(&mut self.transport, name, self.rooms.len()).await?;

        let raw = self
            .source
            .terrain(&room)
            .await
            .map_err(|source| source_error("terrain", &room, source))?;
        let terrain = self.service.decode_terrain(&raw)?;

        let now = self
            .source
            .game_time()
            .await
            .map_err(|source| source_error("game time", &room, source))?;
        let start = self.service.history_window_start(now);
        let history = self
            .source
            .history(&room, start)
            .await
            .map_err(|source| source_error("history", &room, source))?;

        let batch = self.service.build(&terrain, &history)?;
        let delivery = deliver_until(&batch, &mut self.transport, &self.cancel).await?;

        Ok(FeedReport {
            room,
            index,
            delivery,
            stats: self.service.stats(),
        })
    }

    pub async fn handle(&mut self, message: InboundMessage) -> Result<FeedReport, FeedError> {
        match message {
            InboundMessage::Switch(index) => self.show_room(index as usize).await,
        }
    }

    /// Show the first room, then serve `SWITCH` requests until the inbound
    /// channel closes or the cancel flag is raised.
    ///
    /// Failures are logged and the feed keeps waiting for the next request.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<InboundMessage>) {
        let mut shutdown = self.cancel.clone();

        let outcome = self.show_room(0).await;
        log_outcome(&outcome);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        let outcome = self.handle(message).await;
                        log_outcome(&outcome);
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("RoomFeed stopped after {} build(s)", self.service.builds());
    }
}

fn source_error(what: &'static str, room: &str, source: BoxError) -> FeedError {
    FeedError::Source {
        what,
        room: room.to_owned(),
        source,
    }
}

fn log_outcome(outcome: &Result<FeedReport, FeedError>) {
    match outcome {
        Ok(report) => info!(
            "Room {} delivered: {} message(s) acknowledged",
            report.room, report.delivery.acknowledged
        ),
        Err(e) => warn!("Room feed error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_wraps_to_first_room() {
        let rooms = vec!["W1N1".to_string(), "W2N1".to_string()];
        assert_eq!(select_room(&rooms, 1).unwrap(), (1, "W2N1"));
        assert_eq!(select_room(&rooms, 2).unwrap(), (0, "W1N1"));
        assert_eq!(select_room(&rooms, 200).unwrap(), (0, "W1N1"));
    }

    #[test]
    fn empty_room_list_is_an_error() {
        assert!(matches!(select_room(&[], 0), Err(FeedError::NoRooms)));
    }
}
