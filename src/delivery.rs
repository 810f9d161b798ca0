//! Acknowledgment-gated delivery of a [`FrameBatch`].
//!
//! The device cannot buffer more than one message, so the baseline goes
//! first and each diff is only issued after the previous message was
//! acknowledged.  The first negative acknowledgment or transport failure
//! ends the batch; nothing is retried, reordered, or resumed.
//!
//! Delivery is a loop over an explicit [`DeliveryCursor`].  There is no
//! built-in timeout: wrap [`deliver`] in `tokio::time::timeout`, or use
//! [`deliver_until`] with a cancellation flag that is checked before every
//! send.  A send that is already in flight is never interrupted.

use crate::error::{DeliveryError, DeliveryStage, TransportError};
use crate::protocol::OutboundMessage;
use crate::service::FrameBatch;
use bytes::Bytes;
use log::{debug, info};
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A channel with one outstanding message at a time.
///
/// `send` resolves once the device acknowledged the message; `Ok` may carry a
/// reply payload.
pub trait Transport {
    fn send(
        &mut self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;
}

/// Send one message, mapping failure onto the stage it happened at.
async fn send_stage<T: Transport>(
    transport: &mut T,
    stage: DeliveryStage,
    message: OutboundMessage,
    acknowledged: usize,
) -> Result<Option<Bytes>, DeliveryError> {
    transport
        .send(message)
        .await
        .map_err(|source| DeliveryError::Aborted {
            stage,
            acknowledged,
            source,
        })
}

/// Announce a room before its batch: `ROOMNAME`, then `ROOMCOUNT`.
///
/// `name` goes out as given; truncate it to the device limit first.
pub async fn send_room_header<T: Transport>(
    transport: &mut T,
    name: String,
    room_count: usize,
) -> Result<(), DeliveryError> {
    let name = OutboundMessage::RoomName(name);
    send_stage(transport, DeliveryStage::RoomName, name, 0).await?;
    let count = OutboundMessage::RoomCount(u32::try_from(room_count).unwrap_or(u32::MAX));
    send_stage(transport, DeliveryStage::RoomCount, count, 1).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Position within a batch: the next message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryCursor {
    Baseline,
    Frame(usize),
    Done,
}

impl DeliveryCursor {
    /// The message under the cursor, or `None` once the batch is exhausted.
    pub fn current(self, batch: &FrameBatch) -> Option<(DeliveryStage, OutboundMessage)> {
        match self {
            Self::Baseline => Some((
                DeliveryStage::Baseline,
                OutboundMessage::Baseline(batch.baseline.clone()),
            )),
            Self::Frame(i) => batch.diffs.get(i).map(|record| {
                (
                    DeliveryStage::Frame(record.index),
                    OutboundMessage::Frame(record.clone()),
                )
            }),
            Self::Done => None,
        }
    }

    pub fn advance(self, batch: &FrameBatch) -> Self {
        let next = match self {
            Self::Baseline => 0,
            Self::Frame(i) => i + 1,
            Self::Done => return Self::Done,
        };
        if next < batch.diffs.len() {
            Self::Frame(next)
        } else {
            Self::Done
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages positively acknowledged, baseline included.
    pub acknowledged: usize,
    /// Acknowledgments that carried a reply payload.
    pub replies: Vec<Bytes>,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Send `batch` in order, stopping at the first failed acknowledgment.
pub async fn deliver<T: Transport>(
    batch: &FrameBatch,
    transport: &mut T,
) -> Result<DeliveryReport, DeliveryError> {
    let (_keep, never) = watch::channel(false);
    deliver_until(batch, transport, &never).await
}

/// Like [`deliver`], but stops issuing sends once `cancel` reads `true`.
pub async fn deliver_until<T: Transport>(
    batch: &FrameBatch,
    transport: &mut T,
    cancel: &watch::Receiver<bool>,
) -> Result<DeliveryReport, DeliveryError> {
    let mut cursor = DeliveryCursor::Baseline;
    let mut report = DeliveryReport::default();

    while let Some((stage, message)) = cursor.current(batch) {
        if *cancel.borrow() {
            info!("Delivery cancelled before {}", stage);
            return Err(DeliveryError::Cancelled {
                stage,
                acknowledged: report.acknowledged,
            });
        }

        let reply = send_stage(transport, stage, message, report.acknowledged).await?;
        debug!("Device acknowledged {}", stage);
        report.acknowledged += 1;
        report.replies.extend(reply);
        cursor = cursor.advance(batch);
    }

    info!("Delivered {} message(s)", report.acknowledged);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Channel transport
// ---------------------------------------------------------------------------

/// A message handed to the device task, with its acknowledgment slot.
///
/// Dropping an envelope without answering counts as a transport failure.
#[derive(Debug)]
pub struct Envelope {
    pub message: OutboundMessage,
    ack: oneshot::Sender<Result<Option<Bytes>, TransportError>>,
}

impl Envelope {
    pub fn accept(self, reply: Option<Bytes>) {
        let _ = self.ack.send(Ok(reply));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.ack.send(Err(TransportError::Rejected(reason.into())));
    }
}

/// [`Transport`] backed by a tokio channel to a device task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbox: mpsc::Sender<Envelope>,
}

/// Create a transport and the receiving end for the device task.
pub fn channel() -> (ChannelTransport, mpsc::Receiver<Envelope>) {
    // capacity 1: the device never holds more than one message
    let (outbox, inbox) = mpsc::channel(1);
    (ChannelTransport { outbox }, inbox)
}

impl Transport for ChannelTransport {
    async fn send(&mut self, message: OutboundMessage) -> Result<Option<Bytes>, TransportError> {
        let (ack, acked) = oneshot::channel();
        self.outbox
            .send(Envelope { message, ack })
            .await
            .map_err(|_| TransportError::Failed("device channel closed".into()))?;
        acked
            .await
            .map_err(|_| TransportError::Failed("acknowledgment dropped".into()))?
    }
}
