// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Live subscriber bookkeeping (spec §3 "Subscriber", §4.6 "Event log and
//! fan-out").
//!
//! A subscriber is a bounded channel plus a replay cursor whose lifetime is
//! bounded by the caller's request. `Task` holds the sending half; the
//! caller holds the receiving half returned by `Task::subscribe`.

use caic_core::Message;
use tokio::sync::mpsc;

/// Opaque handle identifying one live subscriber within a task.
pub type SubscriberId = u64;

/// Bounded buffer size (spec §4.6: "Bounded buffer is 256 messages").
pub const SUBSCRIBER_BUFFER: usize = 256;

/// The result of `Task::subscribe`: a point-in-time snapshot of history,
/// stitched without gaps to everything appended afterward (spec §4.1
/// `Subscribe` contract).
pub struct Subscription {
    pub id: SubscriberId,
    pub replay: Vec<Message>,
    pub receiver: mpsc::Receiver<Message>,
}

/// Attempts a non-blocking delivery to one subscriber.
///
/// Returns `false` if the subscriber should be evicted: either its buffer
/// is full (spec §4.6: "exceeding it terminates the subscriber with an
/// error") or its receiver has already been dropped (client disconnected).
pub fn try_deliver(sender: &mpsc::Sender<Message>, message: &Message) -> bool {
    match sender.try_send(message.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("subscriber buffer full, evicting");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_while_capacity_remains() {
        let (tx, mut rx) = mpsc::channel(2);
        let msg = Message::System { subtype: "ping".to_string() };
        assert!(try_deliver(&tx, &msg));
        assert!(try_deliver(&tx, &msg));
        assert_eq!(rx.recv().await, Some(msg.clone()));
        let _ = rx;
    }

    #[tokio::test]
    async fn reports_eviction_when_buffer_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let msg = Message::System { subtype: "ping".to_string() };
        assert!(try_deliver(&tx, &msg));
        assert!(!try_deliver(&tx, &msg));
    }

    #[tokio::test]
    async fn reports_eviction_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let msg = Message::System { subtype: "ping".to_string() };
        assert!(!try_deliver(&tx, &msg));
    }
}
