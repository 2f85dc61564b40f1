//! Channel-pair mock of a vector link.
//!
//! # Example
//!
//! ```rust
//! use hsim_transport::mock::{self, Message};
//! use hsim_transport::VectorChannel;
//!
//! let (mut channel, harness) = mock::pair();
//! harness.reply(vec![4.0, 5.0]).unwrap();
//!
//! channel.send_vector(&[10.0, 1.0]).unwrap();
//! let mut reply = [0.0; 2];
//! channel.recv_vector(&mut reply).unwrap();
//!
//! assert_eq!(harness.try_next(), Some(Message::Vector(vec![10.0, 1.0])));
//! assert_eq!(reply, [4.0, 5.0]);
//! ```

use crate::channel::VectorChannel;
use hsim_core::TransportError;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A message written by the controller side.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Output of `send_vector`.
    Vector(Vec<f64>),
    /// Output of `send_id`.
    Id(Vec<i32>),
}

impl Message {
    /// Slot 0 of a vector message.
    #[must_use]
    pub fn opcode(&self) -> Option<f64> {
        match self {
            Message::Vector(v) => v.first().copied(),
            Message::Id(_) => None,
        }
    }
}

/// Controller-facing side of the mock link.
#[derive(Debug)]
pub struct MockChannel {
    /// Messages written by the controller
    sent_tx: Sender<Message>,
    /// Replies scripted by the harness
    replies_rx: Receiver<Vec<f64>>,
    label: String,
}

/// Test-facing side of the mock link.
///
/// Dropping the harness closes the link: later sends and receives on the
/// [`MockChannel`] fail with [`TransportError::Closed`].
#[derive(Debug)]
pub struct PeerHarness {
    sent_rx: Receiver<Message>,
    replies_tx: Sender<Vec<f64>>,
}

/// Create a connected channel/harness pair.
#[must_use]
pub fn pair() -> (MockChannel, PeerHarness) {
    pair_labelled("mock")
}

/// Create a pair whose channel reports `label` as its peer.
#[must_use]
pub fn pair_labelled(label: &str) -> (MockChannel, PeerHarness) {
    let (sent_tx, sent_rx) = mpsc::channel();
    let (replies_tx, replies_rx) = mpsc::channel();
    (
        MockChannel {
            sent_tx,
            replies_rx,
            label: label.to_string(),
        },
        PeerHarness {
            sent_rx,
            replies_tx,
        },
    )
}

impl VectorChannel for MockChannel {
    fn send_vector(&mut self, data: &[f64]) -> Result<(), TransportError> {
        self.sent_tx
            .send(Message::Vector(data.to_vec()))
            .map_err(|_| TransportError::Closed)
    }

    fn recv_vector(&mut self, buf: &mut [f64]) -> Result<(), TransportError> {
        let reply = self.replies_rx.recv().map_err(|_| TransportError::Closed)?;
        if reply.len() != buf.len() {
            return Err(TransportError::Protocol(format!(
                "reply has {} values, expected {}",
                reply.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&reply);
        Ok(())
    }

    fn send_id(&mut self, ids: &[i32]) -> Result<(), TransportError> {
        self.sent_tx
            .send(Message::Id(ids.to_vec()))
            .map_err(|_| TransportError::Closed)
    }

    fn peer(&self) -> String {
        self.label.clone()
    }
}

impl PeerHarness {
    /// Queue a reply for the next `recv_vector`.
    pub fn reply(&self, values: impl Into<Vec<f64>>) -> Result<(), TransportError> {
        self.replies_tx
            .send(values.into())
            .map_err(|_| TransportError::Closed)
    }

    /// Next message already written, without blocking.
    #[must_use]
    pub fn try_next(&self) -> Option<Message> {
        self.sent_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message.
    #[must_use]
    pub fn next_within(&self, timeout: Duration) -> Option<Message> {
        match self.sent_rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the next message, or `None` once the channel is dropped.
    #[must_use]
    pub fn recv(&self) -> Option<Message> {
        self.sent_rx.recv().ok()
    }

    /// Every message written so far.
    #[must_use]
    pub fn drain(&self) -> Vec<Message> {
        self.sent_rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ids_and_vectors_in_order() {
        let (mut channel, harness) = pair();
        channel.send_id(&[1, 2]).unwrap();
        channel.send_vector(&[3.0]).unwrap();
        assert_eq!(
            harness.drain(),
            vec![Message::Id(vec![1, 2]), Message::Vector(vec![3.0])]
        );
    }

    #[test]
    fn reply_length_must_match() {
        let (mut channel, harness) = pair();
        harness.reply(vec![1.0]).unwrap();
        let mut buf = [0.0; 2];
        assert!(matches!(
            channel.recv_vector(&mut buf),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn dropped_harness_closes_link() {
        let (mut channel, harness) = pair();
        drop(harness);
        assert!(matches!(channel.send_vector(&[1.0]), Err(TransportError::Closed)));
        let mut buf = [0.0; 1];
        assert!(matches!(channel.recv_vector(&mut buf), Err(TransportError::Closed)));
    }
}
