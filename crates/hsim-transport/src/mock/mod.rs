//! In-memory transports for tests and hardware-free sessions.
//!
//! - [`channel`]: a [`VectorChannel`](crate::VectorChannel) backed by a pair of
//!   std channels, with a [`PeerHarness`] that records traffic and scripts
//!   replies
//! - [`elastic`]: a background adapter element that answers like a linear
//!   elastic specimen
//! - [`target`]: a [`SignalBus`](crate::SignalBus) that simulates the
//!   real-time target handshake

pub mod channel;
pub mod elastic;
pub mod target;

pub use channel::{pair, pair_labelled, Message, MockChannel, PeerHarness};
pub use elastic::ElasticPeer;
pub use target::{SimulatedTarget, TargetEvent};
