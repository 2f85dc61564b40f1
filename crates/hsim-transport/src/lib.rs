//! Transports used by experimental controls.
//!
//! Two kinds of link are modelled:
//!
//! - [`VectorChannel`]: a blocking stream of fixed-size `f64` vectors and
//!   `i32` identification headers, implemented over TCP by [`TcpChannel`].
//! - [`SignalBus`]: a named address space of parameters and signals on a
//!   real-time target, with vendor error checks after every call.
//!
//! The [`mock`] module provides in-memory implementations of both for tests
//! and for running sessions without hardware.

pub mod bus;
pub mod channel;
pub mod mock;
pub mod protocol;
pub mod tcp;
pub mod wire;

pub use bus::{BusAddress, SignalBus};
pub use channel::VectorChannel;
pub use hsim_core::TransportError;
pub use tcp::TcpChannel;
