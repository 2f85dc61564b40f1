//! Blocking vector channel abstraction.

use hsim_core::TransportError;

/// A connected, blocking, message-oriented link.
///
/// Every call blocks until the whole payload is written or read. Message
/// lengths are fixed by the session header, so no length prefix is sent.
pub trait VectorChannel: Send {
    /// Write one vector message.
    fn send_vector(&mut self, data: &[f64]) -> Result<(), TransportError>;

    /// Read one vector message of exactly `buf.len()` values.
    fn recv_vector(&mut self, buf: &mut [f64]) -> Result<(), TransportError>;

    /// Write one identification (integer) message.
    fn send_id(&mut self, ids: &[i32]) -> Result<(), TransportError>;

    /// Description of the remote end for logs.
    fn peer(&self) -> String;
}

impl<C: VectorChannel + ?Sized> VectorChannel for Box<C> {
    fn send_vector(&mut self, data: &[f64]) -> Result<(), TransportError> {
        (**self).send_vector(data)
    }

    fn recv_vector(&mut self, buf: &mut [f64]) -> Result<(), TransportError> {
        (**self).recv_vector(buf)
    }

    fn send_id(&mut self, ids: &[i32]) -> Result<(), TransportError> {
        (**self).send_id(ids)
    }

    fn peer(&self) -> String {
        (**self).peer()
    }
}
