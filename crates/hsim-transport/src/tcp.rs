//! TCP vector channel.

use crate::channel::VectorChannel;
use crate::wire;
use hsim_core::TransportError;
use std::io::{Read, Write};
use std::net::TcpStream;

/// Blocking TCP implementation of [`VectorChannel`].
///
/// No read timeout is set: a silent peer blocks the caller until the socket
/// errors or is closed.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    peer: String,
    scratch: Vec<u8>,
}

impl TcpChannel {
    /// Connect to `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(addr.as_str()).map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
        let channel = Self::from_stream(stream)?;
        tracing::info!(peer = %channel.peer, "vector channel connected");
        Ok(channel)
    }

    /// Wrap an already connected stream (e.g. from a listener).
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        // Disable Nagle's algorithm for low latency
        stream
            .set_nodelay(true)
            .map_err(|source| TransportError::Io {
                operation: "set_nodelay",
                source,
            })?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self {
            stream,
            peer,
            scratch: Vec::new(),
        })
    }
}

impl VectorChannel for TcpChannel {
    fn send_vector(&mut self, data: &[f64]) -> Result<(), TransportError> {
        let bytes = wire::encode_vector(data);
        self.stream
            .write_all(&bytes)
            .map_err(|source| TransportError::Io {
                operation: "send_vector",
                source,
            })
    }

    fn recv_vector(&mut self, buf: &mut [f64]) -> Result<(), TransportError> {
        self.scratch.resize(buf.len() * wire::F64_WIDTH, 0);
        self.stream
            .read_exact(&mut self.scratch)
            .map_err(|source| TransportError::Io {
                operation: "recv_vector",
                source,
            })?;
        wire::decode_vector(&self.scratch, buf)
    }

    fn send_id(&mut self, ids: &[i32]) -> Result<(), TransportError> {
        let bytes = wire::encode_ids(ids);
        self.stream
            .write_all(&bytes)
            .map_err(|source| TransportError::Io {
                operation: "send_id",
                source,
            })
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn exchanges_vectors_with_a_socket_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut channel = TcpChannel::from_stream(stream).unwrap();
            let mut ids = vec![0u8; 2 * wire::I32_WIDTH];
            channel.stream.read_exact(&mut ids).unwrap();
            let mut header = [0i32; 2];
            wire::decode_ids(&ids, &mut header).unwrap();
            let mut incoming = [0.0; 2];
            channel.recv_vector(&mut incoming).unwrap();
            channel.send_vector(&[incoming[0] * 2.0, incoming[1] * 2.0]).unwrap();
            header
        });

        let mut client = TcpChannel::connect("127.0.0.1", port).unwrap();
        client.send_id(&[7, 8]).unwrap();
        client.send_vector(&[1.5, -2.5]).unwrap();
        let mut reply = [0.0; 2];
        client.recv_vector(&mut reply).unwrap();

        assert_eq!(reply, [3.0, -5.0]);
        assert_eq!(peer.join().unwrap(), [7, 8]);
    }

    #[test]
    fn connect_failure_names_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = TcpChannel::connect("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { ref addr, .. } if addr.ends_with(&port.to_string())));
    }

    #[test]
    fn recv_fails_when_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let mut client = TcpChannel::connect("127.0.0.1", port).unwrap();
        peer.join().unwrap();
        let mut buf = [0.0; 1];
        let err = client.recv_vector(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Io { operation: "recv_vector", .. }));
    }
}
