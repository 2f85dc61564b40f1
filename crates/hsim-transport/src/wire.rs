//! Byte encoding of vector and identification messages.
//!
//! Vectors are packed little-endian `f64`s, identification messages
//! little-endian `i32`s. There is no length prefix: both ends know the
//! message size from the session header.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use hsim_core::TransportError;

/// Bytes per vector element.
pub const F64_WIDTH: usize = std::mem::size_of::<f64>();

/// Bytes per identification element.
pub const I32_WIDTH: usize = std::mem::size_of::<i32>();

/// Encode a vector message.
#[must_use]
pub fn encode_vector(data: &[f64]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() * F64_WIDTH);
    for value in data {
        buf.put_f64_le(*value);
    }
    buf.freeze()
}

/// Decode a vector message into `out`, which fixes the expected length.
pub fn decode_vector(mut bytes: &[u8], out: &mut [f64]) -> Result<(), TransportError> {
    if bytes.len() != out.len() * F64_WIDTH {
        return Err(TransportError::Protocol(format!(
            "vector message of {} bytes, expected {}",
            bytes.len(),
            out.len() * F64_WIDTH
        )));
    }
    for value in out.iter_mut() {
        *value = bytes.get_f64_le();
    }
    Ok(())
}

/// Encode an identification message.
#[must_use]
pub fn encode_ids(ids: &[i32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ids.len() * I32_WIDTH);
    for id in ids {
        buf.put_i32_le(*id);
    }
    buf.freeze()
}

/// Decode an identification message into `out`.
pub fn decode_ids(mut bytes: &[u8], out: &mut [i32]) -> Result<(), TransportError> {
    if bytes.len() != out.len() * I32_WIDTH {
        return Err(TransportError::Protocol(format!(
            "id message of {} bytes, expected {}",
            bytes.len(),
            out.len() * I32_WIDTH
        )));
    }
    for id in out.iter_mut() {
        *id = bytes.get_i32_le();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_layout_is_little_endian() {
        let bytes = encode_vector(&[1.0]);
        assert_eq!(&bytes[..], &1.0f64.to_le_bytes());
    }

    #[test]
    fn ids_layout_is_little_endian() {
        let bytes = encode_ids(&[2, -1]);
        assert_eq!(&bytes[..4], &2i32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-1i32).to_le_bytes());
    }

    #[test]
    fn decode_rejects_short_messages() {
        let mut out = [0.0; 2];
        let err = decode_vector(&[0u8; 8], &mut out).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn decode_preserves_bits() {
        let values = [0.1 + 0.2, -0.0, f64::MAX];
        let bytes = encode_vector(&values);
        let mut out = [0.0; 3];
        decode_vector(&bytes, &mut out).unwrap();
        for (a, b) in values.iter().zip(out.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
