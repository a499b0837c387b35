//! Binary stream encoding for cache segments.
//!
//! Segments are written as a strictly sequential byte stream: there is no
//! seeking and no random access, so values come back in exactly the order
//! they were written.
//!
//! # Primitive encodings
//!
//! | Kind       | Encoding                                        |
//! |------------|-------------------------------------------------|
//! | `u8`       | one byte                                        |
//! | `bool`     | one byte, `0` or `1`                            |
//! | unsigned   | LEB128 varint, at most 10 bytes                 |
//! | signed     | zigzag, then LEB128 varint                      |
//! | `f64`      | 8 bytes, little-endian IEEE-754 bits            |
//! | string     | varint byte length, then UTF-8 bytes            |
//! | byte block | varint length, then raw bytes                   |

mod decoder;
mod encoder;

use std::io;

use thiserror::Error;

pub use decoder::Decoder;
pub use encoder::Encoder;

/// Upper bound for a single length-prefixed block.
///
/// Anything larger is treated as corruption rather than an allocation request.
pub const MAX_BLOCK_LEN: u64 = 1 << 30;

/// Errors raised by the encoder and decoder.
///
/// All of them are fatal for the current read or write.
#[derive(Debug, Error)]
pub enum StreamError {
  /// The underlying sink or source failed.
  #[error("stream i/o failed: {0}")]
  Io(#[source] io::Error),

  /// The source ended in the middle of a value.
  #[error("unexpected end of stream at byte {position}")]
  UnexpectedEof { position: u64 },

  /// The bytes do not form a valid encoding.
  #[error("corrupt stream at byte {position}: {message}")]
  Corrupt { position: u64, message: String },
}

fn zigzag_encode(value: i64) -> u64 {
  ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
  ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roundtrip<F, G, T>(write: F, read: G) -> T
  where
    F: FnOnce(&mut Encoder<&mut Vec<u8>>) -> Result<(), StreamError>,
    G: FnOnce(&mut Decoder<&[u8]>) -> Result<T, StreamError>,
  {
    let mut buf = Vec::new();
    {
      let mut encoder = Encoder::new(&mut buf);
      write(&mut encoder).unwrap();
      encoder.flush().unwrap();
    }
    let mut decoder = Decoder::new(buf.as_slice());
    read(&mut decoder).unwrap()
  }

  #[test]
  fn zigzag_maps_small_magnitudes_to_small_codes() {
    assert_eq!(zigzag_encode(0), 0);
    assert_eq!(zigzag_encode(-1), 1);
    assert_eq!(zigzag_encode(1), 2);
    assert_eq!(zigzag_encode(-2), 3);
    assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
    assert_eq!(zigzag_decode(zigzag_encode(i64::MAX)), i64::MAX);
  }

  #[test]
  fn varint_boundaries() {
    for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
      let read = roundtrip(|e| e.write_var_u64(value), |d| d.read_var_u64());
      assert_eq!(read, value);
    }
  }

  #[test]
  fn single_byte_varint_for_small_values() {
    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf);
    encoder.write_var_u64(127).unwrap();
    assert_eq!(encoder.position(), 1);
    encoder.write_var_u64(128).unwrap();
    assert_eq!(encoder.position(), 3);
  }

  #[test]
  fn mixed_primitives_read_back_in_order() {
    let (flag, n, f, s, b) = roundtrip(
      |e| {
        e.write_bool(true)?;
        e.write_var_i64(-42)?;
        e.write_f64(2.5)?;
        e.write_str("héllo")?;
        e.write_bytes(&[1, 2, 3])
      },
      |d| {
        Ok((
          d.read_bool()?,
          d.read_var_i64()?,
          d.read_f64()?,
          d.read_str()?,
          d.read_bytes()?,
        ))
      },
    );
    assert!(flag);
    assert_eq!(n, -42);
    assert_eq!(f, 2.5);
    assert_eq!(s, "héllo");
    assert_eq!(b, vec![1, 2, 3]);
  }

  #[test]
  fn positions_track_both_sides() {
    let mut buf = Vec::new();
    {
      let mut encoder = Encoder::new(&mut buf);
      encoder.write_str("abc").unwrap();
      assert_eq!(encoder.position(), 4);
    }
    let mut decoder = Decoder::new(buf.as_slice());
    decoder.read_str().unwrap();
    assert_eq!(decoder.position(), 4);
  }

  #[test]
  fn truncated_input_is_unexpected_eof() {
    let mut buf = Vec::new();
    Encoder::new(&mut buf).write_str("truncated").unwrap();
    buf.truncate(4);

    let result = Decoder::new(buf.as_slice()).read_str();
    assert!(matches!(result, Err(StreamError::UnexpectedEof { .. })));
  }

  #[test]
  fn empty_input_is_unexpected_eof() {
    let result = Decoder::new(&[0u8; 0][..]).read_u8();
    assert!(matches!(result, Err(StreamError::UnexpectedEof { position: 0 })));
  }

  #[test]
  fn invalid_utf8_is_corrupt() {
    let bytes = [2u8, 0xff, 0xfe];
    let result = Decoder::new(&bytes[..]).read_str();
    assert!(matches!(result, Err(StreamError::Corrupt { .. })));
  }

  #[test]
  fn overlong_varint_is_corrupt() {
    let bytes = [0xffu8; 11];
    let result = Decoder::new(&bytes[..]).read_var_u64();
    assert!(matches!(result, Err(StreamError::Corrupt { .. })));
  }

  #[test]
  fn oversized_length_prefix_is_corrupt() {
    let mut buf = Vec::new();
    Encoder::new(&mut buf).write_var_u64(MAX_BLOCK_LEN + 1).unwrap();
    let result = Decoder::new(buf.as_slice()).read_bytes();
    assert!(matches!(result, Err(StreamError::Corrupt { .. })));
  }

  #[test]
  fn invalid_bool_byte_is_corrupt() {
    let result = Decoder::new(&[7u8][..]).read_bool();
    assert!(matches!(result, Err(StreamError::Corrupt { .. })));
  }
}
