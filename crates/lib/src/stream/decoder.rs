use std::io::{self, Read};

use super::{MAX_BLOCK_LEN, StreamError, zigzag_decode};

/// Forward-only binary reader, the mirror of [`super::Encoder`].
pub struct Decoder<R: Read> {
  source: R,
  position: u64,
}

impl<R: Read> Decoder<R> {
  pub fn new(source: R) -> Self {
    Self { source, position: 0 }
  }

  /// Number of bytes consumed so far.
  pub fn position(&self) -> u64 {
    self.position
  }

  fn corrupt(&self, message: impl Into<String>) -> StreamError {
    StreamError::Corrupt {
      position: self.position,
      message: message.into(),
    }
  }

  pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
    match self.source.read_exact(buf) {
      Ok(()) => {
        self.position += buf.len() as u64;
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(StreamError::UnexpectedEof {
        position: self.position,
      }),
      Err(e) => Err(StreamError::Io(e)),
    }
  }

  pub fn read_u8(&mut self) -> Result<u8, StreamError> {
    let mut buf = [0u8; 1];
    self.read_raw(&mut buf)?;
    Ok(buf[0])
  }

  pub fn read_bool(&mut self) -> Result<bool, StreamError> {
    match self.read_u8()? {
      0 => Ok(false),
      1 => Ok(true),
      other => Err(self.corrupt(format!("invalid boolean byte {other:#04x}"))),
    }
  }

  pub fn read_var_u64(&mut self) -> Result<u64, StreamError> {
    let mut value = 0u64;
    for shift in (0..70).step_by(7) {
      let byte = self.read_u8()?;
      if shift == 63 && byte > 1 {
        return Err(self.corrupt("varint overflows 64 bits"));
      }
      value |= u64::from(byte & 0x7f) << shift;
      if byte & 0x80 == 0 {
        return Ok(value);
      }
    }
    Err(self.corrupt("varint longer than 10 bytes"))
  }

  pub fn read_var_i64(&mut self) -> Result<i64, StreamError> {
    Ok(zigzag_decode(self.read_var_u64()?))
  }

  /// Reads a length prefix, rejecting lengths above [`MAX_BLOCK_LEN`].
  pub fn read_len(&mut self) -> Result<usize, StreamError> {
    let len = self.read_var_u64()?;
    if len > MAX_BLOCK_LEN {
      return Err(self.corrupt(format!("length {len} exceeds block limit")));
    }
    Ok(len as usize)
  }

  pub fn read_f64(&mut self) -> Result<f64, StreamError> {
    let mut buf = [0u8; 8];
    self.read_raw(&mut buf)?;
    Ok(f64::from_bits(u64::from_le_bytes(buf)))
  }

  pub fn read_bytes(&mut self) -> Result<Vec<u8>, StreamError> {
    let len = self.read_len()?;
    let mut buf = Vec::new();
    let read = (&mut self.source)
      .take(len as u64)
      .read_to_end(&mut buf)
      .map_err(StreamError::Io)?;
    self.position += read as u64;
    if read < len {
      return Err(StreamError::UnexpectedEof {
        position: self.position,
      });
    }
    Ok(buf)
  }

  pub fn read_str(&mut self) -> Result<String, StreamError> {
    let start = self.position;
    let bytes = self.read_bytes()?;
    String::from_utf8(bytes).map_err(|e| StreamError::Corrupt {
      position: start,
      message: format!("invalid UTF-8 string: {e}"),
    })
  }
}
