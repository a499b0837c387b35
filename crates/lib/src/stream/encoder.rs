use std::io::Write;

use super::{StreamError, zigzag_encode};

/// Forward-only binary writer that tracks how many bytes it has emitted.
pub struct Encoder<W: Write> {
  sink: W,
  position: u64,
}

impl<W: Write> Encoder<W> {
  pub fn new(sink: W) -> Self {
    Self { sink, position: 0 }
  }

  /// Number of bytes written so far.
  pub fn position(&self) -> u64 {
    self.position
  }

  pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
    self.sink.write_all(bytes).map_err(StreamError::Io)?;
    self.position += bytes.len() as u64;
    Ok(())
  }

  pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
    self.write_raw(&[value])
  }

  pub fn write_bool(&mut self, value: bool) -> Result<(), StreamError> {
    self.write_u8(u8::from(value))
  }

  pub fn write_var_u64(&mut self, mut value: u64) -> Result<(), StreamError> {
    let mut buf = [0u8; 10];
    let mut len = 0;
    loop {
      let byte = (value & 0x7f) as u8;
      value >>= 7;
      if value == 0 {
        buf[len] = byte;
        len += 1;
        break;
      }
      buf[len] = byte | 0x80;
      len += 1;
    }
    self.write_raw(&buf[..len])
  }

  pub fn write_var_i64(&mut self, value: i64) -> Result<(), StreamError> {
    self.write_var_u64(zigzag_encode(value))
  }

  pub fn write_len(&mut self, len: usize) -> Result<(), StreamError> {
    self.write_var_u64(len as u64)
  }

  pub fn write_f64(&mut self, value: f64) -> Result<(), StreamError> {
    self.write_raw(&value.to_bits().to_le_bytes())
  }

  pub fn write_str(&mut self, value: &str) -> Result<(), StreamError> {
    self.write_bytes(value.as_bytes())
  }

  pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), StreamError> {
    self.write_len(value.len())?;
    self.write_raw(value)
  }

  pub fn flush(&mut self) -> Result<(), StreamError> {
    self.sink.flush().map_err(StreamError::Io)
  }

  pub fn into_inner(self) -> W {
    self.sink
  }
}
