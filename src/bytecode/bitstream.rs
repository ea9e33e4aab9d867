/*!
  Bit-granular writer and reader for the instruction stream.

  Fields are not byte aligned. Each value is laid down least-significant bit first, and the
  bits fill each byte from its least-significant bit upward. The reader consumes bits in
  exactly the same order, so a sequence of writes with widths `w1..wn` is recovered by reads
  with widths `w1..wn`.
*/

use thiserror::Error;

/// The widest value a single `read` can return.
pub const MAX_FIELD_WIDTH: u32 = 64;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BitStreamError {
  #[error("out of data: {requested} bits requested at bit {position} but only {available} remain")]
  OutOfData {
    position  : usize,
    requested : u32,
    available : usize
  },
  #[error("field width {0} exceeds {max} bits", max = MAX_FIELD_WIDTH)]
  WidthTooLarge(u32),
}

/// Accumulates bits, appending a zeroed byte whenever the cursor crosses into a new one.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
  bytes   : Vec<u8>,
  bit_len : usize
}

impl BitWriter {

  pub fn new() -> BitWriter {
    BitWriter::default()
  }

  /// Appends the low `width` bits of `value`. Higher bits of `value` are ignored; range
  /// checking is the caller's job. Bits past the 64th are written as zero.
  pub fn write(&mut self, value: u64, width: u32) {
    for i in 0..width {
      if self.bit_len % 8 == 0 {
        self.bytes.push(0);
      }
      if value.checked_shr(i).unwrap_or(0) & 1 == 1 {
        self.bytes[self.bit_len / 8] |= 1 << (self.bit_len % 8);
      }
      self.bit_len += 1;
    }
  }

  /// Number of bits written so far.
  pub fn bit_len(&self) -> usize {
    self.bit_len
  }

  /// Returns the backing bytes. Unused high bits of the last byte are already zero.
  pub fn finish(self) -> Vec<u8> {
    self.bytes
  }

}

/// A cursor over a borrowed byte buffer.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
  bytes    : &'a [u8],
  position : usize
}

impl<'a> BitReader<'a> {

  pub fn new(bytes: &'a [u8]) -> BitReader<'a> {
    BitReader { bytes, position: 0 }
  }

  /**
    Removes the next `width` bits and returns them as the low bits of a `u64`.

    If fewer than `width` bits remain the read fails with `OutOfData` and the cursor does
    not move.
  */
  pub fn read(&mut self, width: u32) -> Result<u64, BitStreamError> {
    if width > MAX_FIELD_WIDTH {
      return Err(BitStreamError::WidthTooLarge(width));
    }
    if width as usize > self.remaining() {
      return Err(
        BitStreamError::OutOfData {
          position  : self.position,
          requested : width,
          available : self.remaining()
        }
      );
    }

    let mut value: u64 = 0;
    for i in 0..width {
      let bit = (self.bytes[self.position / 8] >> (self.position % 8)) & 1;
      value |= (bit as u64) << i;
      self.position += 1;
    }
    Ok(value)
  }

  /// Bit offset of the cursor from the start of the buffer.
  pub fn position(&self) -> usize {
    self.position
  }

  pub fn bit_len(&self) -> usize {
    self.bytes.len() * 8
  }

  pub fn remaining(&self) -> usize {
    self.bit_len() - self.position
  }

  pub fn is_at_end(&self) -> bool {
    self.remaining() == 0
  }

}
