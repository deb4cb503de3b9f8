//! Bounds-checked cursors over parcel bytes.
//!
//! Every other part of the crate touches the underlying buffer only through [`ReadCursor`] and
//! [`WriteCursor`], so every bounds check in the codec lives in this file.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// A read position over a borrowed byte slice.
#[derive(Clone, Debug)]
pub struct ReadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Move forward `n` bytes without looking at them.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.check("advance", n)?;
        self.pos += n;
        Ok(())
    }

    /// Jump to an absolute position. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::OutOfBounds {
                step: "seek",
                position: pos,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check("read bytes", n)?;
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Look at the next 32-bit word without moving.
    pub fn peek_i32(&self) -> Result<i32> {
        self.check("peek i32", 4)?;
        Ok(LittleEndian::read_i32(&self.data[self.pos..self.pos + 4]))
    }

    /// A copy of this cursor that can't read at or past `end`.
    pub fn bounded(&self, end: usize) -> Result<Self> {
        if end > self.data.len() || end < self.pos {
            return Err(Error::OutOfBounds {
                step: "bound cursor",
                position: self.pos,
                needed: end.saturating_sub(self.pos),
                available: self.remaining(),
            });
        }
        Ok(Self {
            data: &self.data[..end],
            pos: self.pos,
        })
    }

    fn check(&self, step: &'static str, n: usize) -> Result<()> {
        if n > self.remaining() {
            Err(Error::OutOfBounds {
                step,
                position: self.pos,
                needed: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }
}

/// A write position over a caller-owned, growable buffer.
///
/// Writing at the end of the buffer appends. Writing after a seek backwards overwrites, which is
/// how length placeholders get backpatched.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut Vec<u8>,
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Start writing at the current end of `buf`. Existing contents are left alone.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        let pos = buf.len();
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::OutOfBounds {
                step: "advance",
                position: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(Error::OutOfBounds {
                step: "seek",
                position: pos,
                needed: 0,
                available: self.buf.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Bytes between `from` and the current position.
    pub(crate) fn written_since(&self, from: usize) -> Result<&[u8]> {
        self.buf.get(from..self.pos).ok_or_else(|| Error::OutOfBounds {
            step: "look back",
            position: from,
            needed: self.pos.saturating_sub(from),
            available: self.buf.len().saturating_sub(from),
        })
    }

    /// Cut `n` bytes out of the buffer at `at`, shifting everything after them down. The cursor
    /// must be past the removed bytes, and moves down with the rest.
    pub(crate) fn remove(&mut self, at: usize, n: usize) -> Result<()> {
        match at.checked_add(n) {
            Some(end) if end <= self.pos => {
                self.buf.drain(at..end);
                self.pos -= n;
                Ok(())
            }
            _ => Err(Error::OutOfBounds {
                step: "remove",
                position: at,
                needed: n,
                available: self.pos.saturating_sub(at),
            }),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, v);
        self.write_bytes(&raw);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_i32(&mut raw, v);
        self.write_bytes(&raw);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_i64(&mut raw, v);
        self.write_bytes(&raw);
    }

    pub fn write_f32(&mut self, v: f32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_f32(&mut raw, v);
        self.write_bytes(&raw);
    }

    pub fn write_f64(&mut self, v: f64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_f64(&mut raw, v);
        self.write_bytes(&raw);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn read_words() {
        let data = [0x2a, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        let mut cursor = ReadCursor::new(&data);
        assert_eq!(cursor.read_i32().unwrap(), 42);
        assert_eq!(cursor.remaining(), 4);
        assert_eq!(cursor.peek_i32().unwrap(), -1);
        assert_eq!(cursor.read_u32().unwrap(), u32::MAX);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn read_past_end() {
        let data = [1, 2, 3];
        let mut cursor = ReadCursor::new(&data);
        let err = cursor.read_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        // A failed read doesn't move the cursor
        assert_eq!(cursor.position(), 0);
        assert!(cursor.advance(4).is_err());
        cursor.advance(3).unwrap();
        assert!(cursor.peek_i32().is_err());
    }

    #[test]
    fn seek_limits() {
        let data = [0u8; 8];
        let mut cursor = ReadCursor::new(&data);
        cursor.seek(8).unwrap();
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.seek(9).unwrap_err().kind(), ErrorKind::Bounds);
        cursor.seek(0).unwrap();
        assert_eq!(cursor.remaining(), 8);
    }

    #[test]
    fn write_then_overwrite() {
        let mut buf = Vec::new();
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.write_u32(0);
        cursor.write_i64(-2);
        let end = cursor.position();
        cursor.seek(0).unwrap();
        cursor.write_u32(0xdead_beef);
        assert_eq!(cursor.position(), 4);
        cursor.seek(end).unwrap();
        cursor.write_f32(1.0);
        assert_eq!(
            buf,
            vec![
                0xef, 0xbe, 0xad, 0xde, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
                0x00, 0x80, 0x3f
            ]
        );
    }

    #[test]
    fn bounded_read() {
        let data = [1, 0, 0, 0, 2, 0, 0, 0];
        let mut cursor = ReadCursor::new(&data);
        let mut short = cursor.bounded(6).unwrap();
        assert_eq!(short.read_i32().unwrap(), 1);
        assert_eq!(short.read_i32().unwrap_err().kind(), ErrorKind::Bounds);
        assert_eq!(short.position(), 4);
        cursor.advance(4).unwrap();
        assert!(cursor.bounded(2).is_err());
        assert!(cursor.bounded(9).is_err());
    }

    #[test]
    fn remove_shifts_tail() {
        let mut buf = Vec::new();
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.write_bytes(&[1, 2, 3, 4, 5, 6]);
        assert!(cursor.remove(4, 3).is_err());
        cursor.remove(1, 2).unwrap();
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.written_since(0).unwrap(), &[1, 4, 5, 6]);
        cursor.write_bytes(&[7]);
        assert_eq!(buf, vec![1, 4, 5, 6, 7]);
    }

    #[test]
    fn write_appends_to_existing() {
        let mut buf = vec![9, 9];
        let mut cursor = WriteCursor::new(&mut buf);
        assert_eq!(cursor.position(), 2);
        assert!(cursor.seek(3).is_err());
        cursor.write_bytes(&[1]);
        assert_eq!(buf, vec![9, 9, 1]);
    }
}
