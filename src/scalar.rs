//! Fixed-width scalar payloads.
//!
//! bool, byte, and short are widened to a full 32-bit word on the wire, so every scalar is either
//! 4 or 8 bytes. Readers insist on that exact width.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::error::{Error, Result};
use crate::header::FieldHeader;

/// A primitive that can be written as a fixed-width field payload or list element.
pub trait Scalar: Copy + Sized {
    /// Width of the value on the wire, in bytes.
    const WIDTH: u32;
    /// Name used in error messages.
    const NAME: &'static str;

    fn write_raw(self, cursor: &mut WriteCursor);
    fn read_raw(cursor: &mut ReadCursor) -> Result<Self>;
}

impl Scalar for bool {
    const WIDTH: u32 = 4;
    const NAME: &'static str = "bool";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_i32(self as i32);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        // Any non-zero word is true
        Ok(cursor.read_i32()? != 0)
    }
}

impl Scalar for i8 {
    const WIDTH: u32 = 4;
    const NAME: &'static str = "byte";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_i32(self as i32);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        Ok(cursor.read_i32()? as i8)
    }
}

impl Scalar for i16 {
    const WIDTH: u32 = 4;
    const NAME: &'static str = "short";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_i32(self as i32);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        Ok(cursor.read_i32()? as i16)
    }
}

impl Scalar for i32 {
    const WIDTH: u32 = 4;
    const NAME: &'static str = "int";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_i32(self);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        cursor.read_i32()
    }
}

impl Scalar for i64 {
    const WIDTH: u32 = 8;
    const NAME: &'static str = "long";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_i64(self);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        cursor.read_i64()
    }
}

impl Scalar for f32 {
    const WIDTH: u32 = 4;
    const NAME: &'static str = "float";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_f32(self);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        cursor.read_f32()
    }
}

impl Scalar for f64 {
    const WIDTH: u32 = 8;
    const NAME: &'static str = "double";

    fn write_raw(self, cursor: &mut WriteCursor) {
        cursor.write_f64(self);
    }

    fn read_raw(cursor: &mut ReadCursor) -> Result<Self> {
        cursor.read_f64()
    }
}

/// Fail unless the header declares exactly the width of `T`.
pub(crate) fn check_width<T: Scalar>(header: &FieldHeader) -> Result<()> {
    if header.size != T::WIDTH {
        return Err(Error::SizeMismatch {
            field: header.id,
            expected: T::WIDTH,
            actual: header.size,
        });
    }
    Ok(())
}
