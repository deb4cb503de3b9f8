//! The 32-bit header word that precedes every field.
//!
//! The low 16 bits hold the field id. The high 16 bits hold the payload size, unless they're all
//! set, in which case the real size follows as a second 32-bit word.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::error::{Error, Result};
use crate::{EXTENDED_SIZE, OBJECT_MAGIC};

const EXTENDED_MARKER: u32 = (EXTENDED_SIZE as u32) << 16;

/// A decoded field header, along with where its payload sits in the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldHeader {
    /// Field id, taken from the low 16 bits of the header word.
    pub id: u16,
    /// Declared payload size in bytes.
    pub size: u32,
    /// Absolute position of the first payload byte.
    pub start: usize,
}

impl FieldHeader {
    /// Absolute position just past the payload. This, not whatever a field reader consumed, is
    /// where the next field starts.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.size as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Write a field header. Sizes of `0xFFFF` and above take the extended form.
///
/// Field id 0 and the object sentinel are reserved, and asking for either is a caller error.
pub fn write_header(cursor: &mut WriteCursor, id: u16, size: u32) -> Result<()> {
    check_field_id(id)?;
    write_header_unchecked(cursor, id, size);
    Ok(())
}

pub(crate) fn check_field_id(id: u16) -> Result<()> {
    if id == 0 || id == OBJECT_MAGIC {
        return Err(Error::Misuse(format!(
            "field id 0x{:04x} is reserved and can't be used for a field",
            id
        )));
    }
    Ok(())
}

pub(crate) fn write_header_unchecked(cursor: &mut WriteCursor, id: u16, size: u32) {
    if size >= EXTENDED_SIZE as u32 {
        cursor.write_u32(EXTENDED_MARKER | id as u32);
        cursor.write_u32(size);
    } else {
        cursor.write_u32((size << 16) | id as u32);
    }
}

/// Read a field header, leaving the cursor at the start of its payload.
///
/// This doesn't check that the payload fits; that's up to whoever knows the enclosing bounds.
pub fn read_header(cursor: &mut ReadCursor) -> Result<FieldHeader> {
    let word = cursor.read_u32()?;
    let id = (word & 0xFFFF) as u16;
    let size = if word & 0xFFFF_0000 == EXTENDED_MARKER {
        cursor.read_u32()?
    } else {
        word >> 16
    };
    Ok(FieldHeader {
        id,
        size,
        start: cursor.position(),
    })
}

/// Convert a payload length into a header size, rejecting anything the format can't carry.
pub(crate) fn size_of_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::Misuse(format!("payload of {} bytes is too large for a field", len)))
}
