//! Object envelopes, backpatched frames, and unknown-field skipping.
//!
//! An object is written as a header with the [`OBJECT_MAGIC`] id, always in extended form. Its
//! size word starts out as a placeholder and is overwritten once the contents are known. Readers
//! treat that size as the hard end of the object: whatever the field readers did, the cursor ends
//! up exactly there.

use log::{debug, trace};

use crate::cursor::{ReadCursor, WriteCursor};
use crate::error::{Error, Result};
use crate::header::{check_field_id, read_header, size_of_len, write_header_unchecked, FieldHeader};
use crate::{EXTENDED_SIZE, OBJECT_MAGIC};

/// Returned by [`open_write`], needed to close the object again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "an object must be closed with close_write"]
pub struct ObjectMark {
    content_start: usize,
}

impl ObjectMark {
    /// Position of the first content byte, right after the size placeholder.
    pub fn content_start(&self) -> usize {
        self.content_start
    }
}

/// Bounds of an object being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope {
    start: usize,
    end: usize,
}

impl Envelope {
    /// Absolute position of the first content byte.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Absolute position just past the object's last byte.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Write an object header with a placeholder size.
pub fn open_write(cursor: &mut WriteCursor) -> ObjectMark {
    write_header_unchecked(cursor, OBJECT_MAGIC, EXTENDED_SIZE as u32);
    trace!("Opened object at {}", cursor.position());
    ObjectMark {
        content_start: cursor.position(),
    }
}

/// Backpatch the size of the object opened at `mark`, leaving the cursor at the object's end.
pub fn close_write(cursor: &mut WriteCursor, mark: ObjectMark) -> Result<()> {
    let len = backpatch(cursor, mark.content_start)?;
    trace!("Closed object at {} with {} bytes", mark.content_start, len);
    Ok(())
}

/// Read an object header and work out where the object ends.
pub fn open_read(cursor: &mut ReadCursor) -> Result<Envelope> {
    let header = read_header(cursor)?;
    if header.id != OBJECT_MAGIC {
        return Err(Error::BadSentinel { found: header.id });
    }
    let end = checked_end(cursor, &header, "object size")?;
    trace!("Reading object at {}..{}", header.start, end);
    Ok(Envelope {
        start: header.start,
        end,
    })
}

/// Jump over a field's payload using only its declared size. `end_offset` is the end of the
/// enclosing object, which the jump may not cross.
pub fn skip(cursor: &mut ReadCursor, header: &FieldHeader, end_offset: usize) -> Result<()> {
    if header.end() > end_offset {
        return Err(Error::OutOfBounds {
            step: "skip field",
            position: header.start,
            needed: header.size as usize,
            available: end_offset.saturating_sub(header.start),
        });
    }
    debug!("Skipping field {} ({} bytes)", header.id, header.size);
    cursor.seek(header.end())
}

/// Where a header's payload ends, provided it fits in the cursor's data.
pub(crate) fn checked_end(
    cursor: &ReadCursor,
    header: &FieldHeader,
    step: &'static str,
) -> Result<usize> {
    match header.start.checked_add(header.size as usize) {
        Some(end) if end <= cursor.len() => Ok(end),
        _ => Err(Error::OutOfBounds {
            step,
            position: header.start,
            needed: header.size as usize,
            available: cursor.len().saturating_sub(header.start),
        }),
    }
}

/// A field opened by [`open_field_frame`] whose size is still a placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a field frame must be closed with close_frame"]
pub(crate) struct FieldFrame {
    id: u16,
    content_start: usize,
}

impl FieldFrame {
    pub(crate) fn content_start(&self) -> usize {
        self.content_start
    }
}

/// Start a field whose payload size isn't known yet. The header goes out in extended form with a
/// placeholder size, and [`close_frame`] settles the final form.
pub(crate) fn open_field_frame(cursor: &mut WriteCursor, id: u16) -> Result<FieldFrame> {
    check_field_id(id)?;
    write_header_unchecked(cursor, id, EXTENDED_SIZE as u32);
    Ok(FieldFrame {
        id,
        content_start: cursor.position(),
    })
}

/// Start a length-prefixed list element with a placeholder length.
pub(crate) fn open_element_frame(cursor: &mut WriteCursor) -> usize {
    cursor.write_i32(0);
    cursor.position()
}

/// Close a field frame, leaving the cursor at the field's end. A payload shorter than `0xFFFF`
/// gets an inline header: the size word is cut out and the payload moves down 4 bytes.
pub(crate) fn close_frame(cursor: &mut WriteCursor, frame: FieldFrame) -> Result<u32> {
    let len = backpatch(cursor, frame.content_start)?;
    if len < EXTENDED_SIZE as u32 {
        let header_start = frame.content_start.checked_sub(8).ok_or_else(|| {
            Error::Misuse(format!(
                "no field header before position {}",
                frame.content_start
            ))
        })?;
        cursor.remove(frame.content_start - 4, 4)?;
        let end = cursor.position();
        cursor.seek(header_start)?;
        write_header_unchecked(cursor, frame.id, len);
        cursor.seek(end)?;
    }
    Ok(len)
}

/// Like [`close_frame`], but for an int32 element length.
pub(crate) fn close_element_frame(cursor: &mut WriteCursor, content_start: usize) -> Result<()> {
    let len = backpatch(cursor, content_start)?;
    if len > i32::MAX as u32 {
        return Err(Error::Misuse(format!(
            "list element of {} bytes is too large",
            len
        )));
    }
    Ok(())
}

fn backpatch(cursor: &mut WriteCursor, content_start: usize) -> Result<u32> {
    let end = cursor.position();
    if content_start < 4 || content_start > end {
        return Err(Error::Misuse(format!(
            "can't close frame starting at {} from position {}",
            content_start, end
        )));
    }
    let len = size_of_len(end - content_start)?;
    cursor.seek(content_start - 4)?;
    cursor.write_u32(len);
    cursor.seek(end)?;
    Ok(len)
}
