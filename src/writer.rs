//! Writing fields into a parcel.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::depth_tracking::DepthTracker;
use crate::envelope::{
    close_element_frame, close_frame, close_write, open_element_frame, open_field_frame,
    open_write, ObjectMark,
};
use crate::error::{Error, Result};
use crate::header::{read_header, size_of_len, write_header};
use crate::scalar::Scalar;
use crate::{Parcelable, OBJECT_MAGIC};

/// Writes objects and their fields onto a caller-owned buffer.
///
/// A writer lives for a single encode call. Fields can only be written while an object is open;
/// the usual shape of an encode routine is:
///
/// ```
/// # use safe_parcel::{ParcelWriter, Result};
/// # fn main() -> Result<()> {
/// let mut buf = Vec::new();
/// let mut w = ParcelWriter::new(&mut buf);
/// let mark = w.begin_object()?;
/// w.write_scalar(1, 42i32)?;
/// w.write_string(2, "hi")?;
/// w.end_object(mark)?;
/// assert_eq!(buf.len(), 22);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ParcelWriter<'a> {
    cursor: WriteCursor<'a>,
    depth: DepthTracker,
}

impl<'a> ParcelWriter<'a> {
    /// Start writing at the end of `buf`.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self {
            cursor: WriteCursor::new(buf),
            depth: DepthTracker::new(),
        }
    }

    /// Direct access to the cursor, for payload formats this writer doesn't cover.
    pub fn cursor(&mut self) -> &mut WriteCursor<'a> {
        &mut self.cursor
    }

    /// How many objects are currently open. Zero means idle.
    pub fn depth(&self) -> usize {
        self.depth.depth()
    }

    /// Open an object. Every field written until the matching [`end_object`](Self::end_object)
    /// belongs to it.
    ///
    /// Going past [`MAX_DEPTH`](crate::MAX_DEPTH) open objects is a [`Error::Misuse`], and
    /// nothing is written in that case.
    pub fn begin_object(&mut self) -> Result<ObjectMark> {
        // Object headers are always 8 bytes
        let content_start = self.cursor.position() + 8;
        self.depth.enter(content_start).map_err(|e| match e {
            Error::ParseLimit(msg) => Error::Misuse(msg),
            e => e,
        })?;
        Ok(open_write(&mut self.cursor))
    }

    /// Close the innermost object, backpatching its size.
    pub fn end_object(&mut self, mark: ObjectMark) -> Result<()> {
        self.depth.exit(mark.content_start())?;
        close_write(&mut self.cursor, mark)
    }

    fn require_open(&self) -> Result<()> {
        if self.depth.is_idle() {
            return Err(Error::Misuse(
                "fields can only be written inside an object".to_string(),
            ));
        }
        Ok(())
    }

    fn header(&mut self, id: u16, len: usize) -> Result<()> {
        self.require_open()?;
        let size = size_of_len(len)?;
        write_header(&mut self.cursor, id, size)
    }

    /// Write a fixed-width scalar field.
    pub fn write_scalar<T: Scalar>(&mut self, id: u16, value: T) -> Result<()> {
        self.header(id, T::WIDTH as usize)?;
        value.write_raw(&mut self.cursor);
        Ok(())
    }

    /// Write a scalar field if there is a value; omit the field entirely if not.
    pub fn write_opt_scalar<T: Scalar>(&mut self, id: u16, value: Option<T>) -> Result<()> {
        match value {
            Some(v) => self.write_scalar(id, v),
            None => Ok(()),
        }
    }

    /// Write a present field with an empty payload. Readers see it through the `read_nullable_*`
    /// methods as `None`.
    pub fn write_null(&mut self, id: u16) -> Result<()> {
        self.header(id, 0)
    }

    pub fn write_string(&mut self, id: u16, value: &str) -> Result<()> {
        self.write_bytes(id, value.as_bytes())
    }

    pub fn write_opt_string(&mut self, id: u16, value: Option<&str>) -> Result<()> {
        match value {
            Some(v) => self.write_string(id, v),
            None => Ok(()),
        }
    }

    pub fn write_bytes(&mut self, id: u16, value: &[u8]) -> Result<()> {
        self.header(id, value.len())?;
        self.cursor.write_bytes(value);
        Ok(())
    }

    pub fn write_opt_bytes(&mut self, id: u16, value: Option<&[u8]>) -> Result<()> {
        match value {
            Some(v) => self.write_bytes(id, v),
            None => Ok(()),
        }
    }

    /// Write a count-prefixed list of scalars.
    pub fn write_scalar_list<T: Scalar>(&mut self, id: u16, values: &[T]) -> Result<()> {
        let count = list_count(values.len())?;
        let len = (T::WIDTH as usize)
            .checked_mul(values.len())
            .and_then(|n| n.checked_add(4))
            .ok_or_else(|| Error::Misuse(format!("list of {} is too large", T::NAME)))?;
        self.header(id, len)?;
        self.cursor.write_i32(count);
        for v in values {
            v.write_raw(&mut self.cursor);
        }
        Ok(())
    }

    /// Write a count-prefixed list of strings, each one length-prefixed.
    pub fn write_string_list<S: AsRef<str>>(&mut self, id: u16, values: &[S]) -> Result<()> {
        let list: Vec<&[u8]> = values.iter().map(|s| s.as_ref().as_bytes()).collect();
        self.write_bytes_list(id, &list)
    }

    /// Write a count-prefixed list of byte arrays, each one length-prefixed.
    pub fn write_bytes_list<B: AsRef<[u8]>>(&mut self, id: u16, values: &[B]) -> Result<()> {
        let count = list_count(values.len())?;
        let mut len: usize = 4;
        for v in values {
            len = len
                .checked_add(4 + v.as_ref().len())
                .ok_or_else(|| Error::Misuse("list of byte arrays is too large".to_string()))?;
        }
        self.header(id, len)?;
        self.cursor.write_i32(count);
        for v in values {
            let v = v.as_ref();
            self.cursor.write_i32(element_len(v.len())?);
            self.cursor.write_bytes(v);
        }
        Ok(())
    }

    /// Write a field holding one nested object.
    pub fn write_object<T: Parcelable>(&mut self, id: u16, value: &T) -> Result<()> {
        self.write_framed(id, |w| w.write_nested(value))
    }

    /// Write a nested object field if there is a value; omit the field if not.
    pub fn write_opt_object<T: Parcelable>(&mut self, id: u16, value: Option<&T>) -> Result<()> {
        match value {
            Some(v) => self.write_object(id, v),
            None => Ok(()),
        }
    }

    /// Write a list of nested objects.
    pub fn write_object_list<T: Parcelable>(&mut self, id: u16, values: &[T]) -> Result<()> {
        self.write_object_elements(id, values.len(), values.iter().map(Some))
    }

    /// Write a list of nested objects, where `None` entries are stored as null elements.
    pub fn write_object_list_with_nulls<T: Parcelable>(
        &mut self,
        id: u16,
        values: &[Option<T>],
    ) -> Result<()> {
        self.write_object_elements(id, values.len(), values.iter().map(Option::as_ref))
    }

    fn write_object_elements<'v, T, I>(&mut self, id: u16, len: usize, values: I) -> Result<()>
    where
        T: Parcelable + 'v,
        I: Iterator<Item = Option<&'v T>>,
    {
        let count = list_count(len)?;
        self.write_framed(id, |w| {
            w.cursor.write_i32(count);
            for value in values {
                match value {
                    Some(v) => {
                        let start = open_element_frame(&mut w.cursor);
                        w.write_nested(v)?;
                        close_element_frame(&mut w.cursor, start)?;
                    }
                    None => w.cursor.write_i32(0),
                }
            }
            Ok(())
        })
    }

    /// Write a field whose payload is produced by `f` and whose size is filled in afterwards.
    ///
    /// The header ends up in the same form [`write_bytes`](Self::write_bytes) would give a
    /// payload of that length. Any object `f` opens must also be closed by `f`.
    pub fn write_framed<F>(&mut self, id: u16, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.require_open()?;
        let depth = self.depth.depth();
        let frame = open_field_frame(&mut self.cursor, id)?;
        f(self)?;
        if self.depth.depth() != depth {
            return Err(Error::Misuse(format!(
                "field {} closed with an object still open inside it",
                id
            )));
        }
        close_frame(&mut self.cursor, frame)?;
        Ok(())
    }

    /// Run a value's encode routine, making sure it wrote exactly one object and nothing else.
    pub(crate) fn write_nested<T: Parcelable>(&mut self, value: &T) -> Result<()> {
        let before = self.cursor.position();
        let depth = self.depth.depth();
        value.write_to_parcel(self)?;
        if self.depth.depth() != depth {
            return Err(Error::Misuse(
                "encode routine left an object open".to_string(),
            ));
        }
        let written = self.cursor.written_since(before)?;
        let mut check = ReadCursor::new(written);
        match read_header(&mut check) {
            Ok(header) if header.id == OBJECT_MAGIC && header.end() == written.len() => Ok(()),
            Ok(header) if header.id == OBJECT_MAGIC => Err(Error::Misuse(format!(
                "encode routine wrote {} bytes, but its object only spans {}",
                written.len(),
                header.end()
            ))),
            _ => Err(Error::Misuse(
                "encode routine didn't write an object".to_string(),
            )),
        }
    }
}

pub(crate) fn list_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::Misuse(format!("list of {} elements is too long", len)))
}

pub(crate) fn element_len(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| Error::Misuse(format!("list element of {} bytes is too large", len)))
}
