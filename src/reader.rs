//! Reading fields out of a parcel.

use crate::cursor::ReadCursor;
use crate::depth_tracking::DepthTracker;
use crate::envelope::{self, open_read, Envelope};
use crate::error::{Error, Result};
use crate::header::{read_header, FieldHeader};
use crate::scalar::{check_width, Scalar};
use crate::Parcelable;

/// Reads objects and their fields out of a borrowed buffer.
///
/// Field readers take the [`FieldHeader`] returned while walking an object and look only at that
/// field's payload. How much of the payload they actually consume doesn't matter: the walk always
/// resumes at the position the header declared.
///
/// ```
/// # use safe_parcel::{ParcelReader, Result};
/// # fn main() -> Result<()> {
/// let data = [
///     0x45, 0x4f, 0xff, 0xff, 0x0e, 0x00, 0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x2a, 0x00,
///     0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x68, 0x69,
/// ];
/// let mut r = ParcelReader::new(&data);
/// let mut number = None;
/// let mut text = None;
/// r.read_fields(|r, field| {
///     match field.id {
///         1 => number = Some(r.read_scalar::<i32>(field)?),
///         2 => text = Some(r.read_string(field)?),
///         _ => r.skip(field)?,
///     }
///     Ok(())
/// })?;
/// assert_eq!(number, Some(42));
/// assert_eq!(text.as_deref(), Some("hi"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ParcelReader<'a> {
    cursor: ReadCursor<'a>,
    depth: DepthTracker,
}

impl<'a> ParcelReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: ReadCursor::new(data),
            depth: DepthTracker::new(),
        }
    }

    /// A reader over a payload nested inside whatever this reader currently has open.
    pub(crate) fn nested(&self, data: &'a [u8]) -> Self {
        Self {
            cursor: ReadCursor::new(data),
            depth: self.depth.nested(),
        }
    }

    /// Direct access to the cursor, for payload formats this reader doesn't cover.
    pub fn cursor(&mut self) -> &mut ReadCursor<'a> {
        &mut self.cursor
    }

    /// How many objects are currently open, including any this reader is nested inside.
    pub fn depth(&self) -> usize {
        self.depth.depth()
    }

    /// Read an object header. Fields can then be pulled with [`next_field`](Self::next_field)
    /// until it returns `None`.
    pub fn begin_object(&mut self) -> Result<Envelope> {
        let envelope = open_read(&mut self.cursor)?;
        self.depth.enter(envelope.end())?;
        Ok(envelope)
    }

    /// Read the next field header in `envelope`, or `None` once the end is reached.
    ///
    /// The cursor must be at a field boundary; [`read_fields`](Self::read_fields) takes care of
    /// that by calling [`finish_field`](Self::finish_field) after every field.
    pub fn next_field(&mut self, envelope: &Envelope) -> Result<Option<FieldHeader>> {
        if self.cursor.position() >= envelope.end() {
            return Ok(None);
        }
        // The header itself may not reach past the object either
        let mut bounded = self.cursor.bounded(envelope.end())?;
        let header = read_header(&mut bounded)?;
        self.cursor.seek(header.start)?;
        if header.end() > envelope.end() {
            return Err(Error::OutOfBounds {
                step: "field size",
                position: header.start,
                needed: header.size as usize,
                available: envelope.end().saturating_sub(header.start),
            });
        }
        Ok(Some(header))
    }

    /// Move to the end of a field, wherever its reader left the cursor.
    pub fn finish_field(&mut self, header: &FieldHeader) -> Result<()> {
        self.cursor.seek(header.end())
    }

    /// Skip a field this reader doesn't know about.
    pub fn skip(&mut self, header: &FieldHeader) -> Result<()> {
        let end = self.depth.innermost().unwrap_or_else(|| self.cursor.len());
        envelope::skip(&mut self.cursor, header, end)
    }

    /// Close `envelope`, leaving the cursor exactly at its end.
    pub fn end_object(&mut self, envelope: Envelope) -> Result<()> {
        self.depth.exit(envelope.end())?;
        self.cursor.seek(envelope.end())
    }

    /// Read one object, handing each field to `f`. Fields `f` doesn't recognize should be passed
    /// to [`skip`](Self::skip).
    pub fn read_fields<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &FieldHeader) -> Result<()>,
    {
        let envelope = self.begin_object()?;
        while let Some(header) = self.next_field(&envelope)? {
            f(self, &header)?;
            self.finish_field(&header)?;
        }
        self.end_object(envelope)
    }

    fn payload(&mut self, header: &FieldHeader) -> Result<&'a [u8]> {
        self.cursor.seek(header.start)?;
        self.cursor.read_bytes(header.size as usize)
    }

    /// Run `f` unless the field is present but empty, in which case the value is null.
    pub fn read_nullable<T, F>(&mut self, header: &FieldHeader, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Self, &FieldHeader) -> Result<T>,
    {
        if header.is_empty() {
            Ok(None)
        } else {
            f(self, header).map(Some)
        }
    }

    pub fn read_scalar<T: Scalar>(&mut self, header: &FieldHeader) -> Result<T> {
        check_width::<T>(header)?;
        self.cursor.seek(header.start)?;
        T::read_raw(&mut self.cursor)
    }

    /// Borrow a string field straight out of the buffer.
    pub fn read_str(&mut self, header: &FieldHeader) -> Result<&'a str> {
        let payload = self.payload(header)?;
        std::str::from_utf8(payload)
            .map_err(|e| Error::BadEncode(format!("field {}: {}", header.id, e)))
    }

    /// Read a string field. An empty payload is the empty string.
    pub fn read_string(&mut self, header: &FieldHeader) -> Result<String> {
        Ok(self.read_str(header)?.to_owned())
    }

    /// Read a string field. An empty payload is `None`.
    pub fn read_nullable_string(&mut self, header: &FieldHeader) -> Result<Option<String>> {
        self.read_nullable(header, Self::read_string)
    }

    pub fn read_byte_slice(&mut self, header: &FieldHeader) -> Result<&'a [u8]> {
        self.payload(header)
    }

    pub fn read_bytes(&mut self, header: &FieldHeader) -> Result<Vec<u8>> {
        Ok(self.payload(header)?.to_vec())
    }

    pub fn read_nullable_bytes(&mut self, header: &FieldHeader) -> Result<Option<Vec<u8>>> {
        self.read_nullable(header, Self::read_bytes)
    }

    /// Read a list of scalars. An empty payload is an empty list.
    pub fn read_scalar_list<T: Scalar>(&mut self, header: &FieldHeader) -> Result<Vec<T>> {
        if header.is_empty() {
            return Ok(Vec::new());
        }
        let mut list = ReadCursor::new(self.payload(header)?);
        let count = read_count(&mut list, header.id)?;
        let needed = count.saturating_mul(T::WIDTH as usize);
        if needed > list.remaining() {
            return Err(Error::OutOfBounds {
                step: "scalar list",
                position: header.start + list.position(),
                needed,
                available: list.remaining(),
            });
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(T::read_raw(&mut list)?);
        }
        Ok(values)
    }

    pub fn read_string_list(&mut self, header: &FieldHeader) -> Result<Vec<String>> {
        self.read_elements(header, |_, bytes| {
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| Error::BadEncode(format!("field {}: {}", header.id, e)))
        })
    }

    pub fn read_bytes_list(&mut self, header: &FieldHeader) -> Result<Vec<Vec<u8>>> {
        self.read_elements(header, |_, bytes| Ok(bytes.to_vec()))
    }

    /// Read a field holding one nested object. An empty payload is an error here; use
    /// [`read_nullable_object`](Self::read_nullable_object) if null is allowed.
    pub fn read_object<T: Parcelable>(&mut self, header: &FieldHeader) -> Result<T> {
        if header.is_empty() {
            return Err(Error::BadEncode(format!(
                "field {} holds a null object",
                header.id
            )));
        }
        let payload = self.payload(header)?;
        self.nested(payload).read_value()
    }

    pub fn read_nullable_object<T: Parcelable>(
        &mut self,
        header: &FieldHeader,
    ) -> Result<Option<T>> {
        self.read_nullable(header, Self::read_object::<T>)
    }

    /// Read a list of nested objects. Null elements are an error here; use
    /// [`read_object_list_with_nulls`](Self::read_object_list_with_nulls) if they're allowed.
    pub fn read_object_list<T: Parcelable>(&mut self, header: &FieldHeader) -> Result<Vec<T>> {
        self.read_object_list_with_nulls(header)?
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                value.ok_or_else(|| {
                    Error::BadEncode(format!(
                        "field {} has a null element at index {}",
                        header.id, index
                    ))
                })
            })
            .collect()
    }

    pub fn read_object_list_with_nulls<T: Parcelable>(
        &mut self,
        header: &FieldHeader,
    ) -> Result<Vec<Option<T>>> {
        self.read_elements(header, |reader, bytes| {
            if bytes.is_empty() {
                Ok(None)
            } else {
                reader.nested(bytes).read_value().map(Some)
            }
        })
    }

    /// Walk a list of length-prefixed elements.
    fn read_elements<T, F>(&mut self, header: &FieldHeader, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Self, &'a [u8]) -> Result<T>,
    {
        if header.is_empty() {
            return Ok(Vec::new());
        }
        let mut list = ReadCursor::new(self.payload(header)?);
        let count = read_count(&mut list, header.id)?;
        // Every element takes at least its 4-byte length
        let mut values = Vec::with_capacity(count.min(list.remaining() / 4));
        for _ in 0..count {
            let len = read_count(&mut list, header.id)?;
            let bytes = list.read_bytes(len)?;
            values.push(f(self, bytes)?);
        }
        Ok(values)
    }

    /// Decode a value with its own decode routine.
    pub(crate) fn read_value<T: Parcelable>(&mut self) -> Result<T> {
        T::read_from_parcel(self)
    }
}

/// Read an int32 list count or element length. A negative one can't be a valid extent.
pub(crate) fn read_count(cursor: &mut ReadCursor, field: u16) -> Result<usize> {
    let value = cursor.read_i32()?;
    usize::try_from(value).map_err(|_| Error::NegativeLength { field, value })
}
