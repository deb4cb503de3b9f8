//! Schema-less access to the fields of an object.
//!
//! Nothing here knows what a field means. A [`RawObject`] yields each field's id and payload
//! bytes, which is enough to inspect a parcel, dump it, or check that its framing holds together.

use crate::cursor::ReadCursor;
use crate::envelope::{checked_end, open_read};
use crate::error::{Error, Result};
use crate::header::read_header;
use crate::scalar::Scalar;

/// One object, with its content borrowed from the original buffer.
#[derive(Clone, Copy, Debug)]
pub struct RawObject<'a> {
    content: &'a [u8],
    encoded_len: usize,
}

impl<'a> RawObject<'a> {
    /// Parse the object header at the start of `data`. Bytes after the object are ignored.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut cursor = ReadCursor::new(data);
        let envelope = open_read(&mut cursor)?;
        Ok(Self {
            content: &data[envelope.start()..envelope.end()],
            encoded_len: envelope.end(),
        })
    }

    /// Length of the object, header included.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// The encoded fields, without the object header.
    pub fn content(&self) -> &'a [u8] {
        self.content
    }

    pub fn fields(&self) -> RawFields<'a> {
        RawFields {
            cursor: ReadCursor::new(self.content),
            errored: false,
        }
    }

    /// Find the first field with the given id.
    pub fn field(&self, id: u16) -> Result<Option<RawField<'a>>> {
        for field in self.fields() {
            let field = field?;
            if field.id == id {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }
}

/// Iterator over the fields of a [`RawObject`]. Stops for good after the first error.
#[derive(Clone, Debug)]
pub struct RawFields<'a> {
    cursor: ReadCursor<'a>,
    errored: bool,
}

impl<'a> RawFields<'a> {
    fn next_field(&mut self) -> Result<RawField<'a>> {
        let header = read_header(&mut self.cursor)?;
        checked_end(&self.cursor, &header, "field size")?;
        let payload = self.cursor.read_bytes(header.size as usize)?;
        Ok(RawField {
            id: header.id,
            payload,
        })
    }
}

impl<'a> Iterator for RawFields<'a> {
    type Item = Result<RawField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored || self.cursor.remaining() == 0 {
            return None;
        }
        let result = self.next_field();
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}

/// A single field: its id and undecoded payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawField<'a> {
    pub id: u16,
    pub payload: &'a [u8],
}

impl<'a> RawField<'a> {
    /// True if the field is present with an empty payload.
    pub fn is_null(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_scalar<T: Scalar>(&self) -> Result<T> {
        if self.payload.len() != T::WIDTH as usize {
            return Err(Error::SizeMismatch {
                field: self.id,
                expected: T::WIDTH,
                actual: self.payload.len() as u32,
            });
        }
        T::read_raw(&mut ReadCursor::new(self.payload))
    }

    pub fn as_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.payload)
            .map_err(|e| Error::BadEncode(format!("field {}: {}", self.id, e)))
    }

    /// Treat the payload as a nested object.
    pub fn as_object(&self) -> Result<RawObject<'a>> {
        RawObject::parse(self.payload)
    }

    /// Whether the payload starts with an object header.
    pub fn looks_like_object(&self) -> bool {
        self.payload.len() >= 4
            && self.payload[0..2] == crate::OBJECT_MAGIC.to_le_bytes()
            && self.payload[2..4] == [0xff, 0xff]
    }
}
