//! safe-parcel is a compact, self-describing binary format for passing structured messages across
//! a process boundary. Every field carries a small integer id and its own size, so a reader can
//! always step over fields it doesn't understand. That is what lets a newer writer add fields
//! without breaking older readers.
//!
//! # Wire format
//!
//! All integers are little-endian.
//!
//! - A **field** is a 32-bit header word followed by its payload. The low 16 bits of the header
//! 	are the field id (1 to 65535). The high 16 bits are the payload size, unless they're all
//! 	set (`0xFFFF`), in which case the real size follows as a second 32-bit word.
//! - An **object** is a field with the reserved id [`OBJECT_MAGIC`], always using the extended
//! 	size form, whose payload is a sequence of fields. Objects nest: a field may hold an object.
//! - **Scalars** are 4 bytes (bool, byte, short, int, float; sub-word types are widened) or 8
//! 	bytes (long, double). A scalar field with any other size is rejected.
//! - **Strings** are raw UTF-8 and **byte arrays** are raw bytes, sized by the header.
//! - **Lists** start with an int32 count. Scalars follow back to back. Strings, byte arrays, and
//! 	objects are each prefixed with an int32 length; a zero-length object element is null.
//!
//! Encoding `{1: 42, 2: "hi"}` gives exactly these 22 bytes:
//!
//! ```text
//! 45 4F FF FF  0E 00 00 00     object header, 14 bytes of content
//! 01 00 04 00  2A 00 00 00     field 1, 4 bytes: int 42
//! 02 00 02 00  68 69           field 2, 2 bytes: "hi"
//! ```
//!
//! # Absent vs. empty
//!
//! A field that never appears and a field that appears with an empty payload are different
//! things, and the format keeps them apart. Writers omit absent values (`write_opt_*`) and can
//! emit an explicit empty field with [`ParcelWriter::write_null`]. Readers choose per field:
//! `read_*` treats an empty payload as the empty value, `read_nullable_*` treats it as `None`.
//!
//! # Encoding your own types
//!
//! Implement [`Parcelable`] by hand for full control over field ids, or derive serde's
//! `Serialize`/`Deserialize` and use [`to_vec`]/[`from_slice`].

mod cursor;
mod depth_tracking;
pub mod envelope;
mod error;
mod header;
mod raw;
mod reader;
mod scalar;
mod writer;

pub mod de;
pub mod ser;

pub use cursor::{ReadCursor, WriteCursor};
pub use de::from_slice;
pub use depth_tracking::DepthTracker;
pub use envelope::{Envelope, ObjectMark};
pub use error::{expect_field, require, Error, ErrorKind, Result};
pub use header::{read_header, write_header, FieldHeader};
pub use raw::{RawField, RawFields, RawObject};
pub use reader::ParcelReader;
pub use scalar::Scalar;
pub use ser::to_vec;
pub use writer::ParcelWriter;

/// Field id reserved for object headers.
pub const OBJECT_MAGIC: u16 = 0x4F45;
/// Inline size value meaning "the real size follows in the next word".
pub const EXTENDED_SIZE: u16 = 0xFFFF;
/// Maximum nesting depth of objects, on both read and write.
pub const MAX_DEPTH: usize = 100;

/// A message type with its own encode and decode routine.
///
/// Each routine handles exactly one object: `write_to_parcel` opens and closes it, and
/// `read_from_parcel` reads it, usually through [`ParcelReader::read_fields`].
///
/// ```
/// use safe_parcel::{expect_field, Parcelable, ParcelReader, ParcelWriter, Result};
///
/// #[derive(Debug, PartialEq)]
/// struct Greeting {
///     count: i32,
///     text: Option<String>,
/// }
///
/// impl Parcelable for Greeting {
///     fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
///         let mark = w.begin_object()?;
///         w.write_scalar(1, self.count)?;
///         w.write_opt_string(2, self.text.as_deref())?;
///         w.end_object(mark)
///     }
///
///     fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
///         let mut count = None;
///         let mut text = None;
///         r.read_fields(|r, field| {
///             match field.id {
///                 1 => count = Some(r.read_scalar(field)?),
///                 2 => text = Some(r.read_string(field)?),
///                 _ => r.skip(field)?,
///             }
///             Ok(())
///         })?;
///         Ok(Greeting {
///             count: expect_field(1, count)?,
///             text,
///         })
///     }
/// }
///
/// let greeting = Greeting { count: 42, text: Some("hi".into()) };
/// let bytes = safe_parcel::encode(&greeting).unwrap();
/// assert_eq!(bytes.len(), 22);
/// assert_eq!(safe_parcel::decode::<Greeting>(&bytes).unwrap(), greeting);
/// ```
pub trait Parcelable: Sized {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()>;
    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self>;
}

/// Encode a value into a new buffer.
pub fn encode<T: Parcelable>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Encode a value onto the end of an existing buffer.
pub fn encode_into<T: Parcelable>(value: &T, buf: &mut Vec<u8>) -> Result<()> {
    let mut w = ParcelWriter::new(buf);
    w.write_nested(value)
}

/// Decode a value from the start of `data`. Anything after the value's object is ignored.
pub fn decode<T: Parcelable>(data: &[u8]) -> Result<T> {
    ParcelReader::new(data).read_value()
}

/// Decode a value that must take up all of `data`.
pub fn decode_exact<T: Parcelable>(data: &[u8]) -> Result<T> {
    let mut r = ParcelReader::new(data);
    let value = r.read_value()?;
    let extra = r.cursor().remaining();
    if extra != 0 {
        return Err(Error::BadEncode(format!(
            "{} trailing bytes after object",
            extra
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        a: i32,
        b: String,
    }

    impl Parcelable for Pair {
        fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
            let mark = w.begin_object()?;
            w.write_scalar(1, self.a)?;
            w.write_string(2, &self.b)?;
            w.end_object(mark)
        }

        fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
            let mut a = None;
            let mut b = None;
            r.read_fields(|r, field| {
                match field.id {
                    1 => a = Some(r.read_scalar(field)?),
                    2 => b = Some(r.read_string(field)?),
                    _ => r.skip(field)?,
                }
                Ok(())
            })?;
            Ok(Pair {
                a: expect_field(1, a)?,
                b: expect_field(2, b)?,
            })
        }
    }

    struct Empty;

    impl Parcelable for Empty {
        fn write_to_parcel(&self, _w: &mut ParcelWriter) -> Result<()> {
            Ok(())
        }

        fn read_from_parcel(_r: &mut ParcelReader) -> Result<Self> {
            Ok(Empty)
        }
    }

    #[test]
    fn encode_decode() {
        let pair = Pair {
            a: 42,
            b: "hi".into(),
        };
        let bytes = encode(&pair).unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(decode::<Pair>(&bytes).unwrap(), pair);
        assert_eq!(decode_exact::<Pair>(&bytes).unwrap(), pair);
    }

    #[test]
    fn encode_into_appends() {
        let pair = Pair {
            a: -1,
            b: String::new(),
        };
        let mut buf = vec![0xaa];
        encode_into(&pair, &mut buf).unwrap();
        assert_eq!(buf[0], 0xaa);
        assert_eq!(decode::<Pair>(&buf[1..]).unwrap(), pair);
    }

    #[test]
    fn trailing_bytes() {
        let mut bytes = encode(&Pair {
            a: 1,
            b: "x".into(),
        })
        .unwrap();
        bytes.push(0);
        assert!(decode::<Pair>(&bytes).is_ok());
        assert_eq!(
            decode_exact::<Pair>(&bytes).unwrap_err().kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn missing_required_field() {
        let mut buf = Vec::new();
        let mut w = ParcelWriter::new(&mut buf);
        let mark = w.begin_object().unwrap();
        w.write_scalar(1, 5i32).unwrap();
        w.end_object(mark).unwrap();
        assert_eq!(decode::<Pair>(&buf).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn encode_routine_must_write_object() {
        assert_eq!(encode(&Empty).unwrap_err().kind(), ErrorKind::Misuse);
    }
}
