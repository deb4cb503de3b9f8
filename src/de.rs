//! Deserialization through serde.
//!
//! The mirror image of [`ser`](crate::ser): the input must be one object, decoded into a struct.
//! Fields are matched to struct members by id. Ids the struct doesn't know about are skipped.
//! A member is `Some` whenever its field is present, even if the payload is empty.

use serde::de::*;

use crate::cursor::ReadCursor;
use crate::error::{Error, Result};
use crate::header::FieldHeader;
use crate::scalar::Scalar;
use crate::reader::read_count;
use crate::ser::field_ids;
use crate::{Envelope, ParcelReader};

/// Deserialize a struct from the object at the start of `data`. Trailing bytes are ignored.
pub fn from_slice<'de, T: Deserialize<'de>>(data: &'de [u8]) -> Result<T> {
    let mut r = ParcelReader::new(data);
    T::deserialize(ObjectDeserializer { r: &mut r })
}

/// Deserializer for a whole object.
struct ObjectDeserializer<'r, 'de> {
    r: &'r mut ParcelReader<'de>,
}

impl<'r, 'de> Deserializer<'de> for ObjectDeserializer<'r, 'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "parcels can only be deserialized into structs".to_string(),
        ))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let ids = field_ids(fields)?;
        let envelope = self.r.begin_object()?;
        let value = visitor.visit_map(StructAccess {
            r: &mut *self.r,
            envelope,
            fields,
            ids,
            pending: None,
        })?;
        self.r.end_object(envelope)?;
        Ok(value)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.r.read_fields(|r, field| r.skip(field))?;
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf option unit seq tuple tuple_struct
        map enum identifier ignored_any
    }
}

/// Hands the fields of one object to a struct visitor.
struct StructAccess<'r, 'de> {
    r: &'r mut ParcelReader<'de>,
    envelope: Envelope,
    fields: &'static [&'static str],
    ids: Vec<u16>,
    pending: Option<FieldHeader>,
}

impl<'r, 'de> MapAccess<'de> for StructAccess<'r, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        while let Some(header) = self.r.next_field(&self.envelope)? {
            match self.ids.iter().position(|id| *id == header.id) {
                Some(index) => {
                    self.pending = Some(header);
                    let key = value::BorrowedStrDeserializer::<Error>::new(self.fields[index]);
                    return seed.deserialize(key).map(Some);
                }
                None => self.r.skip(&header)?,
            }
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let header = self
            .pending
            .take()
            .ok_or_else(|| Error::SerdeFail("value requested before key".to_string()))?;
        let value = seed.deserialize(FieldDeserializer {
            r: &mut *self.r,
            header,
        })?;
        self.r.finish_field(&header)?;
        Ok(value)
    }
}

/// Deserializer for the value of a single field.
struct FieldDeserializer<'r, 'de> {
    r: &'r mut ParcelReader<'de>,
    header: FieldHeader,
}

impl<'r, 'de> FieldDeserializer<'r, 'de> {
    fn scalar<T: Scalar>(&mut self) -> Result<T> {
        self.r.read_scalar(&self.header)
    }
}

impl<'r, 'de> Deserializer<'de> for FieldDeserializer<'r, 'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(format!(
            "field {} needs a known type to be deserialized",
            self.header.id
        )))
    }

    fn deserialize_bool<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(self.scalar()?)
    }

    fn deserialize_i8<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i8(self.scalar()?)
    }

    fn deserialize_i16<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i16(self.scalar()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i32(self.scalar()?)
    }

    fn deserialize_i64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i64(self.scalar()?)
    }

    fn deserialize_u8<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_u8(narrow(v, self.header.id)?)
    }

    fn deserialize_u16<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_u16(narrow(v, self.header.id)?)
    }

    fn deserialize_u32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_u32(self.scalar::<i32>()? as u32)
    }

    fn deserialize_u64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_u64(self.scalar::<i64>()? as u64)
    }

    fn deserialize_f32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_f32(self.scalar()?)
    }

    fn deserialize_f64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(self.scalar()?)
    }

    fn deserialize_char<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_char(code_point(v, self.header.id)?)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.r.read_str(&self.header)?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.r.read_byte_slice(&self.header)?)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if !self.header.is_empty() {
            return Err(Error::SizeMismatch {
                field: self.header.id,
                expected: 0,
                actual: self.header.size,
            });
        }
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let payload = self.r.read_byte_slice(&self.header)?;
        let mut cursor = ReadCursor::new(payload);
        let remaining = if payload.is_empty() {
            0
        } else {
            read_count(&mut cursor, self.header.id)?
        };
        visitor.visit_seq(ListAccess {
            r: &*self.r,
            cursor,
            remaining,
            field: self.header.id,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail("maps can't be read from a parcel".to_string()))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        if self.header.is_empty() {
            return Err(Error::BadEncode(format!(
                "field {} holds a null object",
                self.header.id
            )));
        }
        let payload = self.r.read_byte_slice(&self.header)?;
        let mut child = self.r.nested(payload);
        ObjectDeserializer { r: &mut child }.deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        mut self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let index = self.scalar::<i32>()? as u32;
        visitor.visit_enum(value::U32Deserializer::<Error>::new(index))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Hands the elements of a list to a sequence visitor.
struct ListAccess<'r, 'de> {
    r: &'r ParcelReader<'de>,
    cursor: ReadCursor<'de>,
    remaining: usize,
    field: u16,
}

impl<'r, 'de> SeqAccess<'de> for ListAccess<'r, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(ElementDeserializer {
            r: self.r,
            cursor: &mut self.cursor,
            field: self.field,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        // Every element takes at least 4 bytes
        Some(self.remaining.min(self.cursor.remaining() / 4))
    }
}

/// Deserializer for one list element.
struct ElementDeserializer<'c, 'r, 'de> {
    r: &'r ParcelReader<'de>,
    cursor: &'c mut ReadCursor<'de>,
    field: u16,
}

impl<'c, 'r, 'de> ElementDeserializer<'c, 'r, 'de> {
    fn scalar<T: Scalar>(&mut self) -> Result<T> {
        T::read_raw(self.cursor)
    }

    fn prefixed(&mut self) -> Result<&'de [u8]> {
        let len = read_count(self.cursor, self.field)?;
        self.cursor.read_bytes(len)
    }
}

impl<'c, 'r, 'de> Deserializer<'de> for ElementDeserializer<'c, 'r, 'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(format!(
            "elements of field {} need a known type to be deserialized",
            self.field
        )))
    }

    fn deserialize_bool<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(self.scalar()?)
    }

    fn deserialize_i8<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i8(self.scalar()?)
    }

    fn deserialize_i16<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i16(self.scalar()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i32(self.scalar()?)
    }

    fn deserialize_i64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_i64(self.scalar()?)
    }

    fn deserialize_u8<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_u8(narrow(v, self.field)?)
    }

    fn deserialize_u16<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_u16(narrow(v, self.field)?)
    }

    fn deserialize_u32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_u32(self.scalar::<i32>()? as u32)
    }

    fn deserialize_u64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_u64(self.scalar::<i64>()? as u64)
    }

    fn deserialize_f32<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_f32(self.scalar()?)
    }

    fn deserialize_f64<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(self.scalar()?)
    }

    fn deserialize_char<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let v = self.scalar::<i32>()?;
        visitor.visit_char(code_point(v, self.field)?)
    }

    fn deserialize_str<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        let bytes = self.prefixed()?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::BadEncode(format!("field {}: {}", self.field, e)))?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.prefixed()?)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.cursor.peek_i32()? == 0 {
            self.cursor.advance(4)?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail("unit list elements aren't supported".to_string()))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail("lists can't be nested in lists".to_string()))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail("maps can't be read from a parcel".to_string()))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        mut self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let bytes = self.prefixed()?;
        if bytes.is_empty() {
            return Err(Error::BadEncode(format!(
                "field {} has a null element",
                self.field
            )));
        }
        let mut child = self.r.nested(bytes);
        ObjectDeserializer { r: &mut child }.deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        mut self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let index = self.scalar::<i32>()? as u32;
        visitor.visit_enum(value::U32Deserializer::<Error>::new(index))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

fn narrow<T: TryFrom<i32>>(v: i32, field: u16) -> Result<T> {
    T::try_from(v).map_err(|_| Error::BadEncode(format!("field {}: {} is out of range", field, v)))
}

fn code_point(v: i32, field: u16) -> Result<char> {
    char::from_u32(v as u32).ok_or_else(|| {
        Error::BadEncode(format!("field {}: 0x{:x} is not a valid char", field, v))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ser::to_vec;
    use crate::ParcelWriter;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    enum Mode {
        Off,
        On,
        Auto,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: f32,
        y: f32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Everything {
        flag: bool,
        small: u8,
        short: i16,
        count: u32,
        big: u64,
        ratio: f64,
        letter: char,
        name: String,
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        note: Option<String>,
        mode: Mode,
        origin: Point,
        path: Vec<Point>,
        tags: Vec<String>,
        maybe: Vec<Option<Point>>,
        pair: (i32, String),
        nothing: (),
    }

    #[test]
    fn round_trip_everything() {
        let value = Everything {
            flag: true,
            small: 255,
            short: -300,
            count: u32::MAX,
            big: u64::MAX,
            ratio: -2.5,
            letter: 'é',
            name: "parcel".into(),
            blob: vec![0, 1, 255],
            note: None,
            mode: Mode::Auto,
            origin: Point { x: 1.0, y: -1.0 },
            path: vec![Point { x: 0.5, y: 0.25 }],
            tags: vec!["a".into(), String::new()],
            maybe: vec![None, Some(Point { x: 2.0, y: 3.0 })],
            pair: (7, "seven".into()),
            nothing: (),
        };
        let bytes = to_vec(&value).unwrap();
        let back: Everything = from_slice(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct V1 {
        id: i32,
        name: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct V2 {
        id: i32,
        name: String,
        extra: Vec<i64>,
        #[serde(default)]
        tail: Option<Point>,
    }

    #[test]
    fn older_reader_skips_new_fields() {
        let bytes = to_vec(&V2 {
            id: 9,
            name: "new".into(),
            extra: vec![1, 2, 3],
            tail: Some(Point { x: 0.0, y: 0.0 }),
        })
        .unwrap();
        let old: V1 = from_slice(&bytes).unwrap();
        assert_eq!(
            old,
            V1 {
                id: 9,
                name: "new".into()
            }
        );
    }

    #[test]
    fn newer_reader_defaults_missing_fields() {
        #[derive(Debug, Deserialize)]
        struct V2Lenient {
            id: i32,
            #[serde(rename = "3", default)]
            extra: Vec<i64>,
            #[serde(rename = "4")]
            tail: Option<Point>,
        }
        let bytes = to_vec(&V1 {
            id: 3,
            name: "old".into(),
        })
        .unwrap();
        let new: V2Lenient = from_slice(&bytes).unwrap();
        assert_eq!(new.id, 3);
        assert!(new.extra.is_empty());
        assert!(new.tail.is_none());
    }

    #[test]
    fn present_empty_field_is_some() {
        let mut buf = Vec::new();
        let mut w = ParcelWriter::new(&mut buf);
        let mark = w.begin_object().unwrap();
        w.write_scalar(1, 1i32).unwrap();
        w.write_null(2).unwrap();
        w.end_object(mark).unwrap();

        #[derive(Deserialize)]
        struct Note {
            _id: i32,
            note: Option<String>,
        }
        let note: Note = from_slice(&buf).unwrap();
        assert_eq!(note.note.as_deref(), Some(""));
    }

    #[test]
    fn out_of_range_narrowing() {
        #[derive(Serialize)]
        struct Wide {
            v: i32,
        }
        #[derive(Debug, Deserialize)]
        struct Narrow {
            _v: u8,
        }
        let bytes = to_vec(&Wide { v: 256 }).unwrap();
        let err = from_slice::<Narrow>(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn wrong_scalar_width() {
        #[derive(Serialize)]
        struct Long {
            v: i64,
        }
        #[derive(Debug, Deserialize)]
        struct Int {
            _v: i32,
        }
        let bytes = to_vec(&Long { v: 1 }).unwrap();
        let err = from_slice::<Int>(&bytes).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { field: 1, .. }));
    }

    #[test]
    fn clashing_field_ids() {
        #[derive(Debug, Deserialize)]
        struct Clash {
            _a: i32,
            #[serde(rename = "1")]
            _b: i32,
        }
        let mut buf = Vec::new();
        let mut w = ParcelWriter::new(&mut buf);
        let mark = w.begin_object().unwrap();
        w.write_scalar(1, 5i32).unwrap();
        w.end_object(mark).unwrap();
        let err = from_slice::<Clash>(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misuse);
    }

    #[test]
    fn negative_list_count() {
        #[derive(Debug, Deserialize)]
        struct Names {
            _names: Vec<String>,
        }
        let mut buf = Vec::new();
        let mut w = ParcelWriter::new(&mut buf);
        let mark = w.begin_object().unwrap();
        w.write_framed(1, |w| {
            w.cursor().write_i32(1);
            w.cursor().write_i32(-8);
            Ok(())
        })
        .unwrap();
        w.end_object(mark).unwrap();
        let err = from_slice::<Names>(&buf).unwrap_err();
        assert!(matches!(err, Error::NegativeLength { field: 1, value: -8 }));
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn truncated_input() {
        let bytes = to_vec(&Point { x: 1.0, y: 2.0 }).unwrap();
        let err = from_slice::<Point>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }
}
