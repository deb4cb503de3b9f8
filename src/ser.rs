//! Serialization through serde.
//!
//! A serialized value must be a struct, which becomes one object. Each struct field becomes a
//! parcel field. Its id is the field's position in the struct, counting from 1, unless the field
//! is renamed to a decimal number: `#[serde(rename = "7")]` puts it at id 7.
//!
//! Field values map as follows:
//! - Integers, floats, and bool - Scalar fields. `u8` and `u16` widen into an int32, `u32` and
//! 	`u64` are stored bit-for-bit as int32 and int64, and `char` is its int32 code point.
//! - Strings and bytes - Raw payload fields. `Vec<u8>` is a list unless it goes through
//! 	`serde_bytes`.
//! - `None` - The field is left out.
//! - Unit - A field with an empty payload.
//! - Unit enum variants - The variant index as an int32.
//! - Sequences and tuples - Count-prefixed lists. Strings, bytes, and structs in a list are
//! 	length-prefixed, and a `None` element is stored with length zero.
//! - Structs - Nested objects.
//!
//! Maps and enum variants carrying data have no representation and fail to serialize.

use serde::ser::*;

use crate::envelope::{
    close_element_frame, close_frame, open_element_frame, open_field_frame, FieldFrame,
};
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::writer::{element_len, list_count};
use crate::{ObjectMark, ParcelWriter};

/// Serialize a struct into a new buffer.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut w = ParcelWriter::new(&mut buf);
        value.serialize(ObjectSerializer { w: &mut w })?;
        if w.depth() != 0 {
            return Err(Error::Misuse("object left open".to_string()));
        }
    }
    Ok(buf)
}

/// Work out the field id for a struct field.
pub(crate) fn field_id(name: &str, index: usize) -> Result<u16> {
    if let Ok(id) = name.parse::<u16>() {
        return Ok(id);
    }
    u16::try_from(index + 1)
        .map_err(|_| Error::Misuse(format!("struct has too many fields for field {}", name)))
}

/// Field ids for a whole struct, in declaration order. Two fields may not share an id.
pub(crate) fn field_ids(names: &[&str]) -> Result<Vec<u16>> {
    let mut ids = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let id = field_id(name, index)?;
        claim_id(&mut ids, id)?;
    }
    Ok(ids)
}

fn claim_id(used: &mut Vec<u16>, id: u16) -> Result<()> {
    if used.contains(&id) {
        return Err(Error::Misuse(format!("Field id {} is used twice", id)));
    }
    used.push(id);
    Ok(())
}

fn unsupported(what: &str) -> Error {
    Error::Misuse(format!("{} can't be represented in a parcel", what))
}

/// Where a struct's object sits, so it can be closed properly.
enum Frame {
    /// The top-level object.
    Root,
    /// An object inside a field.
    Field(FieldFrame),
    /// An object inside a list element; holds the element's content start.
    Element(usize),
}

/// Serializer for a whole object. Only structs are accepted.
struct ObjectSerializer<'w, 'b> {
    w: &'w mut ParcelWriter<'b>,
}

impl<'w, 'b> ObjectSerializer<'w, 'b> {
    fn fail(what: &str) -> Error {
        Error::Misuse(format!("expected a struct at the top level, received {}", what))
    }
}

impl<'w, 'b> Serializer for ObjectSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = StructSerializer<'w, 'b>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        StructSerializer::new(self.w, Frame::Root)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        let mark = self.w.begin_object()?;
        self.w.end_object(mark)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_bool(self, _: bool) -> Result<()> {
        Err(Self::fail("bool"))
    }

    fn serialize_i8(self, _: i8) -> Result<()> {
        Err(Self::fail("i8"))
    }

    fn serialize_i16(self, _: i16) -> Result<()> {
        Err(Self::fail("i16"))
    }

    fn serialize_i32(self, _: i32) -> Result<()> {
        Err(Self::fail("i32"))
    }

    fn serialize_i64(self, _: i64) -> Result<()> {
        Err(Self::fail("i64"))
    }

    fn serialize_u8(self, _: u8) -> Result<()> {
        Err(Self::fail("u8"))
    }

    fn serialize_u16(self, _: u16) -> Result<()> {
        Err(Self::fail("u16"))
    }

    fn serialize_u32(self, _: u32) -> Result<()> {
        Err(Self::fail("u32"))
    }

    fn serialize_u64(self, _: u64) -> Result<()> {
        Err(Self::fail("u64"))
    }

    fn serialize_f32(self, _: f32) -> Result<()> {
        Err(Self::fail("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<()> {
        Err(Self::fail("f64"))
    }

    fn serialize_char(self, _: char) -> Result<()> {
        Err(Self::fail("char"))
    }

    fn serialize_str(self, _: &str) -> Result<()> {
        Err(Self::fail("str"))
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<()> {
        Err(Self::fail("bytes"))
    }

    fn serialize_none(self) -> Result<()> {
        Err(Self::fail("None"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<()> {
        Err(Self::fail("Some"))
    }

    fn serialize_unit(self) -> Result<()> {
        Err(Self::fail("unit"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        Err(Self::fail("unit_variant"))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(Self::fail("newtype_variant"))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Self::fail("seq"))
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Err(Self::fail("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Self::fail("tuple_struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Self::fail("tuple_variant"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Self::fail("map"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Self::fail("struct_variant"))
    }
}

/// Writes the fields of one struct into an open object.
struct StructSerializer<'w, 'b> {
    w: &'w mut ParcelWriter<'b>,
    mark: ObjectMark,
    frame: Frame,
    index: usize,
    used: Vec<u16>,
}

impl<'w, 'b> StructSerializer<'w, 'b> {
    fn new(w: &'w mut ParcelWriter<'b>, frame: Frame) -> Result<Self> {
        let mark = w.begin_object()?;
        Ok(Self {
            w,
            mark,
            frame,
            index: 0,
            used: Vec::new(),
        })
    }

    /// Take the id of the next field in declaration order.
    fn next_id(&mut self, key: &str) -> Result<u16> {
        let id = field_id(key, self.index)?;
        self.index += 1;
        claim_id(&mut self.used, id)?;
        Ok(id)
    }
}

impl<'w, 'b> SerializeStruct for StructSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        let id = self.next_id(key)?;
        value.serialize(FieldSerializer {
            w: &mut *self.w,
            id,
        })
    }

    fn skip_field(&mut self, key: &'static str) -> Result<()> {
        self.next_id(key).map(|_| ())
    }

    fn end(self) -> Result<()> {
        self.w.end_object(self.mark)?;
        match self.frame {
            Frame::Root => Ok(()),
            Frame::Field(frame) => close_frame(self.w.cursor(), frame).map(|_| ()),
            Frame::Element(start) => close_element_frame(self.w.cursor(), start),
        }
    }
}

/// Serializer for the value of a single field.
struct FieldSerializer<'w, 'b> {
    w: &'w mut ParcelWriter<'b>,
    id: u16,
}

impl<'w, 'b> Serializer for FieldSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = ListSerializer<'w, 'b>;
    type SerializeTuple = ListSerializer<'w, 'b>;
    type SerializeTupleStruct = ListSerializer<'w, 'b>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = StructSerializer<'w, 'b>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.w.write_scalar(self.id, v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_i32(v as u32 as i32)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.w.write_string(self.id, v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.w.write_bytes(self.id, v)
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.w.write_null(self.id)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.serialize_u32(variant_index)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        ListSerializer::new(self.w, self.id)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        ListSerializer::new(self.w, self.id)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        ListSerializer::new(self.w, self.id)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        let frame = open_field_frame(self.w.cursor(), self.id)?;
        StructSerializer::new(self.w, Frame::Field(frame))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unsupported("enum variant with data"))
    }
}

/// Writes a count-prefixed list into a field.
///
/// The count isn't known up front for every sequence, so it starts as a placeholder and is
/// patched in `end`, along with the field size.
struct ListSerializer<'w, 'b> {
    w: &'w mut ParcelWriter<'b>,
    frame: FieldFrame,
    count: usize,
}

impl<'w, 'b> ListSerializer<'w, 'b> {
    fn new(w: &'w mut ParcelWriter<'b>, id: u16) -> Result<Self> {
        let frame = open_field_frame(w.cursor(), id)?;
        w.cursor().write_i32(0);
        Ok(Self {
            w,
            frame,
            count: 0,
        })
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.count += 1;
        value.serialize(ElementSerializer {
            w: &mut *self.w,
            nullable: false,
        })
    }

    fn finish(self) -> Result<()> {
        let count = list_count(self.count)?;
        let cursor = self.w.cursor();
        let end = cursor.position();
        cursor.seek(self.frame.content_start())?;
        cursor.write_i32(count);
        cursor.seek(end)?;
        close_frame(cursor, self.frame)?;
        Ok(())
    }
}

impl<'w, 'b> SerializeSeq for ListSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'w, 'b> SerializeTuple for ListSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'w, 'b> SerializeTupleStruct for ListSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Serializer for one list element.
///
/// `nullable` is set once the element has gone through `Some`. A `None` element is written as
/// length zero, so a `Some` element must be something length-prefixed and non-empty to stay
/// distinguishable from it.
struct ElementSerializer<'w, 'b> {
    w: &'w mut ParcelWriter<'b>,
    nullable: bool,
}

impl<'w, 'b> ElementSerializer<'w, 'b> {
    fn scalar<T: Scalar>(self, v: T) -> Result<()> {
        if self.nullable {
            return Err(unsupported("optional list element of scalar type"));
        }
        v.write_raw(self.w.cursor());
        Ok(())
    }

    fn prefixed(self, v: &[u8]) -> Result<()> {
        if self.nullable && v.is_empty() {
            return Err(unsupported("empty optional list element"));
        }
        let len = element_len(v.len())?;
        let cursor = self.w.cursor();
        cursor.write_i32(len);
        cursor.write_bytes(v);
        Ok(())
    }
}

impl<'w, 'b> Serializer for ElementSerializer<'w, 'b> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = StructSerializer<'w, 'b>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.scalar(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.scalar(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.scalar(v as i32)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.scalar(v as i64)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.scalar(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.scalar(v as u32 as i32)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.prefixed(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.prefixed(v)
    }

    fn serialize_none(self) -> Result<()> {
        self.w.cursor().write_i32(0);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(ElementSerializer {
            w: self.w,
            nullable: true,
        })
    }

    fn serialize_unit(self) -> Result<()> {
        Err(unsupported("unit list element"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Err(unsupported("unit list element"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.serialize_u32(variant_index)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(unsupported("list nested in a list"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(unsupported("list nested in a list"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(unsupported("list nested in a list"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        let start = open_element_frame(self.w.cursor());
        StructSerializer::new(self.w, Frame::Element(start))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unsupported("enum variant with data"))
    }
}
