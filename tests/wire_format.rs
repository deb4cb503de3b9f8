use rand::{Rng, SeedableRng};
use safe_parcel::{
    decode, encode, expect_field, from_slice, to_vec, ErrorKind, ParcelReader, ParcelWriter,
    Parcelable, Result, MAX_DEPTH,
};
use serde::{Deserialize, Serialize};

const GREETING: [u8; 22] = [
    0x45, 0x4f, 0xff, 0xff, 0x0e, 0x00, 0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x2a, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x02, 0x00, 0x68, 0x69,
];

#[derive(Debug, Clone, PartialEq)]
struct AllKinds {
    flag: bool,
    byte: i8,
    short: i16,
    int: i32,
    long: i64,
    float: f32,
    double: f64,
    name: Option<String>,
    blob: Option<Vec<u8>>,
    ints: Option<Vec<i32>>,
    names: Vec<String>,
    blobs: Vec<Vec<u8>>,
}

impl AllKinds {
    fn min() -> Self {
        AllKinds {
            flag: false,
            byte: i8::MIN,
            short: i16::MIN,
            int: i32::MIN,
            long: i64::MIN,
            float: f32::MIN,
            double: f64::MIN,
            name: None,
            blob: None,
            ints: None,
            names: Vec::new(),
            blobs: Vec::new(),
        }
    }

    fn max() -> Self {
        AllKinds {
            flag: true,
            byte: i8::MAX,
            short: i16::MAX,
            int: i32::MAX,
            long: i64::MAX,
            float: f32::MAX,
            double: f64::MAX,
            name: Some("ünïcode ✓".into()),
            blob: Some(vec![0x00, 0xff, 0x7f]),
            ints: Some(vec![i32::MIN, 0, i32::MAX]),
            names: vec!["first".into(), String::new(), "third".into()],
            blobs: vec![vec![1, 2, 3], Vec::new()],
        }
    }
}

impl Parcelable for AllKinds {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
        let mark = w.begin_object()?;
        w.write_scalar(1, self.flag)?;
        w.write_scalar(2, self.byte)?;
        w.write_scalar(3, self.short)?;
        w.write_scalar(4, self.int)?;
        w.write_scalar(5, self.long)?;
        w.write_scalar(6, self.float)?;
        w.write_scalar(7, self.double)?;
        w.write_opt_string(8, self.name.as_deref())?;
        w.write_opt_bytes(9, self.blob.as_deref())?;
        match &self.ints {
            Some(ints) => w.write_scalar_list(10, ints)?,
            None => w.write_null(10)?,
        }
        w.write_string_list(11, &self.names)?;
        w.write_bytes_list(12, &self.blobs)?;
        w.end_object(mark)
    }

    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
        let (mut flag, mut byte, mut short, mut int) = (None, None, None, None);
        let (mut long, mut float, mut double) = (None, None, None);
        let (mut name, mut blob, mut ints) = (None, None, None);
        let (mut names, mut blobs) = (Vec::new(), Vec::new());
        r.read_fields(|r, field| {
            match field.id {
                1 => flag = Some(r.read_scalar(field)?),
                2 => byte = Some(r.read_scalar(field)?),
                3 => short = Some(r.read_scalar(field)?),
                4 => int = Some(r.read_scalar(field)?),
                5 => long = Some(r.read_scalar(field)?),
                6 => float = Some(r.read_scalar(field)?),
                7 => double = Some(r.read_scalar(field)?),
                8 => name = Some(r.read_string(field)?),
                9 => blob = Some(r.read_bytes(field)?),
                10 => ints = r.read_nullable(field, |r, f| r.read_scalar_list(f))?,
                11 => names = r.read_string_list(field)?,
                12 => blobs = r.read_bytes_list(field)?,
                _ => r.skip(field)?,
            }
            Ok(())
        })?;
        Ok(AllKinds {
            flag: expect_field(1, flag)?,
            byte: expect_field(2, byte)?,
            short: expect_field(3, short)?,
            int: expect_field(4, int)?,
            long: expect_field(5, long)?,
            float: expect_field(6, float)?,
            double: expect_field(7, double)?,
            name,
            blob,
            ints,
            names,
            blobs,
        })
    }
}

/// A chain of objects, each holding the next in field 2.
#[derive(Debug, Clone, PartialEq)]
struct Node {
    value: i32,
    child: Option<Box<Node>>,
}

impl Node {
    fn chain(len: usize) -> Self {
        let mut node = Node {
            value: len as i32,
            child: None,
        };
        for value in (1..len as i32).rev() {
            node = Node {
                value,
                child: Some(Box::new(node)),
            };
        }
        node
    }

    fn len(&self) -> usize {
        1 + self.child.as_ref().map_or(0, |c| c.len())
    }
}

impl Parcelable for Node {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
        let mark = w.begin_object()?;
        w.write_scalar(1, self.value)?;
        w.write_opt_object(2, self.child.as_deref())?;
        w.end_object(mark)
    }

    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
        let mut value = None;
        let mut child = None;
        r.read_fields(|r, field| {
            match field.id {
                1 => value = Some(r.read_scalar(field)?),
                2 => child = Some(Box::new(r.read_object(field)?)),
                _ => r.skip(field)?,
            }
            Ok(())
        })?;
        Ok(Node {
            value: expect_field(1, value)?,
            child,
        })
    }
}

#[derive(Debug, PartialEq)]
struct Group {
    items: Vec<Option<Node>>,
}

impl Parcelable for Group {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
        let mark = w.begin_object()?;
        w.write_object_list_with_nulls(1, &self.items)?;
        w.end_object(mark)
    }

    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
        let mut items = Vec::new();
        r.read_fields(|r, field| {
            match field.id {
                1 => items = r.read_object_list_with_nulls(field)?,
                _ => r.skip(field)?,
            }
            Ok(())
        })?;
        Ok(Group { items })
    }
}

/// Same wire layout as [`Group`], but rejects null elements.
#[derive(Debug)]
struct StrictGroup {
    _items: Vec<Node>,
}

impl Parcelable for StrictGroup {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
        let mark = w.begin_object()?;
        w.write_object_list(1, &self._items)?;
        w.end_object(mark)
    }

    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
        let mut items = Vec::new();
        r.read_fields(|r, field| {
            match field.id {
                1 => items = r.read_object_list(field)?,
                _ => r.skip(field)?,
            }
            Ok(())
        })?;
        Ok(StrictGroup { _items: items })
    }
}

#[derive(Debug, PartialEq)]
struct Greeting {
    number: i32,
    text: String,
}

impl Parcelable for Greeting {
    fn write_to_parcel(&self, w: &mut ParcelWriter) -> Result<()> {
        let mark = w.begin_object()?;
        w.write_scalar(1, self.number)?;
        w.write_string(2, &self.text)?;
        w.end_object(mark)
    }

    fn read_from_parcel(r: &mut ParcelReader) -> Result<Self> {
        let mut number = None;
        let mut text = None;
        r.read_fields(|r, field| {
            match field.id {
                1 => number = Some(r.read_scalar(field)?),
                2 => text = Some(r.read_string(field)?),
                _ => r.skip(field)?,
            }
            Ok(())
        })?;
        Ok(Greeting {
            number: expect_field(1, number)?,
            text: expect_field(2, text)?,
        })
    }
}

#[test]
fn greeting_bytes() {
    let greeting = Greeting {
        number: 42,
        text: "hi".into(),
    };
    let bytes = encode(&greeting).unwrap();
    assert_eq!(bytes, GREETING);
    assert_eq!(decode::<Greeting>(&GREETING).unwrap(), greeting);
}

#[test]
fn greeting_bytes_through_serde() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SerdeGreeting {
        number: i32,
        text: String,
    }
    let value = SerdeGreeting {
        number: 42,
        text: "hi".into(),
    };
    assert_eq!(to_vec(&value).unwrap(), GREETING);
    assert_eq!(from_slice::<SerdeGreeting>(&GREETING).unwrap(), value);
}

#[test]
fn round_trip_extremes() {
    for value in [AllKinds::min(), AllKinds::max()] {
        let bytes = encode(&value).unwrap();
        assert_eq!(decode::<AllKinds>(&bytes).unwrap(), value);
    }
}

#[test]
fn empty_and_absent_stay_distinct() {
    let mut empty = AllKinds::min();
    empty.name = Some(String::new());
    empty.blob = Some(Vec::new());
    empty.ints = Some(Vec::new());
    let absent = AllKinds::min();

    let empty_bytes = encode(&empty).unwrap();
    let absent_bytes = encode(&absent).unwrap();
    assert_ne!(empty_bytes, absent_bytes);

    let back = decode::<AllKinds>(&empty_bytes).unwrap();
    assert_eq!(back.name.as_deref(), Some(""));
    assert_eq!(back.blob.as_deref(), Some(&[][..]));
    assert_eq!(back.ints.as_deref(), Some(&[][..]));

    let back = decode::<AllKinds>(&absent_bytes).unwrap();
    assert_eq!(back.name, None);
    assert_eq!(back.blob, None);
    assert_eq!(back.ints, None);
}

#[test]
fn empty_list_holds_a_count() {
    let mut buf = Vec::new();
    let mut w = ParcelWriter::new(&mut buf);
    let mark = w.begin_object().unwrap();
    w.write_scalar_list::<i64>(1, &[]).unwrap();
    w.write_null(2).unwrap();
    w.end_object(mark).unwrap();
    assert_eq!(
        &buf[8..],
        &[0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
    );
}

#[test]
fn three_levels_of_nesting() {
    let node = Node::chain(3);
    let bytes = encode(&node).unwrap();
    let back = decode::<Node>(&bytes).unwrap();
    assert_eq!(back.len(), 3);
    assert_eq!(back, node);
}

#[test]
fn nesting_limit() {
    let bytes = encode(&Node::chain(MAX_DEPTH)).unwrap();
    assert_eq!(decode::<Node>(&bytes).unwrap().len(), MAX_DEPTH);

    // Writing past the limit is a caller error
    let err = encode(&Node::chain(MAX_DEPTH + 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Misuse);

    // Reading past it is a format error. Each level is an object holding the next in field 2.
    let mut bytes = vec![0x45, 0x4f, 0xff, 0xff, 0, 0, 0, 0];
    for _ in 0..MAX_DEPTH {
        let inner = bytes;
        bytes = vec![0x45, 0x4f, 0xff, 0xff];
        bytes.extend_from_slice(&(inner.len() as u32 + 8).to_le_bytes());
        bytes.extend_from_slice(&[0x02, 0x00, 0xff, 0xff]);
        bytes.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&inner);
    }
    let err = decode::<Node>(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[derive(Serialize)]
struct SerdeNode {
    value: i32,
    child: Option<Box<SerdeNode>>,
}

impl SerdeNode {
    fn chain(len: usize) -> Self {
        let mut node = SerdeNode {
            value: len as i32,
            child: None,
        };
        for value in (1..len as i32).rev() {
            node = SerdeNode {
                value,
                child: Some(Box::new(node)),
            };
        }
        node
    }
}

#[test]
fn serde_and_hand_written_bytes_agree() {
    assert_eq!(
        to_vec(&SerdeNode::chain(4)).unwrap(),
        encode(&Node::chain(4)).unwrap()
    );

    #[derive(Serialize)]
    struct SerdeGroup {
        items: Vec<Option<SerdeNode>>,
    }
    let serde_group = SerdeGroup {
        items: vec![Some(SerdeNode::chain(2)), None, Some(SerdeNode::chain(1))],
    };
    let group = Group {
        items: vec![Some(Node::chain(2)), None, Some(Node::chain(1))],
    };
    assert_eq!(to_vec(&serde_group).unwrap(), encode(&group).unwrap());

    // Big enough that the list needs the extended size form
    #[derive(Serialize)]
    struct Words {
        words: Vec<String>,
    }
    let words: Vec<String> = (0..20_000).map(|i| format!("w{:03}", i % 1000)).collect();
    let mut buf = Vec::new();
    let mut w = ParcelWriter::new(&mut buf);
    let mark = w.begin_object().unwrap();
    w.write_string_list(1, &words).unwrap();
    w.end_object(mark).unwrap();
    let serde_bytes = to_vec(&Words { words }).unwrap();
    assert_eq!(&serde_bytes[8..12], &[0x01, 0x00, 0xff, 0xff]);
    assert_eq!(serde_bytes, buf);
}

#[test]
fn list_with_null_element() {
    let group = Group {
        items: vec![
            Some(Node::chain(1)),
            None,
            Some(Node::chain(2)),
        ],
    };
    let bytes = encode(&group).unwrap();
    assert_eq!(decode::<Group>(&bytes).unwrap(), group);

    let err = decode::<StrictGroup>(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn reader_skips_newer_fields() {
    let mut buf = Vec::new();
    let mut w = ParcelWriter::new(&mut buf);
    let mark = w.begin_object().unwrap();
    w.write_scalar(1, 7i32).unwrap();
    w.write_scalar_list(3, &[1.0f64, 2.0, 3.0]).unwrap();
    w.write_string(2, "seven").unwrap();
    w.write_object(4, &Node::chain(2)).unwrap();
    w.end_object(mark).unwrap();
    buf.extend_from_slice(&GREETING);

    // A reader that only knows ids 1 and 2 gets its fields, and ends up on the next object
    let mut r = ParcelReader::new(&buf);
    let greeting: Greeting = Parcelable::read_from_parcel(&mut r).unwrap();
    assert_eq!(
        greeting,
        Greeting {
            number: 7,
            text: "seven".into()
        }
    );
    let next: Greeting = Parcelable::read_from_parcel(&mut r).unwrap();
    assert_eq!(next.number, 42);
    assert_eq!(r.cursor().remaining(), 0);
}

#[test]
fn under_reading_field_still_lands_on_next() {
    let mut buf = Vec::new();
    let mut w = ParcelWriter::new(&mut buf);
    let mark = w.begin_object().unwrap();
    w.write_string(1, "a long string nobody reads in full").unwrap();
    w.write_scalar(2, 99i32).unwrap();
    w.end_object(mark).unwrap();

    let mut after = None;
    ParcelReader::new(&buf)
        .read_fields(|r, field| {
            match field.id {
                1 => {
                    r.cursor().read_bytes(1)?;
                }
                2 => after = Some(r.read_scalar::<i32>(field)?),
                _ => r.skip(field)?,
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(after, Some(99));
}

#[test]
fn large_field_uses_extended_size() {
    let data: Vec<u8> = (0..100_000u32).map(|i| i as u8).collect();
    let mut value = AllKinds::min();
    value.blob = Some(data.clone());
    let bytes = encode(&value).unwrap();

    let mut blob_header = None;
    ParcelReader::new(&bytes)
        .read_fields(|r, field| {
            if field.id == 9 {
                blob_header = Some(*field);
            }
            r.skip(field)
        })
        .unwrap();
    let header = blob_header.unwrap();
    assert_eq!(header.size, 100_000);
    // Extended form: inline bits all set, then 0x000186a0
    let at = header.start - 8;
    assert_eq!(
        &bytes[at..header.start],
        &[0x09, 0x00, 0xff, 0xff, 0xa0, 0x86, 0x01, 0x00]
    );
    assert_eq!(decode::<AllKinds>(&bytes).unwrap().blob, Some(data));
}

#[test]
fn every_truncation_is_a_bounds_error() {
    let bytes = encode(&AllKinds::max()).unwrap();
    for len in 0..bytes.len() {
        let err = decode::<AllKinds>(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds, "truncated to {} bytes", len);
    }
}

#[test]
fn truncated_payload_inside_object() {
    // The object claims its full size, but a field inside claims more than is left
    let mut bytes = encode(&Greeting {
        number: 1,
        text: "abc".into(),
    })
    .unwrap();
    // Field 2's inline size: 3 -> 4
    bytes[18] = 4;
    let err = decode::<Greeting>(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
}

#[test]
fn random_corruption_never_panics() {
    let original = encode(&AllKinds::max()).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5afe);
    for _ in 0..2000 {
        let mut bytes = original.clone();
        for _ in 0..rng.gen_range(1..4) {
            let at = rng.gen_range(0..bytes.len());
            bytes[at] = rng.gen();
        }
        let _ = decode::<AllKinds>(&bytes);
        let _ = safe_parcel::RawObject::parse(&bytes).map(|o| o.fields().count());
    }
    for _ in 0..500 {
        let len = rng.gen_range(0..64);
        let mut bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        if bytes.len() >= 4 && rng.gen_bool(0.5) {
            bytes[0..4].copy_from_slice(&[0x45, 0x4f, 0xff, 0xff]);
        }
        let _ = decode::<Node>(&bytes);
    }
}
