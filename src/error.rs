use std::fmt;

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`], for callers that only need to decide whether to drop
/// a message or fix their own code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A computed offset or seek target fell outside the buffer, or a length was negative.
    Bounds,
    /// The bytes are structurally wrong: bad sentinel, wrong scalar width, bad UTF-8, etc.
    Format,
    /// The caller asked the writer to do something the format can't express.
    Misuse,
}

#[derive(Debug)]
pub enum Error {
    /// Tried to read, advance, or seek past the end of the available data.
    OutOfBounds {
        step: &'static str,
        position: usize,
        needed: usize,
        available: usize,
    },
    /// A list count or element length was negative.
    NegativeLength { field: u16, value: i32 },
    /// An object header didn't carry the object sentinel as its field id.
    BadSentinel { found: u16 },
    /// A fixed-width field declared a payload size other than the width of its type.
    SizeMismatch {
        field: u16,
        expected: u32,
        actual: u32,
    },
    /// Basic encoding failure: invalid UTF-8, values out of range, missing fields, and so on.
    BadEncode(String),
    /// The writer was used in a way that cannot produce a valid parcel.
    Misuse(String),
    /// Object nesting went past [`MAX_DEPTH`](crate::MAX_DEPTH) while reading. The writer reports
    /// the same limit as [`Error::Misuse`].
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::OutOfBounds { .. } | Error::NegativeLength { .. } => ErrorKind::Bounds,
            Error::BadSentinel { .. }
            | Error::SizeMismatch { .. }
            | Error::BadEncode(_)
            | Error::ParseLimit(_)
            | Error::SerdeFail(_) => ErrorKind::Format,
            Error::Misuse(_) => ErrorKind::Misuse,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::OutOfBounds {
                step,
                position,
                needed,
                available,
            } => write!(
                f,
                "Out of bounds on step [{}]: needed {} bytes at position {}, but only {} are available",
                step, needed, position, available
            ),
            Error::NegativeLength { field, value } => {
                write!(f, "Field {} declared a negative length of {}", field, value)
            }
            Error::BadSentinel { found } => write!(
                f,
                "Expected object header 0x{:04x}, got field id 0x{:04x}",
                crate::OBJECT_MAGIC,
                found
            ),
            Error::SizeMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Field {} expected size {}, got {} (0x{:x})",
                field, expected, actual, actual
            ),
            Error::BadEncode(ref err) => write!(f, "Basic parcel encoding failure: {}", err),
            Error::Misuse(ref err) => write!(f, "Parcel writer misuse: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

/// Unwrap a value the writer was told is required. A `None` here is a bug in the calling encode
/// routine, not a wire problem, so it's reported as [`Error::Misuse`].
pub fn require<T>(field: u16, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::Misuse(format!("required field {} has no value", field)))
}

/// Unwrap a field a decode routine needs but never saw in the object.
pub fn expect_field<T>(field: u16, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::BadEncode(format!("required field {} is missing", field)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        let bounds = Error::OutOfBounds {
            step: "read u32",
            position: 2,
            needed: 4,
            available: 1,
        };
        assert_eq!(bounds.kind(), ErrorKind::Bounds);
        let negative = Error::NegativeLength {
            field: 3,
            value: -8,
        };
        assert_eq!(negative.kind(), ErrorKind::Bounds);
        assert_eq!(Error::BadSentinel { found: 1 }.kind(), ErrorKind::Format);
        assert_eq!(Error::Misuse("x".into()).kind(), ErrorKind::Misuse);
    }

    #[test]
    fn display_sentinel() {
        let err = Error::BadSentinel { found: 0x0001 };
        assert_eq!(
            err.to_string(),
            "Expected object header 0x4f45, got field id 0x0001"
        );
    }

    #[test]
    fn require_and_expect() {
        assert_eq!(require(3, Some(5)).unwrap(), 5);
        assert_eq!(require::<i32>(3, None).unwrap_err().kind(), ErrorKind::Misuse);
        assert_eq!(
            expect_field::<i32>(3, None).unwrap_err().kind(),
            ErrorKind::Format
        );
    }
}
