//! Thrift binary protocol codec.
//!
//! Message format (strict): `[0x8001:2][0x00][type:1][name:i32 len + bytes][seqid:i32][struct]`
//!
//! - integers are big-endian, strings are length-prefixed with an `i32`
//! - a struct is a sequence of `[type:1][id:i16][value]` fields closed by a `STOP` byte
//! - a list or set is `[element type:1][size:i32]` followed by the elements
//! - a map is `[key type:1][value type:1][size:i32]` followed by the pairs
//!
//! Values are decoded into the generic [`Value`] tree, so fields of any type
//! can be read (or ignored) without generated code.

mod decode;
mod encode;

pub use decode::decode_message;
pub use encode::encode_message;

/// Strict protocol version marker in the upper half of the first header word.
pub const VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of the first header word.
pub const VERSION_MASK: u32 = 0xffff_0000;

/// Upper bound on any single length prefix, to reject garbage before allocating.
pub const MAX_LENGTH: usize = 16 * 1024 * 1024;

/// Maximum nesting of structs and containers.
pub const MAX_DEPTH: usize = 64;

/// Wire codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThriftError {
    /// Not enough data yet to decode a whole message.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    Incomplete {
        /// Minimum bytes required to make progress.
        needed: usize,
        /// Bytes available.
        have: usize,
    },
    /// First header word is not a strict version-1 header.
    #[error("bad protocol version header {0:#010x}")]
    BadVersion(u32),
    /// Unknown message type byte.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    /// Unknown field or element type byte.
    #[error("unknown field type {0}")]
    UnknownType(u8),
    /// Negative or oversized length prefix.
    #[error("invalid length prefix {0}")]
    InvalidLength(i64),
    /// Message name is not UTF-8.
    #[error("message name is not valid UTF-8")]
    InvalidUtf8,
    /// Structs or containers nested deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH}")]
    TooDeep,
}

/// Wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TType {
    /// End of struct marker.
    Stop = 0,
    /// Boolean, one byte.
    Bool = 2,
    /// Signed byte.
    Byte = 3,
    /// 64-bit float.
    Double = 4,
    /// 16-bit integer.
    I16 = 6,
    /// 32-bit integer.
    I32 = 8,
    /// 64-bit integer.
    I64 = 10,
    /// Binary or UTF-8 string.
    String = 11,
    /// Nested struct.
    Struct = 12,
    /// Map.
    Map = 13,
    /// Set.
    Set = 14,
    /// List.
    List = 15,
}

impl TType {
    /// Parses a type byte.
    ///
    /// # Errors
    ///
    /// Returns [`ThriftError::UnknownType`] for unassigned codes.
    pub fn from_byte(byte: u8) -> Result<Self, ThriftError> {
        Ok(match byte {
            0 => Self::Stop,
            2 => Self::Bool,
            3 => Self::Byte,
            4 => Self::Double,
            6 => Self::I16,
            8 => Self::I32,
            10 => Self::I64,
            11 => Self::String,
            12 => Self::Struct,
            13 => Self::Map,
            14 => Self::Set,
            15 => Self::List,
            other => return Err(ThriftError::UnknownType(other)),
        })
    }
}

/// Kind of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Request expecting a reply.
    Call = 1,
    /// Successful reply (possibly carrying a declared exception).
    Reply = 2,
    /// Application-level failure raised by the server.
    Exception = 3,
    /// Request with no reply.
    Oneway = 4,
}

impl MessageType {
    /// Parses a message type byte.
    ///
    /// # Errors
    ///
    /// Returns [`ThriftError::UnknownMessageType`] for unassigned codes.
    pub fn from_byte(byte: u8) -> Result<Self, ThriftError> {
        Ok(match byte {
            1 => Self::Call,
            2 => Self::Reply,
            3 => Self::Exception,
            4 => Self::Oneway,
            other => return Err(ThriftError::UnknownMessageType(other)),
        })
    }
}

/// A decoded or to-be-encoded value.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    /// Strings travel as binary; see [`Value::as_str`].
    Binary(Vec<u8>),
    Struct(Vec<Field>),
    /// Element type, elements.
    List(TType, Vec<Value>),
    /// Element type, elements.
    Set(TType, Vec<Value>),
    /// Key type, value type, pairs.
    Map(TType, TType, Vec<(Value, Value)>),
}

impl Value {
    /// UTF-8 string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Binary(s.into().into_bytes())
    }

    /// List of UTF-8 strings.
    pub fn string_list<S: AsRef<str>>(items: &[S]) -> Self {
        Self::List(TType::String, items.iter().map(|s| Self::string(s.as_ref())).collect())
    }

    /// Wire type of this value.
    #[must_use]
    pub fn ttype(&self) -> TType {
        match self {
            Self::Bool(_) => TType::Bool,
            Self::Byte(_) => TType::Byte,
            Self::I16(_) => TType::I16,
            Self::I32(_) => TType::I32,
            Self::I64(_) => TType::I64,
            Self::Double(_) => TType::Double,
            Self::Binary(_) => TType::String,
            Self::Struct(_) => TType::Struct,
            Self::List(..) => TType::List,
            Self::Set(..) => TType::Set,
            Self::Map(..) => TType::Map,
        }
    }

    /// The value as UTF-8 text, if it is a valid string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// The value as an `i32`, if it is one.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }
}

/// One struct field: id and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field id from the IDL.
    pub id: i16,
    /// Field value.
    pub value: Value,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub fn new(id: i16, value: Value) -> Self {
        Self { id, value }
    }
}

/// A whole protocol message: header plus the argument or result struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Remote method name.
    pub name: String,
    /// Message kind.
    pub kind: MessageType,
    /// Sequence id echoed by the server.
    pub seqid: i32,
    /// Fields of the argument, result, or exception struct.
    pub body: Vec<Field>,
}

impl Message {
    /// A call message.
    pub fn call(name: impl Into<String>, seqid: i32, body: Vec<Field>) -> Self {
        Self { name: name.into(), kind: MessageType::Call, seqid, body }
    }

    /// A reply message.
    pub fn reply(name: impl Into<String>, seqid: i32, body: Vec<Field>) -> Self {
        Self { name: name.into(), kind: MessageType::Reply, seqid, body }
    }

    /// Looks up a body field by id.
    #[must_use]
    pub fn field(&self, id: i16) -> Option<&Value> {
        self.body.iter().find(|f| f.id == id).map(|f| &f.value)
    }
}

/// Application exception carried by an `EXCEPTION` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    /// Human-readable message (field 1).
    pub message: String,
    /// Exception type code (field 2).
    pub kind: i32,
}

impl ApplicationException {
    /// Unknown method type code.
    pub const UNKNOWN_METHOD: i32 = 1;

    /// Reads the exception fields out of a message body, tolerating missing fields.
    #[must_use]
    pub fn from_fields(fields: &[Field]) -> Self {
        let mut exception = Self { message: String::new(), kind: 0 };
        for field in fields {
            match (field.id, &field.value) {
                (1, value) => exception.message = value.as_str().unwrap_or_default().to_string(),
                (2, Value::I32(kind)) => exception.kind = *kind,
                _ => {}
            }
        }
        exception
    }

    /// Fields to encode this exception as a message body.
    #[must_use]
    pub fn to_fields(&self) -> Vec<Field> {
        vec![Field::new(1, Value::string(self.message.clone())), Field::new(2, Value::I32(self.kind))]
    }
}

impl std::fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "application exception (type {}): {}", self.kind, self.message)
    }
}
