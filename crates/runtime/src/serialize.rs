//! Detached values
//!
//! `Any` borrows its text and arrays from an arena, so it cannot leave the
//! process or outlive that arena on its own. `TypedValue` is the owned,
//! serde-serializable mirror: it can be written to disk, sent elsewhere, and
//! rehydrated into any arena with `to_any`.
//!
//! Functions and built-in objects are identities, not data, and are refused.
//! Non-finite floats are refused too, so a stored value always reads back
//! equal to itself.
//!
//! Binary encoding is bincode.

use crate::any::{Any, AnyTag, ArrayRef};
use crate::array::{Element, RtArray, Text};
use serde::{Deserialize, Serialize};
use sn_core::Arena;

/// Error during serialization/deserialization
#[derive(Debug)]
pub enum SerializeError {
    /// Functions and object handles only make sense inside this process
    HandleNotSerializable(&'static str),
    /// Bincode encoding/decoding error (preserves original error for debugging)
    BincodeError(Box<bincode::Error>),
    /// Structurally valid bytes that do not describe a runtime value
    InvalidData(String),
    /// Non-finite float (NaN or Infinity)
    NonFiniteFloat(f64),
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializeError::HandleNotSerializable(kind) => {
                write!(f, "{} values cannot be serialized - they are process handles", kind)
            }
            SerializeError::BincodeError(e) => write!(f, "Bincode error: {}", e),
            SerializeError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            SerializeError::NonFiniteFloat(v) => {
                write!(f, "Cannot serialize non-finite float: {}", v)
            }
        }
    }
}

impl std::error::Error for SerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializeError::BincodeError(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<bincode::Error> for SerializeError {
    fn from(e: bincode::Error) -> Self {
        SerializeError::BincodeError(Box::new(e))
    }
}

/// Owned mirror of [`Any`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TypedValue {
    Nil,
    Int(i64),
    Long(i64),
    Int32(i32),
    Uint(u64),
    Uint32(u32),
    Double(f64),
    Float(f32),
    /// `None` is the null string
    String(Option<String>),
    Char(char),
    Bool(bool),
    Byte(u8),
    /// `element_tag` is `Nil` for `any[]`
    Array {
        element_tag: AnyTag,
        elements: Vec<TypedValue>,
    },
}

fn finite_double(v: f64) -> Result<TypedValue, SerializeError> {
    if !v.is_finite() {
        return Err(SerializeError::NonFiniteFloat(v));
    }
    Ok(TypedValue::Double(v))
}

fn finite_float(v: f32) -> Result<TypedValue, SerializeError> {
    if !v.is_finite() {
        return Err(SerializeError::NonFiniteFloat(f64::from(v)));
    }
    Ok(TypedValue::Float(v))
}

fn detach_elements<'x, T: Element<'x>>(
    array: &RtArray<'x, T>,
    f: impl Fn(T) -> Result<TypedValue, SerializeError>,
) -> Result<TypedValue, SerializeError> {
    let elements = array
        .iter()
        .map(|v| f(*v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypedValue::Array {
        element_tag: T::TAG,
        elements,
    })
}

fn detach_array(array: &ArrayRef<'_>) -> Result<TypedValue, SerializeError> {
    match *array {
        ArrayRef::Long(a) => detach_elements(a, |v| Ok(TypedValue::Long(v))),
        ArrayRef::Int32(a) => detach_elements(a, |v| Ok(TypedValue::Int32(v))),
        ArrayRef::Uint(a) => detach_elements(a, |v| Ok(TypedValue::Uint(v))),
        ArrayRef::Uint32(a) => detach_elements(a, |v| Ok(TypedValue::Uint32(v))),
        ArrayRef::Double(a) => detach_elements(a, finite_double),
        ArrayRef::Float(a) => detach_elements(a, finite_float),
        ArrayRef::Char(a) => detach_elements(a, |v| Ok(TypedValue::Char(v))),
        ArrayRef::Bool(a) => detach_elements(a, |v| Ok(TypedValue::Bool(v))),
        ArrayRef::Byte(a) => detach_elements(a, |v| Ok(TypedValue::Byte(v))),
        ArrayRef::String(a) => {
            detach_elements(a, |v| Ok(TypedValue::String(v.map(str::to_string))))
        }
        ArrayRef::Any(a) => detach_elements(a, |v| TypedValue::from_any(&v)),
    }
}

fn mismatch(expected: AnyTag, found: &TypedValue) -> SerializeError {
    SerializeError::InvalidData(format!(
        "{} element in {}[]",
        found.tag().name(),
        expected.name()
    ))
}

fn rehydrate_elements<'a, T: Element<'a>>(
    arena: &'a Arena<'a>,
    elements: &[TypedValue],
    f: impl Fn(&TypedValue) -> Option<Result<T, SerializeError>>,
) -> Result<&'a RtArray<'a, T>, SerializeError> {
    let values = elements
        .iter()
        .map(|e| f(e).unwrap_or_else(|| Err(mismatch(T::TAG, e))))
        .collect::<Result<Vec<T>, _>>()?;
    Ok(arena.alloc_value(RtArray::create(arena, Some(values.as_slice()))))
}

impl TypedValue {
    /// Detach a runtime value from its arena
    pub fn from_any(value: &Any<'_>) -> Result<Self, SerializeError> {
        match *value {
            Any::Nil => Ok(TypedValue::Nil),
            Any::Int(v) => Ok(TypedValue::Int(v)),
            Any::Long(v) => Ok(TypedValue::Long(v)),
            Any::Int32(v) => Ok(TypedValue::Int32(v)),
            Any::Uint(v) => Ok(TypedValue::Uint(v)),
            Any::Uint32(v) => Ok(TypedValue::Uint32(v)),
            Any::Double(v) => finite_double(v),
            Any::Float(v) => finite_float(v),
            Any::String(s) => Ok(TypedValue::String(s.map(str::to_string))),
            Any::Char(v) => Ok(TypedValue::Char(v)),
            Any::Bool(v) => Ok(TypedValue::Bool(v)),
            Any::Byte(v) => Ok(TypedValue::Byte(v)),
            Any::Array(ref a) => detach_array(a),
            ref other => Err(SerializeError::HandleNotSerializable(other.type_name())),
        }
    }

    /// Kind of the value this would rehydrate to
    pub fn tag(&self) -> AnyTag {
        match self {
            TypedValue::Nil => AnyTag::Nil,
            TypedValue::Int(_) => AnyTag::Int,
            TypedValue::Long(_) => AnyTag::Long,
            TypedValue::Int32(_) => AnyTag::Int32,
            TypedValue::Uint(_) => AnyTag::Uint,
            TypedValue::Uint32(_) => AnyTag::Uint32,
            TypedValue::Double(_) => AnyTag::Double,
            TypedValue::Float(_) => AnyTag::Float,
            TypedValue::String(_) => AnyTag::String,
            TypedValue::Char(_) => AnyTag::Char,
            TypedValue::Bool(_) => AnyTag::Bool,
            TypedValue::Byte(_) => AnyTag::Byte,
            TypedValue::Array { .. } => AnyTag::Array,
        }
    }

    /// Rebuild the value inside `arena`
    ///
    /// Text and arrays are freshly allocated, so the result depends on
    /// nothing but `arena`. Empty arrays come back as null arrays.
    pub fn to_any<'a>(&self, arena: &'a Arena<'a>) -> Result<Any<'a>, SerializeError> {
        Ok(match self {
            TypedValue::Nil => Any::Nil,
            TypedValue::Int(v) => Any::Int(*v),
            TypedValue::Long(v) => Any::Long(*v),
            TypedValue::Int32(v) => Any::Int32(*v),
            TypedValue::Uint(v) => Any::Uint(*v),
            TypedValue::Uint32(v) => Any::Uint32(*v),
            TypedValue::Double(v) => Any::Double(*v),
            TypedValue::Float(v) => Any::Float(*v),
            TypedValue::String(s) => Any::String(s.as_deref().map(|s| arena.strdup(s))),
            TypedValue::Char(v) => Any::Char(*v),
            TypedValue::Bool(v) => Any::Bool(*v),
            TypedValue::Byte(v) => Any::Byte(*v),
            TypedValue::Array {
                element_tag,
                elements,
            } => Any::Array(rehydrate_array(arena, *element_tag, elements)?),
        })
    }

    /// Serialize to binary format (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        bincode::serialize(self).map_err(SerializeError::from)
    }

    /// Deserialize from binary format (bincode)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializeError> {
        bincode::deserialize(bytes).map_err(SerializeError::from)
    }
}

fn rehydrate_array<'a>(
    arena: &'a Arena<'a>,
    element_tag: AnyTag,
    elements: &[TypedValue],
) -> Result<ArrayRef<'a>, SerializeError> {
    let array = match element_tag {
        AnyTag::Int | AnyTag::Long => ArrayRef::Long(rehydrate_elements(arena, elements, |e| {
            match e {
                TypedValue::Int(v) | TypedValue::Long(v) => Some(Ok(*v)),
                _ => None,
            }
        })?),
        AnyTag::Int32 => ArrayRef::Int32(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Int32(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Uint => ArrayRef::Uint(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Uint(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Uint32 => ArrayRef::Uint32(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Uint32(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Double => ArrayRef::Double(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Double(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Float => ArrayRef::Float(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Float(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Char => ArrayRef::Char(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Char(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Bool => ArrayRef::Bool(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Bool(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::Byte => ArrayRef::Byte(rehydrate_elements(arena, elements, |e| match e {
            TypedValue::Byte(v) => Some(Ok(*v)),
            _ => None,
        })?),
        AnyTag::String => {
            ArrayRef::String(rehydrate_elements(arena, elements, |e| match e {
                TypedValue::String(s) => {
                    let text: Text<'a> = s.as_deref().map(|s| arena.strdup(s));
                    Some(Ok(text))
                }
                _ => None,
            })?)
        }
        AnyTag::Nil => ArrayRef::Any(rehydrate_elements(arena, elements, |e| {
            Some(e.to_any(arena))
        })?),
        other => {
            return Err(SerializeError::InvalidData(format!(
                "{} is not an array element kind",
                other.name()
            )));
        }
    };
    Ok(array)
}

/// Extension trait for Any to add serialization methods
pub trait AnySerialize {
    /// Convert to serializable TypedValue
    fn to_typed(&self) -> Result<TypedValue, SerializeError>;

    /// Serialize directly to bytes
    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError>;
}

impl AnySerialize for Any<'_> {
    fn to_typed(&self) -> Result<TypedValue, SerializeError> {
        TypedValue::from_any(self)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        TypedValue::from_any(self)?.to_bytes()
    }
}
