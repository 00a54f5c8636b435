//! Tagged runtime values
//!
//! `Any` is the value that crosses dynamically-typed boundaries: generic
//! source-language code, heterogeneous `any[]` arrays, formatting helpers.
//! It is a plain `Copy` enum; only text and array payloads point into an
//! arena, and those are the payloads `promote` copies.
//!
//! Unboxing checks the tag at runtime. A mismatch is a fatal type error
//! ("Type error: expected long, got int"), because statically-typed code can
//! never produce one.
//!
//! Equality follows the runtime's long-standing rules:
//! - different tags are never equal
//! - `double`/`float` compare with IEEE `==` (NaN != NaN, 0.0 == -0.0)
//! - `any[]` arrays compare element by element, typed arrays by identity
//! - functions and objects compare by identity

use crate::array::{Element, RtArray, Text};
use serde::{Deserialize, Serialize};
use sn_core::{Arena, Fault, fatal};
use std::ffi::c_void;
use std::fmt::{self, Write as _};

/// Discriminant of an [`Any`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnyTag {
    Nil,
    Int,
    Long,
    Int32,
    Uint,
    Uint32,
    Double,
    Float,
    String,
    Char,
    Bool,
    Byte,
    Array,
    Function,
    TextFile,
    BinaryFile,
    Date,
    Time,
    Process,
    TcpListener,
    TcpStream,
    UdpSocket,
    Random,
    Uuid,
}

impl AnyTag {
    /// Every tag, in discriminant order
    pub const ALL: [AnyTag; 24] = [
        AnyTag::Nil,
        AnyTag::Int,
        AnyTag::Long,
        AnyTag::Int32,
        AnyTag::Uint,
        AnyTag::Uint32,
        AnyTag::Double,
        AnyTag::Float,
        AnyTag::String,
        AnyTag::Char,
        AnyTag::Bool,
        AnyTag::Byte,
        AnyTag::Array,
        AnyTag::Function,
        AnyTag::TextFile,
        AnyTag::BinaryFile,
        AnyTag::Date,
        AnyTag::Time,
        AnyTag::Process,
        AnyTag::TcpListener,
        AnyTag::TcpStream,
        AnyTag::UdpSocket,
        AnyTag::Random,
        AnyTag::Uuid,
    ];

    /// Source-language name of the kind
    pub const fn name(self) -> &'static str {
        match self {
            AnyTag::Nil => "nil",
            AnyTag::Int => "int",
            AnyTag::Long => "long",
            AnyTag::Int32 => "int32",
            AnyTag::Uint => "uint",
            AnyTag::Uint32 => "uint32",
            AnyTag::Double => "double",
            AnyTag::Float => "float",
            AnyTag::String => "str",
            AnyTag::Char => "char",
            AnyTag::Bool => "bool",
            AnyTag::Byte => "byte",
            AnyTag::Array => "array",
            AnyTag::Function => "function",
            AnyTag::TextFile => "TextFile",
            AnyTag::BinaryFile => "BinaryFile",
            AnyTag::Date => "Date",
            AnyTag::Time => "Time",
            AnyTag::Process => "Process",
            AnyTag::TcpListener => "TcpListener",
            AnyTag::TcpStream => "TcpStream",
            AnyTag::UdpSocket => "UdpSocket",
            AnyTag::Random => "Random",
            AnyTag::Uuid => "UUID",
        }
    }

    pub fn from_raw(raw: u8) -> Option<AnyTag> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Name for a raw discriminant coming from generated code
    pub fn name_of(raw: u8) -> &'static str {
        Self::from_raw(raw).map_or("unknown", AnyTag::name)
    }

    /// Built-in object kinds (compared and promoted by identity)
    pub fn is_object(self) -> bool {
        self as u8 >= AnyTag::TextFile as u8
    }
}

impl fmt::Display for AnyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque pointer to a function or a built-in object
///
/// The runtime never dereferences it; it is only compared and passed along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(*const c_void);

impl Handle {
    pub const fn from_ptr(ptr: *const c_void) -> Self {
        Handle(ptr)
    }

    pub fn from_ref<T>(value: &T) -> Self {
        Handle(std::ptr::from_ref(value).cast())
    }

    pub const fn as_ptr(self) -> *const c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// A boxed array: the typed array plus, implicitly, its element kind
#[derive(Debug, Clone, Copy)]
pub enum ArrayRef<'a> {
    Long(&'a RtArray<'a, i64>),
    Int32(&'a RtArray<'a, i32>),
    Uint(&'a RtArray<'a, u64>),
    Uint32(&'a RtArray<'a, u32>),
    Double(&'a RtArray<'a, f64>),
    Float(&'a RtArray<'a, f32>),
    Char(&'a RtArray<'a, char>),
    Bool(&'a RtArray<'a, bool>),
    Byte(&'a RtArray<'a, u8>),
    String(&'a RtArray<'a, Text<'a>>),
    Any(&'a RtArray<'a, Any<'a>>),
}

macro_rules! with_array {
    ($array:expr, $a:ident => $body:expr) => {
        match $array {
            ArrayRef::Long($a) => $body,
            ArrayRef::Int32($a) => $body,
            ArrayRef::Uint($a) => $body,
            ArrayRef::Uint32($a) => $body,
            ArrayRef::Double($a) => $body,
            ArrayRef::Float($a) => $body,
            ArrayRef::Char($a) => $body,
            ArrayRef::Bool($a) => $body,
            ArrayRef::Byte($a) => $body,
            ArrayRef::String($a) => $body,
            ArrayRef::Any($a) => $body,
        }
    };
}

fn element_tag_of<'a, T: Element<'a>>(_array: &RtArray<'a, T>) -> AnyTag {
    T::TAG
}

impl<'a> ArrayRef<'a> {
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        with_array!(self, a => a.is_null())
    }

    /// Kind of the elements; `Nil` means the elements are themselves `Any`
    pub fn element_tag(&self) -> AnyTag {
        with_array!(self, a => element_tag_of(a))
    }

    fn addr(&self) -> *const () {
        with_array!(self, a => a.as_ptr().cast::<()>())
    }

    /// Whether both refer to the same storage
    pub fn same_storage(&self, other: &ArrayRef<'_>) -> bool {
        self.addr() == other.addr()
    }

    /// Deep copy the array (and its text/any payloads) into `dest`
    pub fn promote<'b>(&self, dest: &'b Arena<'b>) -> ArrayRef<'b> {
        match *self {
            ArrayRef::Long(a) => ArrayRef::Long(dest.alloc_value(a.promote(dest))),
            ArrayRef::Int32(a) => ArrayRef::Int32(dest.alloc_value(a.promote(dest))),
            ArrayRef::Uint(a) => ArrayRef::Uint(dest.alloc_value(a.promote(dest))),
            ArrayRef::Uint32(a) => ArrayRef::Uint32(dest.alloc_value(a.promote(dest))),
            ArrayRef::Double(a) => ArrayRef::Double(dest.alloc_value(a.promote(dest))),
            ArrayRef::Float(a) => ArrayRef::Float(dest.alloc_value(a.promote(dest))),
            ArrayRef::Char(a) => ArrayRef::Char(dest.alloc_value(a.promote(dest))),
            ArrayRef::Bool(a) => ArrayRef::Bool(dest.alloc_value(a.promote(dest))),
            ArrayRef::Byte(a) => ArrayRef::Byte(dest.alloc_value(a.promote(dest))),
            ArrayRef::String(a) => ArrayRef::String(dest.alloc_value(a.promote(dest))),
            ArrayRef::Any(a) => ArrayRef::Any(dest.alloc_value(a.promote(dest))),
        }
    }
}

fn arrays_equal(a: &ArrayRef<'_>, b: &ArrayRef<'_>) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    if a.len() != b.len() {
        return false;
    }
    match (a, b) {
        (ArrayRef::Any(x), ArrayRef::Any(y)) => x.iter().zip(y.iter()).all(|(p, q)| p.equals(q)),
        // Typed arrays are only equal to themselves
        _ => a.same_storage(b),
    }
}

/// A dynamically-typed runtime value
#[derive(Debug, Clone, Copy, Default)]
pub enum Any<'a> {
    #[default]
    Nil,
    Int(i64),
    Long(i64),
    Int32(i32),
    Uint(u64),
    Uint32(u32),
    Double(f64),
    Float(f32),
    String(Text<'a>),
    Char(char),
    Bool(bool),
    Byte(u8),
    Array(ArrayRef<'a>),
    Function(Handle),
    TextFile(Handle),
    BinaryFile(Handle),
    Date(Handle),
    Time(Handle),
    Process(Handle),
    TcpListener(Handle),
    TcpStream(Handle),
    UdpSocket(Handle),
    Random(Handle),
    Uuid(Handle),
}

macro_rules! accessors {
    ($( $variant:ident($ty:ty): $boxer:ident, $unboxer:ident, $check:ident; )*) => {
        impl Any<'_> {
            $(
                pub fn $boxer(value: $ty) -> Self {
                    Any::$variant(value)
                }

                pub fn $unboxer(&self) -> $ty {
                    match self {
                        Any::$variant(v) => *v,
                        other => other.type_error(AnyTag::$variant),
                    }
                }

                pub fn $check(&self) -> bool {
                    matches!(self, Any::$variant(_))
                }
            )*
        }
    };
}

accessors! {
    Int(i64): box_int, unbox_int, is_int;
    Long(i64): box_long, unbox_long, is_long;
    Int32(i32): box_int32, unbox_int32, is_int32;
    Uint(u64): box_uint, unbox_uint, is_uint;
    Uint32(u32): box_uint32, unbox_uint32, is_uint32;
    Double(f64): box_double, unbox_double, is_double;
    Float(f32): box_float, unbox_float, is_float;
    Char(char): box_char, unbox_char, is_char;
    Bool(bool): box_bool, unbox_bool, is_bool;
    Byte(u8): box_byte, unbox_byte, is_byte;
    Function(Handle): box_function, unbox_function, is_function;
    TextFile(Handle): box_text_file, unbox_text_file, is_text_file;
    BinaryFile(Handle): box_binary_file, unbox_binary_file, is_binary_file;
    Date(Handle): box_date, unbox_date, is_date;
    Time(Handle): box_time, unbox_time, is_time;
    Process(Handle): box_process, unbox_process, is_process;
    TcpListener(Handle): box_tcp_listener, unbox_tcp_listener, is_tcp_listener;
    TcpStream(Handle): box_tcp_stream, unbox_tcp_stream, is_tcp_stream;
    UdpSocket(Handle): box_udp_socket, unbox_udp_socket, is_udp_socket;
    Random(Handle): box_random, unbox_random, is_random;
    Uuid(Handle): box_uuid, unbox_uuid, is_uuid;
}

impl<'a> Any<'a> {
    pub fn box_nil() -> Self {
        Any::Nil
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Any::Nil)
    }

    /// Box text without copying it
    pub fn box_string(value: Text<'a>) -> Self {
        Any::String(value)
    }

    pub fn unbox_string(&self) -> Text<'a> {
        match self {
            Any::String(s) => *s,
            other => other.type_error(AnyTag::String),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Any::String(_))
    }

    pub fn box_array(array: ArrayRef<'a>) -> Self {
        Any::Array(array)
    }

    /// Box a typed array; the element kind is taken from `T`
    pub fn from_array<T: Element<'a>>(array: &'a RtArray<'a, T>) -> Self {
        Any::Array(T::array_ref(array))
    }

    pub fn unbox_array(&self) -> ArrayRef<'a> {
        match self {
            Any::Array(a) => *a,
            other => other.type_error(AnyTag::Array),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Any::Array(_))
    }

    #[cold]
    fn type_error(&self, expected: AnyTag) -> ! {
        fatal(Fault::TypeMismatch {
            expected: expected.name(),
            actual: self.type_name(),
        })
    }

    pub fn tag(&self) -> AnyTag {
        match self {
            Any::Nil => AnyTag::Nil,
            Any::Int(_) => AnyTag::Int,
            Any::Long(_) => AnyTag::Long,
            Any::Int32(_) => AnyTag::Int32,
            Any::Uint(_) => AnyTag::Uint,
            Any::Uint32(_) => AnyTag::Uint32,
            Any::Double(_) => AnyTag::Double,
            Any::Float(_) => AnyTag::Float,
            Any::String(_) => AnyTag::String,
            Any::Char(_) => AnyTag::Char,
            Any::Bool(_) => AnyTag::Bool,
            Any::Byte(_) => AnyTag::Byte,
            Any::Array(_) => AnyTag::Array,
            Any::Function(_) => AnyTag::Function,
            Any::TextFile(_) => AnyTag::TextFile,
            Any::BinaryFile(_) => AnyTag::BinaryFile,
            Any::Date(_) => AnyTag::Date,
            Any::Time(_) => AnyTag::Time,
            Any::Process(_) => AnyTag::Process,
            Any::TcpListener(_) => AnyTag::TcpListener,
            Any::TcpStream(_) => AnyTag::TcpStream,
            Any::UdpSocket(_) => AnyTag::UdpSocket,
            Any::Random(_) => AnyTag::Random,
            Any::Uuid(_) => AnyTag::Uuid,
        }
    }

    /// Element kind of a boxed array; `Nil` for every other value
    pub fn element_tag(&self) -> AnyTag {
        match self {
            Any::Array(a) => a.element_tag(),
            _ => AnyTag::Nil,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    pub fn same_type(&self, other: &Any<'_>) -> bool {
        self.tag() == other.tag()
    }

    pub fn equals(&self, other: &Any<'_>) -> bool {
        match (self, other) {
            (Any::Nil, Any::Nil) => true,
            (Any::Int(a), Any::Int(b)) | (Any::Long(a), Any::Long(b)) => a == b,
            (Any::Int32(a), Any::Int32(b)) => a == b,
            (Any::Uint(a), Any::Uint(b)) => a == b,
            (Any::Uint32(a), Any::Uint32(b)) => a == b,
            (Any::Double(a), Any::Double(b)) => a == b,
            (Any::Float(a), Any::Float(b)) => a == b,
            (Any::String(a), Any::String(b)) => *a == *b,
            (Any::Char(a), Any::Char(b)) => a == b,
            (Any::Bool(a), Any::Bool(b)) => a == b,
            (Any::Byte(a), Any::Byte(b)) => a == b,
            (Any::Array(a), Any::Array(b)) => arrays_equal(a, b),
            (Any::Function(a), Any::Function(b))
            | (Any::TextFile(a), Any::TextFile(b))
            | (Any::BinaryFile(a), Any::BinaryFile(b))
            | (Any::Date(a), Any::Date(b))
            | (Any::Time(a), Any::Time(b))
            | (Any::Process(a), Any::Process(b))
            | (Any::TcpListener(a), Any::TcpListener(b))
            | (Any::TcpStream(a), Any::TcpStream(b))
            | (Any::UdpSocket(a), Any::UdpSocket(b))
            | (Any::Random(a), Any::Random(b))
            | (Any::Uuid(a), Any::Uuid(b)) => a == b,
            _ => false,
        }
    }

    /// Render into `arena` (see the `Display` impl for the format)
    pub fn to_string_in<'x>(&self, arena: &'x Arena<'x>) -> &'x str {
        arena.strdup(&self.to_string())
    }

    /// Copy text and array payloads into `dest`
    ///
    /// Arrays are deep-copied, so the result no longer depends on the arena
    /// the value was boxed in. Functions and objects pass through unchanged.
    pub fn promote<'b>(&self, dest: &'b Arena<'b>) -> Any<'b> {
        match *self {
            Any::Nil => Any::Nil,
            Any::Int(v) => Any::Int(v),
            Any::Long(v) => Any::Long(v),
            Any::Int32(v) => Any::Int32(v),
            Any::Uint(v) => Any::Uint(v),
            Any::Uint32(v) => Any::Uint32(v),
            Any::Double(v) => Any::Double(v),
            Any::Float(v) => Any::Float(v),
            Any::String(s) => Any::String(s.map(|s| dest.promote_string(s))),
            Any::Char(v) => Any::Char(v),
            Any::Bool(v) => Any::Bool(v),
            Any::Byte(v) => Any::Byte(v),
            Any::Array(a) => Any::Array(a.promote(dest)),
            Any::Function(h) => Any::Function(h),
            Any::TextFile(h) => Any::TextFile(h),
            Any::BinaryFile(h) => Any::BinaryFile(h),
            Any::Date(h) => Any::Date(h),
            Any::Time(h) => Any::Time(h),
            Any::Process(h) => Any::Process(h),
            Any::TcpListener(h) => Any::TcpListener(h),
            Any::TcpStream(h) => Any::TcpStream(h),
            Any::UdpSocket(h) => Any::UdpSocket(h),
            Any::Random(h) => Any::Random(h),
            Any::Uuid(h) => Any::Uuid(h),
        }
    }
}

impl PartialEq<Any<'_>> for Any<'_> {
    fn eq(&self, other: &Any<'_>) -> bool {
        self.equals(other)
    }
}

/// `printf("%g")`: 6 significant digits, trailing zeros dropped, exponent
/// form below 1e-4 and from 1e6 on
pub fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `nil`, `42`, `3.14`, `"text"` / `null`, `x`, `true`, `[array of 3
/// elements]`, `[function]`, `[TcpStream]`
impl fmt::Display for Any<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Any::Nil => f.write_str("nil"),
            Any::Int(v) | Any::Long(v) => write!(f, "{}", v),
            Any::Int32(v) => write!(f, "{}", v),
            Any::Uint(v) => write!(f, "{}", v),
            Any::Uint32(v) => write!(f, "{}", v),
            Any::Double(v) => f.write_str(&format_general(*v)),
            Any::Float(v) => f.write_str(&format_general(f64::from(*v))),
            Any::String(Some(s)) => write!(f, "\"{}\"", s),
            Any::String(None) => f.write_str("null"),
            Any::Char(c) => f.write_char(*c),
            Any::Bool(b) => write!(f, "{}", b),
            Any::Byte(b) => write!(f, "{}", b),
            Any::Array(a) => write!(f, "[array of {} elements]", a.len()),
            Any::Function(_) => f.write_str("[function]"),
            other => write!(f, "[{}]", other.type_name()),
        }
    }
}

impl<'a> Element<'a> for Any<'a> {
    type Promoted<'b> = Any<'b>;

    const TAG: AnyTag = AnyTag::Nil;

    fn promote<'b>(self, dest: &'b Arena<'b>) -> Any<'b> {
        Any::promote(&self, dest)
    }

    fn element_eq(&self, other: &Self) -> bool {
        self.equals(other)
    }

    fn join_into(&self, out: &mut String) {
        let _ = write!(out, "{}", self);
    }

    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }

    fn array_ref(array: &'a RtArray<'a, Any<'a>>) -> ArrayRef<'a> {
        ArrayRef::Any(array)
    }
}
