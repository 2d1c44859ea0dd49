use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A value type as far as the decompiler core needs to know it.
///
/// Object and array types are opaque names; no class hierarchy is consulted.
/// Types serialize as Java source spelling (`int`, `java.lang.String`, `int[][]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Object type by fully qualified dotted name.
    Object(String),
    Array(Box<Type>),
    /// Type of the `null` literal.
    Null,
    /// JSR return address.
    ReturnAddress,
    Unknown,
}

impl Type {
    pub fn object(name: &str) -> Self {
        Type::Object(name.replace('/', "."))
    }

    pub fn array_of(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn string() -> Self {
        Type::Object("java.lang.String".into())
    }

    pub fn throwable() -> Self {
        Type::Object("java.lang.Throwable".into())
    }

    /// Long and double take two registers.
    pub fn is_wide(&self) -> bool {
        matches!(self, Type::Long | Type::Double)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Object(_) | Type::Array(_) | Type::Null)
    }

    /// Types the JVM computes with as `int`.
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int
        )
    }

    pub fn is_object(&self, name: &str) -> bool {
        matches!(self, Type::Object(n) if n == name)
    }

    /// Element type of an array, `None` for anything else.
    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Register slots taken by a value of this type.
    pub fn slot_count(&self) -> usize {
        if self.is_wide() { 2 } else { 1 }
    }

    /// Least upper bound used at dataflow joins.
    pub fn join(&self, other: &Type) -> Type {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
            (Type::Null, t) | (t, Type::Null) if t.is_reference() => t.clone(),
            (a, b) if a.is_reference() && b.is_reference() => {
                Type::Object("java.lang.Object".into())
            }
            (a, b) if a.is_int_like() && b.is_int_like() => Type::Int,
            _ => Type::Unknown,
        }
    }

    /// Unqualified name for display: `java.util.Map$Entry` becomes `Entry`.
    pub fn simple_name(&self) -> String {
        match self {
            Type::Object(name) => {
                let tail = name.rsplit('.').next().unwrap_or(name);
                tail.rsplit('$').next().unwrap_or(tail).to_string()
            }
            Type::Array(elem) => format!("{}[]", elem.simple_name()),
            other => other.to_string(),
        }
    }

    /// Parse a `Class.forName` style name: `java.lang.String`, `[I`, `[Ljava.lang.String;`.
    pub fn from_class_name(name: &str) -> Option<Type> {
        if let Some(rest) = name.strip_prefix('[') {
            return Self::from_descriptor(rest).map(Type::array_of);
        }
        if name.is_empty() {
            return None;
        }
        Some(Type::object(name))
    }

    fn from_descriptor(desc: &str) -> Option<Type> {
        let mut chars = desc.chars();
        let t = match chars.next()? {
            'Z' => Type::Boolean,
            'B' => Type::Byte,
            'C' => Type::Char,
            'S' => Type::Short,
            'I' => Type::Int,
            'J' => Type::Long,
            'F' => Type::Float,
            'D' => Type::Double,
            'V' => Type::Void,
            '[' => return Self::from_descriptor(chars.as_str()).map(Type::array_of),
            'L' => {
                let name = chars.as_str().strip_suffix(';')?;
                return Some(Type::object(name));
            }
            _ => return None,
        };
        if chars.next().is_some() {
            return None;
        }
        Some(t)
    }
}

/// Error returned when a type name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type name `{0}`")]
pub struct ParseTypeError(pub String);

impl FromStr for Type {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(elem) = s.strip_suffix("[]") {
            return Ok(Type::array_of(elem.parse()?));
        }
        Ok(match s {
            "void" => Type::Void,
            "boolean" => Type::Boolean,
            "byte" => Type::Byte,
            "char" => Type::Char,
            "short" => Type::Short,
            "int" => Type::Int,
            "long" => Type::Long,
            "float" => Type::Float,
            "double" => Type::Double,
            "null" => Type::Null,
            "returnAddress" => Type::ReturnAddress,
            "?" => Type::Unknown,
            "" => return Err(ParseTypeError(s.to_string())),
            name if name.contains(char::is_whitespace) => {
                return Err(ParseTypeError(s.to_string()));
            }
            name => Type::object(name),
        })
    }
}

impl TryFrom<String> for Type {
    type Error = ParseTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Type> for String {
    fn from(t: Type) -> Self {
        t.to_string()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Boolean => f.write_str("boolean"),
            Type::Byte => f.write_str("byte"),
            Type::Char => f.write_str("char"),
            Type::Short => f.write_str("short"),
            Type::Int => f.write_str("int"),
            Type::Long => f.write_str("long"),
            Type::Float => f.write_str("float"),
            Type::Double => f.write_str("double"),
            Type::Object(name) => f.write_str(name),
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Null => f.write_str("null"),
            Type::ReturnAddress => f.write_str("returnAddress"),
            Type::Unknown => f.write_str("?"),
        }
    }
}

bitflags! {
    /// Member access flags, only the ones the decompiler looks at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// Field reference carried by GET/PUT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: Type,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub flags: AccessFlags,
}

impl FieldRef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

/// Method reference carried by INVOKE.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: Type,
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default = "void")]
    pub ret: Type,
    #[serde(default)]
    pub flags: AccessFlags,
}

fn void() -> Type {
    Type::Void
}

impl MethodRef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn returns_void(&self) -> bool {
        self.ret == Type::Void
    }
}

/// `String.hashCode()` as computed by the JVM: UTF-16 units, wrapping.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}
