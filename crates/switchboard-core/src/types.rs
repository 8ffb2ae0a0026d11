//! Wire-type classification.
//!
//! Every Rust type that can cross the wire describes itself with a [`TypeDesc`]
//! through the [`WireTyped`] trait. The description is kept unreduced; the
//! coarse [`WireType`] vocabulary used by introspection is derived from it with
//! [`classify`], and [`is_allowed`] decides whether an operation may use it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// Coarse wire-type vocabulary reported by signature introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireType {
    Void,
    Bool,
    Int,
    Double,
    String,
    Array,
    Struct,
}

impl WireType {
    /// Name used in signature strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireType::Void => "void",
            WireType::Bool => "bool",
            WireType::Int => "int",
            WireType::Double => "double",
            WireType::String => "string",
            WireType::Array => "array",
            WireType::Struct => "struct",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full description of a parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Void,
    Bool,
    Char,
    /// Integral type of the given bit width.
    Integer { bits: u16, signed: bool },
    /// Floating type of the given bit width.
    Float { bits: u16 },
    String,
    /// Ordered sequence of the element type.
    Array(Box<TypeDesc>),
    /// Unordered set with no positional wire form.
    Collection(Box<TypeDesc>),
    Map {
        key: Box<TypeDesc>,
        value: Box<TypeDesc>,
    },
    /// Any other serializable type, by name.
    Struct(&'static str),
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => f.write_str("()"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Char => f.write_str("char"),
            TypeDesc::Integer { bits, signed } => {
                write!(f, "{}{}", if *signed { 'i' } else { 'u' }, bits)
            }
            TypeDesc::Float { bits } => write!(f, "f{}", bits),
            TypeDesc::String => f.write_str("String"),
            TypeDesc::Array(elem) => write!(f, "[{}]", elem),
            TypeDesc::Collection(elem) => write!(f, "Set<{}>", elem),
            TypeDesc::Map { key, value } => write!(f, "Map<{}, {}>", key, value),
            TypeDesc::Struct(name) => f.write_str(name),
        }
    }
}

/// Reduce a type description to its wire-type name.
pub fn classify(desc: &TypeDesc) -> WireType {
    match desc {
        TypeDesc::Void => WireType::Void,
        TypeDesc::Bool => WireType::Bool,
        TypeDesc::Float { .. } => WireType::Double,
        TypeDesc::Integer { .. } | TypeDesc::Char => WireType::Int,
        TypeDesc::String => WireType::String,
        TypeDesc::Array(_) => WireType::Array,
        TypeDesc::Collection(_) | TypeDesc::Map { .. } | TypeDesc::Struct(_) => WireType::Struct,
    }
}

/// Whether an operation may declare this type as a parameter or return type.
pub fn is_allowed(desc: &TypeDesc) -> bool {
    match desc {
        TypeDesc::Array(elem) => is_allowed(elem),
        TypeDesc::Collection(_) | TypeDesc::Map { .. } => false,
        _ => true,
    }
}

/// Types that can appear in a capability operation signature.
pub trait WireTyped {
    fn type_desc() -> TypeDesc;
}

macro_rules! impl_wire_typed {
    ($($t:ty => $desc:expr),* $(,)?) => {
        $(
            impl WireTyped for $t {
                fn type_desc() -> TypeDesc {
                    $desc
                }
            }
        )*
    };
}

macro_rules! impl_wire_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl WireTyped for $t {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Integer {
                        bits: <$t>::BITS as u16,
                        signed: <$t>::MIN != 0,
                    }
                }
            }
        )*
    };
}

impl_wire_typed! {
    () => TypeDesc::Void,
    bool => TypeDesc::Bool,
    char => TypeDesc::Char,
    f32 => TypeDesc::Float { bits: 32 },
    f64 => TypeDesc::Float { bits: 64 },
    String => TypeDesc::String,
}

impl_wire_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl<T: WireTyped> WireTyped for Option<T> {
    fn type_desc() -> TypeDesc {
        T::type_desc()
    }
}

impl<T: WireTyped> WireTyped for Box<T> {
    fn type_desc() -> TypeDesc {
        T::type_desc()
    }
}

impl<T: WireTyped> WireTyped for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Array(Box::new(T::type_desc()))
    }
}

impl<T: WireTyped> WireTyped for VecDeque<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Array(Box::new(T::type_desc()))
    }
}

impl<T: WireTyped, const N: usize> WireTyped for [T; N] {
    fn type_desc() -> TypeDesc {
        TypeDesc::Array(Box::new(T::type_desc()))
    }
}

impl<T: WireTyped, S> WireTyped for HashSet<T, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Collection(Box::new(T::type_desc()))
    }
}

impl<T: WireTyped> WireTyped for BTreeSet<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Collection(Box::new(T::type_desc()))
    }
}

impl<K: WireTyped, V: WireTyped, S> WireTyped for HashMap<K, V, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Map {
            key: Box::new(K::type_desc()),
            value: Box::new(V::type_desc()),
        }
    }
}

impl<K: WireTyped, V: WireTyped> WireTyped for BTreeMap<K, V> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Map {
            key: Box::new(K::type_desc()),
            value: Box::new(V::type_desc()),
        }
    }
}

/// Declare one or more serde types as `struct` on the wire.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Point { x: i64, y: i64 }
///
/// switchboard_core::wire_struct!(Point);
/// ```
#[macro_export]
macro_rules! wire_struct {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::WireTyped for $t {
                fn type_desc() -> $crate::TypeDesc {
                    $crate::TypeDesc::Struct(stringify!($t))
                }
            }
        )+
    };
}
