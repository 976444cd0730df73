//! Dynamic values exchanged between accessor thunks and the walker.
//!
//! The walker never sees concrete member types. Getters hand it a borrowed
//! [`ValueRef`], setters receive an owned [`Value`], and [`ValueKind`] tells it
//! which of the few supported shapes (scalar, sequence, nested object,
//! optional) to expect. [`XmlValue`] bridges concrete Rust types to that model.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use xmlbind_support::{ConversionError, Scalar, ScalarType, XmlEnum};

use crate::meta::{TypeDescriptor, XmlObject, descriptor_of};

/// An owned value on its way into a setter.
pub enum Value {
    Absent,
    Scalar(Scalar),
    List(Vec<Value>),
    Object(Box<dyn Any>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent value",
            Value::Scalar(_) => "scalar",
            Value::List(_) => "sequence",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("Absent"),
            Value::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// A nested object handed out by a getter.
pub enum ObjectRef<'a> {
    Borrowed(&'a dyn Any),
    /// Produced by computed members, which return by value.
    Owned(Box<dyn Any>),
}

impl ObjectRef<'_> {
    pub fn as_any(&self) -> &dyn Any {
        match self {
            ObjectRef::Borrowed(any) => *any,
            ObjectRef::Owned(boxed) => boxed.as_ref(),
        }
    }
}

/// A value read out of a getter, borrowing from the source object where it can.
pub enum ValueRef<'a> {
    Absent,
    Scalar(Scalar),
    List(Vec<ValueRef<'a>>),
    Object(ObjectRef<'a>),
}

impl ValueRef<'_> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueRef::Absent => "absent value",
            ValueRef::Scalar(_) => "scalar",
            ValueRef::List(_) => "sequence",
            ValueRef::Object(_) => "object",
        }
    }
}

impl From<Value> for ValueRef<'_> {
    fn from(value: Value) -> Self {
        match value {
            Value::Absent => ValueRef::Absent,
            Value::Scalar(s) => ValueRef::Scalar(s),
            Value::List(items) => ValueRef::List(items.into_iter().map(ValueRef::from).collect()),
            Value::Object(boxed) => ValueRef::Object(ObjectRef::Owned(boxed)),
        }
    }
}

/// Handle to a nested object type whose descriptor is built on first use.
///
/// Holding a function pointer rather than the descriptor itself keeps
/// self-referencing types (a node holding a list of nodes) from recursing
/// while their own descriptor is being built.
#[derive(Clone, Copy)]
pub struct ObjectType {
    type_id: TypeId,
    rust_name: &'static str,
    descriptor: fn() -> Arc<TypeDescriptor>,
}

impl ObjectType {
    pub fn of<T: XmlObject>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            descriptor: descriptor_of::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn descriptor(&self) -> Arc<TypeDescriptor> {
        (self.descriptor)()
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectType").field(&self.rust_name).finish()
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// The closed set of shapes the walker dispatches on.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Scalar(ScalarType),
    Sequence(Box<ValueKind>),
    Object(ObjectType),
    Optional(Box<ValueKind>),
}

impl ValueKind {
    pub fn object<T: XmlObject>() -> Self {
        ValueKind::Object(ObjectType::of::<T>())
    }

    /// Strips any number of `Optional` layers.
    pub fn unwrap_optional(&self) -> &ValueKind {
        let mut kind = self;
        while let ValueKind::Optional(inner) = kind {
            kind = inner;
        }
        kind
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.unwrap_optional(), ValueKind::Sequence(_))
    }

    /// Declared name of the type, used for item elements without an override.
    pub fn declared_name(&self) -> String {
        match self {
            ValueKind::Scalar(ty) => ty.type_name().to_string(),
            ValueKind::Sequence(item) => format!("ArrayOf{}", item.declared_name()),
            ValueKind::Object(ty) => ty.descriptor().type_name().to_string(),
            ValueKind::Optional(inner) => inner.declared_name(),
        }
    }

    /// Value produced for an empty element of this kind.
    pub fn empty_value(&self) -> Value {
        match self {
            ValueKind::Scalar(ty) => Value::Scalar(ty.default_scalar()),
            ValueKind::Sequence(_) => Value::List(Vec::new()),
            ValueKind::Object(ty) => Value::Object(ty.descriptor().construct()),
            ValueKind::Optional(_) => Value::Absent,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Scalar(_) => "scalar",
            ValueKind::Sequence(_) => "sequence",
            ValueKind::Object(_) => "object",
            ValueKind::Optional(_) => "optional",
        }
    }
}

/// Bridges a concrete Rust type to the walker's value model.
///
/// Implemented here for scalars, `String`, `DateTime<Utc>`, `Vec<T>` and
/// `Option<T>`. Object types get it from [`xml_object!`](crate::xml_object),
/// enums from [`xml_enum!`](crate::xml_enum).
pub trait XmlValue: Sized + 'static {
    fn kind() -> ValueKind;

    fn to_value(&self) -> ValueRef<'_>;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn scalar_of(value: Value, target: &'static str) -> Result<Scalar, ConversionError> {
    match value {
        Value::Scalar(s) => Ok(s),
        Value::Absent => Err(ConversionError::Absent { target }),
        other => Err(ConversionError::Mismatch {
            expected: target,
            found: other.kind_name(),
        }),
    }
}

macro_rules! signed_value {
    ($($ty:ty => $scalar:ident),* $(,)?) => {$(
        impl XmlValue for $ty {
            fn kind() -> ValueKind {
                ValueKind::Scalar(ScalarType::$scalar)
            }

            fn to_value(&self) -> ValueRef<'_> {
                ValueRef::Scalar(Scalar::Int(i64::from(*self)))
            }

            fn into_value(self) -> Value {
                Value::Scalar(Scalar::Int(i64::from(self)))
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                scalar_of(value, stringify!($ty))?.into_signed(stringify!($ty))
            }
        }
    )*};
}

macro_rules! unsigned_value {
    ($($ty:ty => $scalar:ident),* $(,)?) => {$(
        impl XmlValue for $ty {
            fn kind() -> ValueKind {
                ValueKind::Scalar(ScalarType::$scalar)
            }

            fn to_value(&self) -> ValueRef<'_> {
                ValueRef::Scalar(Scalar::UInt(u64::from(*self)))
            }

            fn into_value(self) -> Value {
                Value::Scalar(Scalar::UInt(u64::from(self)))
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                scalar_of(value, stringify!($ty))?.into_unsigned(stringify!($ty))
            }
        }
    )*};
}

/// Scalars that map onto a single `Scalar` variant without widening.
macro_rules! direct_value {
    ($($ty:ty => $scalar:ident, $variant:ident, $into:ident);* $(;)?) => {$(
        impl XmlValue for $ty {
            fn kind() -> ValueKind {
                ValueKind::Scalar(ScalarType::$scalar)
            }

            fn to_value(&self) -> ValueRef<'_> {
                ValueRef::Scalar(Scalar::$variant(self.clone()))
            }

            fn into_value(self) -> Value {
                Value::Scalar(Scalar::$variant(self))
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                scalar_of(value, stringify!($ty))?.$into()
            }
        }
    )*};
}

signed_value!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);
unsigned_value!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);
direct_value! {
    bool => Bool, Bool, into_bool;
    f32 => F32, Single, into_f32;
    f64 => F64, Float, into_f64;
    char => Char, Char, into_char;
    String => String, Str, into_string;
    DateTime<Utc> => DateTime, DateTime, into_datetime;
}

impl<T: XmlValue> XmlValue for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::Sequence(Box::new(T::kind()))
    }

    fn to_value(&self) -> ValueRef<'_> {
        ValueRef::List(self.iter().map(XmlValue::to_value).collect())
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(XmlValue::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Absent => Ok(Vec::new()),
            other => Err(ConversionError::Mismatch {
                expected: "sequence",
                found: other.kind_name(),
            }),
        }
    }
}

impl<T: XmlValue> XmlValue for Option<T> {
    fn kind() -> ValueKind {
        ValueKind::Optional(Box::new(T::kind()))
    }

    fn to_value(&self) -> ValueRef<'_> {
        match self {
            Some(value) => value.to_value(),
            None => ValueRef::Absent,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Absent,
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Absent => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[doc(hidden)]
pub fn object_from_value<T: XmlObject>(value: Value) -> Result<T, ConversionError> {
    match value {
        Value::Object(boxed) => boxed
            .downcast::<T>()
            .map(|typed| *typed)
            .map_err(|_| ConversionError::Mismatch {
                expected: std::any::type_name::<T>(),
                found: "object of another type",
            }),
        Value::Absent => Err(ConversionError::Absent {
            target: std::any::type_name::<T>(),
        }),
        other => Err(ConversionError::Mismatch {
            expected: std::any::type_name::<T>(),
            found: other.kind_name(),
        }),
    }
}

#[doc(hidden)]
pub fn enum_from_value<E: XmlEnum>(value: Value) -> Result<E, ConversionError> {
    scalar_of(value, E::INFO.name)?.into_enum::<E>()
}

/// Implements [`XmlValue`] for types that implement [`XmlObject`].
///
/// ```ignore
/// xml_object!(TestManager, TestUser);
/// ```
#[macro_export]
macro_rules! xml_object {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::XmlValue for $ty {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::object::<$ty>()
            }

            fn to_value(&self) -> $crate::ValueRef<'_> {
                $crate::ValueRef::Object($crate::ObjectRef::Borrowed(self))
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::Object(::std::boxed::Box::new(self))
            }

            fn from_value(
                value: $crate::Value,
            ) -> ::std::result::Result<Self, $crate::support::ConversionError> {
                $crate::value::object_from_value::<$ty>(value)
            }
        }
    )+};
}

/// Declares a fieldless enum stored as its variant name.
///
/// The first variant is the default. Reading matches variant names without
/// regard to ASCII case.
///
/// ```ignore
/// xml_enum! {
///     pub enum ProgressStatus { Pending, Running, Done }
/// }
/// ```
#[macro_export]
macro_rules! xml_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $first:ident $(, $variant:ident)* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis enum $name {
            #[default]
            $first,
            $($variant,)*
        }

        impl $crate::support::XmlEnum for $name {
            const INFO: &'static $crate::support::EnumInfo = &$crate::support::EnumInfo {
                name: stringify!($name),
                variants: &[stringify!($first) $(, stringify!($variant))*],
            };

            fn variant_name(self) -> &'static str {
                match self {
                    $name::$first => stringify!($first),
                    $($name::$variant => stringify!($variant),)*
                }
            }

            fn from_variant_name(name: &str) -> ::std::option::Option<Self> {
                let name = name.trim();
                [$name::$first $(, $name::$variant)*]
                    .into_iter()
                    .find(|v| $crate::support::XmlEnum::variant_name(*v).eq_ignore_ascii_case(name))
            }
        }

        impl $crate::XmlValue for $name {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::Scalar($crate::support::ScalarType::Enum(
                    <$name as $crate::support::XmlEnum>::INFO,
                ))
            }

            fn to_value(&self) -> $crate::ValueRef<'_> {
                $crate::ValueRef::Scalar($crate::support::Scalar::Enum(
                    $crate::support::XmlEnum::variant_name(*self),
                ))
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::Scalar($crate::support::Scalar::Enum(
                    $crate::support::XmlEnum::variant_name(self),
                ))
            }

            fn from_value(
                value: $crate::Value,
            ) -> ::std::result::Result<Self, $crate::support::ConversionError> {
                $crate::value::enum_from_value::<$name>(value)
            }
        }
    };
}
