//! Conversions between typed [`Value`]s and Rust types.

use crate::error::DecodeError;
use crate::schema::{EnumDef, PrimitiveKind, TypeExpr, TypeKey};
use crate::value::{RawValue, Value, mismatch};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read a Rust value out of a decoded [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, DecodeError>;
}

/// Turn a Rust value into a typed [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Rust types that know the [`TypeExpr`] a field of their type declares.
pub trait Describe {
    fn type_expr() -> TypeExpr;
}

/// Fieldless Rust enums decoded from their variant names.
///
/// Usually implemented through [`crate::config_enum!`].
pub trait ConfigEnum: Sized + 'static {
    /// Variant names in declaration order.
    const VARIANTS: &'static [&'static str];

    fn from_variant(name: &str) -> Option<Self>;

    fn variant(&self) -> &'static str;

    fn enum_def() -> Arc<EnumDef> {
        Arc::new(EnumDef::new(
            TypeKey::of::<Self>(),
            Self::VARIANTS.iter().copied(),
        ))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(flag) => Ok(*flag),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Describe for bool {
    fn type_expr() -> TypeExpr {
        TypeExpr::Primitive(PrimitiveKind::Bool)
    }
}

// Only widths that fit `i64` losslessly. `u64`, `usize` and `isize` have no
// conversions so an out-of-range value can never be encoded.
macro_rules! integer_conversions {
    ($($int:ty),+) => {$(
        impl FromValue for $int {
            fn from_value(value: &Value) -> Result<Self, DecodeError> {
                match value {
                    Value::Int(number) => <$int>::try_from(*number).map_err(|_| DecodeError::Extract {
                        path: crate::error::FieldPath::root(),
                        expected: stringify!($int).to_string(),
                        found: format!("out-of-range integer {number}"),
                    }),
                    other => Err(mismatch::<Self>(other)),
                }
            }
        }

        impl ToValue for $int {
            fn to_value(&self) -> Value {
                Value::Int(i64::from(*self))
            }
        }

        impl Describe for $int {
            fn type_expr() -> TypeExpr {
                TypeExpr::Primitive(PrimitiveKind::Int)
            }
        }
    )+};
}

integer_conversions!(i8, i16, i32, i64, u8, u16, u32);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Float(number) => Ok(*number),
            Value::Int(number) => Ok(*number as f64),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl Describe for f64 {
    fn type_expr() -> TypeExpr {
        TypeExpr::Primitive(PrimitiveKind::Float)
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        f64::from_value(value).map(|number| number as f32)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl Describe for f32 {
    fn type_expr() -> TypeExpr {
        TypeExpr::Primitive(PrimitiveKind::Float)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Str(text) => Ok(text.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Describe for String {
    fn type_expr() -> TypeExpr {
        TypeExpr::Primitive(PrimitiveKind::Str)
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Path(path) => Ok(path.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl ToValue for PathBuf {
    fn to_value(&self) -> Value {
        Value::Path(self.clone())
    }
}

impl ToValue for Path {
    fn to_value(&self) -> Value {
        Value::Path(self.to_path_buf())
    }
}

impl Describe for PathBuf {
    fn type_expr() -> TypeExpr {
        TypeExpr::Path
    }
}

impl FromValue for RawValue {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Any(raw) => Ok(raw.clone()),
            Value::None => Ok(RawValue::Null),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl ToValue for RawValue {
    fn to_value(&self) -> Value {
        Value::Any(self.clone())
    }
}

impl Describe for RawValue {
    fn type_expr() -> TypeExpr {
        TypeExpr::Any
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::None,
        }
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::optional(T::type_expr())
    }
}

/// Elements of any sequence-shaped value.
fn sequence_items<C: ?Sized + 'static>(value: &Value) -> Result<&[Value], DecodeError> {
    match value {
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => Ok(items),
        other => Err(mismatch::<C>(other)),
    }
}

fn collect_items<C, T>(value: &Value) -> Result<C, DecodeError>
where
    C: FromIterator<T> + 'static,
    T: FromValue,
{
    sequence_items::<C>(value)?
        .iter()
        .enumerate()
        .map(|(index, item)| T::from_value(item).map_err(|err| err.within(&index.to_string())))
        .collect()
}

impl<T: FromValue + 'static> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        collect_items(value)
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::list(T::type_expr())
    }
}

impl<T: FromValue + Eq + Hash + 'static> FromValue for HashSet<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        collect_items(value)
    }
}

impl<T: ToValue> ToValue for HashSet<T> {
    fn to_value(&self) -> Value {
        Value::Set(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: Describe> Describe for HashSet<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::set(T::type_expr())
    }
}

impl<T: FromValue + Ord + 'static> FromValue for BTreeSet<T> {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        collect_items(value)
    }
}

impl<T: ToValue> ToValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::Set(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::set(T::type_expr())
    }
}

fn collect_pairs<C, K, V>(value: &Value) -> Result<C, DecodeError>
where
    C: FromIterator<(K, V)> + 'static,
    K: FromValue,
    V: FromValue,
{
    let Value::Map(pairs) = value else {
        return Err(mismatch::<C>(value));
    };
    pairs
        .iter()
        .enumerate()
        .map(|(index, (key, item))| {
            let segment = key.as_str().map_or_else(|| index.to_string(), str::to_string);
            let key = K::from_value(key).map_err(|err| err.within(&segment))?;
            let item = V::from_value(item).map_err(|err| err.within(&segment))?;
            Ok((key, item))
        })
        .collect()
}

fn map_to_value<'m, K, V, I>(entries: I) -> Value
where
    K: ToValue + 'm,
    V: ToValue + 'm,
    I: Iterator<Item = (&'m K, &'m V)>,
{
    Value::Map(
        entries
            .map(|(key, item)| (key.to_value(), item.to_value()))
            .collect(),
    )
}

impl<K, V> FromValue for HashMap<K, V>
where
    K: FromValue + Eq + Hash + 'static,
    V: FromValue + 'static,
{
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        collect_pairs(value)
    }
}

impl<K: ToValue, V: ToValue> ToValue for HashMap<K, V> {
    fn to_value(&self) -> Value {
        map_to_value(self.iter())
    }
}

impl<K: Describe, V: Describe> Describe for HashMap<K, V> {
    fn type_expr() -> TypeExpr {
        TypeExpr::map(K::type_expr(), V::type_expr())
    }
}

impl<K, V> FromValue for BTreeMap<K, V>
where
    K: FromValue + Ord + 'static,
    V: FromValue + 'static,
{
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        collect_pairs(value)
    }
}

impl<K: ToValue, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        map_to_value(self.iter())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn type_expr() -> TypeExpr {
        TypeExpr::map(K::type_expr(), V::type_expr())
    }
}

macro_rules! tuple_conversions {
    ($len:expr; $($name:ident : $index:tt),+) => {
        impl<$($name: FromValue + 'static),+> FromValue for ($($name,)+) {
            fn from_value(value: &Value) -> Result<Self, DecodeError> {
                let items = sequence_items::<Self>(value)?;
                if items.len() != $len {
                    return Err(DecodeError::Extract {
                        path: crate::error::FieldPath::root(),
                        expected: format!("{}-tuple", $len),
                        found: format!("{} elements", items.len()),
                    });
                }
                Ok(($(
                    $name::from_value(&items[$index])
                        .map_err(|err| err.within(stringify!($index)))?,
                )+))
            }
        }

        impl<$($name: ToValue),+> ToValue for ($($name,)+) {
            fn to_value(&self) -> Value {
                Value::Tuple(vec![$(self.$index.to_value()),+])
            }
        }

        impl<$($name: Describe),+> Describe for ($($name,)+) {
            fn type_expr() -> TypeExpr {
                TypeExpr::tuple([$($name::type_expr()),+])
            }
        }
    };
}

tuple_conversions!(1; A: 0);
tuple_conversions!(2; A: 0, B: 1);
tuple_conversions!(3; A: 0, B: 1, C: 2);
tuple_conversions!(4; A: 0, B: 1, C: 2, D: 3);

/// Declare a fieldless enum usable as a config field.
///
/// The macro derives `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq` and `Hash`
/// and implements [`ConfigEnum`], [`FromValue`], [`ToValue`] and [`Describe`].
#[macro_export]
macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $crate::ConfigEnum for $name {
            const VARIANTS: &'static [&'static str] = &[$(stringify!($variant)),+];

            fn from_variant(name: &str) -> ::std::option::Option<Self> {
                match name {
                    $(stringify!($variant) => ::std::option::Option::Some(Self::$variant),)+
                    _ => ::std::option::Option::None,
                }
            }

            fn variant(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                $crate::value::enum_from_value(value)
            }
        }

        impl $crate::ToValue for $name {
            fn to_value(&self) -> $crate::Value {
                $crate::value::enum_to_value(self)
            }
        }

        impl $crate::Describe for $name {
            fn type_expr() -> $crate::TypeExpr {
                $crate::TypeExpr::enumeration::<Self>()
            }
        }
    };
}

/// Let config types appear inside options, collections and other fields.
///
/// Implements [`FromValue`], [`ToValue`] and [`Describe`] for types that
/// already implement [`crate::Config`].
#[macro_export]
macro_rules! config_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::FromValue for $ty {
            fn from_value(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                $crate::value::config_from_value(value)
            }
        }

        impl $crate::ToValue for $ty {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Struct(<$ty as $crate::Config>::to_struct(self))
            }
        }

        impl $crate::Describe for $ty {
            fn type_expr() -> $crate::TypeExpr {
                $crate::TypeExpr::structure::<$ty>()
            }
        }
    )+};
}
