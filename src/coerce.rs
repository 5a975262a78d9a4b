//! Coercion of document scalars into primitive targets.

use facet_core::{NumericType, PrimitiveType, Type};
use facet_reflect::Partial;

use crate::{
    ConfErrorKind,
    duration::{Duration, parse_duration},
    value::{Number, Value},
};

/// A scalar that does not fit its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CoerceError(pub(crate) String);

impl CoerceError {
    fn mismatch(expected: &str, found: &Value) -> Self {
        CoerceError(format!("expected {expected}, found {}", found.kind_name()))
    }
}

/// Conversion of a document scalar into a primitive.
pub(crate) trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Result<Self, CoerceError>;
}

fn out_of_range(number: impl std::fmt::Display, expected: &str) -> CoerceError {
    CoerceError(format!("{number} is out of range for {expected}"))
}

macro_rules! integer {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_value(value: &Value) -> Result<Self, CoerceError> {
                match value {
                    Value::Number(Number::PosInt(n)) => {
                        <$ty>::try_from(*n).map_err(|_| out_of_range(n, Self::EXPECTED))
                    }
                    Value::Number(Number::NegInt(n)) => {
                        <$ty>::try_from(*n).map_err(|_| out_of_range(n, Self::EXPECTED))
                    }
                    Value::Number(Number::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                        // MAX + 1 is a power of two, exact as a float
                        let in_range = *f >= <$ty>::MIN as f64 && *f < <$ty>::MAX as f64 + 1.0;
                        if in_range {
                            Ok(*f as $ty)
                        } else {
                            Err(out_of_range(f, Self::EXPECTED))
                        }
                    }
                    Value::Number(Number::Float(f)) => {
                        Err(CoerceError(format!("{f} is not an integer")))
                    }
                    Value::String(s) => s.trim().parse::<$ty>().map_err(|_| {
                        CoerceError(format!("cannot parse {s:?} as {}", Self::EXPECTED))
                    }),
                    other => Err(CoerceError::mismatch(Self::EXPECTED, other)),
                }
            }
        }
    )*};
}

integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_value(value: &Value) -> Result<Self, CoerceError> {
                match value {
                    Value::Number(Number::PosInt(n)) => Ok(*n as $ty),
                    Value::Number(Number::NegInt(n)) => Ok(*n as $ty),
                    Value::Number(Number::Float(f)) => Ok(*f as $ty),
                    Value::String(s) => s.trim().parse::<$ty>().map_err(|_| {
                        CoerceError(format!("cannot parse {s:?} as {}", Self::EXPECTED))
                    }),
                    other => Err(CoerceError::mismatch(Self::EXPECTED, other)),
                }
            }
        }
    )*};
}

float!(f32, f64);

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim() {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
                _ => Err(CoerceError(format!("cannot parse {s:?} as bool"))),
            },
            other => Err(CoerceError::mismatch(Self::EXPECTED, other)),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(CoerceError::mismatch(Self::EXPECTED, other)),
        }
    }
}

impl FromValue for Duration {
    const EXPECTED: &'static str = "duration";

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => parse_duration(s).map_err(|err| CoerceError(err.to_string())),
            Value::Number(Number::PosInt(nanos)) => Ok(Duration::from_nanos(*nanos)),
            Value::Number(n) => Err(CoerceError(format!(
                "{n} is not a valid duration in nanoseconds"
            ))),
            other => Err(CoerceError::mismatch(Self::EXPECTED, other)),
        }
    }
}

/// Failure to write a scalar into a partial value.
pub(crate) enum SetError {
    Coerce(CoerceError),
    Unsupported,
    Conf(ConfErrorKind),
}

impl From<CoerceError> for SetError {
    fn from(err: CoerceError) -> Self {
        SetError::Coerce(err)
    }
}

impl From<facet_reflect::ReflectError> for SetError {
    fn from(err: facet_reflect::ReflectError) -> Self {
        SetError::Conf(ConfErrorKind::Reflect(err))
    }
}

fn set_as<'facet, T: FromValue + facet::Facet<'facet>>(
    partial: &mut Partial<'facet>,
    value: &Value,
) -> Result<(), SetError> {
    partial.set(T::from_value(value)?)?;
    Ok(())
}

/// Writes `value` into the scalar at the top of `partial`.
pub(crate) fn set_scalar(partial: &mut Partial<'_>, value: &Value) -> Result<(), SetError> {
    let shape = partial.shape();
    if shape.is_type::<String>() {
        return set_as::<String>(partial, value);
    }
    if shape.is_type::<bool>() {
        return set_as::<bool>(partial, value);
    }
    if shape.is_type::<usize>() {
        return set_as::<usize>(partial, value);
    }
    if shape.is_type::<isize>() {
        return set_as::<isize>(partial, value);
    }

    let Type::Primitive(primitive) = &shape.ty else {
        // other scalars (paths, addresses) parse from their text form
        let text = String::from_value(value)?;
        partial
            .parse_from_str(&text)
            .map_err(|err| SetError::Coerce(CoerceError(err.to_string())))?;
        return Ok(());
    };
    let size = shape.layout.sized_layout().map(|layout| layout.size()).ok();

    use NumericType::{Float, Integer};
    use PrimitiveType::Numeric;
    match (primitive, size) {
        (Numeric(Integer { signed: false }), Some(1)) => set_as::<u8>(partial, value),
        (Numeric(Integer { signed: false }), Some(2)) => set_as::<u16>(partial, value),
        (Numeric(Integer { signed: false }), Some(4)) => set_as::<u32>(partial, value),
        (Numeric(Integer { signed: false }), Some(8)) => set_as::<u64>(partial, value),
        (Numeric(Integer { signed: false }), Some(16)) => set_as::<u128>(partial, value),
        (Numeric(Integer { signed: true }), Some(1)) => set_as::<i8>(partial, value),
        (Numeric(Integer { signed: true }), Some(2)) => set_as::<i16>(partial, value),
        (Numeric(Integer { signed: true }), Some(4)) => set_as::<i32>(partial, value),
        (Numeric(Integer { signed: true }), Some(8)) => set_as::<i64>(partial, value),
        (Numeric(Integer { signed: true }), Some(16)) => set_as::<i128>(partial, value),
        (Numeric(Float), Some(4)) => set_as::<f32>(partial, value),
        (Numeric(Float), Some(8)) => set_as::<f64>(partial, value),
        _ => Err(SetError::Unsupported),
    }
}

/// Writes `value` into a [`Duration`] at the top of `partial`.
pub(crate) fn set_duration(partial: &mut Partial<'_>, value: &Value) -> Result<(), SetError> {
    set_as::<Duration>(partial, value)
}
