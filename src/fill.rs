//! Applies `fallback`, `env` and `default` directives to an already
//! constructed value.

use facet_core::{Def, Facet};
use facet_reflect::Peek;

use crate::{
    ConfError, ConfErrorKind, Options, Result,
    bind::Binder,
    duration::Duration,
    namespace::{self, Binding, Decoder, Namespace, struct_fields},
    value::{Mapping, Number, Value},
};

/// Fills every zero field of `target` that carries a directive: the `env`
/// variable when it is set, else the `fallback` literal, else the
/// `#[facet(default)]` value.
///
/// `target` must be a struct, or an `Option` holding one. A field that
/// carries a directive but is already non-zero is an error. The value is
/// rebuilt, so fields marked `skip` return to their defaults.
///
/// ```
/// use facet::Facet;
///
/// #[derive(Facet, Debug, Default)]
/// struct Retry {
///     #[facet(fallback = "3")]
///     attempts: u32,
///     label: String,
/// }
///
/// let mut retry = Retry::default();
/// confbind::fill_default(&mut retry).unwrap();
/// assert_eq!(retry.attempts, 3);
/// assert!(retry.label.is_empty());
/// ```
pub fn fill_default<T: Facet<'static>>(target: &mut T) -> Result<()> {
    let shape = T::SHAPE;
    log::trace!("Filling defaults of {shape}");

    let peek = Peek::new(&*target);
    let (struct_shape, value) = match shape.def {
        Def::Option(def) => match peek.into_option().ok().and_then(|option| option.value()) {
            Some(value) => (def.t, value),
            None => {
                return Err(ConfErrorKind::InvalidDefault(format!(
                    "cannot fill defaults of an empty {shape}"
                ))
                .into());
            }
        },
        _ => (shape, peek),
    };
    if struct_fields(struct_shape).is_none() {
        return Err(ConfErrorKind::InvalidDefault(format!(
            "cannot fill defaults of {struct_shape}, only of structs"
        ))
        .into());
    }

    let namespace = namespace::analyze(struct_shape)?;
    check_unfilled(&namespace, value)?;
    let snapshot = Value::Mapping(Snapshot::default().mapping(&namespace, value)?);

    let options = Options::default();
    let filled: T = Binder::new(&options)
        .build(&snapshot)
        .map_err(|err| invalid_default(&err))?;
    *target = filled;
    Ok(())
}

fn invalid_default(err: &ConfError) -> ConfError {
    match err.kind() {
        ConfErrorKind::TypeMismatch { path, message } => {
            ConfErrorKind::InvalidDefault(format!("field {path}: {message}")).into()
        }
        other => ConfErrorKind::InvalidDefault(other.to_string()).into(),
    }
}

/// Rejects fields that carry a directive but already hold a value.
fn check_unfilled(namespace: &Namespace, target: Peek<'_, '_>) -> Result<()> {
    for binding in namespace.bindings() {
        match binding {
            Binding::Leaf(leaf) if leaf.has_fallback() => {
                let Some(value) = leaf.path().resolve(target, false)? else {
                    continue;
                };
                if !leaf.decoder.is_zero(value) {
                    return Err(ConfErrorKind::InvalidDefault(format!(
                        "field {} already has a value",
                        leaf.path()
                    ))
                    .into());
                }
            }
            Binding::Leaf(_) => {}
            Binding::Composite(composite) => {
                for owner in composite.owners() {
                    if let Some(value) = owner.path().resolve(target, true)? {
                        check_unfilled(owner.namespace(), value)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Turns a reflected value back into a document tree.
///
/// Zero leaves of the outer structs are left out so that binding the
/// snapshot applies their directives again; values inside collections are
/// kept whole.
#[derive(Default)]
struct Snapshot {
    inside_collection: bool,
}

impl Snapshot {
    fn mapping(&mut self, namespace: &Namespace, target: Peek<'_, '_>) -> Result<Mapping> {
        let mut mapping = Mapping::new();
        for binding in namespace.bindings() {
            match binding {
                Binding::Leaf(leaf) => {
                    let Some(value) = leaf.path().resolve(target, false)? else {
                        continue;
                    };
                    if !self.inside_collection && leaf.decoder.is_zero(value) {
                        continue;
                    }
                    let value = self.value(&leaf.decoder, value, leaf.key())?;
                    mapping.insert(leaf.key(), value);
                }
                Binding::Composite(composite) => {
                    for owner in composite.owners() {
                        let Some(value) = owner.path().resolve(target, true)? else {
                            continue;
                        };
                        let nested = self.mapping(owner.namespace(), value)?;
                        match mapping.get_mut(composite.key()) {
                            Some(Value::Mapping(existing)) => {
                                for (key, value) in nested {
                                    existing.insert(key, value);
                                }
                            }
                            _ => {
                                mapping.insert(composite.key(), Value::Mapping(nested));
                            }
                        }
                    }
                }
            }
        }
        Ok(mapping)
    }

    fn value(&mut self, decoder: &Decoder, value: Peek<'_, '_>, key: &str) -> Result<Value> {
        Ok(match decoder {
            Decoder::Scalar => scalar_value(value),
            Decoder::Duration => match value.get::<Duration>() {
                Ok(duration) => Value::Number(Number::PosInt(duration.as_nanos())),
                Err(_) => return Err(ConfErrorKind::ReflectMismatch("Duration").into()),
            },
            Decoder::Transparent(inner) => self.value(inner, value.innermost_peek(), key)?,
            Decoder::Option(inner) => match value.into_option().ok().and_then(|o| o.value()) {
                Some(value) => self.value(inner, value, key)?,
                None => Value::Null,
            },
            Decoder::List(item) => {
                let list = value
                    .into_list()
                    .map_err(|_| ConfErrorKind::ReflectMismatch(value.shape().type_identifier))?;
                let outer = std::mem::replace(&mut self.inside_collection, true);
                let items = list
                    .iter()
                    .map(|element| self.value(item, element, key))
                    .collect::<Result<Vec<_>>>();
                self.inside_collection = outer;
                Value::Sequence(items?)
            }
            Decoder::Map(entry) => {
                let map = value
                    .into_map()
                    .map_err(|_| ConfErrorKind::ReflectMismatch(value.shape().type_identifier))?;
                let outer = std::mem::replace(&mut self.inside_collection, true);
                let entries = map
                    .iter()
                    .map(|(name, element)| {
                        let name = name.as_str().unwrap_or_default().to_string();
                        Ok((name, self.value(entry, element, key)?))
                    })
                    .collect::<Result<Mapping>>();
                self.inside_collection = outer;
                Value::Mapping(entries?)
            }
            Decoder::Struct(namespace) => {
                let outer = std::mem::replace(&mut self.inside_collection, true);
                let nested = self.mapping(namespace, value);
                self.inside_collection = outer;
                Value::Mapping(nested?)
            }
            Decoder::Unsupported(shape) => {
                return Err(ConfErrorKind::UnsupportedField {
                    path: key.to_string(),
                    type_identifier: shape.type_identifier,
                }
                .into());
            }
        })
    }
}

macro_rules! integer_value {
    ($value:ident; $($ty:ty => $wide:ty),*) => {$(
        if let Ok(n) = $value.get::<$ty>() {
            return match i64::try_from(*n as $wide) {
                Ok(n) => Value::Number(Number::from(n)),
                Err(_) => match u64::try_from(*n as $wide) {
                    Ok(n) => Value::Number(Number::PosInt(n)),
                    Err(_) => Value::String(n.to_string()),
                },
            };
        }
    )*};
}

fn scalar_value(value: Peek<'_, '_>) -> Value {
    if let Some(s) = value.as_str() {
        return Value::String(s.to_string());
    }
    if let Ok(b) = value.get::<bool>() {
        return Value::Bool(*b);
    }
    integer_value!(value;
        u8 => i128, u16 => i128, u32 => i128, u64 => i128, usize => i128,
        i8 => i128, i16 => i128, i32 => i128, i64 => i128, isize => i128,
        u128 => u128, i128 => i128);
    if let Ok(f) = value.get::<f32>() {
        return Value::Number(Number::Float(f64::from(*f)));
    }
    if let Ok(f) = value.get::<f64>() {
        return Value::Number(Number::Float(*f));
    }
    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use facet::Facet;

    use super::*;

    #[derive(Facet, Debug, Default)]
    struct Defaults {
        #[facet(fallback = "hello")]
        name: String,
        #[facet(fallback = "8080")]
        port: u16,
        untouched: String,
    }

    #[test]
    fn fills_zero_fields_only_with_directives() {
        let mut value = Defaults::default();
        fill_default(&mut value).unwrap();
        assert_eq!(value.name, "hello");
        assert_eq!(value.port, 8080);
        assert!(value.untouched.is_empty());
    }

    #[test]
    fn keeps_fields_without_directives() {
        let mut value = Defaults {
            untouched: "kept".into(),
            ..Defaults::default()
        };
        fill_default(&mut value).unwrap();
        assert_eq!(value.untouched, "kept");
        assert_eq!(value.port, 8080);
    }

    #[test]
    fn rejects_fields_already_set() {
        let mut value = Defaults {
            port: 1,
            ..Defaults::default()
        };
        let err = fill_default(&mut value).unwrap_err();
        assert!(matches!(err.kind(), ConfErrorKind::InvalidDefault(_)));
    }

    #[test]
    fn rejects_non_structs_and_empty_options() {
        let mut number = 3i32;
        assert!(fill_default(&mut number).is_err());

        let mut none: Option<Defaults> = None;
        assert!(fill_default(&mut none).is_err());

        let mut some = Some(Defaults::default());
        fill_default(&mut some).unwrap();
        assert_eq!(some.map(|value| value.port), Some(8080));
    }

    #[test]
    fn wide_integers_survive_the_snapshot() {
        assert_eq!(scalar_value(Peek::new(&u128::MAX)), Value::String(u128::MAX.to_string()));
        assert_eq!(scalar_value(Peek::new(&u64::MAX)), Value::Number(Number::PosInt(u64::MAX)));
        assert_eq!(scalar_value(Peek::new(&-5i8)), Value::Number(Number::NegInt(-5)));
    }
}
