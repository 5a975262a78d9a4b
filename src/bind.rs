//! Walks a [`Value`] tree and builds a reflected value from it.

use std::{borrow::Cow, collections::HashMap, env, fmt};

use facet_core::{Def, Facet, Shape};
use facet_reflect::Partial;

use crate::{
    ConfError, ConfErrorKind, Options, Result,
    coerce::{self, SetError},
    interpolate::expand_env,
    key::{canonicalize, equivalent},
    namespace::{self, Decoder, Leaf, Namespace, Slot},
    value::{Mapping, Value},
};

/// Location inside the document, used in error messages.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyPath(Vec<Segment>);

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
    Entry(String),
}

impl KeyPath {
    pub(crate) fn push_key(&mut self, key: &str) {
        self.0.push(Segment::Key(key.to_string()));
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    pub(crate) fn push_entry(&mut self, key: &str) {
        self.0.push(Segment::Entry(key.to_string()));
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    /// Renders the path with `key` appended, without modifying it.
    pub(crate) fn join(&self, key: &str) -> String {
        let mut path = self.clone();
        path.push_key(key);
        path.to_string()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (at, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if at == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Entry(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// Canonical view of one mapping level.
struct CanonicalIndex<'v> {
    mapping: &'v Mapping,
    by_key: HashMap<String, &'v Value>,
}

impl<'v> CanonicalIndex<'v> {
    fn new(mapping: &'v Mapping) -> Self {
        // later spellings of the same canonical key win
        let by_key = mapping
            .iter()
            .map(|(key, value)| (canonicalize(key), value))
            .collect();
        CanonicalIndex { mapping, by_key }
    }

    fn get(&self, key: &str) -> Option<&'v Value> {
        if let Some(value) = self.by_key.get(key) {
            return Some(value);
        }
        if key.contains('.') {
            return lookup_dotted(self.mapping, key);
        }
        None
    }
}

/// Resolves `a.b.c` through nested mappings.
fn lookup_dotted<'v>(mapping: &'v Mapping, key: &str) -> Option<&'v Value> {
    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut current = last_equivalent(mapping, first)?;
    for segment in segments {
        current = last_equivalent(current.as_mapping()?, segment)?;
    }
    Some(current)
}

fn last_equivalent<'v>(mapping: &'v Mapping, key: &str) -> Option<&'v Value> {
    mapping
        .iter()
        .filter(|(candidate, _)| equivalent(candidate, key))
        .map(|(_, value)| value)
        .last()
}

/// Builds values of reflected types from document trees.
pub(crate) struct Binder<'o> {
    options: &'o Options,
    path: KeyPath,
}

impl<'o> Binder<'o> {
    pub(crate) fn new(options: &'o Options) -> Self {
        Binder {
            options,
            path: KeyPath::default(),
        }
    }

    /// Builds a `T` from `value`.
    ///
    /// `T` is a struct, or an `Option` of one that is always built as `Some`.
    pub(crate) fn build<T: Facet<'static>>(&mut self, value: &Value) -> Result<T> {
        let mut typed_partial = Partial::alloc::<T>()?;
        {
            let partial = typed_partial.inner_mut();
            log::trace!("Allocated partial value for {}", partial.shape());
            let (shape, wrapped) = match partial.shape().def {
                Def::Option(def) => (def.t, true),
                _ => (partial.shape(), false),
            };
            let namespace = namespace::analyze(shape)?;
            let mapping = self.mapping_of(value, shape)?;
            if wrapped {
                partial.begin_some()?;
            }
            self.bind_struct(partial, &namespace, mapping)?;
            if wrapped {
                partial.end()?;
            }
        }
        let boxed_value = typed_partial.build()?;
        log::trace!("Partial value fully built");
        Ok(*boxed_value)
    }

    fn mapping_of<'v>(&self, value: &'v Value, shape: &Shape) -> Result<Option<&'v Mapping>> {
        match value {
            Value::Mapping(mapping) => Ok(Some(mapping)),
            Value::Null => Ok(None),
            other => Err(self.mismatch(format!(
                "expected a mapping for {shape}, found {}",
                other.kind_name()
            ))),
        }
    }

    /// Fills the struct at the top of `partial` from `mapping`.
    ///
    /// A missing mapping behaves like an empty one: every field falls back
    /// to its env, fallback or default value.
    pub(crate) fn bind_struct(
        &mut self,
        partial: &mut Partial<'_>,
        namespace: &Namespace,
        mapping: Option<&Mapping>,
    ) -> Result<()> {
        let index = mapping.map(CanonicalIndex::new);
        if let Some(mapping) = mapping {
            if log::log_enabled!(log::Level::Debug) {
                self.log_unknown_keys(namespace, mapping);
            }
        }
        self.bind_fields(partial, namespace, index.as_ref())
    }

    fn bind_fields(
        &mut self,
        partial: &mut Partial<'_>,
        namespace: &Namespace,
        index: Option<&CanonicalIndex<'_>>,
    ) -> Result<()> {
        for (at, slot) in namespace.slots().iter().enumerate() {
            match slot {
                Slot::Skip => {
                    partial.set_nth_field_to_default(at)?;
                }
                Slot::Flatten {
                    field,
                    namespace: embedded,
                    wrapped,
                } => {
                    if *wrapped && !touches(embedded, index) {
                        partial.set_nth_field_to_default(at)?;
                        continue;
                    }
                    log::trace!("Binding flattened {} at {}", field.name, partial.path());
                    partial.begin_field(field.name)?;
                    if *wrapped {
                        partial.begin_some()?;
                    }
                    self.bind_fields(partial, embedded, index)?;
                    if *wrapped {
                        partial.end()?;
                    }
                    partial.end()?;
                }
                Slot::Composite {
                    field,
                    key,
                    namespace: nested,
                    wrapped,
                    typed_default,
                } => {
                    let found = index.and_then(|index| index.get(key));
                    self.path.push_key(key);
                    let mapping = match found {
                        Some(value) => self.mapping_of(value, nested.shape())?,
                        None => None,
                    };
                    if mapping.is_none() && (*wrapped || *typed_default) {
                        // absent subtrees never allocate an option
                        partial.set_nth_field_to_default(at)?;
                    } else {
                        partial.begin_field(field.name)?;
                        if *wrapped {
                            partial.begin_some()?;
                        }
                        self.bind_struct(partial, nested, mapping)?;
                        if *wrapped {
                            partial.end()?;
                        }
                        partial.end()?;
                    }
                    self.path.pop();
                }
                Slot::Leaf(leaf) => {
                    let found = index.and_then(|index| index.get(leaf.key()));
                    self.path.push_key(leaf.key());
                    self.bind_leaf(partial, at, leaf, found)?;
                    self.path.pop();
                }
            }
        }
        Ok(())
    }

    fn bind_leaf(
        &mut self,
        partial: &mut Partial<'_>,
        at: usize,
        leaf: &Leaf,
        found: Option<&Value>,
    ) -> Result<()> {
        let from_env = leaf
            .env_var()
            .and_then(|name| env::var(name).ok().map(|value| (name, value)));
        let found = found.filter(|value| !value.is_null());
        let value = match (from_env, found) {
            (Some((name, value)), _) => {
                log::debug!("Binding {} from environment variable {name}", self.path);
                Cow::Owned(Value::String(value))
            }
            (None, Some(value)) => Cow::Borrowed(value),
            (None, None) => match leaf.fallback() {
                Some(literal) => {
                    log::debug!("Binding {} from fallback {literal:?}", self.path);
                    Cow::Owned(Value::String(literal.to_string()))
                }
                None => {
                    partial.set_nth_field_to_default(at)?;
                    return Ok(());
                }
            },
        };

        log::trace!("Binding {} as {:?}", self.path, leaf.kind());
        partial.begin_field(leaf.field().name)?;
        self.decode(partial, &leaf.decoder, &value)?;
        partial.end()?;
        Ok(())
    }

    /// Decodes one value into the frame at the top of `partial`.
    ///
    /// `Null` produces the zero value; a struct still gets its fallbacks.
    fn decode(&mut self, partial: &mut Partial<'_>, decoder: &Decoder, value: &Value) -> Result<()> {
        if value.is_null() {
            match decoder {
                Decoder::Struct(namespace) => self.bind_struct(partial, namespace, None)?,
                _ => {
                    partial.set_default()?;
                }
            }
            return Ok(());
        }

        match decoder {
            Decoder::Scalar | Decoder::Duration => {
                let expanded;
                let value = match value {
                    Value::String(s) if self.options.env_enabled() => {
                        expanded = Value::String(expand_env(s));
                        &expanded
                    }
                    _ => value,
                };
                let set = match decoder {
                    Decoder::Duration => coerce::set_duration(partial, value),
                    _ => coerce::set_scalar(partial, value),
                };
                set.map_err(|err| match err {
                    SetError::Coerce(err) => self.mismatch(err.0),
                    SetError::Unsupported => self.unsupported(partial.shape()),
                    SetError::Conf(kind) => kind.into(),
                })
            }
            Decoder::Transparent(inner) => {
                partial.begin_inner()?;
                self.decode(partial, inner, value)?;
                partial.end()?;
                Ok(())
            }
            Decoder::Option(inner) => {
                partial.begin_some()?;
                self.decode(partial, inner, value)?;
                partial.end()?;
                Ok(())
            }
            Decoder::List(item) => {
                let Value::Sequence(items) = value else {
                    return Err(
                        self.mismatch(format!("expected a sequence, found {}", value.kind_name()))
                    );
                };
                partial.begin_list()?;
                for (at, element) in items.iter().enumerate() {
                    self.path.push_index(at);
                    partial.begin_list_item()?;
                    self.decode(partial, item, element)?;
                    partial.end()?;
                    self.path.pop();
                }
                Ok(())
            }
            Decoder::Map(entry) => {
                let Value::Mapping(entries) = value else {
                    return Err(
                        self.mismatch(format!("expected a mapping, found {}", value.kind_name()))
                    );
                };
                partial.begin_map()?;
                for (key, element) in entries.iter() {
                    self.path.push_entry(key);
                    partial.begin_key()?;
                    partial.set(key.to_string())?;
                    partial.end()?;
                    partial.begin_value()?;
                    self.decode(partial, entry, element)?;
                    partial.end()?;
                    self.path.pop();
                }
                Ok(())
            }
            Decoder::Struct(namespace) => {
                let mapping = self.mapping_of(value, namespace.shape())?;
                self.bind_struct(partial, namespace, mapping)
            }
            Decoder::Unsupported(shape) => Err(self.unsupported(shape)),
        }
    }

    fn mismatch(&self, message: String) -> ConfError {
        ConfErrorKind::TypeMismatch {
            path: self.path.to_string(),
            message,
        }
        .into()
    }

    fn unsupported(&self, shape: &'static Shape) -> ConfError {
        ConfErrorKind::UnsupportedField {
            path: self.path.to_string(),
            type_identifier: shape.type_identifier,
        }
        .into()
    }

    fn log_unknown_keys(&self, namespace: &Namespace, mapping: &Mapping) {
        for (key, _) in mapping.iter() {
            let key = canonicalize(key);
            let dotted = format!("{key}.");
            let known = namespace
                .keys()
                .any(|candidate| candidate == key || candidate.starts_with(&dotted));
            if !known {
                log::debug!(
                    "Ignoring unknown key {key:?} for {} at {:?}",
                    namespace.shape(),
                    self.path.to_string()
                );
            }
        }
    }
}

/// Returns true if the document or the environment supplies anything for a
/// key of `namespace`.
fn touches(namespace: &Namespace, index: Option<&CanonicalIndex<'_>>) -> bool {
    namespace.bindings().iter().any(|binding| {
        let found = index
            .and_then(|index| index.get(binding.key()))
            .is_some_and(|value| !value.is_null());
        found
            || binding
                .as_leaf()
                .and_then(Leaf::env_var)
                .is_some_and(|name| env::var_os(name).is_some())
    })
}
