//! Field namespaces: the collision-checked mapping from canonical document
//! keys to the fields that receive them.
//!
//! A namespace is a pure function of a type's [`Shape`]. It is built once per
//! type, cached for the life of the process and shared through [`Arc`].

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use facet_core::{ConstTypeId, Def, Facet, Field, Shape, Type, UserType};
use facet_reflect::Peek;

use crate::{
    ConfErrorKind, Result,
    duration::Duration,
    key::canonicalize,
    tag::{Optionality, Tag},
};

/// Classification of a namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A primitive value.
    Scalar,
    /// A transparent wrapper around a primitive.
    NamedScalar,
    /// A sequence, decoded element by element.
    Slice,
    /// A string-keyed map; keys are taken verbatim.
    Map,
    /// A nested struct, decoded field by field.
    Composite,
    /// A type that cannot be decoded (enums, sets, pointers).
    Unsupported,
}

/// Fields from a namespace root down to one field.
///
/// Every link but the last is a struct field, possibly behind an `Option`.
#[derive(Clone, Default)]
pub struct FieldPath(Vec<&'static Field>);

impl FieldPath {
    fn single(field: &'static Field) -> Self {
        FieldPath(vec![field])
    }

    fn prefixed(&self, field: &'static Field) -> Self {
        let mut fields = Vec::with_capacity(self.0.len() + 1);
        fields.push(field);
        fields.extend_from_slice(&self.0);
        FieldPath(fields)
    }

    /// The fields along the path.
    pub fn fields(&self) -> &[&'static Field] {
        &self.0
    }

    /// Looks at the addressed value; `None` if an optional link is empty.
    ///
    /// With `descend` the addressed value is also stepped through its own
    /// `Option` layer, which is how composite owners are reached.
    pub(crate) fn resolve<'mem, 'facet>(
        &self,
        root: Peek<'mem, 'facet>,
        descend: bool,
    ) -> Result<Option<Peek<'mem, 'facet>>> {
        let mut current = root;
        for (at, field) in self.0.iter().enumerate() {
            let container = current.shape().type_identifier;
            let value = current
                .into_struct()
                .map_err(|_| ConfErrorKind::ReflectMismatch(container))?
                .field_by_name(field.name)
                .map_err(|_| ConfErrorKind::ReflectMismatch(container))?;
            if at + 1 == self.0.len() && !descend {
                return Ok(Some(value));
            }
            match step_into(field, value) {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Steps through the `Option` layer of `field`, if it has one.
fn step_into<'mem, 'facet>(
    field: &Field,
    value: Peek<'mem, 'facet>,
) -> Option<Peek<'mem, 'facet>> {
    if !matches!(field.shape.def, Def::Option(_)) {
        return Some(value);
    }
    match value.into_option() {
        Ok(option) => option.value(),
        Err(_) => Some(value),
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (at, field) in self.0.iter().enumerate() {
            if at > 0 {
                f.write_str(".")?;
            }
            f.write_str(field.name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({self})")
    }
}

/// How a leaf value is decoded, resolved once when the namespace is built.
#[derive(Clone)]
pub(crate) enum Decoder {
    Scalar,
    Duration,
    Transparent(Box<Decoder>),
    Option(Box<Decoder>),
    List(Box<Decoder>),
    Map(Box<Decoder>),
    Struct(Arc<Namespace>),
    Unsupported(&'static Shape),
}

impl Decoder {
    pub(crate) fn kind(&self) -> FieldKind {
        match self {
            Decoder::Scalar | Decoder::Duration => FieldKind::Scalar,
            Decoder::Transparent(inner) => match inner.kind() {
                FieldKind::Scalar => FieldKind::NamedScalar,
                kind => kind,
            },
            Decoder::Option(inner) => inner.kind(),
            Decoder::List(_) => FieldKind::Slice,
            Decoder::Map(_) => FieldKind::Map,
            Decoder::Struct(_) => FieldKind::Composite,
            Decoder::Unsupported(_) => FieldKind::Unsupported,
        }
    }

    /// Whether a literal string can be decoded into this target.
    fn accepts_literal(&self) -> bool {
        match self {
            Decoder::Scalar | Decoder::Duration => true,
            Decoder::Transparent(inner) | Decoder::Option(inner) => inner.accepts_literal(),
            _ => false,
        }
    }

    pub(crate) fn is_zero(&self, value: Peek<'_, '_>) -> bool {
        match self {
            Decoder::Scalar => scalar_is_zero(value),
            Decoder::Duration => value.get::<Duration>().is_ok_and(|d| d.is_zero()),
            Decoder::Transparent(inner) => inner.is_zero(value.innermost_peek()),
            Decoder::Option(_) => value.into_option().is_ok_and(|option| option.is_none()),
            Decoder::List(_) => value.into_list().is_ok_and(|list| list.len() == 0),
            Decoder::Map(_) => value.into_map().is_ok_and(|map| map.len() == 0),
            Decoder::Struct(namespace) => namespace.is_zero(value),
            Decoder::Unsupported(_) => false,
        }
    }
}

macro_rules! numeric_is_zero {
    ($value:ident; $($ty:ty),*) => {$(
        if let Ok(n) = $value.get::<$ty>() {
            return *n == (0 as $ty);
        }
    )*};
}

fn scalar_is_zero(value: Peek<'_, '_>) -> bool {
    if let Some(s) = value.as_str() {
        return s.is_empty();
    }
    if let Ok(b) = value.get::<bool>() {
        return !*b;
    }
    numeric_is_zero!(value; u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);
    value.to_string().is_empty()
}

/// A field that receives one document value as a whole.
#[derive(Clone)]
pub struct Leaf {
    key: String,
    field: &'static Field,
    path: FieldPath,
    pub(crate) decoder: Decoder,
    optionality: Optionality,
    fallback: Option<&'static str>,
    env: Option<&'static str>,
    typed_default: bool,
}

impl Leaf {
    /// The canonical document key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The declaring field.
    pub fn field(&self) -> &'static Field {
        self.field
    }

    /// Where the field sits below the namespace root.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Classification of the field type.
    pub fn kind(&self) -> FieldKind {
        self.decoder.kind()
    }

    /// Whether the field may stay zero after binding.
    pub fn optionality(&self) -> &Optionality {
        &self.optionality
    }

    /// The `fallback` literal, if any.
    pub fn fallback(&self) -> Option<&'static str> {
        self.fallback
    }

    /// The `env` variable name, if any.
    pub fn env_var(&self) -> Option<&'static str> {
        self.env
    }

    /// Returns true if the field carries `default`, `fallback` or `env`.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some() || self.env.is_some() || self.typed_default
    }
}

/// One struct-valued destination of a composite binding.
#[derive(Clone)]
pub struct Owner {
    path: FieldPath,
    namespace: Arc<Namespace>,
    optional: bool,
}

impl Owner {
    /// Where the struct sits below the namespace root.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// The namespace of the struct.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Whether the struct was declared `optional`.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    fn prefixed(&self, field: &'static Field) -> Self {
        Owner {
            path: self.path.prefixed(field),
            namespace: self.namespace.clone(),
            optional: self.optional,
        }
    }
}

/// A key bound into one or more structs from the same document subtree.
#[derive(Clone)]
pub struct Composite {
    key: String,
    owners: Vec<Owner>,
}

impl Composite {
    /// The canonical document key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every struct populated from the key's subtree.
    pub fn owners(&self) -> &[Owner] {
        &self.owners
    }

    /// Returns true when several embedding paths share the key.
    pub fn is_merged(&self) -> bool {
        self.owners.len() > 1
    }
}

/// An entry of a [`Namespace`].
#[derive(Clone)]
pub enum Binding {
    /// The key is assigned to a single field as one value.
    Leaf(Leaf),
    /// The key's subtree is decoded field by field into one or more structs.
    Composite(Composite),
}

impl Binding {
    /// The canonical document key.
    pub fn key(&self) -> &str {
        match self {
            Binding::Leaf(leaf) => leaf.key(),
            Binding::Composite(composite) => composite.key(),
        }
    }

    /// Classification of the entry.
    pub fn kind(&self) -> FieldKind {
        match self {
            Binding::Leaf(leaf) => leaf.kind(),
            Binding::Composite(_) => FieldKind::Composite,
        }
    }

    /// Returns the leaf, if this is one.
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Binding::Leaf(leaf) => Some(leaf),
            Binding::Composite(_) => None,
        }
    }

    /// Returns the composite, if this is one.
    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Binding::Composite(composite) => Some(composite),
            Binding::Leaf(_) => None,
        }
    }

    fn prefixed(&self, field: &'static Field) -> Self {
        match self {
            Binding::Leaf(leaf) => Binding::Leaf(Leaf {
                path: leaf.path.prefixed(field),
                ..leaf.clone()
            }),
            Binding::Composite(composite) => Binding::Composite(Composite {
                key: composite.key.clone(),
                owners: composite
                    .owners
                    .iter()
                    .map(|owner| owner.prefixed(field))
                    .collect(),
            }),
        }
    }
}

/// How the binder fills one declared field, in declaration order.
pub(crate) enum Slot {
    /// Left at its default.
    Skip,
    /// A flattened struct, filled from the same mapping as its parent.
    Flatten {
        field: &'static Field,
        namespace: Arc<Namespace>,
        wrapped: bool,
    },
    /// A struct filled from the mapping under `key`.
    Composite {
        field: &'static Field,
        key: String,
        namespace: Arc<Namespace>,
        wrapped: bool,
        typed_default: bool,
    },
    /// A field set from a single value.
    Leaf(Leaf),
}

/// The collision-free key space of one struct type.
pub struct Namespace {
    shape: &'static Shape,
    bindings: Vec<Binding>,
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
}

impl Namespace {
    /// Returns the cached namespace of `T`, building it on first use.
    ///
    /// Fails with [`ConfErrorKind::DuplicateKey`] when embedding makes a key
    /// ambiguous, without looking at any document.
    pub fn of<'facet, T: Facet<'facet>>() -> Result<Arc<Namespace>> {
        analyze(T::SHAPE)
    }

    /// The struct this namespace describes.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// Looks up a key; the key is canonicalized first.
    pub fn get(&self, key: &str) -> Option<&Binding> {
        self.index
            .get(&canonicalize(key))
            .map(|&at| &self.bindings[at])
    }

    /// Entries in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Canonical keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(Binding::key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true for a struct without bindable fields.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// One slot per declared field of the struct itself.
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns true when every field of `value` holds its zero value.
    pub(crate) fn is_zero(&self, value: Peek<'_, '_>) -> bool {
        self.bindings.iter().all(|binding| match binding {
            Binding::Leaf(leaf) => match leaf.path.resolve(value, false) {
                Ok(Some(field)) => leaf.decoder.is_zero(field),
                Ok(None) => true,
                Err(_) => false,
            },
            Binding::Composite(composite) => composite.owners.iter().all(|owner| {
                match owner.path.resolve(value, true) {
                    Ok(Some(field)) => owner.namespace.is_zero(field),
                    Ok(None) => true,
                    Err(_) => false,
                }
            }),
        })
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("shape", &self.shape.type_identifier)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

type Cache = RwLock<HashMap<ConstTypeId, Arc<Namespace>>>;

static CACHE: OnceLock<Cache> = OnceLock::new();

fn cache() -> &'static Cache {
    CACHE.get_or_init(Cache::default)
}

/// Returns the namespace of a struct shape, from the cache when possible.
pub(crate) fn analyze(shape: &'static Shape) -> Result<Arc<Namespace>> {
    Analyzer::default().namespace(shape)
}

/// The fields of a struct that is bound field by field.
///
/// Transparent wrappers and [`Duration`] are structs too, but bind as leaves.
pub(crate) fn struct_fields(shape: &'static Shape) -> Option<&'static [Field]> {
    if shape.is_type::<Duration>() || shape.inner.is_some() {
        return None;
    }
    match (&shape.def, &shape.ty) {
        (Def::Scalar | Def::Option(_) | Def::List(_) | Def::Map(_), _) => None,
        (_, Type::User(UserType::Struct(ty))) => Some(ty.fields),
        _ => None,
    }
}

/// The struct a field decodes into field by field: the field's own struct
/// type, or one behind a single `Option`.
fn struct_behind(shape: &'static Shape) -> Option<(&'static Shape, bool)> {
    if struct_fields(shape).is_some() {
        return Some((shape, false));
    }
    match shape.def {
        Def::Option(def) => struct_fields(def.t).map(|_| (def.t, true)),
        _ => None,
    }
}

#[derive(Default)]
struct Analyzer {
    /// Struct types currently being analyzed, outermost first.
    stack: Vec<ConstTypeId>,
}

impl Analyzer {
    fn namespace(&mut self, shape: &'static Shape) -> Result<Arc<Namespace>> {
        let id = shape.id;
        let cached = cache()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        if let Some(namespace) = cached {
            return Ok(namespace);
        }

        let Some(fields) = struct_fields(shape) else {
            return Err(ConfErrorKind::TypeMismatch {
                path: String::new(),
                message: format!("{shape} is not a struct"),
            }
            .into());
        };
        if self.stack.contains(&id) {
            return Err(ConfErrorKind::RecursiveType(shape.type_identifier).into());
        }

        log::trace!("Building namespace for {shape}");
        self.stack.push(id);
        let built = self.build(shape, fields);
        self.stack.pop();
        let namespace = Arc::new(built?);

        let mut cache = cache().write().unwrap_or_else(PoisonError::into_inner);
        let namespace = cache.entry(id).or_insert(namespace).clone();
        log::debug!(
            "Cached namespace for {shape} with {} keys",
            namespace.bindings.len()
        );
        Ok(namespace)
    }

    fn build(&mut self, shape: &'static Shape, fields: &'static [Field]) -> Result<Namespace> {
        let mut candidates = Vec::with_capacity(fields.len());
        let mut slots = Vec::with_capacity(fields.len());

        for field in fields {
            let invalid = |reason: String| ConfErrorKind::InvalidTag {
                field: format!("{shape}.{}", field.name),
                reason,
            };
            let tag = Tag::of(field).map_err(invalid)?;
            if tag.skip {
                slots.push(Slot::Skip);
                continue;
            }

            let field_shape = field.shape;
            let behind = struct_behind(field_shape);

            if tag.flatten {
                if let Some((struct_shape, wrapped)) = behind {
                    if tag.optionality.is_optional() || tag.has_fallback() {
                        return Err(invalid(
                            "a flattened struct takes no other directives".into(),
                        )
                        .into());
                    }
                    log::trace!("Flattening {} into {shape}", field.name);
                    let embedded = self.namespace(struct_shape)?;
                    candidates.extend(embedded.bindings.iter().map(|b| b.prefixed(field)));
                    slots.push(Slot::Flatten {
                        field,
                        namespace: embedded,
                        wrapped,
                    });
                    continue;
                }
            }

            let name = if tag.flatten {
                field_shape.type_identifier
            } else {
                field.name
            };
            let key = canonicalize(name);

            match behind {
                Some((struct_shape, wrapped)) => {
                    if tag.fallback.is_some() || tag.env.is_some() {
                        return Err(invalid(
                            "fallback and env apply to leaf fields only".into(),
                        )
                        .into());
                    }
                    let namespace = self.namespace(struct_shape)?;
                    candidates.push(Binding::Composite(Composite {
                        key: key.clone(),
                        owners: vec![Owner {
                            path: FieldPath::single(field),
                            namespace: namespace.clone(),
                            optional: tag.optionality.is_optional(),
                        }],
                    }));
                    slots.push(Slot::Composite {
                        field,
                        key,
                        namespace,
                        wrapped,
                        typed_default: tag.typed_default,
                    });
                }
                None => {
                    let decoder = self.decoder(field_shape)?;
                    if tag.fallback.is_some() && !decoder.accepts_literal() {
                        return Err(invalid("fallback applies to scalar fields only".into()).into());
                    }
                    let leaf = Leaf {
                        key,
                        field,
                        path: FieldPath::single(field),
                        decoder,
                        optionality: tag.optionality,
                        fallback: tag.fallback,
                        env: tag.env,
                        typed_default: tag.typed_default,
                    };
                    candidates.push(Binding::Leaf(leaf.clone()));
                    slots.push(Slot::Leaf(leaf));
                }
            }
        }

        let bindings = merge(candidates)?;
        let index = bindings
            .iter()
            .enumerate()
            .map(|(at, binding)| (binding.key().to_string(), at))
            .collect();
        let namespace = Namespace {
            shape,
            bindings,
            index,
            slots,
        };
        check_optional_references(&namespace)?;
        Ok(namespace)
    }

    fn decoder(&mut self, shape: &'static Shape) -> Result<Decoder> {
        if shape.is_type::<Duration>() {
            return Ok(Decoder::Duration);
        }
        match shape.def {
            Def::Option(def) => return Ok(Decoder::Option(Box::new(self.decoder(def.t)?))),
            Def::List(def) => return Ok(Decoder::List(Box::new(self.decoder(def.t())?))),
            Def::Map(def) if def.k().is_type::<String>() => {
                return Ok(Decoder::Map(Box::new(self.decoder(def.v())?)));
            }
            Def::Map(_) => return Ok(Decoder::Unsupported(shape)),
            _ => {}
        }
        if let Some(inner) = transparent_inner(shape) {
            return Ok(Decoder::Transparent(Box::new(self.decoder(inner)?)));
        }
        if let Def::Scalar = shape.def {
            return Ok(Decoder::Scalar);
        }
        if struct_fields(shape).is_some() {
            return Ok(Decoder::Struct(self.namespace(shape)?));
        }
        Ok(Decoder::Unsupported(shape))
    }
}

/// The wrapped type of a `#[facet(transparent)]` newtype.
fn transparent_inner(shape: &'static Shape) -> Option<&'static Shape> {
    shape.inner?;
    match &shape.ty {
        Type::User(UserType::Struct(ty)) if ty.fields.len() == 1 => {
            Some(ty.fields[0].shape)
        }
        _ => None,
    }
}

/// Combines candidates claiming the same key.
///
/// Struct-shaped candidates merge into one composite as long as their
/// sub-namespaces never claim the same leaf; anything else is ambiguous.
fn merge(candidates: Vec<Binding>) -> Result<Vec<Binding>> {
    let mut merged: Vec<Binding> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key = candidate.key().to_string();
        let Some(&at) = index.get(&key) else {
            index.insert(key, merged.len());
            merged.push(candidate);
            continue;
        };

        let (Binding::Composite(existing), Binding::Composite(incoming)) =
            (&mut merged[at], candidate)
        else {
            log::debug!("Key {key:?} is claimed by a non-struct field more than once");
            return Err(ConfErrorKind::DuplicateKey(key).into());
        };
        existing.owners.extend(incoming.owners);
        let namespaces: Vec<&Namespace> = existing
            .owners
            .iter()
            .map(|owner| owner.namespace.as_ref())
            .collect();
        check_disjoint(&namespaces)?;
        log::trace!(
            "Merged {} owners under key {key:?}",
            existing.owners.len()
        );
    }

    Ok(merged)
}

/// Verifies that namespaces populated from one subtree never share a leaf.
fn check_disjoint(namespaces: &[&Namespace]) -> Result<()> {
    let mut groups: Vec<(&str, Vec<&Binding>)> = Vec::new();
    for namespace in namespaces {
        for binding in &namespace.bindings {
            match groups.iter_mut().find(|(key, _)| *key == binding.key()) {
                Some((_, group)) => group.push(binding),
                None => groups.push((binding.key(), vec![binding])),
            }
        }
    }

    for (key, group) in groups.into_iter().filter(|(_, group)| group.len() > 1) {
        let mut nested = Vec::new();
        for binding in group {
            match binding {
                Binding::Leaf(_) => {
                    log::debug!("Leaf key {key:?} is reachable from several owners");
                    return Err(ConfErrorKind::DuplicateKey(key.to_string()).into());
                }
                Binding::Composite(composite) => {
                    nested.extend(composite.owners.iter().map(|owner| owner.namespace.as_ref()))
                }
            }
        }
        check_disjoint(&nested)?;
    }

    Ok(())
}

fn check_optional_references(namespace: &Namespace) -> Result<()> {
    for binding in &namespace.bindings {
        let Binding::Leaf(leaf) = binding else {
            continue;
        };
        let Optionality::OptionalIf(sibling) = &leaf.optionality else {
            continue;
        };
        let resolves = sibling != &leaf.key
            && matches!(namespace.get(sibling), Some(Binding::Leaf(_)));
        if !resolves {
            return Err(ConfErrorKind::InvalidTag {
                field: format!("{}.{}", namespace.shape, leaf.path),
                reason: format!("optional = {sibling:?} does not name a sibling field"),
            }
            .into());
        }
    }
    Ok(())
}
