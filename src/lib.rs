#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
    fs, io,
    path::Path,
};

use facet_core::Facet;
use facet_reflect::{Peek, ReflectError};

mod bind;
mod coerce;
mod duration;
mod fill;
mod format;
mod interpolate;
mod key;
mod namespace;
mod tag;
mod validate;
mod value;

pub use duration::{Duration, DurationError};
pub use fill::fill_default;
pub use format::Format;
pub use interpolate::{expand_env, expand_with};
pub use key::{canonicalize, equivalent};
pub use namespace::{Binding, Composite, FieldKind, FieldPath, Leaf, Namespace, Owner};
pub use tag::Optionality;
pub use value::{Mapping, Number, Value};

use bind::Binder;

/// Error type for configuration loading and binding.
#[derive(Debug)]
pub struct ConfError {
    kind: ConfErrorKind,
}

impl ConfError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &ConfErrorKind {
        &self.kind
    }

    /// Returns true if the target type has an ambiguous key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self.kind, ConfErrorKind::DuplicateKey(_))
    }

    /// The ambiguous canonical key, if this is a [`ConfErrorKind::DuplicateKey`].
    pub fn duplicate_key(&self) -> Option<&str> {
        match &self.kind {
            ConfErrorKind::DuplicateKey(key) => Some(key),
            _ => None,
        }
    }
}

impl Display for ConfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}

impl Error for ConfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ConfErrorKind::Parse(err) => Some(err),
            ConfErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl<K: Into<ConfErrorKind>> From<K> for ConfError {
    fn from(value: K) -> Self {
        let kind = value.into();
        ConfError { kind }
    }
}

/// Detailed classification of configuration errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfErrorKind {
    // Type analysis errors
    /// Two fields of the target type claim the same canonical key.
    DuplicateKey(String),
    /// A field's directive string is malformed or contradictory.
    InvalidTag {
        /// `Type.field` of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The target type contains itself.
    RecursiveType(&'static str),

    // Binding errors
    /// A document value does not fit the field it is bound to.
    TypeMismatch {
        /// Location in the document.
        path: String,
        /// What was expected and found.
        message: String,
    },
    /// A value was supplied for a field type that cannot be decoded.
    UnsupportedField {
        /// Location in the document.
        path: String,
        /// The field's type.
        type_identifier: &'static str,
    },
    /// A required field is still zero after binding.
    MissingRequiredField(String),
    /// A `fallback`, `env` or `default` directive could not be applied.
    InvalidDefault(String),
    /// A reflected value did not have the shape its namespace describes.
    ReflectMismatch(&'static str),
    /// Building the value through reflection failed.
    Reflect(ReflectError),

    // Input errors
    /// The document could not be parsed.
    Parse(ParseError),
    /// The file extension names no supported format.
    UnsupportedFormat(String),
    /// The file could not be read.
    Io(io::Error),
}

impl Display for ConfErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfErrorKind::DuplicateKey(key) => write!(f, "duplicated key {key}"),
            ConfErrorKind::InvalidTag { field, reason } => {
                write!(f, "invalid tag on {field}: {reason}")
            }
            ConfErrorKind::RecursiveType(ty) => write!(f, "type {ty} contains itself"),
            ConfErrorKind::TypeMismatch { path, message } if path.is_empty() => {
                write!(f, "type mismatch: {message}")
            }
            ConfErrorKind::TypeMismatch { path, message } => {
                write!(f, "type mismatch for field {path}: {message}")
            }
            ConfErrorKind::UnsupportedField {
                path,
                type_identifier,
            } => write!(f, "field {path} has unsupported type {type_identifier}"),
            ConfErrorKind::MissingRequiredField(path) => write!(f, "field {path} is not set"),
            ConfErrorKind::InvalidDefault(msg) => write!(f, "invalid default: {msg}"),
            ConfErrorKind::ReflectMismatch(ty) => {
                write!(f, "reflected value of {ty} does not match its namespace")
            }
            ConfErrorKind::Reflect(err) => write!(f, "{err}"),
            ConfErrorKind::Parse(err) => write!(f, "{err}"),
            ConfErrorKind::UnsupportedFormat(path) => {
                write!(f, "unrecognized config file type: {path}")
            }
            ConfErrorKind::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl From<ParseError> for ConfErrorKind {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<ReflectError> for ConfErrorKind {
    fn from(err: ReflectError) -> Self {
        Self::Reflect(err)
    }
}

impl From<io::Error> for ConfErrorKind {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A document that failed to parse, by format.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// Invalid JSON.
    Json(serde_json::Error),
    /// Invalid YAML.
    Yaml(serde_yaml::Error),
    /// Invalid TOML.
    Toml(toml::de::Error),
    /// Invalid KDL.
    Kdl(kdl::KdlError),
    /// Well-formed syntax with no document-tree equivalent.
    Value(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Json(err) => write!(f, "invalid json: {err}"),
            ParseError::Yaml(err) => write!(f, "invalid yaml: {err}"),
            ParseError::Toml(err) => write!(f, "invalid toml: {err}"),
            ParseError::Kdl(err) => write!(f, "invalid kdl: {err}"),
            ParseError::Value(msg) => write!(f, "unsupported document: {msg}"),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Json(err) => Some(err),
            ParseError::Yaml(err) => Some(err),
            ParseError::Toml(err) => Some(err),
            ParseError::Kdl(err) => Some(err),
            ParseError::Value(_) => None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}

impl From<toml::de::Error> for ParseError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err)
    }
}

impl From<kdl::KdlError> for ParseError {
    fn from(err: kdl::KdlError) -> Self {
        Self::Kdl(err)
    }
}

/// Result type of this crate.
pub type Result<T> = std::result::Result<T, ConfError>;

/// Switches for a single load.
#[derive(Debug, Clone, Default)]
pub struct Options {
    use_env: bool,
}

impl Options {
    /// Options with every switch off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expands `${NAME}` references in string values from the environment.
    pub fn use_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Returns true if string values are expanded from the environment.
    pub fn env_enabled(&self) -> bool {
        self.use_env
    }
}

/// Returns the namespace `T` binds documents through.
///
/// Fails for types with ambiguous keys, independent of any document.
pub fn namespace_of<T: Facet<'static>>() -> Result<std::sync::Arc<Namespace>> {
    Namespace::of::<T>()
}

/// Binds a document tree into a new `T`.
pub fn from_value<T: Facet<'static>>(value: &Value) -> Result<T> {
    from_value_with(value, &Options::default())
}

/// Binds a document tree into a new `T` with the given options, then checks
/// its required fields.
///
/// `T` is a struct, or an `Option` of one, which is always built as `Some`.
pub fn from_value_with<T: Facet<'static>>(value: &Value, options: &Options) -> Result<T> {
    log::trace!("Entering `from_value_with` for {}", T::SHAPE);
    let target: T = Binder::new(options).build(value)?;
    log::trace!("Document bound into {}", T::SHAPE);
    validate(&target)?;
    Ok(target)
}

/// Checks the required-field constraints of an already populated value.
pub fn validate<T: Facet<'static>>(target: &T) -> Result<()> {
    let peek = Peek::new(target);
    let peek = match peek.into_option() {
        Ok(option) => match option.value() {
            Some(value) => value,
            None => return Ok(()),
        },
        Err(_) => peek,
    };
    let namespace = namespace::analyze(peek.shape())?;
    validate::validate_struct(&namespace, peek)
}

/// Parses `text` in the given format and binds it into a new `T`.
///
/// The type is analyzed first, so a type with ambiguous keys fails the same
/// way for any input.
pub fn from_str<T: Facet<'static>>(text: &str, format: Format, options: &Options) -> Result<T> {
    log::trace!("Entering `from_str` for {} as {format}", T::SHAPE);
    analyze_target(T::SHAPE)?;
    let value = format.parse(text)?;
    log::trace!("{format} parsed");
    from_value_with(&value, options)
}

/// Binds a JSON document into a new `T`.
pub fn from_json_str<T: Facet<'static>>(text: &str) -> Result<T> {
    from_str(text, Format::Json, &Options::default())
}

/// Binds a YAML document into a new `T`.
pub fn from_yaml_str<T: Facet<'static>>(text: &str) -> Result<T> {
    from_str(text, Format::Yaml, &Options::default())
}

/// Binds a TOML document into a new `T`.
pub fn from_toml_str<T: Facet<'static>>(text: &str) -> Result<T> {
    from_str(text, Format::Toml, &Options::default())
}

/// Binds a KDL document into a new `T`.
pub fn from_kdl_str<T: Facet<'static>>(text: &str) -> Result<T> {
    from_str(text, Format::Kdl, &Options::default())
}

/// Reads a file and binds it into a new `T`, picking the format from the
/// file extension.
pub fn load<T: Facet<'static>>(path: impl AsRef<Path>, options: &Options) -> Result<T> {
    let path = path.as_ref();
    log::trace!("Loading {} into {}", path.display(), T::SHAPE);
    analyze_target(T::SHAPE)?;
    let format = Format::from_path(path)
        .ok_or_else(|| ConfErrorKind::UnsupportedFormat(path.display().to_string()))?;
    let text = fs::read_to_string(path)?;
    from_str(&text, format, options)
}

/// Like [`load`], but panics with the error message on failure.
pub fn must_load<T: Facet<'static>>(path: impl AsRef<Path>, options: &Options) -> T {
    let path = path.as_ref();
    match load(path, options) {
        Ok(value) => value,
        Err(err) => {
            log::error!("error: config file {}, {err}", path.display());
            panic!("error: config file {}, {err}", path.display())
        }
    }
}

/// Analyzes the struct `shape` describes, looking through one `Option`.
fn analyze_target(shape: &'static facet_core::Shape) -> Result<std::sync::Arc<Namespace>> {
    match shape.def {
        facet_core::Def::Option(def) => namespace::analyze(def.t),
        _ => namespace::analyze(shape),
    }
}
