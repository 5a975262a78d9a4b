//! Field directives, read from `#[facet(...)]` attributes.
//!
//! Names come from the field itself (after `rename`/`rename_all`), embedding
//! from `flatten`, and the typed default from `default`/`default = expr`.
//! The rest are arbitrary attributes: `skip`, `optional`, `optional = "x"`,
//! `fallback = "literal"` and `env = "NAME"`.

use facet_core::{Field, FieldAttribute, FieldFlags};

use crate::key::canonicalize;

/// Whether a leaf may stay at its zero value after binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optionality {
    /// The field must be non-zero.
    Required,
    /// The field may stay zero.
    Optional,
    /// The field may stay zero while the sibling with this canonical key is set.
    OptionalIf(String),
}

impl Optionality {
    /// Returns true unless the field is unconditionally required.
    pub fn is_optional(&self) -> bool {
        !matches!(self, Optionality::Required)
    }
}

/// The directives of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    pub(crate) skip: bool,
    pub(crate) flatten: bool,
    pub(crate) optionality: Optionality,
    pub(crate) fallback: Option<&'static str>,
    pub(crate) env: Option<&'static str>,
    /// `#[facet(default)]` or `#[facet(default = expr)]`.
    pub(crate) typed_default: bool,
}

impl Tag {
    fn empty() -> Self {
        Tag {
            skip: false,
            flatten: false,
            optionality: Optionality::Required,
            fallback: None,
            env: None,
            typed_default: false,
        }
    }

    /// Reads the directives of `field`.
    pub(crate) fn of(field: &Field) -> Result<Tag, String> {
        let arbitrary = field.attributes.iter().filter_map(|attr| match attr {
            FieldAttribute::Arbitrary(text) => Some(*text),
            _ => None,
        });
        let mut tag = parse(arbitrary)?;
        tag.flatten = field.flags.contains(FieldFlags::FLATTEN);
        tag.typed_default = field.flags.contains(FieldFlags::DEFAULT);
        if tag.typed_default && (tag.fallback.is_some() || tag.env.is_some()) {
            return Err("default cannot be combined with fallback or env".into());
        }
        Ok(tag)
    }

    /// Returns true if an absent key is filled from somewhere.
    pub(crate) fn has_fallback(&self) -> bool {
        self.fallback.is_some() || self.env.is_some() || self.typed_default
    }
}

/// Splits `key = "value"` into its key and unquoted value.
fn split_directive(text: &'static str) -> (&'static str, Option<&'static str>) {
    match text.split_once('=') {
        Some((key, value)) => {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|value| value.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim(), Some(value))
        }
        None => (text.trim(), None),
    }
}

/// Parses the arbitrary attributes of one field.
pub(crate) fn parse(attributes: impl IntoIterator<Item = &'static str>) -> Result<Tag, String> {
    let mut parsed = Tag::empty();
    let mut seen_optional = false;

    for text in attributes {
        match split_directive(text) {
            ("skip", None) => parsed.skip = true,
            ("optional", value) => {
                if seen_optional {
                    return Err("optional given more than once".into());
                }
                seen_optional = true;
                parsed.optionality = match value {
                    None => Optionality::Optional,
                    Some("") => return Err("optional = needs a field name".into()),
                    Some(sibling) => Optionality::OptionalIf(canonicalize(sibling)),
                };
            }
            ("fallback", Some(literal)) => {
                if parsed.fallback.replace(literal).is_some() {
                    return Err("fallback given more than once".into());
                }
            }
            ("env", Some(name)) if !name.is_empty() => {
                if parsed.env.replace(name).is_some() {
                    return Err("env given more than once".into());
                }
            }
            ("env", _) => return Err("env needs a variable name".into()),
            ("fallback", None) => return Err("fallback needs a value".into()),
            (other, _) => return Err(format!("unknown option {other:?}")),
        }
    }

    if parsed.fallback.is_some() && parsed.env.is_some() {
        return Err("fallback and env cannot be combined on one field".into());
    }

    Ok(parsed)
}
