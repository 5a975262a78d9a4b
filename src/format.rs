//! Parsing front-ends: every supported syntax is lowered into a [`Value`].

use std::{collections::HashSet, fmt, path::Path};

use kdl::{KdlDocument, KdlNode, KdlValue};

use crate::{
    ParseError,
    value::{Mapping, Number, Value},
};

/// A supported document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON, via `serde_json`.
    Json,
    /// YAML, via `serde_yaml`.
    Yaml,
    /// TOML, via `toml`.
    Toml,
    /// KDL, via `kdl`.
    Kdl,
}

impl Format {
    /// Picks a format from a file extension, ignoring ASCII case.
    ///
    /// ```
    /// use confbind::Format;
    ///
    /// assert_eq!(Format::from_extension("YML"), Some(Format::Yaml));
    /// assert_eq!(Format::from_extension("ini"), None);
    /// ```
    pub fn from_extension(extension: &str) -> Option<Format> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            "kdl" => Some(Format::Kdl),
            _ => None,
        }
    }

    /// Picks a format from the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Format::from_extension)
    }

    /// Parses `text` into a document tree.
    pub fn parse(self, text: &str) -> Result<Value, ParseError> {
        log::trace!("Parsing {} bytes of {self}", text.len());
        match self {
            Format::Json => {
                let value: serde_json::Value = serde_json::from_str(text)?;
                Ok(from_json(value))
            }
            Format::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_str(text)?;
                from_yaml(value)
            }
            Format::Toml => {
                let table: toml::Table = toml::from_str(text)?;
                Ok(from_toml(toml::Value::Table(table)))
            }
            Format::Kdl => {
                let document: KdlDocument = text.parse()?;
                from_kdl_document(&document)
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
            Format::Kdl => "kdl",
        })
    }
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(json_number(&n)),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(entries) => Value::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect(),
        ),
    }
}

fn json_number(n: &serde_json::Number) -> Number {
    if let Some(n) = n.as_u64() {
        Number::PosInt(n)
    } else if let Some(n) = n.as_i64() {
        Number::NegInt(n)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn from_yaml(value: serde_yaml::Value) -> Result<Value, ParseError> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => Value::Number(yaml_number(&n)),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(entries) => {
            let mut mapping = Mapping::new();
            for (key, value) in entries {
                mapping.insert(yaml_key(key)?, from_yaml(value)?);
            }
            Value::Mapping(mapping)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Number {
    if let Some(n) = n.as_u64() {
        Number::PosInt(n)
    } else if let Some(n) = n.as_i64() {
        Number::NegInt(n)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, ParseError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(ParseError::Value(format!(
            "mapping keys must be scalars, found {other:?}"
        ))),
    }
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(n) => Value::Number(Number::from(n)),
        toml::Value::Float(f) => Value::Number(Number::Float(f)),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(entries) => Value::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key, from_toml(value)))
                .collect(),
        ),
    }
}

/// Node name under which children form a sequence.
const ITEM_NODE: &str = "-";

fn from_kdl_document(document: &KdlDocument) -> Result<Value, ParseError> {
    let nodes = document.nodes();
    if !nodes.is_empty() && nodes.iter().all(|node| node.name().value() == ITEM_NODE) {
        return Ok(Value::Sequence(
            nodes.iter().map(from_kdl_node).collect::<Result<_, _>>()?,
        ));
    }

    let mut mapping = Mapping::new();
    let mut repeated = HashSet::new();
    for node in nodes {
        let name = node.name().value();
        let value = from_kdl_node(node)?;
        match mapping.get_mut(name) {
            Some(Value::Sequence(items)) if repeated.contains(name) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::Sequence(vec![first, value]);
                repeated.insert(name);
            }
            None => {
                mapping.insert(name, value);
            }
        }
    }
    Ok(Value::Mapping(mapping))
}

fn from_kdl_node(node: &KdlNode) -> Result<Value, ParseError> {
    let mut arguments = Vec::new();
    let mut properties = Mapping::new();
    for entry in node.entries() {
        let value = from_kdl_value(entry.value())?;
        match entry.name() {
            Some(name) => {
                properties.insert(name.value(), value);
            }
            None => arguments.push(value),
        }
    }

    if let Some(children) = node.children() {
        if !arguments.is_empty() {
            return Err(ParseError::Value(format!(
                "node {} mixes arguments with children",
                node.name().value()
            )));
        }
        let mut value = from_kdl_document(children)?;
        if let Value::Mapping(mapping) = &mut value {
            for (key, property) in properties {
                mapping.insert(key, property);
            }
        } else if !properties.is_empty() {
            return Err(ParseError::Value(format!(
                "node {} mixes properties with list children",
                node.name().value()
            )));
        }
        return Ok(value);
    }

    if !properties.is_empty() {
        if !arguments.is_empty() {
            return Err(ParseError::Value(format!(
                "node {} mixes arguments with properties",
                node.name().value()
            )));
        }
        return Ok(Value::Mapping(properties));
    }

    Ok(match arguments.len() {
        0 => Value::Null,
        1 => arguments.remove(0),
        _ => Value::Sequence(arguments),
    })
}

fn from_kdl_value(value: &KdlValue) -> Result<Value, ParseError> {
    Ok(match value {
        KdlValue::String(s) => Value::String(s.clone()),
        KdlValue::Integer(n) => {
            if let Ok(n) = u64::try_from(*n) {
                Value::Number(Number::PosInt(n))
            } else if let Ok(n) = i64::try_from(*n) {
                Value::Number(Number::NegInt(n))
            } else {
                return Err(ParseError::Value(format!("integer {n} is out of range")));
            }
        }
        KdlValue::Float(f) => Value::Number(Number::Float(*f)),
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Null,
    })
}
