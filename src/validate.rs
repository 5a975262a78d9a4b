//! Required-field checks run after binding.

use facet_reflect::Peek;

use crate::{
    ConfErrorKind, Result,
    bind::KeyPath,
    namespace::{Binding, Decoder, Leaf, Namespace},
    tag::Optionality,
};

/// Checks that every required leaf below `target` holds a non-zero value.
pub(crate) fn validate_struct(namespace: &Namespace, target: Peek<'_, '_>) -> Result<()> {
    Validator::default().check_struct(namespace, target)
}

#[derive(Default)]
struct Validator {
    path: KeyPath,
}

impl Validator {
    fn check_struct(&mut self, namespace: &Namespace, target: Peek<'_, '_>) -> Result<()> {
        for binding in namespace.bindings() {
            match binding {
                Binding::Leaf(leaf) => self.check_leaf(namespace, leaf, target)?,
                Binding::Composite(composite) => {
                    self.path.push_key(composite.key());
                    for owner in composite.owners() {
                        let Some(value) = owner.path().resolve(target, true)? else {
                            continue;
                        };
                        if owner.is_optional() && owner.namespace().is_zero(value) {
                            continue;
                        }
                        self.check_struct(owner.namespace(), value)?;
                    }
                    self.path.pop();
                }
            }
        }
        Ok(())
    }

    fn check_leaf(&mut self, namespace: &Namespace, leaf: &Leaf, target: Peek<'_, '_>) -> Result<()> {
        // an empty embedded option leaves all of its leaves unset
        let Some(value) = leaf.path().resolve(target, false)? else {
            return Ok(());
        };

        if leaf.decoder.is_zero(value) {
            let exempt = match leaf.optionality() {
                Optionality::Required => false,
                Optionality::Optional => true,
                Optionality::OptionalIf(sibling) => sibling_is_set(namespace, sibling, target)?,
            };
            if exempt {
                return Ok(());
            }
            log::debug!("Required field {} is not set", leaf.path());
            return Err(ConfErrorKind::MissingRequiredField(self.path.join(leaf.key())).into());
        }

        self.path.push_key(leaf.key());
        self.check_value(&leaf.decoder, value)?;
        self.path.pop();
        Ok(())
    }

    /// Descends into the structs held by a non-zero leaf.
    fn check_value(&mut self, decoder: &Decoder, value: Peek<'_, '_>) -> Result<()> {
        match decoder {
            Decoder::Struct(namespace) => self.check_struct(namespace, value),
            Decoder::Option(inner) => match value.into_option().ok().and_then(|o| o.value()) {
                Some(value) => self.check_value(inner, value),
                None => Ok(()),
            },
            Decoder::Transparent(inner) => self.check_value(inner, value.innermost_peek()),
            Decoder::List(item) => {
                let Ok(list) = value.into_list() else {
                    return Ok(());
                };
                for (at, element) in list.iter().enumerate() {
                    self.path.push_index(at);
                    self.check_value(item, element)?;
                    self.path.pop();
                }
                Ok(())
            }
            Decoder::Map(entry) => {
                let Ok(map) = value.into_map() else {
                    return Ok(());
                };
                let mut entries: Vec<_> = map
                    .iter()
                    .map(|(key, element)| (key.as_str().unwrap_or_default().to_string(), element))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (key, element) in entries {
                    self.path.push_entry(&key);
                    self.check_value(entry, element)?;
                    self.path.pop();
                }
                Ok(())
            }
            Decoder::Scalar | Decoder::Duration | Decoder::Unsupported(_) => Ok(()),
        }
    }
}

fn sibling_is_set(namespace: &Namespace, sibling: &str, target: Peek<'_, '_>) -> Result<bool> {
    let Some(Binding::Leaf(sibling)) = namespace.get(sibling) else {
        return Ok(false);
    };
    Ok(match sibling.path().resolve(target, false)? {
        Some(value) => !sibling.decoder.is_zero(value),
        None => false,
    })
}
