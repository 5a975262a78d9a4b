//! Shell-style `${NAME}` / `$NAME` substitution in string scalars.

use std::env;

/// Replaces `${NAME}` and `$NAME` with the value of the environment variable
/// `NAME`, or with nothing when it is unset.
pub fn expand_env(s: &str) -> String {
    expand_with(s, |name| env::var(name).unwrap_or_default())
}

/// Expands variable references in `s` using `lookup`.
///
/// `${}` and an unterminated `${` are dropped; a `$` that does not start a
/// reference is kept.
pub fn expand_with(s: &str, mut lookup: impl FnMut(&str) -> String) -> String {
    if !s.contains('$') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        match variable_name(after) {
            Reference::Name(name, consumed) => {
                out.push_str(&lookup(name));
                rest = &after[consumed..];
            }
            Reference::Invalid(consumed) => rest = &after[consumed..],
            Reference::None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

enum Reference<'a> {
    /// A variable name and the number of bytes it spans after the `$`.
    Name(&'a str, usize),
    /// Malformed braces, dropped from the output.
    Invalid(usize),
    None,
}

fn is_special(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || c.is_ascii_digit()
}

fn is_name_byte(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

fn variable_name(s: &str) -> Reference<'_> {
    let bytes = s.as_bytes();
    let Some(&first) = bytes.first() else {
        return Reference::None;
    };

    if first == b'{' {
        if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
            return Reference::Name(&s[1..2], 3);
        }
        return match s[1..].find('}') {
            Some(0) => Reference::Invalid(2),
            Some(end) => Reference::Name(&s[1..=end], end + 2),
            None => Reference::Invalid(1),
        };
    }

    if is_special(first) {
        return Reference::Name(&s[..1], 1);
    }

    let len = bytes.iter().take_while(|c| is_name_byte(**c)).count();
    if len == 0 {
        Reference::None
    } else {
        Reference::Name(&s[..len], len)
    }
}
