//! Canonical comparison form of document keys and field names.

/// Folds `raw` into its canonical comparison key.
///
/// ASCII letters are lower-cased; separators (`_`, `.`, whitespace), digits
/// and non-ASCII characters are kept as they are. The function is idempotent.
///
/// ```
/// assert_eq!(confbind::canonicalize("HelloWorld"), "helloworld");
/// assert_eq!(confbind::canonicalize("Hello.World Foo_Bar"), "hello.world foo_bar");
/// assert_eq!(confbind::canonicalize("你好 World"), "你好 world");
/// ```
pub fn canonicalize(raw: &str) -> String {
    raw.to_ascii_lowercase()
}

/// Returns true when both keys have the same canonical form.
pub fn equivalent(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii_case_only() {
        let cases = [
            ("", ""),
            ("A", "a"),
            ("a", "a"),
            ("hello_world", "hello_world"),
            ("Hello_world", "hello_world"),
            ("hello_World", "hello_world"),
            ("helloWorld", "helloworld"),
            ("HelloWorld", "helloworld"),
            ("hello World", "hello world"),
            ("Hello World", "hello world"),
            ("Hello World foo_bar", "hello world foo_bar"),
            ("Hello World foo_Bar", "hello world foo_bar"),
            ("Hello World Foo_bar", "hello world foo_bar"),
            ("Hello World Foo_Bar", "hello world foo_bar"),
            ("Hello.World Foo_Bar", "hello.world foo_bar"),
            ("你好 World Foo_Bar", "你好 world foo_bar"),
        ];
        for (input, expected) in cases {
            assert_eq!(canonicalize(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn is_idempotent() {
        for raw in ["MiXeD_Case.Key", "ÄÖÜ Straße", "Tls_Conf", "123abcDEF"] {
            let once = canonicalize(raw);
            assert_eq!(canonicalize(&once), once);
        }
    }

    #[test]
    fn non_ascii_letters_are_not_folded() {
        assert_eq!(canonicalize("ÄBC"), "Äbc");
        assert!(!equivalent("Ä", "ä"));
        assert!(equivalent("Tls_Conf", "tls_conf"));
    }
}
