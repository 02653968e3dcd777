//! Module-prefix stripping: `crate::physics::step(x)` becomes `step(x)`.
//!
//! Shaders have a single flat namespace, so qualified paths into host
//! modules are reduced to their leaf names.

use std::collections::BTreeSet;

/// Prefixes stripped from every file.
pub const BUILTIN_MODULES: &[&str] = &["crate", "self", "super", "slbool", "sltype", "slrand"];

/// Primitive type names look like modules on `use` lines
/// (`use std::f32::consts::PI`) but qualify associated constants.
const PRIMITIVES: &[&str] = &[
    "f32", "f64", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "usize", "isize",
];

/// The set of module names to strip for one file.
#[derive(Clone, Debug, Default)]
pub struct Namespaces {
    modules: BTreeSet<String>,
}

impl Namespaces {
    /// Collect module names from the `use` lines of a whole file.
    pub fn from_source(text: &str) -> Self {
        let mut modules: BTreeSet<String> =
            BUILTIN_MODULES.iter().map(|m| m.to_string()).collect();
        for line in text.lines() {
            if let Some(tree) = use_tree(line) {
                for word in identifiers(tree) {
                    if is_module_name(word) {
                        modules.insert(word.to_string());
                    }
                }
            }
        }
        Self { modules }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.as_str())
    }

    /// Strip known module prefixes from one line. `use` lines are left
    /// intact; string literals are not touched.
    pub fn strip(&self, line: &str) -> String {
        if use_tree(line).is_some() {
            return line.to_string();
        }
        let bytes = line.as_bytes();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        let mut in_string = false;
        while i < bytes.len() {
            let c = bytes[i];
            if in_string {
                let len = if c == b'\\' && i + 1 < bytes.len() {
                    1 + utf8_len(bytes[i + 1])
                } else {
                    utf8_len(c)
                };
                let end = (i + len).min(bytes.len());
                out.push_str(&line[i..end]);
                in_string = c != b'"';
                i = end;
                continue;
            }
            if c == b'"' {
                in_string = true;
                out.push('"');
                i += 1;
                continue;
            }
            if c == b'\'' {
                let end = char_literal_end(bytes, i).unwrap_or(i + 1);
                out.push_str(&line[i..end]);
                i = end;
                continue;
            }
            if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
                out.push_str(&line[i..]);
                break;
            }
            if is_ident_start(c) && (i == 0 || !is_ident_byte(bytes[i - 1])) {
                let start = i;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                let word = &line[start..i];
                if self.contains(word) && line[i..].starts_with("::") {
                    i += 2;
                } else {
                    out.push_str(word);
                }
                continue;
            }
            // Non-ASCII bytes are copied through as whole characters.
            let ch_len = utf8_len(c);
            out.push_str(&line[i..i + ch_len]);
            i += ch_len;
        }
        out
    }
}

/// Text following `use` on a `use` line, if it is one.
fn use_tree(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let trimmed = trimmed
        .strip_prefix("pub(crate) ")
        .or_else(|| trimmed.strip_prefix("pub "))
        .unwrap_or(trimmed);
    trimmed.strip_prefix("use ")
}

fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

fn is_module_name(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_lowercase())
        && !PRIMITIVES.contains(&word)
        && word != "as"
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// End of the char literal opening at `start`, or `None` for a lifetime.
fn char_literal_end(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start + 1)?;
    let close = if first == b'\\' {
        // '\n', '\'', '\u{..}'
        let rest = bytes.get(start + 3..)?;
        start + 3 + rest.iter().position(|&b| b == b'\'')?
    } else {
        start + 1 + utf8_len(first)
    };
    (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prefixes() {
        let ns = Namespaces::default_for_tests();
        assert_eq!(ns.strip("let x = crate::step(a);"), "let x = step(a);");
        assert_eq!(
            ns.strip("let r = slrand::rand_float32(ctr, key);"),
            "let r = rand_float32(ctr, key);"
        );
        assert_eq!(ns.strip("super::self::f()"), "f()");
    }

    #[test]
    fn test_use_line_modules() {
        let ns = Namespaces::from_source(
            "use crate::physics::{self, Params};\nuse std::f32::consts::PI;\nuse glam::Vec3;\n",
        );
        assert!(ns.contains("physics"));
        assert!(ns.contains("glam"));
        assert!(ns.contains("consts"));
        assert!(!ns.contains("f32"));
        assert!(!ns.contains("Params"));
        assert_eq!(
            ns.strip("let v = glam::Vec3::new(0.0, 1.0, physics::scale());"),
            "let v = Vec3::new(0.0, 1.0, scale());"
        );
        assert_eq!(ns.strip("let m = f32::MAX;"), "let m = f32::MAX;");
    }

    #[test]
    fn test_use_lines_and_literals_untouched() {
        let ns = Namespaces::default_for_tests();
        assert_eq!(ns.strip("use crate::physics;"), "use crate::physics;");
        assert_eq!(ns.strip(r#"let s = "crate::x";"#), r#"let s = "crate::x";"#);
        assert_eq!(ns.strip("x(); // crate::y"), "x(); // crate::y");
    }

    #[test]
    fn test_non_ascii_strings_survive() {
        let ns = Namespaces::default_for_tests();
        assert_eq!(
            ns.strip(r#"println!("héllo → {}", crate::x());"#),
            r#"println!("héllo → {}", x());"#
        );
        assert_eq!(ns.strip(r#"let s = "a\"é"; crate::y()"#), r#"let s = "a\"é"; y()"#);
    }

    #[test]
    fn test_char_literals_do_not_open_strings() {
        let ns = Namespaces::default_for_tests();
        assert_eq!(
            ns.strip(r#"let q = '"'; let v = crate::f();"#),
            r#"let q = '"'; let v = f();"#
        );
        assert_eq!(ns.strip(r"let e = '\''; crate::g()"), r"let e = '\''; g()");
        assert_eq!(ns.strip("fn f<'a>(x: &'a u32) { crate::h() }"), "fn f<'a>(x: &'a u32) { h() }");
    }

    #[test]
    fn test_identifier_boundaries() {
        let ns = Namespaces::default_for_tests();
        assert_eq!(ns.strip("mycrate::f()"), "mycrate::f()");
        assert_eq!(ns.strip("Self::new()"), "Self::new()");
    }

    impl Namespaces {
        fn default_for_tests() -> Self {
            Self::from_source("")
        }
    }
}
