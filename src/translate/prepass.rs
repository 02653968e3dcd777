//! Turn extracted lines into parseable Rust for the translator.
//!
//! Lines of a `//gpu:wgsl` region are commented-out WGSL. Each one is
//! wrapped as a `__wgsl!(r#"..."#);` macro invocation so it survives
//! parsing and is printed verbatim. Lines of a `//gpu:nowgsl` region are
//! blanked. Line count is preserved so spans still map back through
//! [`crate::extract::Extracted::origin`].

use crate::extract::{Directive, Extracted};

/// Macro carrying one verbatim WGSL line through the Rust parser.
pub const WGSL_MACRO: &str = "__wgsl";

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Wgsl,
    NoWgsl,
}

/// Prepared source text of an extracted file.
pub fn prepare(ex: &Extracted) -> String {
    let mut out = String::new();
    let mut state = State::Normal;
    for raw in &ex.lines {
        let trimmed = raw.trim();
        let directive = Directive::parse(trimmed).and_then(Result::ok);
        let line = match (state, directive) {
            (_, Some(Directive::Wgsl)) => {
                state = State::Wgsl;
                String::new()
            }
            (_, Some(Directive::NoWgsl)) => {
                state = State::NoWgsl;
                String::new()
            }
            (State::NoWgsl, Some(Directive::End)) => {
                state = State::Normal;
                String::new()
            }
            (State::NoWgsl, _) => String::new(),
            (State::Wgsl, _) if trimmed.starts_with("//") => wrap(trimmed),
            (State::Wgsl, _) => {
                state = State::Normal;
                raw.clone()
            }
            (State::Normal, _) => raw.clone(),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// `// fn f() {}` as `__wgsl!(r#"fn f() {}"#);`.
fn wrap(trimmed: &str) -> String {
    let body = trimmed.trim_start_matches('/');
    let body = body.strip_prefix(' ').unwrap_or(body);
    let hashes = "#".repeat(longest_hash_run(body) + 1);
    format!("{}!(r{h}\"{b}\"{h});", WGSL_MACRO, h = hashes, b = body)
}

fn longest_hash_run(s: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    for ch in s.chars() {
        if ch == '#' {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(lines: &[&str]) -> Vec<String> {
        let ex = Extracted {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            origin: (0..lines.len()).collect(),
            ..Default::default()
        };
        prepare(&ex).lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_wgsl_lines_are_wrapped_until_first_code_line() {
        let out = prepared(&[
            "//gpu:wgsl",
            "// fn gpu_only() -> f32 {",
            "//\treturn 1.0;",
            "// }",
            "fn host() {}",
        ]);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], "");
        assert_eq!(out[1], "__wgsl!(r#\"fn gpu_only() -> f32 {\"#);");
        assert_eq!(out[2], "__wgsl!(r#\"\treturn 1.0;\"#);");
        assert_eq!(out[4], "fn host() {}");
    }

    #[test]
    fn test_nowgsl_region_is_blanked() {
        let out = prepared(&["//gpu:nowgsl", "fn cpu() {}", "//gpu:end", "fn both() {}"]);
        assert_eq!(out, vec!["", "", "", "fn both() {}"]);
    }

    #[test]
    fn test_raw_string_hashes_grow() {
        assert_eq!(wrap("// a \"# b"), "__wgsl!(r##\"a \"# b\"##);");
        let parsed: syn::ExprMacro = syn::parse_str(wrap("// x = \"#\";").trim_end_matches(';')).unwrap();
        let lit: syn::LitStr = parsed.mac.parse_body().unwrap();
        assert_eq!(lit.value(), "x = \"#\";");
    }
}
