//! WGSL support modules appended to kernels that call into them, with
//! CPU implementations for host code.
//!
//! A module is appended when the kernel text calls one of its functions;
//! `slrand` pulls in `sltype`.

pub mod slbool;
pub mod slrand;
pub mod sltype;

/// One runtime module.
#[derive(Debug)]
pub struct Module {
    pub name: &'static str,
    pub source: &'static str,
    /// `(function, WGSL return type)`.
    pub functions: &'static [(&'static str, &'static str)],
    pub requires: &'static [&'static str],
}

pub const MODULES: &[Module] = &[
    Module {
        name: "slbool",
        source: slbool::WGSL,
        functions: &[("is_true", "bool"), ("from_bool", "i32")],
        requires: &[],
    },
    Module {
        name: "sltype",
        source: sltype::WGSL,
        functions: &[
            ("uint32_mul64", "vec2<u32>"),
            ("uint64_add32", "vec2<u32>"),
            ("uint64_incr", "vec2<u32>"),
        ],
        requires: &[],
    },
    Module {
        name: "slrand",
        source: slrand::WGSL,
        functions: &[
            ("philox2x32", "vec2<u32>"),
            ("counter_add", "vec2<u32>"),
            ("rand_uint32_vec2", "vec2<u32>"),
            ("rand_uint32", "u32"),
            ("uint32_to_float32", "f32"),
            ("uint32_to_float32_range11", "f32"),
            ("rand_float32", "f32"),
            ("rand_float32_range11", "f32"),
            ("rand_float32_norm", "f32"),
            ("rand_uint32_n", "u32"),
            ("rand_bool_p", "bool"),
        ],
        requires: &["sltype"],
    },
];

pub fn module(name: &str) -> Option<&'static Module> {
    MODULES.iter().find(|m| m.name == name)
}

/// WGSL return type of a runtime function.
pub fn return_type(function: &str) -> Option<&'static str> {
    MODULES
        .iter()
        .flat_map(|m| m.functions.iter())
        .find(|(name, _)| *name == function)
        .map(|(_, ty)| *ty)
}

/// Modules whose functions `text` calls, dependencies included, in
/// dependency order.
pub fn required(text: &str) -> Vec<&'static Module> {
    let mut wanted: Vec<&str> = MODULES
        .iter()
        .filter(|m| m.functions.iter().any(|(f, _)| calls(text, f)))
        .map(|m| m.name)
        .collect();
    let mut i = 0;
    while i < wanted.len() {
        if let Some(m) = module(wanted[i]) {
            for dep in m.requires {
                if !wanted.contains(dep) {
                    wanted.push(dep);
                }
            }
        }
        i += 1;
    }
    MODULES
        .iter()
        .filter(|m| wanted.contains(&m.name))
        .collect()
}

/// Whether `text` contains a call to `function`.
fn calls(text: &str, function: &str) -> bool {
    let pattern = format!("{}(", function);
    text.match_indices(&pattern).any(|(at, _)| {
        !text[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(mods: &[&Module]) -> Vec<&'static str> {
        mods.iter().map(|m| m.name).collect()
    }

    #[test]
    fn test_required_pulls_dependencies() {
        let text = "let r = rand_float32(ctr, 0u, key);";
        assert_eq!(names(&required(text)), vec!["sltype", "slrand"]);
        assert_eq!(names(&required("if (is_true(f)) {}")), vec!["slbool"]);
        assert!(required("let x = my_is_true(f);").is_empty());
    }

    #[test]
    fn test_return_types() {
        assert_eq!(return_type("rand_uint32"), Some("u32"));
        assert_eq!(return_type("uint64_incr"), Some("vec2<u32>"));
        assert_eq!(return_type("sqrt"), None);
    }

    #[test]
    fn test_modules_parse_as_wgsl() {
        for m in MODULES {
            let mut source = String::new();
            for dep in m.requires {
                if let Some(d) = module(dep) {
                    source.push_str(d.source);
                }
            }
            source.push_str(m.source);
            let parsed = naga::front::wgsl::parse_str(&source);
            assert!(parsed.is_ok(), "{}: {:?}", m.name, parsed.err());
        }
    }
}
