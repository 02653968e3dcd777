//! Rust → WGSL type and identifier mapping.

use quote::ToTokens;
use syn::{Expr, Type};

/// Words WGSL reserves (or predeclares as keywords) that are legal
/// identifiers in Rust.
const RESERVED: &[&str] = &[
    "NULL", "Self", "abstract", "active", "alias", "alignas", "alignof", "array", "asm",
    "atomic", "attribute", "auto", "bitcast", "cast", "catch", "class", "coherent", "common",
    "compile", "concept", "const_assert", "constexpr", "debugger", "decltype", "delete",
    "diagnostic", "discard", "enable", "explicit", "export", "extends", "extern", "external",
    "fallthrough", "filter", "finally", "friend", "from", "get", "goto", "handle", "highp",
    "implements", "import", "inline", "instanceof", "interface", "layout", "lowp", "mat2x2",
    "mat3x3", "mat4x4", "mediump", "meta", "module", "namespace", "new", "nil", "noexcept",
    "noinline", "null", "operator", "package", "packoffset", "partition", "pass", "patch",
    "precise", "precision", "private", "protected", "ptr", "public", "readonly", "regardless",
    "register", "require", "requires", "resource", "restrict", "sampler", "set", "shared",
    "signed", "sizeof", "smooth", "snorm", "storage", "switch", "target", "template", "this",
    "throw", "typedef", "typeid", "typename", "typeof", "uniform", "union", "unless",
    "unsigned", "using", "var", "varying", "vec2", "vec3", "vec4", "virtual", "volatile",
    "wgsl", "workgroup", "writeonly", "case", "default", "bool", "texture_2d", "sampler_comparison",
];

/// Map a Rust identifier to a valid WGSL identifier.
pub fn ident(name: &str) -> String {
    let name = name.strip_prefix("r#").unwrap_or(name);
    if name == "self" {
        return "slf".to_string();
    }
    if RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Map a primitive or well-known Rust type name to WGSL.
pub fn scalar(name: &str) -> Option<&'static str> {
    let ty = match name {
        "f32" | "f64" => "f32",
        "i32" | "isize" => "i32",
        "u32" | "usize" => "u32",
        "bool" => "bool",
        "Bool" => "i32",
        "Uint32Vec2" => "vec2<u32>",
        "Vec2" => "vec2<f32>",
        "Vec3" | "Vec3A" => "vec3<f32>",
        "Vec4" => "vec4<f32>",
        "UVec2" => "vec2<u32>",
        "UVec3" => "vec3<u32>",
        "UVec4" => "vec4<u32>",
        "IVec2" => "vec2<i32>",
        "IVec3" => "vec3<i32>",
        "IVec4" => "vec4<i32>",
        "Mat2" => "mat2x2<f32>",
        "Mat3" => "mat3x3<f32>",
        "Mat4" => "mat4x4<f32>",
        _ => return None,
    };
    Some(ty)
}

pub fn is_integer(wgsl: &str) -> bool {
    matches!(wgsl, "u32" | "i32")
}

/// Map a Rust type to WGSL. References map to their referent; the
/// caller decides whether a `&mut` becomes a pointer.
pub fn wgsl_type(ty: &Type, self_ty: Option<&str>) -> Result<String, String> {
    match ty {
        Type::Reference(r) => wgsl_type(&r.elem, self_ty),
        Type::Paren(p) => wgsl_type(&p.elem, self_ty),
        Type::Group(g) => wgsl_type(&g.elem, self_ty),
        Type::Array(arr) => {
            let elem = wgsl_type(&arr.elem, self_ty)?;
            let len = array_len(&arr.len)?;
            Ok(format!("array<{}, {}>", elem, len))
        }
        Type::Path(p) => {
            let seg = p
                .path
                .segments
                .last()
                .ok_or_else(|| "empty type path".to_string())?;
            let name = seg.ident.to_string();
            if !seg.arguments.is_none() {
                return Err(format!(
                    "generic type `{}` is not supported in shaders",
                    ty.to_token_stream()
                ));
            }
            if name == "Self" {
                return self_ty
                    .map(|s| s.to_string())
                    .ok_or_else(|| "`Self` used outside of an impl".to_string());
            }
            if matches!(name.as_str(), "u64" | "i64" | "u128" | "i128") {
                return Err(format!(
                    "64-bit integer `{}` is not supported in shaders; use `Uint32Vec2`",
                    name
                ));
            }
            if matches!(name.as_str(), "u8" | "u16" | "i8" | "i16" | "char" | "str") {
                return Err(format!("type `{}` is not supported in shaders", name));
            }
            Ok(scalar(&name).map(|s| s.to_string()).unwrap_or(name))
        }
        Type::Tuple(t) if t.elems.is_empty() => Err("unit type has no WGSL form".to_string()),
        _ => Err(format!(
            "type `{}` is not supported in shaders",
            ty.to_token_stream()
        )),
    }
}

fn array_len(len: &Expr) -> Result<String, String> {
    match len {
        Expr::Lit(lit) => match &lit.lit {
            syn::Lit::Int(i) => Ok(format!("{}", i.base10_digits())),
            _ => Err("array length must be an integer".to_string()),
        },
        Expr::Path(p) => Ok(p
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("_")),
        _ => Err(format!(
            "array length `{}` must be a literal or constant",
            len.to_token_stream()
        )),
    }
}

/// Last path identifier of a type, looking through references; used to
/// track local variable types for method resolution.
pub fn host_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Reference(r) => host_name(&r.elem),
        Type::Paren(p) => host_name(&p.elem),
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// Whether a type is `&mut T`.
pub fn is_mut_ref(ty: &Type) -> bool {
    matches!(ty, Type::Reference(r) if r.mutability.is_some())
}

/// Whether a type is `&T`.
pub fn is_shared_ref(ty: &Type) -> bool {
    matches!(ty, Type::Reference(r) if r.mutability.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn map(ty: Type) -> Result<String, String> {
        wgsl_type(&ty, Some("Params"))
    }

    #[test]
    fn test_scalars_and_vectors() {
        assert_eq!(map(parse_quote!(f32)).unwrap(), "f32");
        assert_eq!(map(parse_quote!(usize)).unwrap(), "u32");
        assert_eq!(map(parse_quote!(glam::Vec4)).unwrap(), "vec4<f32>");
        assert_eq!(map(parse_quote!(UVec2)).unwrap(), "vec2<u32>");
        assert_eq!(map(parse_quote!(&mut Neuron)).unwrap(), "Neuron");
        assert_eq!(map(parse_quote!(Self)).unwrap(), "Params");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(map(parse_quote!([f32; 4])).unwrap(), "array<f32, 4>");
        assert_eq!(map(parse_quote!([u32; N_SLOTS])).unwrap(), "array<u32, N_SLOTS>");
    }

    #[test]
    fn test_unsupported_types() {
        assert!(map(parse_quote!(u64)).unwrap_err().contains("Uint32Vec2"));
        assert!(map(parse_quote!(Vec<f32>)).is_err());
        assert!(map(parse_quote!((f32, f32))).is_err());
    }

    #[test]
    fn test_ident_renaming() {
        assert_eq!(ident("self"), "slf");
        assert_eq!(ident("filter"), "filter_");
        assert_eq!(ident("target"), "target_");
        assert_eq!(ident("rate"), "rate");
        assert_eq!(ident("r#type"), "type");
    }

    #[test]
    fn test_reference_kinds() {
        assert!(is_mut_ref(&parse_quote!(&mut f32)));
        assert!(!is_mut_ref(&parse_quote!(&f32)));
        assert!(is_shared_ref(&parse_quote!(&Params)));
        assert_eq!(host_name(&parse_quote!(&mut crate::Params)).as_deref(), Some("Params"));
    }
}
