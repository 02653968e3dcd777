//! Expressions: literals, operators, paths, calls and method calls.

use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{BinOp, Expr, ExprCall, ExprIf, ExprMethodCall, ExprPath, Lit, Stmt, UnOp};

use super::items::{FuncSig, ParamKind};
use super::stmt::strip_parens;
use super::types;
use super::{TResult, Translator};

/// A translated expression and its WGSL type, when known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Typed {
    pub code: String,
    pub ty: Option<String>,
}

impl Typed {
    pub fn new(code: String, ty: Option<&str>) -> Self {
        Self {
            code,
            ty: ty.map(|t| t.to_string()),
        }
    }
}

/// glam vector and matrix types accepted in `Type::new(..)` form.
const GLAM_TYPES: &[&str] = &[
    "Vec2", "Vec3", "Vec3A", "Vec4", "UVec2", "UVec3", "UVec4", "IVec2", "IVec3", "IVec4",
    "Mat2", "Mat3", "Mat4",
];

/// glam free constructor functions.
const GLAM_CTORS: &[(&str, &str)] = &[
    ("vec2", "vec2<f32>"),
    ("vec3", "vec3<f32>"),
    ("vec4", "vec4<f32>"),
    ("uvec2", "vec2<u32>"),
    ("uvec3", "vec3<u32>"),
    ("uvec4", "vec4<u32>"),
    ("ivec2", "vec2<i32>"),
    ("ivec3", "vec3<i32>"),
    ("ivec4", "vec4<i32>"),
];

/// Float constants usable as bare names after `use std::f32::consts::*`.
fn float_const(name: &str) -> Option<&'static str> {
    let v = match name {
        "PI" => "3.14159265358979",
        "TAU" => "6.28318530717959",
        "FRAC_PI_2" => "1.5707963267949",
        "FRAC_PI_3" => "1.0471975511966",
        "FRAC_PI_4" => "0.785398163397448",
        "FRAC_1_PI" => "0.318309886183791",
        "LN_2" => "0.693147180559945",
        "LN_10" => "2.30258509299405",
        "SQRT_2" => "1.4142135623731",
        "FRAC_1_SQRT_2" => "0.707106781186548",
        _ => return None,
    };
    Some(v)
}

/// Leading module segments the extractor did not strip (`util::twice`,
/// `crate::util::twice`). The last segment and primitive type names stay.
fn strip_modules(segs: &[String]) -> &[String] {
    let mut start = 0;
    while start + 1 < segs.len() && is_module(&segs[start]) {
        start += 1;
    }
    &segs[start..]
}

fn is_module(seg: &str) -> bool {
    let primitive = matches!(
        seg,
        "f32" | "f64" | "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64" | "usize" | "isize" | "bool"
    );
    !primitive && seg.starts_with(|c: char| c.is_ascii_lowercase())
}

/// `f32::MAX` and friends.
fn primitive_const(ty: &str, name: &str) -> Option<(&'static str, &'static str)> {
    let v = match (ty, name) {
        ("f32" | "f64", "MAX") => ("3.40282347e+38", "f32"),
        ("f32" | "f64", "MIN") => ("-3.40282347e+38", "f32"),
        ("f32" | "f64", "EPSILON") => ("1.1920929e-7", "f32"),
        ("f32" | "f64", "MIN_POSITIVE") => ("1.17549435e-38", "f32"),
        ("u32" | "usize", "MAX") => ("0xffffffffu", "u32"),
        ("u32" | "usize", "MIN") => ("0u", "u32"),
        ("i32" | "isize", "MAX") => ("0x7fffffffi", "i32"),
        ("i32" | "isize", "MIN") => ("i32(-2147483648)", "i32"),
        ("f32" | "f64", c) => (float_const(c)?, "f32"),
        _ => return None,
    };
    Some(v)
}

pub(crate) fn binary_op(op: &BinOp) -> Option<&'static str> {
    let s = match op {
        BinOp::Add(_) => "+",
        BinOp::Sub(_) => "-",
        BinOp::Mul(_) => "*",
        BinOp::Div(_) => "/",
        BinOp::Rem(_) => "%",
        BinOp::And(_) => "&&",
        BinOp::Or(_) => "||",
        BinOp::BitXor(_) => "^",
        BinOp::BitAnd(_) => "&",
        BinOp::BitOr(_) => "|",
        BinOp::Shl(_) => "<<",
        BinOp::Shr(_) => ">>",
        BinOp::Eq(_) => "==",
        BinOp::Lt(_) => "<",
        BinOp::Le(_) => "<=",
        BinOp::Ne(_) => "!=",
        BinOp::Ge(_) => ">=",
        BinOp::Gt(_) => ">",
        _ => return None,
    };
    Some(s)
}

pub(crate) fn compound_op(op: &BinOp) -> Option<&'static str> {
    let s = match op {
        BinOp::AddAssign(_) => "+=",
        BinOp::SubAssign(_) => "-=",
        BinOp::MulAssign(_) => "*=",
        BinOp::DivAssign(_) => "/=",
        BinOp::RemAssign(_) => "%=",
        BinOp::BitXorAssign(_) => "^=",
        BinOp::BitAndAssign(_) => "&=",
        BinOp::BitOrAssign(_) => "|=",
        BinOp::ShlAssign(_) => "<<=",
        BinOp::ShrAssign(_) => ">>=",
        _ => return None,
    };
    Some(s)
}

fn is_comparison(op: &str) -> bool {
    matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||")
}

/// An `if` whose branches are single expressions, printed as `select`.
pub(crate) fn is_select(i: &ExprIf) -> bool {
    fn single(block: &syn::Block) -> bool {
        matches!(block.stmts.as_slice(), [Stmt::Expr(_, None)])
    }
    let Some((_, else_expr)) = &i.else_branch else {
        return false;
    };
    let else_ok = match &**else_expr {
        Expr::Block(b) => single(&b.block),
        Expr::If(nested) => is_select(nested),
        _ => false,
    };
    single(&i.then_branch) && else_ok && !matches!(&*i.cond, Expr::Let(_))
}

/// Element type of a vector, matrix column, or fixed array type.
fn element_type(ty: &str) -> Option<String> {
    let inner = ty.split_once('<')?.1.trim_end_matches('>');
    let elem = match inner.rsplit_once(',') {
        Some((elem, _)) if ty.starts_with("array") => elem.trim(),
        _ => inner.trim(),
    };
    if ty.starts_with("mat") {
        let n = ty.get(3..4)?;
        return Some(format!("vec{}<{}>", n, elem));
    }
    Some(elem.to_string())
}

fn is_vector(ty: &str) -> bool {
    ty.starts_with("vec") || ty.starts_with("mat")
}

impl<'a> Translator<'a> {
    pub(crate) fn expr(&mut self, e: &Expr) -> TResult<Typed> {
        match e {
            Expr::Lit(l) => self.lit(&l.lit),
            Expr::Path(p) => self.path_expr(p),
            Expr::Paren(p) => {
                let inner = self.expr(&p.expr)?;
                Ok(Typed {
                    code: format!("({})", inner.code),
                    ty: inner.ty,
                })
            }
            Expr::Group(g) => self.expr(&g.expr),
            Expr::Binary(b) => {
                let Some(op) = binary_op(&b.op) else {
                    return self.error(e, "assignment used as a value".to_string());
                };
                let l = self.operand(&b.left)?;
                let mut r = self.operand(&b.right)?;
                if matches!(op, "<<" | ">>") && r.ty.as_deref() == Some("i32") {
                    r.code = format!("u32({})", r.code);
                }
                let ty = if is_comparison(op) {
                    Some("bool".to_string())
                } else {
                    match (&l.ty, &r.ty) {
                        (Some(lt), Some(rt)) if !is_vector(lt) && is_vector(rt) => Some(rt.clone()),
                        (Some(lt), _) => Some(lt.clone()),
                        (None, rt) => rt.clone(),
                    }
                };
                Ok(Typed {
                    code: format!("{} {} {}", l.code, op, r.code),
                    ty,
                })
            }
            Expr::Unary(u) => {
                let inner = self.operand(&u.expr)?;
                match u.op {
                    UnOp::Deref(_) => Ok(inner),
                    UnOp::Neg(_) => {
                        let code = if inner.code.starts_with('-') {
                            format!("-({})", inner.code)
                        } else {
                            format!("-{}", inner.code)
                        };
                        Ok(Typed { code, ty: inner.ty })
                    }
                    UnOp::Not(_) => {
                        let op = if inner.ty.as_deref().is_some_and(types::is_integer) {
                            "~"
                        } else {
                            "!"
                        };
                        Ok(Typed {
                            code: format!("{}{}", op, inner.code),
                            ty: inner.ty,
                        })
                    }
                    _ => self.error(e, "unsupported unary operator".to_string()),
                }
            }
            Expr::Cast(c) => {
                let ty = types::wgsl_type(&c.ty, self.self_ty.as_deref()).or_else(|m| self.error(&c.ty, m))?;
                let inner = self.expr(&c.expr)?;
                if inner.ty.as_deref() == Some(ty.as_str()) {
                    return Ok(inner);
                }
                let code = format!("{}({})", ty, strip_outer_parens(&inner.code));
                Ok(Typed { code, ty: Some(ty) })
            }
            Expr::Field(f) => {
                let base = self.operand(&f.base)?;
                let syn::Member::Named(name) = &f.member else {
                    return self.error(e, "tuple fields are not supported".to_string());
                };
                let field = name.to_string();
                let ty = base.ty.as_deref().and_then(|t| self.field_type(t, &field));
                Ok(Typed {
                    code: format!("{}.{}", base.code, types::ident(&field)),
                    ty,
                })
            }
            Expr::Index(ix) => {
                if let Some(t) = self.global_index_read(ix)? {
                    return Ok(t);
                }
                let base = self.operand(&ix.expr)?;
                let index = self.expr(&ix.index)?;
                let ty = base.ty.as_deref().and_then(element_type);
                Ok(Typed {
                    code: format!("{}[{}]", base.code, index.code),
                    ty,
                })
            }
            Expr::Call(c) => self.call(c),
            Expr::MethodCall(m) => self.method_call(m),
            Expr::Struct(s) => self.struct_lit(s),
            Expr::If(i) if is_select(i) => self.select(i),
            Expr::Block(b) if b.label.is_none() => match b.block.stmts.as_slice() {
                [Stmt::Expr(inner, None)] => self.expr(inner),
                _ => self.error(e, "block used as a value; use a `let` with a type".to_string()),
            },
            Expr::Reference(r) => self.expr(&r.expr),
            Expr::Array(arr) => {
                let mut parts = Vec::new();
                let mut elem = None;
                for item in &arr.elems {
                    let t = self.expr(item)?;
                    elem = elem.or(t.ty);
                    parts.push(t.code);
                }
                let ty = elem.map(|el| format!("array<{}, {}>", el, parts.len()));
                Ok(Typed {
                    code: format!("array({})", parts.join(", ")),
                    ty,
                })
            }
            Expr::Repeat(r) => {
                let value = self.expr(&r.expr)?;
                let len = self.expr(&r.len)?;
                let Some(elem) = value.ty.clone().or_else(|| literal_type(&value.code)) else {
                    return self.error(e, "array element type must be known".to_string());
                };
                let ty = format!("array<{}, {}>", elem, len.code);
                let code = if is_zero(&value.code) {
                    format!("{}()", ty)
                } else {
                    let n: usize = len
                        .code
                        .trim_end_matches(['u', 'i'])
                        .parse()
                        .or_else(|_| self.error(&r.len, "repeat length must be a literal".to_string()))?;
                    format!("{}({})", ty, vec![value.code; n].join(", "))
                };
                Ok(Typed { code, ty: Some(ty) })
            }
            Expr::Macro(m) => self.error(m, "macros cannot be used as values".to_string()),
            _ => self.error(e, "expression is not supported on the GPU".to_string()),
        }
    }

    /// An operand of a binary or postfix operator, parenthesized when it
    /// is itself a binary expression.
    fn operand(&mut self, e: &Expr) -> TResult<Typed> {
        let t = self.expr(e)?;
        if matches!(e, Expr::Binary(_)) {
            Ok(Typed {
                code: format!("({})", t.code),
                ty: t.ty,
            })
        } else {
            Ok(t)
        }
    }

    pub(crate) fn lit(&self, lit: &Lit) -> TResult<Typed> {
        match lit {
            Lit::Int(i) => {
                let digits = i.base10_digits().to_string();
                match i.suffix() {
                    "" => Ok(Typed::new(digits, None)),
                    "u32" | "usize" => Ok(Typed::new(format!("{}u", digits), Some("u32"))),
                    "i32" | "isize" => Ok(Typed::new(format!("{}i", digits), Some("i32"))),
                    "f32" | "f64" => Ok(Typed::new(format!("{}.0", digits), Some("f32"))),
                    other => self.error(
                        lit,
                        format!("`{}` literals are not supported in shaders; use `Uint32Vec2`", other),
                    ),
                }
            }
            Lit::Float(f) => {
                let mut digits = f.base10_digits().to_string();
                if !digits.contains(['.', 'e', 'E']) {
                    digits.push_str(".0");
                }
                Ok(Typed::new(digits, Some("f32")))
            }
            Lit::Bool(b) => Ok(Typed::new(b.value.to_string(), Some("bool"))),
            _ => self.error(lit, "only numeric and boolean literals are supported".to_string()),
        }
    }

    pub(crate) fn path_expr(&mut self, p: &ExprPath) -> TResult<Typed> {
        if p.qself.is_some() {
            return self.error(p, "qualified paths are not supported".to_string());
        }
        let env = self.env;
        let full: Vec<String> = p.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let segs = strip_modules(&full);
        if let [name] = segs {
            if let Some(local) = self.lookup(name).filter(|_| full.len() == 1) {
                let w = types::ident(name);
                let code = if local.ptr { format!("(*{})", w) } else { w };
                return Ok(Typed {
                    code,
                    ty: local.ty.clone(),
                });
            }
            if let Some(ty) = env.index.consts.get(name) {
                return Ok(Typed::new(types::ident(name), ty.as_deref()));
            }
            if env.var(name).is_some() {
                return self.error(
                    p,
                    format!("global `{}` must be accessed through its methods or accessor", name),
                );
            }
            if let Some(v) = float_const(name) {
                return Ok(Typed::new(v.to_string(), Some("f32")));
            }
            return Ok(Typed::new(types::ident(name), None));
        }

        let Some(last) = segs.last() else {
            return self.error(p, "empty path".to_string());
        };
        let first = self.resolve_self(&segs[0]);
        if let Some((code, ty)) = primitive_const(&first, last) {
            return Ok(Typed::new(code.to_string(), Some(ty)));
        }
        if segs.len() >= 3 && segs[segs.len() - 2] == "consts" {
            if let Some(v) = float_const(last) {
                return Ok(Typed::new(v.to_string(), Some("f32")));
            }
        }
        if env.index.enums.contains_key(&first) {
            return Ok(Typed::new(format!("{}_{}", first, last), Some(first.as_str())));
        }
        let assoc = format!("{}_{}", first, last);
        if let Some(ty) = env.index.consts.get(&assoc) {
            return Ok(Typed::new(assoc, ty.as_deref()));
        }
        if GLAM_TYPES.contains(&first.as_str()) {
            if let Some(ty) = types::scalar(&first) {
                return self.glam_const(p, ty, last);
            }
        }
        Ok(Typed::new(assoc, None))
    }

    fn resolve_self(&self, name: &str) -> String {
        match (name, &self.self_ty) {
            ("Self", Some(t)) => t.clone(),
            _ => name.to_string(),
        }
    }

    fn glam_const(&self, p: &ExprPath, ty: &str, name: &str) -> TResult<Typed> {
        let n: usize = ty.get(3..4).and_then(|d| d.parse().ok()).unwrap_or(4);
        let elem = element_type(ty).unwrap_or_else(|| "f32".to_string());
        let one = match elem.as_str() {
            "u32" => "1u",
            "i32" => "1i",
            _ => "1.0",
        };
        let unit = |axis: usize| -> String {
            let parts: Vec<&str> = (0..n).map(|k| if k == axis { one } else { "0" }).collect();
            format!("{}({})", ty, parts.join(", "))
        };
        let code = match name {
            "ZERO" => format!("{}()", ty),
            "ONE" => format!("{}({})", ty, one),
            "X" => unit(0),
            "Y" => unit(1),
            "Z" if n >= 3 => unit(2),
            "W" if n >= 4 => unit(3),
            other => return self.error(p, format!("unknown vector constant `{}`", other)),
        };
        Ok(Typed::new(code, Some(ty)))
    }

    fn field_type(&self, ty: &str, field: &str) -> Option<String> {
        if let Some(info) = self.env.index.structs.get(ty) {
            return info
                .fields
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, t)| t.clone());
        }
        if ty.starts_with("vec") {
            let elem = element_type(ty)?;
            return match field.len() {
                1 => Some(elem),
                n @ 2..=4 => Some(format!("vec{}<{}>", n, elem)),
                _ => None,
            };
        }
        None
    }

    fn select(&mut self, i: &ExprIf) -> TResult<Typed> {
        let cond = self.expr(&i.cond)?;
        let then = match i.then_branch.stmts.as_slice() {
            [Stmt::Expr(e, None)] => self.expr(e)?,
            _ => return self.error(&i.then_branch, "expected a single expression".to_string()),
        };
        let otherwise = match i.else_branch.as_ref().map(|(_, e)| &**e) {
            Some(Expr::Block(b)) => match b.block.stmts.as_slice() {
                [Stmt::Expr(e, None)] => self.expr(e)?,
                _ => return self.error(&b.block, "expected a single expression".to_string()),
            },
            Some(Expr::If(nested)) => self.select(nested)?,
            _ => return self.error(i, "`if` used as a value needs an `else`".to_string()),
        };
        Ok(Typed {
            code: format!("select({}, {}, {})", otherwise.code, then.code, cond.code),
            ty: then.ty.or(otherwise.ty),
        })
    }

    fn struct_lit(&mut self, s: &syn::ExprStruct) -> TResult<Typed> {
        if s.rest.is_some() {
            return self.error(s, "struct update syntax is not supported".to_string());
        }
        let Some(name) = s.path.segments.last().map(|seg| seg.ident.to_string()) else {
            return self.error(s, "empty struct path".to_string());
        };
        let name = self.resolve_self(&name);
        let env = self.env;
        let Some(info) = env.index.structs.get(&name) else {
            return self.error(s, format!("unknown struct `{}`", name));
        };
        let mut values = Vec::new();
        for (field, _) in &info.fields {
            let fv = s.fields.iter().find(|f| match &f.member {
                syn::Member::Named(id) => id == field,
                _ => false,
            });
            let Some(fv) = fv else {
                return self.error(s, format!("missing field `{}` of `{}`", field, name));
            };
            values.push(self.expr(&fv.expr)?.code);
        }
        Ok(Typed::new(format!("{}({})", name, values.join(", ")), Some(&name)))
    }

    // --- Calls ---

    fn call(&mut self, c: &ExprCall) -> TResult<Typed> {
        let Expr::Path(p) = &*c.func else {
            return self.error(&c.func, "only named functions can be called".to_string());
        };
        let env = self.env;
        let full: Vec<String> = p.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let segs = strip_modules(&full);
        if let [name] = segs {
            if let Some(var) = env.accessor(name) {
                return self.accessor_read(var, c);
            }
            if let Some(sig) = env.index.funcs.get(name) {
                return self.user_call(sig, None, &c.args);
            }
            if name.starts_with("get_") {
                return self.error(p, format!("`{}` does not name a global variable accessor", name));
            }
            if let Some((_, ty)) = GLAM_CTORS.iter().find(|(n, _)| n == name) {
                let args = self.args(&c.args)?;
                return Ok(Typed::new(format!("{}({})", ty, args.join(", ")), Some(*ty)));
            }
            let args = self.args(&c.args)?;
            self.func.calls.insert(name.to_string());
            let ty = crate::runtime::return_type(name);
            return Ok(Typed::new(format!("{}({})", types::ident(name), args.join(", ")), ty));
        }

        let (Some(first), Some(last)) = (segs.first(), segs.last()) else {
            return self.error(p, "empty path".to_string());
        };
        let first = self.resolve_self(first);
        if let Some(ty) = types::scalar(&first) {
            if GLAM_TYPES.contains(&first.as_str()) {
                let args = self.args(&c.args)?;
                return match last.as_str() {
                    "new" | "from_array" => Ok(Typed::new(format!("{}({})", ty, args.join(", ")), Some(ty))),
                    "splat" => Ok(Typed::new(format!("{}({})", ty, args.join(", ")), Some(ty))),
                    other => self.error(p, format!("unsupported vector constructor `{}`", other)),
                };
            }
            if last == "from" {
                let args = self.args(&c.args)?;
                return Ok(Typed::new(format!("{}({})", ty, args.join(", ")), Some(ty)));
            }
            let mut args = c.args.iter();
            if let Some(recv) = args.next() {
                let recv = self.expr(recv)?;
                let rest: Punctuated<Expr, Comma> = args.cloned().collect();
                if let Some(t) = self.builtin_method(last, recv, &rest)? {
                    return Ok(t);
                }
            }
            return self.error(p, format!("unsupported function `{}::{}`", first, last));
        }
        let assoc = format!("{}_{}", first, last);
        if let Some(sig) = env.index.funcs.get(&assoc) {
            return self.user_call(sig, None, &c.args);
        }
        self.error(p, format!("unknown function `{}`", full.join("::")))
    }

    fn args(&mut self, args: &Punctuated<Expr, Comma>) -> TResult<Vec<String>> {
        args.iter().map(|a| self.arg(a, ParamKind::Value)).collect()
    }

    /// A call argument for a parameter of the given kind.
    fn arg(&mut self, e: &Expr, kind: ParamKind) -> TResult<String> {
        match kind {
            ParamKind::Out => self.address_of(e),
            ParamKind::Ref | ParamKind::Value => match e {
                Expr::Reference(r) => Ok(self.expr(&r.expr)?.code),
                other => Ok(self.expr(other)?.code),
            },
        }
    }

    /// `&mut place` as a WGSL pointer expression.
    fn address_of(&mut self, e: &Expr) -> TResult<String> {
        let place = match e {
            Expr::Reference(r) if r.mutability.is_some() => &*r.expr,
            other => other,
        };
        let place = match strip_parens(place) {
            Expr::Unary(u) if matches!(u.op, UnOp::Deref(_)) => &*u.expr,
            other => other,
        };
        if let Expr::Path(p) = place {
            if let Some(ident) = p.path.get_ident() {
                let name = ident.to_string();
                if self.lookup(&name).is_some_and(|l| l.ptr) {
                    return Ok(types::ident(&name));
                }
            }
        }
        if !matches!(e, Expr::Reference(_)) {
            return self.error(e, "expected a `&mut` argument".to_string());
        }
        Ok(format!("&{}", self.expr(place)?.code))
    }

    fn user_call(
        &mut self,
        sig: &FuncSig,
        receiver: Option<&Expr>,
        args: &Punctuated<Expr, Comma>,
    ) -> TResult<Typed> {
        self.func.calls.insert(sig.name.clone());
        let mut parts = Vec::new();
        if let (Some(recv), Some(kind)) = (receiver, sig.receiver) {
            let code = match kind {
                ParamKind::Out => {
                    let wrapped: Expr = match strip_parens(recv) {
                        Expr::Reference(_) => recv.clone(),
                        other => Expr::Reference(syn::ExprReference {
                            attrs: Vec::new(),
                            and_token: Default::default(),
                            mutability: Some(Default::default()),
                            expr: Box::new(other.clone()),
                        }),
                    };
                    self.address_of(&wrapped)?
                }
                _ => self.arg(recv, kind)?,
            };
            parts.push(code);
        }
        if args.len() != sig.params.len() {
            return self.error(
                args,
                format!(
                    "`{}` takes {} arguments, {} given",
                    sig.name,
                    sig.params.len(),
                    args.len()
                ),
            );
        }
        for (a, p) in args.iter().zip(&sig.params) {
            parts.push(self.arg(a, p.kind)?);
        }
        Ok(Typed {
            code: format!("{}({})", sig.name, parts.join(", ")),
            ty: sig.ret.clone(),
        })
    }

    fn method_call(&mut self, m: &ExprMethodCall) -> TResult<Typed> {
        if m.turbofish.is_some() {
            return self.error(m, "generic method calls are not supported".to_string());
        }
        if let Some(t) = self.global_method(m)? {
            return Ok(t);
        }
        let env = self.env;
        let method = m.method.to_string();
        let recv = self.operand(&m.receiver)?;

        if let Some(ty) = &recv.ty {
            if let Some(sig) = env.index.funcs.get(&format!("{}_{}", ty, method)) {
                return self.user_call(sig, Some(&m.receiver), &m.args);
            }
        }
        if let Some(t) = self.builtin_method(&method, recv, &m.args)? {
            return Ok(t);
        }
        if let Some(owners) = env.index.methods.get(&method) {
            if owners.len() == 1 {
                if let Some(sig) = owners
                    .iter()
                    .next()
                    .and_then(|owner| env.index.funcs.get(&format!("{}_{}", owner, method)))
                {
                    return self.user_call(sig, Some(&m.receiver), &m.args);
                }
            }
            return self.error(
                &m.method,
                format!("cannot tell which `{}` method is called; annotate the receiver type", method),
            );
        }
        self.error(&m.method, format!("unknown method `{}`", method))
    }

    /// Rust float/int/vector methods with a WGSL built-in equivalent.
    pub(crate) fn builtin_method(
        &mut self,
        method: &str,
        recv: Typed,
        args: &Punctuated<Expr, Comma>,
    ) -> TResult<Option<Typed>> {
        let args: Vec<Typed> = args.iter().map(|a| self.expr(a)).collect::<TResult<_>>()?;
        let r = recv.code.clone();
        let ty = recv.ty.clone();
        let scalar_of = |t: &Option<String>| -> Option<String> {
            t.as_deref()
                .map(|t| if is_vector(t) { element_type(t).unwrap_or_else(|| t.to_string()) } else { t.to_string() })
        };
        let call = |f: &str, rest: &[&Typed]| -> String {
            let mut parts = vec![r.clone()];
            parts.extend(rest.iter().map(|t| t.code.clone()));
            format!("{}({})", f, parts.join(", "))
        };
        let out = match (method, args.as_slice()) {
            ("clone" | "into" | "to_owned", []) => Typed { code: r.clone(), ty },
            (
                "sqrt" | "abs" | "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "sinh" | "cosh"
                | "tanh" | "exp" | "exp2" | "log2" | "floor" | "ceil" | "round" | "trunc" | "fract"
                | "normalize",
                [],
            ) => Typed { code: call(method, &[]), ty },
            ("ln", []) => Typed { code: call("log", &[]), ty },
            ("signum", []) => Typed { code: call("sign", &[]), ty },
            ("to_radians", []) => Typed { code: call("radians", &[]), ty },
            ("to_degrees", []) => Typed { code: call("degrees", &[]), ty },
            ("recip", []) => Typed { code: format!("(1.0 / {})", r), ty },
            ("length", []) => Typed { code: call("length", &[]), ty: scalar_of(&ty) },
            ("count_ones", []) => Typed { code: call("countOneBits", &[]), ty: Some("u32".to_string()) },
            ("leading_zeros", []) => Typed { code: call("countLeadingZeros", &[]), ty: Some("u32".to_string()) },
            ("trailing_zeros", []) => Typed { code: call("countTrailingZeros", &[]), ty: Some("u32".to_string()) },
            ("reverse_bits", []) => Typed { code: call("reverseBits", &[]), ty },
            ("min" | "max" | "cross" | "step", [a]) => Typed { code: call(method, &[a]), ty },
            ("powf", [a]) => Typed { code: call("pow", &[a]), ty },
            ("powi", [a]) => Typed { code: format!("pow({}, f32({}))", r, a.code), ty },
            ("atan2", [a]) => Typed { code: call("atan2", &[a]), ty },
            ("dot" | "distance", [a]) => Typed { code: call(method, &[a]), ty: scalar_of(&ty) },
            ("hypot", [a]) => Typed {
                code: format!("length(vec2<f32>({}, {}))", r, a.code),
                ty,
            },
            ("wrapping_add", [a]) => Typed { code: format!("({} + {})", r, a.code), ty },
            ("wrapping_sub", [a]) => Typed { code: format!("({} - {})", r, a.code), ty },
            ("wrapping_mul", [a]) => Typed { code: format!("({} * {})", r, a.code), ty },
            ("clamp", [a, b]) => Typed { code: call("clamp", &[a, b]), ty },
            ("mul_add", [a, b]) => Typed { code: call("fma", &[a, b]), ty },
            ("lerp", [a, b]) => Typed { code: call("mix", &[a, b]), ty },
            _ => return Ok(None),
        };
        Ok(Some(out))
    }
}

fn strip_outer_parens(code: &str) -> &str {
    let Some(inner) = code.strip_prefix('(').and_then(|c| c.strip_suffix(')')) else {
        return code;
    };
    // Only strip when the parentheses enclose the whole expression.
    let mut depth = 0i32;
    for ch in inner.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return code;
                }
            }
            _ => {}
        }
    }
    inner
}

fn literal_type(code: &str) -> Option<String> {
    if code == "true" || code == "false" {
        Some("bool".to_string())
    } else if code.ends_with('u') {
        Some("u32".to_string())
    } else if code.ends_with('i') {
        Some("i32".to_string())
    } else if code.contains('.') {
        Some("f32".to_string())
    } else {
        None
    }
}

fn is_zero(code: &str) -> bool {
    matches!(code, "0" | "0u" | "0i" | "0.0" | "false")
}
