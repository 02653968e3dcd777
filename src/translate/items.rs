//! Item-level declarations: the cross-file index of structs, functions,
//! enums and constants, and printing of non-function items.

use std::collections::{BTreeMap, BTreeSet};

use syn::{FnArg, ImplItem, Item, ReturnType};

use super::prepass::WGSL_MACRO;
use super::{types, Env, Mode, Translator};
use crate::diagnostic::Diagnostic;

/// How a parameter is passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// By value.
    Value,
    /// `&T`: passed by value in WGSL.
    Ref,
    /// `&mut T`: a `ptr<function, T>` out-parameter.
    Out,
}

impl ParamKind {
    fn of(ty: &syn::Type) -> Self {
        if types::is_mut_ref(ty) {
            ParamKind::Out
        } else if types::is_shared_ref(ty) {
            ParamKind::Ref
        } else {
            ParamKind::Value
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub ty: Option<String>,
}

/// Signature of a translatable function, as seen by callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncSig {
    /// WGSL name; `Type_method` for methods.
    pub name: String,
    pub receiver: Option<ParamKind>,
    pub params: Vec<Param>,
    pub ret: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructInfo {
    /// `(field, WGSL type)` in declaration order.
    pub fields: Vec<(String, String)>,
}

/// Declarations of every file of a run, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct ItemIndex {
    pub structs: BTreeMap<String, StructInfo>,
    pub funcs: BTreeMap<String, FuncSig>,
    /// Method name to the types defining it.
    pub methods: BTreeMap<String, BTreeSet<String>>,
    /// Enum name to its variants.
    pub enums: BTreeMap<String, Vec<String>>,
    /// Constant name (`NAME` or `Type_NAME`) to its WGSL type.
    pub consts: BTreeMap<String, Option<String>>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the declarations of one parsed file. Earlier files win on
    /// name clashes.
    pub fn add_file(&mut self, file: &syn::File) {
        for item in &file.items {
            match item {
                Item::Struct(s) => {
                    let name = s.ident.to_string();
                    let fields = s
                        .fields
                        .iter()
                        .filter_map(|f| {
                            let fname = f.ident.as_ref()?.to_string();
                            let ty = types::wgsl_type(&f.ty, Some(&name)).ok()?;
                            Some((fname, ty))
                        })
                        .collect();
                    self.structs.entry(name).or_insert(StructInfo { fields });
                }
                Item::Enum(e) => {
                    let variants = e.variants.iter().map(|v| v.ident.to_string()).collect();
                    self.enums.entry(e.ident.to_string()).or_insert(variants);
                }
                Item::Const(c) => {
                    let ty = types::wgsl_type(&c.ty, None).ok();
                    self.consts.entry(c.ident.to_string()).or_insert(ty);
                }
                Item::Fn(f) if !is_test(&f.attrs) => {
                    let sig = signature(types::ident(&f.sig.ident.to_string()), &f.sig, None);
                    self.funcs.entry(sig.name.clone()).or_insert(sig);
                }
                Item::Impl(imp) if imp.trait_.is_none() => {
                    let Some(owner) = types::host_name(&imp.self_ty) else {
                        continue;
                    };
                    for ii in &imp.items {
                        match ii {
                            ImplItem::Fn(m) if !is_test(&m.attrs) => {
                                let method = m.sig.ident.to_string();
                                let name = format!("{}_{}", owner, method);
                                let sig = signature(name.clone(), &m.sig, Some(&owner));
                                self.funcs.entry(name).or_insert(sig);
                                self.methods.entry(method).or_default().insert(owner.clone());
                            }
                            ImplItem::Const(c) => {
                                let ty = types::wgsl_type(&c.ty, Some(&owner)).ok();
                                self.consts
                                    .entry(format!("{}_{}", owner, c.ident))
                                    .or_insert(ty);
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn is_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| a.path().is_ident("test"))
}

fn signature(name: String, sig: &syn::Signature, owner: Option<&str>) -> FuncSig {
    let mut receiver = None;
    let mut params = Vec::new();
    for input in &sig.inputs {
        match input {
            FnArg::Receiver(r) => {
                receiver = Some(match (&r.reference, &r.mutability) {
                    (Some(_), Some(_)) => ParamKind::Out,
                    (Some(_), None) => ParamKind::Ref,
                    (None, _) => ParamKind::Value,
                });
            }
            FnArg::Typed(pt) => {
                let pname = match &*pt.pat {
                    syn::Pat::Ident(pi) => pi.ident.to_string(),
                    _ => String::from("_"),
                };
                params.push(Param {
                    name: pname,
                    kind: ParamKind::of(&pt.ty),
                    ty: types::wgsl_type(&pt.ty, owner).ok(),
                });
            }
        }
    }
    let ret = match &sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => types::wgsl_type(ty, owner).ok(),
    };
    FuncSig {
        name,
        receiver,
        params,
        ret,
    }
}

/// Print the structs, aliases, enums, constants and verbatim WGSL lines
/// of one file, in source order. Items that cannot be expressed in WGSL
/// are reported and skipped.
pub fn render_items(file: &syn::File, env: &Env<'_>) -> (String, Vec<Diagnostic>) {
    let mut t = Translator::new(env, Mode::Emit);
    t.push_scope(false);
    let mut diags = Vec::new();
    for item in &file.items {
        if let Err(d) = render_item(&mut t, item) {
            diags.push(d);
        }
    }
    diags.extend(std::mem::take(&mut t.warnings));
    (t.out, diags)
}

fn render_item(t: &mut Translator<'_>, item: &Item) -> super::TResult<()> {
    match item {
        Item::Struct(s) => {
            if !s.generics.params.is_empty() {
                return t.error(&s.generics, format!("generic struct `{}` cannot be used on the GPU", s.ident));
            }
            let name = s.ident.to_string();
            let mut fields = Vec::new();
            for f in &s.fields {
                let Some(fname) = &f.ident else {
                    return t.error(f, "tuple structs are not supported".to_string());
                };
                let ty = types::wgsl_type(&f.ty, Some(&name)).or_else(|m| t.error(&f.ty, m))?;
                fields.push(format!("\t{}: {},", types::ident(&fname.to_string()), ty));
            }
            t.line(&format!("struct {} {{", name));
            for f in &fields {
                t.line(f);
            }
            t.line("}");
            t.line("");
        }
        Item::Type(ty) => {
            let target = types::wgsl_type(&ty.ty, None).or_else(|m| t.error(&ty.ty, m))?;
            t.line(&format!("alias {} = {};", ty.ident, target));
            t.line("");
        }
        Item::Enum(e) => {
            t.line(&format!("alias {} = i32;", e.ident));
            let mut next: i64 = 0;
            for v in &e.variants {
                if !v.fields.is_empty() {
                    return t.error(v, format!("enum variant `{}` carries data", v.ident));
                }
                if let Some((_, value)) = &v.discriminant {
                    let Some(v) = discriminant(value) else {
                        return t.error(value, "enum discriminants must be integer literals".to_string());
                    };
                    next = v;
                }
                t.line(&format!("const {}_{}: i32 = {};", e.ident, v.ident, next));
                next += 1;
            }
            t.line("");
        }
        Item::Const(c) => {
            let ty = types::wgsl_type(&c.ty, None).or_else(|m| t.error(&c.ty, m))?;
            let value = t.expr(&c.expr)?;
            t.line(&format!("const {}: {} = {};", types::ident(&c.ident.to_string()), ty, value.code));
            t.line("");
        }
        Item::Impl(imp) if imp.trait_.is_none() => {
            let Some(owner) = types::host_name(&imp.self_ty) else {
                return Ok(());
            };
            t.self_ty = Some(owner.clone());
            let mut any = false;
            for ii in &imp.items {
                if let ImplItem::Const(c) = ii {
                    let ty = types::wgsl_type(&c.ty, Some(&owner)).or_else(|m| t.error(&c.ty, m))?;
                    let value = t.expr(&c.expr)?;
                    t.line(&format!("const {}_{}: {} = {};", owner, c.ident, ty, value.code));
                    any = true;
                }
            }
            t.self_ty = None;
            if any {
                t.line("");
            }
        }
        Item::Macro(m) if m.mac.path.is_ident(WGSL_MACRO) => {
            let lit: syn::LitStr = m
                .mac
                .parse_body()
                .or_else(|e| t.error(&m.mac, format!("bad WGSL line: {}", e)))?;
            t.line(&lit.value());
        }
        _ => {}
    }
    Ok(())
}

fn discriminant(e: &syn::Expr) -> Option<i64> {
    match e {
        syn::Expr::Lit(l) => match &l.lit {
            syn::Lit::Int(i) => i.base10_parse().ok(),
            _ => None,
        },
        syn::Expr::Unary(u) if matches!(u.op, syn::UnOp::Neg(_)) => discriminant(&u.expr).map(|v| -v),
        _ => None,
    }
}
