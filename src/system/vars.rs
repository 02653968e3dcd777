//! Parse `//gpu:vars` regions into Groups and Vars.
//!
//! ```text
//! //gpu:vars
//! //gpu:group -uniform Params
//! /// Simulation parameters.
//! pub static PARAMS: Global<Vec<SimParams>> = Global::new();
//! //gpu:group Data
//! //gpu:dims 2
//! //gpu:read-write
//! pub static DATA: Global<Tensor<f32>> = Global::new();
//! //gpu:end
//! ```

use syn::{GenericArgument, PathArguments, Type};

use super::{ElemKind, Group, System, Var, VarType};
use crate::diagnostic::Diagnostic;
use crate::extract::{Directive, VarsBlock};
use crate::layout::MAX_TENSOR_DIMS;
use crate::span::LineIndex;
use crate::translate::types;

/// Attributes collected from directives, applied to the next Var.
#[derive(Default)]
struct Pending {
    doc: Vec<String>,
    read_only: bool,
    read_write: bool,
    dims: Option<usize>,
    nbuffs: Option<usize>,
    size: Option<u64>,
}

impl Pending {
    fn take_doc(&mut self) -> String {
        std::mem::take(&mut self.doc).join("\n")
    }
}

/// Add the Groups and Vars of one vars region to `system`.
pub fn parse_vars(block: &VarsBlock, system: &mut System, index: &LineIndex) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    let mut pending = Pending::default();
    let mut decl = String::new();
    let mut decl_line = 0;

    for (line, raw) in &block.lines {
        let trimmed = raw.trim();
        if !decl.is_empty() {
            decl.push('\n');
            decl.push_str(raw);
            if trimmed.contains(';') {
                declare(system, &decl, decl_line, &mut pending, index, &mut diags);
                decl.clear();
            }
            continue;
        }
        if let Some(parsed) = Directive::parse(trimmed) {
            // Malformed directives were already reported by the extractor.
            let Ok(d) = parsed else {
                continue;
            };
            match d {
                Directive::Group { name, uniform } => {
                    if system.groups.iter().any(|g| g.name == name) {
                        diags.push(Diagnostic::error(
                            format!("group `{}` declared twice in System `{}`", name, system.name),
                            index.line(*line),
                        ));
                        continue;
                    }
                    let mut group = Group::new(&name, uniform);
                    group.doc = pending.take_doc();
                    system.groups.push(group);
                }
                Directive::ReadOnly => pending.read_only = true,
                Directive::ReadWrite => pending.read_write = true,
                Directive::Dims(n) => pending.dims = Some(n),
                Directive::NBuffs(n) => pending.nbuffs = Some(n),
                Directive::Size(n) => pending.size = Some(n),
                _ => {}
            }
            continue;
        }
        if trimmed.is_empty() {
            pending.doc.clear();
        } else if let Some(doc) = trimmed.strip_prefix("///") {
            pending.doc.push(doc.trim().to_string());
        } else if let Some(doc) = trimmed.strip_prefix("//") {
            pending.doc.push(doc.trim().to_string());
        } else {
            decl_line = *line;
            decl.push_str(raw);
            if trimmed.contains(';') {
                declare(system, &decl, decl_line, &mut pending, index, &mut diags);
                decl.clear();
            }
        }
    }
    if !decl.is_empty() {
        diags.push(Diagnostic::error(
            "unterminated variable declaration".to_string(),
            index.line(decl_line),
        ));
    }
    diags
}

fn declare(
    system: &mut System,
    text: &str,
    line: usize,
    pending: &mut Pending,
    index: &LineIndex,
    diags: &mut Vec<Diagnostic>,
) {
    let attrs = std::mem::take(pending);
    let span = index.line(line);
    let item = match syn::parse_str::<syn::ItemStatic>(text.trim()) {
        Ok(item) => item,
        Err(e) => {
            diags.push(
                Diagnostic::error(format!("invalid variable declaration: {}", e), span)
                    .with_help("declare vars as `pub static NAME: Global<Tensor<f32>> = Global::new();`".to_string()),
            );
            return;
        }
    };
    let name = item.ident.to_string();
    let ty = match classify(&item.ty) {
        Ok(ty) => ty,
        Err(msg) => {
            diags.push(Diagnostic::error(format!("variable `{}`: {}", name, msg), span));
            return;
        }
    };
    if system.var(&name).is_some() {
        diags.push(Diagnostic::error(
            format!("variable `{}` declared twice in System `{}`", name, system.name),
            span,
        ));
        return;
    }
    if attrs.read_only && attrs.read_write {
        diags.push(Diagnostic::error(
            format!("variable `{}` cannot be both read-only and read-write", name),
            span,
        ));
        return;
    }

    let mut var = Var::new(&name, ty);
    var.doc = attrs.doc.join("\n");
    var.read_only = attrs.read_only;
    var.read_or_write = attrs.read_write;
    var.span = span;
    if var.is_tensor() {
        let dims = attrs.dims.unwrap_or(1);
        if dims == 0 || dims > MAX_TENSOR_DIMS {
            diags.push(Diagnostic::error(
                format!("tensor `{}` has {} dims; 1 to {} are supported", name, dims, MAX_TENSOR_DIMS),
                span,
            ));
            return;
        }
        var.dims = dims;
        var.nbuffs_hint = attrs.nbuffs;
        var.size = attrs.size;
    } else if attrs.dims.is_some() || attrs.nbuffs.is_some() || attrs.size.is_some() {
        diags.push(Diagnostic::warning(
            format!("`dims`, `nbuffs` and `size` only apply to tensors; ignored on `{}`", name),
            span,
        ));
    }

    if system.groups.is_empty() {
        system.groups.push(Group::new("Vars", false));
    }
    let Some(group) = system.groups.last_mut() else {
        return;
    };
    if group.uniform && var.is_tensor() {
        diags.push(Diagnostic::error(
            format!("tensor `{}` cannot live in uniform group `{}`", name, group.name),
            span,
        ));
        return;
    }
    tracing::debug!(system = %system.name, group = %group.name, var = %name, "declared var");
    group.vars.push(var);
}

/// Peel wrapper generics down to `Tensor<T>` or `Vec<T>`.
fn classify(ty: &Type) -> Result<VarType, String> {
    let Type::Path(path) = ty else {
        return Err("type must be `Tensor<T>` or `Vec<T>` (optionally wrapped)".to_string());
    };
    let seg = path
        .path
        .segments
        .last()
        .ok_or_else(|| "empty type".to_string())?;
    let inner = single_type_arg(&seg.arguments);
    match (seg.ident.to_string().as_str(), inner) {
        ("Tensor", Some(elem)) => {
            let elem_name = types::host_name(elem).unwrap_or_default();
            ElemKind::from_rust(&elem_name)
                .map(VarType::Tensor)
                .ok_or_else(|| format!("tensor element `{}` must be f32, i32 or u32", elem_name))
        }
        ("Vec", Some(elem)) => types::wgsl_type(elem, None).map(VarType::Array),
        (_, Some(inner)) => classify(inner),
        (other, None) => Err(format!(
            "`{}` is not a tensor or array type; use `Tensor<T>` or `Vec<T>`",
            other
        )),
    }
}

fn single_type_arg(args: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = args else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|a| match a {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    });
    let first = types.next()?;
    if types.next().is_some() {
        return None;
    }
    Some(first)
}
