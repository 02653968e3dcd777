//! Global variable access: tensor methods, `get_<name>` accessors and
//! direct indexing of array vars.

use syn::{Expr, ExprCall, ExprIndex, ExprMethodCall, UnOp};

use super::expr::Typed;
use super::stmt::strip_parens;
use super::{Local, TResult, Translator};
use crate::layout::{MAX_TENSOR_DIMS, STRIDES_VAR};
use crate::system::Var;

/// How a tensor method touches its element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    /// Plain read-modify-write with a compound operator.
    Update(&'static str),
    /// A WGSL atomic built-in.
    Atomic(&'static str),
}

fn tensor_method(name: &str) -> Option<(Access, bool)> {
    // (access, takes a value argument first)
    let m = match name {
        "value" => (Access::Read, false),
        "set" => (Access::Write, true),
        "set_add" => (Access::Update("+="), true),
        "set_sub" => (Access::Update("-="), true),
        "set_mul" => (Access::Update("*="), true),
        "set_div" => (Access::Update("/="), true),
        "atomic_add" => (Access::Atomic("atomicAdd"), true),
        "atomic_sub" => (Access::Atomic("atomicSub"), true),
        "atomic_max" => (Access::Atomic("atomicMax"), true),
        "atomic_min" => (Access::Atomic("atomicMin"), true),
        "atomic_and" => (Access::Atomic("atomicAnd"), true),
        "atomic_or" => (Access::Atomic("atomicOr"), true),
        "atomic_xor" => (Access::Atomic("atomicXor"), true),
        "atomic_swap" => (Access::Atomic("atomicExchange"), true),
        "atomic_store" => (Access::Atomic("atomicStore"), true),
        "atomic_load" => (Access::Atomic("atomicLoad"), false),
        _ => return None,
    };
    Some(m)
}

impl<'a> Translator<'a> {
    fn kernel_name(&self) -> &str {
        self.env.kernel.map(|(_, k)| k.name.as_str()).unwrap_or("")
    }

    /// The var named by a bare path expression.
    fn global_var(&self, e: &Expr) -> Option<&'a Var> {
        let Expr::Path(p) = strip_parens(e) else {
            return None;
        };
        let name = p.path.get_ident()?.to_string();
        if self.lookup(&name).is_some() {
            return None;
        }
        self.env.var(&name)
    }

    fn touch(&mut self, var: &Var) {
        self.func.vars.insert(var.name.clone());
    }

    fn check_writable(&mut self, node: &impl syn::spanned::Spanned, var: &Var) {
        if self.emitting() && !self.env.writable(var) {
            let msg = format!(
                "`{}` is written but is not read-write in kernel `{}`",
                var.name,
                self.kernel_name()
            );
            self.warn(node, msg);
        }
    }

    /// `get_<name>(ix)`, possibly behind `&`, `&mut` or `*`.
    pub(crate) fn accessor_call<'e>(&self, e: &'e Expr) -> Option<(&'e ExprCall, &'a Var)> {
        let e = match strip_parens(e) {
            Expr::Reference(r) => strip_parens(&r.expr),
            Expr::Unary(u) if matches!(u.op, UnOp::Deref(_)) => strip_parens(&u.expr),
            other => other,
        };
        let Expr::Call(call) = e else {
            return None;
        };
        let Expr::Path(p) = &*call.func else {
            return None;
        };
        let name = p.path.get_ident()?.to_string();
        self.env.accessor(&name).map(|var| (call, var))
    }

    fn accessor_index(&mut self, var: &Var, call: &ExprCall) -> TResult<String> {
        let mut args = call.args.iter();
        let (Some(ix), None) = (args.next(), args.next()) else {
            return self.error(call, format!("`get_{}` takes one index", var.name.to_lowercase()));
        };
        Ok(self.expr(ix)?.code)
    }

    /// A value read through an accessor: `get_params(0)` is `PARAMS[0]`.
    pub(crate) fn accessor_read(&mut self, var: &'a Var, call: &ExprCall) -> TResult<Typed> {
        self.touch(var);
        let ix = self.accessor_index(var, call)?;
        Ok(Typed::new(format!("{}[{}]", var.name, ix), Some(var.elem_wgsl())))
    }

    /// `let [mut] x = get_x(ix);` copies the element into a local. A
    /// mutable copy of a writable var is written back at every exit of
    /// the enclosing scope.
    pub(crate) fn let_global(
        &mut self,
        name: &str,
        mutable: bool,
        annotated: Option<String>,
        call: &ExprCall,
        var: &'a Var,
    ) -> TResult<()> {
        self.touch(var);
        let ix = self.accessor_index(var, call)?;
        let target = format!("{}[{}]", var.name, ix);
        let wname = super::types::ident(name);
        let ty = annotated.unwrap_or_else(|| var.elem_wgsl().to_string());
        let keyword = if mutable { "var" } else { "let" };
        self.line(&format!("{} {}: {} = {};", keyword, wname, ty, target));
        self.declare(name, Local { ty: Some(ty), ptr: false });
        if mutable {
            if self.env.writable(var) {
                self.defer_write_back(&wname, target);
            } else if self.emitting() {
                let msg = format!(
                    "`{}` is modified locally but `{}` is not read-write in kernel `{}`; changes are not stored",
                    name,
                    var.name,
                    self.kernel_name()
                );
                self.warn(call, msg);
            }
        }
        Ok(())
    }

    /// `X[ix]` on an array var, as a value.
    pub(crate) fn global_index_read(&mut self, ix: &ExprIndex) -> TResult<Option<Typed>> {
        let Some(var) = self.global_var(&ix.expr) else {
            return Ok(None);
        };
        if var.is_tensor() {
            return self.error(ix, format!("index tensor `{}` with `.value(..)`", var.name));
        }
        self.touch(var);
        let index = self.expr(&ix.index)?;
        Ok(Some(Typed::new(
            format!("{}[{}]", var.name, index.code),
            Some(var.elem_wgsl()),
        )))
    }

    /// `X[ix]` on an array var, as an assignment target.
    pub(crate) fn global_index_write(&mut self, ix: &ExprIndex) -> TResult<Option<String>> {
        let Some(var) = self.global_var(&ix.expr) else {
            return Ok(None);
        };
        if var.is_tensor() {
            return self.error(ix, format!("write tensor `{}` with `.set(..)`", var.name));
        }
        self.touch(var);
        self.check_writable(ix, var);
        let index = self.expr(&ix.index)?;
        Ok(Some(format!("{}[{}]", var.name, index.code)))
    }

    /// Methods called on a global var. `None` when the receiver is not one.
    pub(crate) fn global_method(&mut self, m: &ExprMethodCall) -> TResult<Option<Typed>> {
        let Some(var) = self.global_var(&m.receiver) else {
            return Ok(None);
        };
        let method = m.method.to_string();
        self.touch(var);

        if method == "len" && m.args.is_empty() {
            let uniform = self
                .env
                .kernel
                .is_some_and(|(system, _)| system.is_uniform(var));
            let code = if uniform {
                "1u".to_string()
            } else if var.is_split() {
                format!("{}u", crate::layout::SplitLayout::of(var).capacity())
            } else {
                format!("arrayLength(&{})", var.name)
            };
            return Ok(Some(Typed::new(code, Some("u32"))));
        }
        if !var.is_tensor() {
            return self.error(
                &m.method,
                format!("`{}` is not a tensor; use `{}(ix)`", var.name, Var::accessor_name(&var.name)),
            );
        }
        let Some((access, takes_value)) = tensor_method(&method) else {
            return self.error(&m.method, format!("unknown tensor method `{}`", method));
        };

        let mut args = m.args.iter();
        let value = if takes_value {
            let Some(v) = args.next() else {
                return self.error(m, format!("`{}` needs a value", method));
            };
            Some(self.expr(v)?)
        } else {
            None
        };
        let indexes: Vec<&Expr> = args.collect();
        let index = self.tensor_index(m, var, &indexes)?;

        if let Access::Atomic(_) = access {
            self.func.atomics.insert(var.name.clone());
        }
        if matches!(access, Access::Write | Access::Update(_) | Access::Atomic(_)) && access != Access::Atomic("atomicLoad") {
            self.check_writable(m, var);
        }
        if !self.emitting() {
            return Ok(Some(Typed::new(String::new(), Some(var.elem_wgsl()))));
        }

        // Plain access to a var the kernel treats atomically goes through
        // the atomic built-ins.
        let access = match access {
            Access::Read if self.env.is_atomic(var) => Access::Atomic("atomicLoad"),
            Access::Write if self.env.is_atomic(var) => Access::Atomic("atomicStore"),
            Access::Update("+=") if self.env.is_atomic(var) => Access::Atomic("atomicAdd"),
            Access::Update("-=") if self.env.is_atomic(var) => Access::Atomic("atomicSub"),
            other => other,
        };
        if let Access::Update(_) = access {
            if self.env.is_atomic(var) {
                let msg = format!(
                    "`{}` has no atomic form; `{}` is atomic in kernel `{}`",
                    method,
                    var.name,
                    self.kernel_name()
                );
                return self.error(m, msg);
            }
        }
        if let Access::Atomic(_) = access {
            if var.elem_wgsl() == "f32" {
                let msg = format!("atomic access to f32 tensor `{}` is not portable WGSL", var.name);
                self.warn(m, msg);
            }
        }
        let elem = var.elem_wgsl();
        let value = value.map(|v| v.code).unwrap_or_default();
        let code = match (access, var.is_split()) {
            (Access::Read, false) => format!("{}[{}]", var.name, index),
            (Access::Read, true) => {
                self.usage.split_gets.insert(var.name.clone());
                format!("{}_get({})", var.name, index)
            }
            (Access::Write, false) => format!("{}[{}] = {}", var.name, index, value),
            (Access::Write, true) => {
                self.usage.split_sets.insert(var.name.clone());
                format!("{}_set({}, {})", var.name, index, value)
            }
            (Access::Update(op), false) => format!("{}[{}] {} {}", var.name, index, op, value),
            (Access::Update(op), true) => {
                self.usage.split_gets.insert(var.name.clone());
                self.usage.split_sets.insert(var.name.clone());
                let bin = op.trim_end_matches('=');
                format!(
                    "{n}_set({ix}, {n}_get({ix}) {op} {v})",
                    n = var.name,
                    ix = index,
                    op = bin,
                    v = value
                )
            }
            (Access::Atomic(builtin), false) => {
                if builtin == "atomicLoad" {
                    format!("atomicLoad(&{}[{}])", var.name, index)
                } else {
                    format!("{}(&{}[{}], {})", builtin, var.name, index, value)
                }
            }
            (Access::Atomic(builtin), true) => {
                self.usage
                    .split_atomics
                    .insert((var.name.clone(), builtin.to_string()));
                if builtin == "atomicLoad" {
                    format!("{}_{}({})", var.name, builtin, index)
                } else {
                    format!("{}_{}({}, {})", var.name, builtin, index, value)
                }
            }
        };
        let ty = match access {
            Access::Write | Access::Update(_) | Access::Atomic("atomicStore") => None,
            _ => Some(elem),
        };
        Ok(Some(Typed::new(code, ty)))
    }

    /// Flat element index of a tensor access, through an `IndexND` helper.
    fn tensor_index(&mut self, m: &ExprMethodCall, var: &Var, indexes: &[&Expr]) -> TResult<String> {
        let n = indexes.len();
        if n == 0 || n > MAX_TENSOR_DIMS {
            return self.error(m, format!("`{}` needs 1 to {} indexes", m.method, MAX_TENSOR_DIMS));
        }
        if n != var.dims {
            return self.error(
                m,
                format!("`{}` has {} dimensions but {} indexes are given", var.name, var.dims, n),
            );
        }
        let base = var.tensor_index.unwrap_or(0) * MAX_TENSOR_DIMS;
        let mut args: Vec<String> = (0..n)
            .map(|d| format!("{}[{}]", STRIDES_VAR, base + d))
            .collect();
        for e in indexes {
            let ix = self.expr(e)?;
            let code = match ix.ty.as_deref() {
                Some("u32") => ix.code,
                _ if ix.code.chars().all(|c| c.is_ascii_digit()) => format!("{}u", ix.code),
                _ => format!("u32({})", ix.code),
            };
            args.push(code);
        }
        self.usage.index_dims.insert(n);
        Ok(format!("Index{}D({})", n, args.join(", ")))
    }
}
