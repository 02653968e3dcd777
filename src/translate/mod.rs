//! Translation of the supported Rust subset into WGSL.
//!
//! One [`Translator`] serves two passes. In [`Mode::Graph`] it walks a
//! function only to record the call-graph facts (callees, touched vars,
//! atomics); in [`Mode::Emit`] it prints WGSL for one kernel, rewriting
//! global-variable access against that kernel's binding layout.

pub mod expr;
mod globals;
pub mod items;
pub mod prepass;
mod stmt;
pub mod types;


use std::collections::{BTreeSet, HashMap};

use syn::spanned::Spanned;
use syn::{FnArg, Pat, ReturnType};

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::graph::Function;
use crate::span::{LineIndex, Span};
use crate::system::{Kernel, System, Systems, Var};

pub use items::ItemIndex;

pub type TResult<T> = Result<T, Diagnostic>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Record call-graph facts only.
    Graph,
    /// Produce WGSL for the kernel in the environment.
    Emit,
}

/// Maps spans of the prepared (extracted) text back to the original file.
#[derive(Clone, Debug)]
pub struct SpanMap {
    index: LineIndex,
    origin: Vec<usize>,
}

impl SpanMap {
    pub fn new(index: LineIndex, origin: Vec<usize>) -> Self {
        Self { index, origin }
    }

    /// Identity mapping, for text that was not extracted.
    pub fn identity(file_id: u16, text: &str) -> Self {
        let n = text.lines().count();
        Self::new(LineIndex::new(file_id, text), (0..n).collect())
    }

    /// Span of the original line holding `span`.
    pub fn span(&self, span: proc_macro2::Span) -> Span {
        let ext = span.start().line.saturating_sub(1);
        let line = self
            .origin
            .get(ext)
            .or_else(|| self.origin.last())
            .copied()
            .unwrap_or(0);
        self.index.line(line)
    }
}

/// Read-only state shared by every function translated in a pass.
pub struct Env<'a> {
    pub index: &'a ItemIndex,
    pub systems: &'a Systems,
    /// The kernel being emitted, with its System.
    pub kernel: Option<(&'a System, &'a Kernel)>,
    pub config: &'a Config,
    pub spans: &'a SpanMap,
}

impl<'a> Env<'a> {
    /// Environment of the graph pass.
    pub fn graph(
        index: &'a ItemIndex,
        systems: &'a Systems,
        config: &'a Config,
        spans: &'a SpanMap,
    ) -> Self {
        Self {
            index,
            systems,
            kernel: None,
            config,
            spans,
        }
    }

    /// Environment for emitting one kernel.
    pub fn for_kernel(
        index: &'a ItemIndex,
        systems: &'a Systems,
        system: &'a System,
        kernel: &'a Kernel,
        config: &'a Config,
        spans: &'a SpanMap,
    ) -> Self {
        Self {
            index,
            systems,
            kernel: Some((system, kernel)),
            config,
            spans,
        }
    }

    /// Look up a global var, in the kernel's System when emitting.
    pub fn var(&self, name: &str) -> Option<&'a Var> {
        match self.kernel {
            Some((system, _)) => system.var(name),
            None => self.systems.find_var(name).map(|(_, v)| v),
        }
    }

    /// Look up the var behind a `get_<name>` accessor.
    pub fn accessor(&self, name: &str) -> Option<&'a Var> {
        match self.kernel {
            Some((system, _)) => system.var_for_accessor(name),
            None => self.systems.find_accessor(name).map(|(_, v)| v),
        }
    }

    /// Whether the kernel may write `var`.
    pub fn writable(&self, var: &Var) -> bool {
        match self.kernel {
            Some((system, kernel)) => system.writable(kernel, var),
            None => true,
        }
    }

    /// Whether the kernel accesses `var` atomically.
    pub fn is_atomic(&self, var: &Var) -> bool {
        self.kernel
            .is_some_and(|(_, k)| k.atomics.contains(&var.name))
    }
}

/// Helpers a kernel's functions need, collected while emitting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// Dimensions of the `IndexND` helpers used.
    pub index_dims: BTreeSet<usize>,
    pub split_gets: BTreeSet<String>,
    pub split_sets: BTreeSet<String>,
    /// `(var, atomic built-in)` pairs needing a split helper.
    pub split_atomics: BTreeSet<(String, String)>,
}

impl Usage {
    pub fn merge(&mut self, other: Usage) {
        self.index_dims.extend(other.index_dims);
        self.split_gets.extend(other.split_gets);
        self.split_sets.extend(other.split_sets);
        self.split_atomics.extend(other.split_atomics);
    }
}

/// A function or method borrowed from a parsed file.
pub struct FnItem<'f> {
    /// WGSL name: `name`, or `Type_name` for methods.
    pub name: String,
    pub sig: &'f syn::Signature,
    pub body: &'f syn::Block,
    pub self_ty: Option<String>,
}

/// Every function and method of a file, in source order. Test
/// functions are skipped.
pub fn fn_items(file: &syn::File) -> Vec<FnItem<'_>> {
    let mut out = Vec::new();
    for item in &file.items {
        match item {
            syn::Item::Fn(f) if !is_test(&f.attrs) => out.push(FnItem {
                name: types::ident(&f.sig.ident.to_string()),
                sig: &f.sig,
                body: &f.block,
                self_ty: None,
            }),
            syn::Item::Impl(imp) => {
                let Some(self_ty) = types::host_name(&imp.self_ty) else {
                    continue;
                };
                for ii in &imp.items {
                    if let syn::ImplItem::Fn(m) = ii {
                        if is_test(&m.attrs) {
                            continue;
                        }
                        out.push(FnItem {
                            name: format!("{}_{}", self_ty, m.sig.ident),
                            sig: &m.sig,
                            body: &m.block,
                            self_ty: Some(self_ty.clone()),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn is_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| a.path().is_ident("test"))
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Local {
    /// WGSL type, when known.
    pub ty: Option<String>,
    /// A `ptr<function, T>` parameter.
    pub ptr: bool,
}

/// A global-variable value copied into a local, written back at scope exit.
#[derive(Clone, Debug)]
pub(crate) struct WriteBack {
    pub local: String,
    pub target: String,
}

#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub locals: HashMap<String, Local>,
    pub pending: Vec<WriteBack>,
    pub loop_body: bool,
}

/// Translator of one function in one mode.
pub struct Translator<'a> {
    pub(crate) env: &'a Env<'a>,
    pub(crate) mode: Mode,
    pub(crate) out: String,
    pub(crate) indent: usize,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) self_ty: Option<String>,
    pub(crate) ret_ty: Option<String>,
    /// Call-graph facts recorded in either mode.
    pub func: Function,
    pub usage: Usage,
    pub warnings: Vec<Diagnostic>,
}

impl<'a> Translator<'a> {
    pub fn new(env: &'a Env<'a>, mode: Mode) -> Self {
        Self {
            env,
            mode,
            out: String::new(),
            indent: 0,
            scopes: Vec::new(),
            self_ty: None,
            ret_ty: None,
            func: Function::default(),
            usage: Usage::default(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn emitting(&self) -> bool {
        self.mode == Mode::Emit
    }

    pub(crate) fn span_of(&self, node: &impl Spanned) -> Span {
        self.env.spans.span(node.span())
    }

    pub(crate) fn error<T>(&self, node: &impl Spanned, message: String) -> TResult<T> {
        Err(Diagnostic::error(message, self.span_of(node)))
    }

    pub(crate) fn warn(&mut self, node: &impl Spanned, message: String) {
        let span = self.span_of(node);
        if !self.warnings.iter().any(|w| w.message == message) {
            self.warnings.push(Diagnostic::warning(message, span));
        }
    }

    pub(crate) fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    // --- Scopes ---

    pub(crate) fn push_scope(&mut self, loop_body: bool) {
        self.scopes.push(Scope {
            loop_body,
            ..Default::default()
        });
    }

    /// Close the innermost scope, writing back its pending globals unless
    /// control already left the block.
    pub(crate) fn pop_scope(&mut self, flush: bool) {
        if let Some(scope) = self.scopes.pop() {
            if flush {
                for wb in scope.pending.iter().rev() {
                    let text = format!("{} = {};", wb.target, wb.local);
                    self.line(&text);
                }
            }
        }
    }

    /// Write back every pending global, before a `return`.
    pub(crate) fn flush_all(&mut self) {
        let lines: Vec<String> = self
            .scopes
            .iter()
            .rev()
            .flat_map(|s| s.pending.iter().rev())
            .map(|wb| format!("{} = {};", wb.target, wb.local))
            .collect();
        for l in lines {
            self.line(&l);
        }
    }

    /// Write back pending globals up to the enclosing loop body, before a
    /// `break` or `continue`.
    pub(crate) fn flush_loop(&mut self) {
        let mut lines = Vec::new();
        for scope in self.scopes.iter().rev() {
            lines.extend(
                scope
                    .pending
                    .iter()
                    .rev()
                    .map(|wb| format!("{} = {};", wb.target, wb.local)),
            );
            if scope.loop_body {
                break;
            }
        }
        for l in lines {
            self.line(&l);
        }
    }

    pub(crate) fn declare(&mut self, name: &str, local: Local) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.insert(name.to_string(), local);
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Local> {
        self.scopes.iter().rev().find_map(|s| s.locals.get(name))
    }

    pub(crate) fn defer_write_back(&mut self, local: &str, target: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.pending.push(WriteBack {
                local: local.to_string(),
                target,
            });
        }
    }

    // --- Functions ---

    /// Translate one function. In [`Mode::Graph`] the returned text is
    /// discarded by callers; `self.func` holds the recorded facts.
    pub fn function(&mut self, item: &FnItem<'_>) -> TResult<String> {
        let sig = item.sig;
        self.func.name = item.name.clone();
        self.func.span = self.span_of(&sig.ident);
        self.self_ty = item.self_ty.clone();
        if !sig.generics.params.is_empty() {
            return self.error(
                &sig.generics,
                format!("generic function `{}` cannot run on the GPU", item.name),
            );
        }

        self.push_scope(false);
        let mut params = Vec::new();
        let mut copies = Vec::new();
        for arg in &sig.inputs {
            match arg {
                FnArg::Receiver(recv) => {
                    let ty = self
                        .self_ty
                        .clone()
                        .ok_or_else(|| Diagnostic::error("`self` outside an impl".to_string(), self.span_of(recv)))?;
                    let ptr = recv.reference.is_some() && recv.mutability.is_some();
                    if ptr {
                        params.push(format!("slf: ptr<function, {}>", ty));
                    } else {
                        params.push(format!("slf: {}", ty));
                    }
                    self.declare("self", Local { ty: Some(ty), ptr });
                }
                FnArg::Typed(pt) => {
                    let Pat::Ident(pi) = &*pt.pat else {
                        return self.error(&pt.pat, "parameters must be plain names".to_string());
                    };
                    let name = pi.ident.to_string();
                    let wname = types::ident(&name);
                    let ty = types::wgsl_type(&pt.ty, self.self_ty.as_deref())
                        .or_else(|m| self.error(&pt.ty, m))?;
                    let ptr = types::is_mut_ref(&pt.ty);
                    if ptr {
                        params.push(format!("{}: ptr<function, {}>", wname, ty));
                    } else if pi.mutability.is_some() {
                        params.push(format!("{}_in: {}", wname, ty));
                        copies.push(format!("var {} = {}_in;", wname, wname));
                    } else {
                        params.push(format!("{}: {}", wname, ty));
                    }
                    self.declare(&name, Local { ty: Some(ty), ptr });
                }
            }
        }

        self.ret_ty = match &sig.output {
            ReturnType::Default => None,
            ReturnType::Type(_, ty) => Some(
                types::wgsl_type(ty, self.self_ty.as_deref()).or_else(|m| self.error(ty, m))?,
            ),
        };

        let header = match &self.ret_ty {
            Some(ret) => format!("fn {}({}) -> {} {{", item.name, params.join(", "), ret),
            None => format!("fn {}({}) {{", item.name, params.join(", ")),
        };
        self.line(&header);
        self.indent += 1;
        for c in &copies {
            self.line(c);
        }
        let tail = if self.ret_ty.is_some() {
            stmt::Tail::Return
        } else {
            stmt::Tail::Discard
        };
        let exits = self.block_stmts(&item.body.stmts, tail)?;
        self.pop_scope(!exits);
        self.indent -= 1;
        self.line("}");
        Ok(std::mem::take(&mut self.out))
    }
}

/// Record the call-graph node of one function.
pub fn graph_function(env: &Env<'_>, item: &FnItem<'_>, file: usize) -> Result<Function, Diagnostic> {
    let mut t = Translator::new(env, Mode::Graph);
    t.function(item)?;
    let mut func = t.func;
    func.file = file;
    Ok(func)
}

/// Emitted WGSL of one function, with the helpers it needs.
#[derive(Debug)]
pub struct EmittedFn {
    pub text: String,
    pub usage: Usage,
    pub warnings: Vec<Diagnostic>,
}

/// Translate one function for the kernel in `env`.
pub fn emit_function(env: &Env<'_>, item: &FnItem<'_>) -> Result<EmittedFn, Diagnostic> {
    let mut t = Translator::new(env, Mode::Emit);
    let text = t.function(item)?;
    Ok(EmittedFn {
        text,
        usage: t.usage,
        warnings: t.warnings,
    })
}
