//! Statements and control flow.

use syn::{Block, Expr, ExprForLoop, ExprIf, ExprMatch, Local as LetStmt, Pat, RangeLimits, Stmt};

use super::prepass::WGSL_MACRO;
use super::types;
use super::{Local, TResult, Translator};

/// Macros that only make sense on the CPU; dropped from shaders.
const CPU_MACROS: &[&str] = &[
    "println",
    "print",
    "eprintln",
    "eprint",
    "dbg",
    "assert",
    "assert_eq",
    "assert_ne",
    "debug_assert",
    "debug_assert_eq",
    "debug_assert_ne",
    "trace",
    "debug",
    "info",
    "warn",
];

/// What to do with the value of a block's trailing expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tail {
    Discard,
    Return,
    /// Assign to the named local.
    Assign(String),
}

impl<'a> Translator<'a> {
    /// Translate statements of a block whose scope is already open.
    /// Returns whether control always leaves the block before its end.
    pub(crate) fn block_stmts(&mut self, stmts: &[Stmt], tail: Tail) -> TResult<bool> {
        let mut exits = false;
        for (i, stmt) in stmts.iter().enumerate() {
            let last = i + 1 == stmts.len();
            exits = match stmt {
                Stmt::Local(local) => {
                    self.let_stmt(local)?;
                    false
                }
                Stmt::Item(syn::Item::Const(c)) => {
                    self.local_const(c)?;
                    false
                }
                Stmt::Item(item) => {
                    return self.error(item, "only `const` items may appear in GPU functions".to_string())
                }
                Stmt::Expr(expr, None) if last => self.tail_expr(expr, &tail)?,
                Stmt::Expr(expr, _) => self.stmt_expr(expr)?,
                Stmt::Macro(m) => {
                    self.stmt_macro(&m.mac)?;
                    false
                }
            };
        }
        Ok(exits)
    }

    /// A nested block with its own scope.
    pub(crate) fn branch(&mut self, block: &Block, tail: &Tail, loop_body: bool) -> TResult<bool> {
        self.indent += 1;
        self.push_scope(loop_body);
        let exits = self.block_stmts(&block.stmts, tail.clone())?;
        self.pop_scope(!exits);
        self.indent -= 1;
        Ok(exits)
    }

    fn local_const(&mut self, c: &syn::ItemConst) -> TResult<()> {
        let ty = types::wgsl_type(&c.ty, self.self_ty.as_deref()).or_else(|m| self.error(&c.ty, m))?;
        let value = self.expr(&c.expr)?;
        let name = c.ident.to_string();
        let text = format!("const {}: {} = {};", types::ident(&name), ty, value.code);
        self.line(&text);
        self.declare(&name, Local { ty: Some(ty), ptr: false });
        Ok(())
    }

    fn let_stmt(&mut self, local: &LetStmt) -> TResult<()> {
        let (pat, annotated) = match &local.pat {
            Pat::Type(pt) => {
                let ty = types::wgsl_type(&pt.ty, self.self_ty.as_deref())
                    .or_else(|m| self.error(&pt.ty, m))?;
                (&*pt.pat, Some(ty))
            }
            other => (other, None),
        };
        let init = match &local.init {
            Some(init) if init.diverge.is_some() => {
                return self.error(local, "`let ... else` is not supported".to_string())
            }
            Some(init) => Some(&*init.expr),
            None => None,
        };

        let (name, mutable) = match pat {
            Pat::Ident(pi) if pi.by_ref.is_none() && pi.subpat.is_none() => {
                (pi.ident.to_string(), pi.mutability.is_some())
            }
            Pat::Wild(_) => {
                if let Some(e) = init {
                    let v = self.expr(e)?;
                    self.line(&format!("_ = {};", v.code));
                }
                return Ok(());
            }
            _ => return self.error(pat, "only simple `let` bindings are supported".to_string()),
        };
        let wname = types::ident(&name);

        let Some(init) = init else {
            let Some(ty) = annotated else {
                return self.error(local, format!("`{}` needs a type annotation", name));
            };
            self.line(&format!("var {}: {};", wname, ty));
            self.declare(&name, Local { ty: Some(ty), ptr: false });
            return Ok(());
        };

        if let Some((call, var)) = self.accessor_call(init) {
            return self.let_global(&name, mutable, annotated, call, var);
        }

        if needs_statement_form(init) {
            let Some(ty) = annotated.or_else(|| self.branch_type(init)) else {
                return self.error(local, format!("`{}` needs a type annotation", name));
            };
            self.line(&format!("var {}: {};", wname, ty));
            self.declare(&name, Local { ty: Some(ty), ptr: false });
            self.tail_expr(init, &Tail::Assign(wname))?;
            return Ok(());
        }

        let value = self.expr(init)?;
        let keyword = if mutable { "var" } else { "let" };
        let text = match &annotated {
            Some(ty) => format!("{} {}: {} = {};", keyword, wname, ty, value.code),
            None => format!("{} {} = {};", keyword, wname, value.code),
        };
        self.line(&text);
        self.declare(
            &name,
            Local {
                ty: annotated.or(value.ty),
                ptr: false,
            },
        );
        Ok(())
    }

    /// Best-effort type of an `if`/`match` value from its first branch.
    fn branch_type(&mut self, e: &Expr) -> Option<String> {
        let tail = match e {
            Expr::If(i) => last_expr(&i.then_branch)?,
            Expr::Match(m) => match &*m.arms.first()?.body {
                Expr::Block(b) => last_expr(&b.block)?,
                other => other,
            },
            Expr::Block(b) => last_expr(&b.block)?,
            _ => return None,
        };
        let saved = std::mem::take(&mut self.out);
        let ty = self.expr(tail).ok().and_then(|t| t.ty);
        self.out = saved;
        ty
    }

    /// A trailing expression, whose value goes where `tail` says.
    pub(crate) fn tail_expr(&mut self, e: &Expr, tail: &Tail) -> TResult<bool> {
        if *tail == Tail::Discard {
            return self.stmt_expr(e);
        }
        match e {
            Expr::If(i) if needs_statement_form(e) => self.if_stmt(i, tail),
            Expr::Match(m) => self.match_stmt(m, tail),
            Expr::Block(b) if b.label.is_none() => {
                self.line("{");
                let exits = self.branch(&b.block, tail, false)?;
                self.line("}");
                Ok(exits)
            }
            Expr::Return(_) | Expr::Break(_) | Expr::Continue(_) | Expr::While(_) | Expr::ForLoop(_) | Expr::Loop(_) => {
                self.stmt_expr(e)
            }
            _ => {
                let v = self.expr(e)?;
                match tail {
                    Tail::Return => {
                        self.flush_all();
                        self.line(&format!("return {};", v.code));
                        Ok(true)
                    }
                    Tail::Assign(name) => {
                        self.line(&format!("{} = {};", name, v.code));
                        Ok(false)
                    }
                    Tail::Discard => Ok(false),
                }
            }
        }
    }

    /// An expression in statement position.
    pub(crate) fn stmt_expr(&mut self, e: &Expr) -> TResult<bool> {
        match e {
            Expr::Return(r) => {
                let value = match &r.expr {
                    Some(v) => Some(self.expr(v)?),
                    None => None,
                };
                self.flush_all();
                match value {
                    Some(v) => self.line(&format!("return {};", v.code)),
                    None => self.line("return;"),
                }
                Ok(true)
            }
            Expr::Break(b) => {
                if b.label.is_some() || b.expr.is_some() {
                    return self.error(e, "labelled or valued `break` is not supported".to_string());
                }
                self.flush_loop();
                self.line("break;");
                Ok(true)
            }
            Expr::Continue(c) => {
                if c.label.is_some() {
                    return self.error(e, "labelled `continue` is not supported".to_string());
                }
                self.flush_loop();
                self.line("continue;");
                Ok(true)
            }
            Expr::If(i) => self.if_stmt(i, &Tail::Discard),
            Expr::Match(m) => self.match_stmt(m, &Tail::Discard),
            Expr::While(w) => {
                if w.label.is_some() {
                    return self.error(e, "loop labels are not supported".to_string());
                }
                if matches!(&*w.cond, Expr::Let(_)) {
                    return self.error(&w.cond, "`while let` is not supported".to_string());
                }
                let cond = self.expr(&w.cond)?;
                self.line(&format!("while ({}) {{", cond.code));
                self.branch(&w.body, &Tail::Discard, true)?;
                self.line("}");
                Ok(false)
            }
            Expr::Loop(l) => {
                if l.label.is_some() {
                    return self.error(e, "loop labels are not supported".to_string());
                }
                self.line("loop {");
                self.branch(&l.body, &Tail::Discard, true)?;
                self.line("}");
                Ok(false)
            }
            Expr::ForLoop(f) => {
                self.for_stmt(f)?;
                Ok(false)
            }
            Expr::Block(b) if b.label.is_none() => {
                self.line("{");
                let exits = self.branch(&b.block, &Tail::Discard, false)?;
                self.line("}");
                Ok(exits)
            }
            Expr::Assign(a) => {
                let lhs = self.place(&a.left)?;
                let rhs = self.expr(&a.right)?;
                self.line(&format!("{} = {};", lhs, rhs.code));
                Ok(false)
            }
            Expr::Binary(b) if super::expr::compound_op(&b.op).is_some() => {
                let op = super::expr::compound_op(&b.op).unwrap_or("=");
                let lhs = self.place(&b.left)?;
                let rhs = self.expr(&b.right)?;
                self.line(&format!("{} {} {};", lhs, op, rhs.code));
                Ok(false)
            }
            Expr::Macro(m) => {
                self.stmt_macro(&m.mac)?;
                Ok(false)
            }
            Expr::Call(_) | Expr::MethodCall(_) => {
                let v = self.expr(e)?;
                self.line(&format!("{};", v.code));
                Ok(false)
            }
            _ => {
                let v = self.expr(e)?;
                self.line(&format!("_ = {};", v.code));
                Ok(false)
            }
        }
    }

    /// Left-hand side of an assignment.
    fn place(&mut self, e: &Expr) -> TResult<String> {
        if let Expr::Index(ix) = e {
            if let Some(code) = self.global_index_write(ix)? {
                return Ok(code);
            }
        }
        Ok(self.expr(e)?.code)
    }

    fn if_stmt(&mut self, first: &ExprIf, tail: &Tail) -> TResult<bool> {
        let mut cur = first;
        let mut opener = "if";
        let mut all_exit = true;
        loop {
            if matches!(&*cur.cond, Expr::Let(_)) {
                return self.error(&cur.cond, "`if let` is not supported".to_string());
            }
            let cond = self.expr(&cur.cond)?;
            self.line(&format!("{} ({}) {{", opener, cond.code));
            all_exit &= self.branch(&cur.then_branch, tail, false)?;
            match &cur.else_branch {
                None => {
                    self.line("}");
                    return Ok(false);
                }
                Some((_, else_expr)) => match &**else_expr {
                    Expr::If(next) => {
                        cur = next;
                        opener = "} else if";
                    }
                    Expr::Block(b) => {
                        self.line("} else {");
                        all_exit &= self.branch(&b.block, tail, false)?;
                        self.line("}");
                        return Ok(all_exit);
                    }
                    other => return self.error(other, "unsupported `else` branch".to_string()),
                },
            }
        }
    }

    fn for_stmt(&mut self, f: &ExprForLoop) -> TResult<()> {
        if f.label.is_some() {
            return self.error(f, "loop labels are not supported".to_string());
        }
        let name = match &*f.pat {
            Pat::Ident(pi) => pi.ident.to_string(),
            Pat::Wild(_) => "_i".to_string(),
            other => return self.error(other, "loop variable must be a plain name".to_string()),
        };
        let (range, step) = match strip_parens(&f.expr) {
            Expr::MethodCall(m) if m.method == "step_by" && m.args.len() == 1 => {
                (strip_parens(&m.receiver), m.args.first())
            }
            other => (other, None),
        };
        let Expr::Range(range) = range else {
            return self.error(&f.expr, "`for` loops must iterate over an integer range".to_string());
        };
        let (Some(start), Some(end)) = (&range.start, &range.end) else {
            return self.error(range, "`for` ranges need both bounds".to_string());
        };
        let start = self.expr(start)?;
        let end = self.expr(end)?;
        let ty = start
            .ty
            .clone()
            .filter(|t| types::is_integer(t))
            .or_else(|| end.ty.clone().filter(|t| types::is_integer(t)))
            .unwrap_or_else(|| "u32".to_string());
        let op = match range.limits {
            RangeLimits::HalfOpen(_) => "<",
            RangeLimits::Closed(_) => "<=",
        };
        let wname = types::ident(&name);
        let update = match step {
            Some(s) => format!("{} += {}", wname, self.expr(s)?.code),
            None => format!("{}++", wname),
        };
        self.line(&format!(
            "for (var {n}: {ty} = {s}; {n} {op} {e}; {u}) {{",
            n = wname,
            ty = ty,
            s = start.code,
            op = op,
            e = end.code,
            u = update
        ));
        self.indent += 1;
        self.push_scope(true);
        self.declare(&name, Local { ty: Some(ty), ptr: false });
        let exits = self.block_stmts(&f.body.stmts, Tail::Discard)?;
        self.pop_scope(!exits);
        self.indent -= 1;
        self.line("}");
        Ok(())
    }

    fn match_stmt(&mut self, m: &ExprMatch, tail: &Tail) -> TResult<bool> {
        let scrutinee = self.expr(&m.expr)?;
        self.line(&format!("switch ({}) {{", scrutinee.code));
        self.indent += 1;
        let mut has_default = false;
        let mut all_exit = true;
        for arm in &m.arms {
            if let Some((_, guard)) = &arm.guard {
                return self.error(&**guard, "match guards are not supported".to_string());
            }
            let selectors = self.case_selectors(&arm.pat)?;
            match &selectors {
                Some(s) => self.line(&format!("case {}: {{", s.join(", "))),
                None => {
                    has_default = true;
                    self.line("default: {");
                }
            }
            self.indent += 1;
            self.push_scope(false);
            let exits = match &*arm.body {
                Expr::Block(b) if b.label.is_none() => self.block_stmts(&b.block.stmts, tail.clone())?,
                body => self.tail_expr(body, tail)?,
            };
            self.pop_scope(!exits);
            self.indent -= 1;
            self.line("}");
            all_exit &= exits;
        }
        if !has_default {
            self.line("default: {}");
            all_exit = false;
        }
        self.indent -= 1;
        self.line("}");
        Ok(all_exit)
    }

    /// Case selectors of a pattern; `None` for a catch-all.
    fn case_selectors(&mut self, pat: &Pat) -> TResult<Option<Vec<String>>> {
        let mut out = Vec::new();
        let alts: Vec<&Pat> = match pat {
            Pat::Or(or) => or.cases.iter().collect(),
            other => vec![other],
        };
        for p in alts {
            match p {
                Pat::Wild(_) => return Ok(None),
                Pat::Lit(lit) => out.push(self.lit(&lit.lit)?.code),
                Pat::Path(path) => out.push(self.path_expr(path)?.code),
                Pat::Ident(pi) if pi.subpat.is_none() => {
                    let name = pi.ident.to_string();
                    if self.env.index.consts.contains_key(&name) {
                        out.push(types::ident(&name));
                    } else {
                        return Ok(None);
                    }
                }
                other => return self.error(other, "unsupported `match` pattern".to_string()),
            }
        }
        Ok(Some(out))
    }

    fn stmt_macro(&mut self, mac: &syn::Macro) -> TResult<()> {
        let name = mac
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();
        if name == WGSL_MACRO {
            let lit: syn::LitStr = mac
                .parse_body()
                .or_else(|e| self.error(mac, format!("bad WGSL line: {}", e)))?;
            self.line(&lit.value());
            return Ok(());
        }
        if CPU_MACROS.contains(&name.as_str()) {
            return Ok(());
        }
        self.error(mac, format!("macro `{}!` cannot run on the GPU", name))
    }
}

/// `if`/`match`/block values that cannot become a single expression.
fn needs_statement_form(e: &Expr) -> bool {
    match e {
        Expr::If(i) => !super::expr::is_select(i),
        Expr::Match(_) => true,
        Expr::Block(b) => !(b.block.stmts.len() == 1 && last_expr(&b.block).is_some()),
        _ => false,
    }
}

fn last_expr(block: &Block) -> Option<&Expr> {
    match block.stmts.last()? {
        Stmt::Expr(e, None) => Some(e),
        _ => None,
    }
}

pub(crate) fn strip_parens(e: &Expr) -> &Expr {
    match e {
        Expr::Paren(p) => strip_parens(&p.expr),
        Expr::Group(g) => strip_parens(&g.expr),
        other => other,
    }
}
