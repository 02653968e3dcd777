//! Generated helper functions: strided `IndexND` flattening and the
//! accessors of tensors split across several buffers.

use std::fmt::Write as _;

use crate::layout::SplitLayout;
use crate::system::{System, Var};
use crate::translate::Usage;

/// `IndexND(s0.., i0..)`: dot product of strides and indexes.
pub fn index_fn(dims: usize) -> String {
    let strides: Vec<String> = (0..dims).map(|d| format!("s{}: u32", d)).collect();
    let indexes: Vec<String> = (0..dims).map(|d| format!("i{}: u32", d)).collect();
    let terms: Vec<String> = (0..dims).map(|d| format!("s{d} * i{d}")).collect();
    format!(
        "fn Index{}D({}, {}) -> u32 {{\n\treturn {};\n}}\n",
        dims,
        strides.join(", "),
        indexes.join(", "),
        terms.join(" + ")
    )
}

/// Physical buffer `b` and offset `o` of logical index `ix`. The last
/// buffer absorbs any index past the others, matching
/// [`SplitLayout::locate`].
fn locate(out: &mut String, split: SplitLayout) {
    let _ = writeln!(
        out,
        "\tlet b = min(ix / {}u, {}u);",
        split.per_buffer,
        split.n_buffs - 1
    );
    let _ = writeln!(out, "\tlet o = ix - b * {}u;", split.per_buffer);
}

/// A `switch` over the physical buffers, one `body(buffer)` per case.
fn dispatch(out: &mut String, var: &Var, body: impl Fn(&str) -> String) {
    let n = var.n_buffs.max(1);
    out.push_str("\tswitch (b) {\n");
    for k in 0..n {
        let label = if k + 1 == n {
            "default".to_string()
        } else {
            format!("case {}u", k)
        };
        let _ = writeln!(out, "\t\t{}: {{ {} }}", label, body(&var.buffer_name(k)));
    }
    out.push_str("\t}\n");
}

fn getter(var: &Var) -> String {
    let elem = var.elem_wgsl();
    let mut out = format!("fn {}_get(ix: u32) -> {} {{\n", var.name, elem);
    locate(&mut out, SplitLayout::of(var));
    let _ = writeln!(out, "\tvar r: {};", elem);
    dispatch(&mut out, var, |buf| format!("r = {}[o];", buf));
    out.push_str("\treturn r;\n}\n");
    out
}

fn setter(var: &Var) -> String {
    let mut out = format!("fn {}_set(ix: u32, v: {}) {{\n", var.name, var.elem_wgsl());
    locate(&mut out, SplitLayout::of(var));
    dispatch(&mut out, var, |buf| format!("{}[o] = v;", buf));
    out.push_str("}\n");
    out
}

fn atomic(var: &Var, builtin: &str) -> String {
    let elem = var.elem_wgsl();
    let mut out = String::new();
    match builtin {
        "atomicLoad" => {
            let _ = writeln!(out, "fn {}_{}(ix: u32) -> {} {{", var.name, builtin, elem);
            locate(&mut out, SplitLayout::of(var));
            let _ = writeln!(out, "\tvar r: {};", elem);
            dispatch(&mut out, var, |buf| format!("r = atomicLoad(&{}[o]);", buf));
            out.push_str("\treturn r;\n");
        }
        "atomicStore" => {
            let _ = writeln!(out, "fn {}_{}(ix: u32, v: {}) {{", var.name, builtin, elem);
            locate(&mut out, SplitLayout::of(var));
            dispatch(&mut out, var, |buf| format!("atomicStore(&{}[o], v);", buf));
        }
        _ => {
            let _ = writeln!(
                out,
                "fn {}_{}(ix: u32, v: {}) -> {} {{",
                var.name, builtin, elem, elem
            );
            locate(&mut out, SplitLayout::of(var));
            let _ = writeln!(out, "\tvar r: {};", elem);
            dispatch(&mut out, var, |buf| format!("r = {}(&{}[o], v);", builtin, buf));
            out.push_str("\treturn r;\n");
        }
    }
    out.push_str("}\n");
    out
}

/// Every helper a kernel's functions call, each once.
pub fn helpers(system: &System, usage: &Usage) -> String {
    let mut out = String::new();
    for &dims in &usage.index_dims {
        out.push_str(&index_fn(dims));
        out.push('\n');
    }
    for var in system.vars().filter(|v| v.is_split()) {
        if usage.split_gets.contains(&var.name) {
            out.push_str(&getter(var));
            out.push('\n');
        }
        if usage.split_sets.contains(&var.name) {
            out.push_str(&setter(var));
            out.push('\n');
        }
        for (name, builtin) in &usage.split_atomics {
            if name == &var.name {
                out.push_str(&atomic(var, builtin));
                out.push('\n');
            }
        }
    }
    out
}
