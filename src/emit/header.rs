//! Binding declarations and the compute entry point of a kernel file.

use std::fmt::Write as _;

use crate::layout::STRIDES_VAR;
use crate::system::{Kernel, System, Var};
use crate::translate::types;

/// Name of the generated entry point.
pub const ENTRY_POINT: &str = "main";

fn doc_lines(out: &mut String, doc: &str) {
    for line in doc.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            out.push_str("//\n");
        } else {
            let _ = writeln!(out, "// {}", line);
        }
    }
}

/// Storage declaration of one var as `kernel` sees it.
fn declaration(system: &System, kernel: &Kernel, var: &Var, k: usize) -> String {
    let name = var.buffer_name(k);
    let coords = format!("@group({}) @binding({})", var.group, var.binding + k as u32);
    if system.is_uniform(var) {
        return format!("{} var<uniform> {}: array<{}, 1>;", coords, name, var.elem_wgsl());
    }
    let writable = system.writable(kernel, var);
    let access = if writable { "read_write" } else { "read" };
    let elem = if writable && kernel.atomics.contains(&var.name) {
        format!("atomic<{}>", var.elem_wgsl())
    } else {
        var.elem_wgsl().to_string()
    };
    format!("{} var<storage, {}> {}: array<{}>;", coords, access, name, elem)
}

/// Every Group and Var of the kernel's System, with their docs. The
/// table is System-wide; only access modes depend on the kernel.
pub fn bindings(system: &System, kernel: &Kernel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "@group(0) @binding(0) var<storage, read> {}: array<u32>;",
        STRIDES_VAR
    );
    for group in &system.groups {
        out.push('\n');
        let _ = writeln!(
            out,
            "// Group {}: {}{}",
            group.number,
            group.name,
            if group.uniform { " (uniform)" } else { "" }
        );
        doc_lines(&mut out, &group.doc);
        for var in &group.vars {
            doc_lines(&mut out, &var.doc);
            for k in 0..var.buffer_count() {
                out.push_str(&declaration(system, kernel, var, k));
                out.push('\n');
            }
        }
    }
    out
}

/// One thread per flattened global index, dispatched to the kernel.
pub fn entry_point(kernel: &Kernel, workgroup_size: u32) -> String {
    let arg = if kernel.call_args.is_empty() {
        String::new()
    } else {
        match kernel.index_type() {
            "u32" => "idx".to_string(),
            other => format!("{}(idx)", types::scalar(other).unwrap_or(other)),
        }
    };
    let mut out = String::new();
    let _ = writeln!(out, "@compute @workgroup_size({}, 1, 1)", workgroup_size);
    let _ = writeln!(
        out,
        "fn {}(@builtin(workgroup_id) wgid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>, @builtin(local_invocation_index) loci: u32) {{",
        ENTRY_POINT
    );
    let _ = writeln!(
        out,
        "\tlet idx = loci + (wgid.x + wgid.y * nwg.x + wgid.z * nwg.x * nwg.y) * {}u;",
        workgroup_size
    );
    let _ = writeln!(out, "\t{}({});", types::ident(&kernel.name), arg);
    out.push_str("}\n");
    out
}
