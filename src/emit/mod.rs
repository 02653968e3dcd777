//! Kernel emission: assemble one WGSL compute shader per kernel.
//!
//! A kernel file holds, in order: the System's binding table, the entry
//! point, the index and split-buffer helpers the kernel uses, the types
//! and constants of every file, the kernel's reachable functions in file
//! order, and the runtime modules its text calls.

pub mod header;
pub mod helpers;
pub mod write;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::graph::CallGraph;
use crate::runtime;
use crate::system::{Kernel, System, Systems};
use crate::translate::{emit_function, fn_items, Env, ItemIndex, SpanMap, Usage};

pub use write::{output_path, write_imports, write_manifest, write_shaders};

/// First line of every generated file.
pub const GENERATED: &str = "// Code generated by rustsl. DO NOT EDIT.";

/// Read-only run state shared by every kernel emission.
#[derive(Clone, Copy)]
pub struct Shared<'a> {
    pub index: &'a ItemIndex,
    pub systems: &'a Systems,
    pub graph: &'a CallGraph,
    pub config: &'a Config,
    /// Types and constants of every file, rendered once per run.
    pub items: &'a str,
    /// Span maps of the parsed files, in processing order.
    pub spans: &'a [SpanMap],
}

/// The shader text of one kernel.
#[derive(Clone, Debug)]
pub struct KernelShader {
    pub system: String,
    pub kernel: String,
    pub text: String,
    /// Warnings raised while translating the kernel's functions.
    pub diagnostics: Vec<Diagnostic>,
}

impl KernelShader {
    /// Path relative to the output directory: `<kernel>.wgsl`, under a
    /// `<System>/` directory for named Systems.
    pub fn relative_path(&self) -> PathBuf {
        let file = format!("{}.wgsl", self.kernel);
        if self.system == crate::system::DEFAULT_SYSTEM {
            PathBuf::from(file)
        } else {
            PathBuf::from(&self.system).join(file)
        }
    }
}

/// Translate the reachable functions of `kernel`, in file order, each
/// once. `files[i]` is the parsed file whose span map is `spans[i]`;
/// skipped files are `None`.
fn functions(
    shared: &Shared<'_>,
    files: &[Option<syn::File>],
    system: &System,
    kernel: &Kernel,
    diags: &mut Vec<Diagnostic>,
) -> Result<(String, Usage), Diagnostic> {
    let mut out = String::new();
    let mut usage = Usage::default();
    let mut emitted = BTreeSet::new();
    for (i, file) in files.iter().enumerate() {
        let (Some(file), Some(spans)) = (file, shared.spans.get(i)) else {
            continue;
        };
        let env = Env::for_kernel(shared.index, shared.systems, system, kernel, shared.config, spans);
        for item in fn_items(file) {
            if !kernel.funcs.contains(&item.name) || emitted.contains(&item.name) {
                continue;
            }
            // A duplicate whose first definition lives in another file.
            if shared.graph.get(&item.name).is_some_and(|f| f.file != i) {
                continue;
            }
            let f = emit_function(&env, &item)?;
            out.push_str(&f.text);
            out.push('\n');
            usage.merge(f.usage);
            diags.extend(f.warnings);
            emitted.insert(item.name);
        }
    }
    Ok((out, usage))
}

/// Emit the shader file of one resolved kernel. A translation error
/// skips the kernel; it is returned with the warnings gathered so far.
pub fn emit_kernel(
    shared: &Shared<'_>,
    files: &[Option<syn::File>],
    system: &System,
    kernel: &Kernel,
) -> Result<KernelShader, Vec<Diagnostic>> {
    let mut diags = Vec::new();
    let (funcs, usage) = match functions(shared, files, system, kernel, &mut diags) {
        Ok(r) => r,
        Err(e) => {
            diags.push(e);
            return Err(diags);
        }
    };

    let mut text = String::new();
    text.push_str(GENERATED);
    text.push('\n');
    text.push_str(&format!("// Kernel: {} (System: {})\n\n", kernel.name, system.name));
    text.push_str(&header::bindings(system, kernel));
    text.push('\n');
    text.push_str(&header::entry_point(kernel, shared.config.workgroup_size));
    text.push('\n');
    text.push_str(&helpers::helpers(system, &usage));

    let mut body = String::new();
    body.push_str(shared.items);
    body.push_str(&funcs);
    for module in runtime::required(&body) {
        body.push_str(&format!("// runtime: {}\n", module.name));
        body.push_str(module.source);
        body.push('\n');
    }
    text.push_str(&body);

    tracing::debug!(
        kernel = %kernel.name,
        system = %system.name,
        functions = kernel.funcs.len(),
        bytes = text.len(),
        "kernel emitted"
    );
    Ok(KernelShader {
        system: system.name.clone(),
        kernel: kernel.name.clone(),
        text,
        diagnostics: diags,
    })
}
