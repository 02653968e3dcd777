//! Per-kernel reachability: which functions a kernel pulls in, which
//! vars those functions touch, and how many buffers the kernel binds.

use std::collections::BTreeSet;

use super::CallGraph;
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::system::{Kernel, System, Systems};

/// Closure of one kernel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reach {
    pub funcs: BTreeSet<String>,
    pub atomics: BTreeSet<String>,
    pub vars: BTreeSet<String>,
    /// Storage/uniform buffers bound, the stride table included.
    pub n_buffers: usize,
}

/// Resolve one kernel against the graph and its System's layout.
pub fn resolve(kernel: &Kernel, system: &System, graph: &CallGraph) -> Result<Reach, Diagnostic> {
    if !graph.contains(&kernel.name) {
        return Err(Diagnostic::error(
            format!("kernel `{}` has no translatable function", kernel.name),
            kernel.span,
        )
        .with_note("the function may contain errors, or be excluded".to_string()));
    }

    let mut reach = Reach {
        funcs: graph.reachable(&kernel.name),
        ..Default::default()
    };
    for name in &reach.funcs {
        if let Some(f) = graph.get(name) {
            reach.atomics.extend(f.atomics.iter().cloned());
            reach.vars.extend(f.vars.iter().cloned());
        }
    }

    reach.n_buffers = 1;
    for name in &reach.vars {
        let Some(var) = system.var(name) else {
            return Err(Diagnostic::error(
                format!(
                    "kernel `{}` touches `{}`, which is not a var of System `{}`",
                    kernel.name, name, system.name
                ),
                kernel.span,
            ));
        };
        reach.n_buffers += var.buffer_count();
    }
    Ok(reach)
}

/// Summary of resolving every kernel.
#[derive(Clone, Debug, Default)]
pub struct ReachSummary {
    pub resolved: usize,
    pub max_buffers: usize,
    pub over_limit: usize,
}

/// Resolve every kernel of every System, storing the closure on the
/// kernel. Unresolvable kernels stay unresolved and are reported.
pub fn resolve_all(
    systems: &mut Systems,
    graph: &CallGraph,
    config: &Config,
    diags: &mut Vec<Diagnostic>,
) -> ReachSummary {
    let mut summary = ReachSummary::default();
    for system in systems.iter_mut() {
        let results: Vec<(String, Result<Reach, Diagnostic>)> = {
            let shared: &System = system;
            shared
                .kernels
                .values()
                .map(|k| (k.name.clone(), resolve(k, shared, graph)))
                .collect()
        };
        for (name, result) in results {
            let Some(kernel) = system.kernels.get_mut(&name) else {
                continue;
            };
            match result {
                Ok(reach) => {
                    if reach.n_buffers > config.max_storage_buffers {
                        tracing::warn!(
                            kernel = %name,
                            buffers = reach.n_buffers,
                            limit = config.max_storage_buffers,
                            "kernel exceeds storage buffer limit"
                        );
                        diags.push(
                            Diagnostic::warning(
                                format!(
                                    "kernel `{}` binds {} buffers, more than the limit of {}",
                                    name, reach.n_buffers, config.max_storage_buffers
                                ),
                                kernel.span,
                            )
                            .with_help("split the kernel or merge variables".to_string()),
                        );
                        summary.over_limit += 1;
                    }
                    summary.max_buffers = summary.max_buffers.max(reach.n_buffers);
                    summary.resolved += 1;
                    kernel.funcs = reach.funcs;
                    kernel.atomics = reach.atomics;
                    kernel.vars = reach.vars;
                    kernel.n_buffers = reach.n_buffers;
                    kernel.resolved = true;
                }
                Err(diag) => {
                    kernel.resolved = false;
                    diags.push(diag);
                }
            }
        }
    }

    for cycle in graph.cycles() {
        let span = cycle
            .first()
            .and_then(|n| graph.get(n))
            .map(|f| f.span)
            .unwrap_or_default();
        diags.push(
            Diagnostic::warning(format!("recursive functions: {}", cycle.join(", ")), span)
                .with_note("WGSL does not allow recursion".to_string()),
        );
    }
    summary
}
